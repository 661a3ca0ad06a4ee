/*
 * message.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Ragnatela, an HTTP/1.1 client and server library.
 *
 * Ragnatela is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Ragnatela is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Ragnatela.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Common part of requests and responses: start line, headers, content
//! length, and a body.

use bytes::Bytes;

use crate::body::{Body, Payload};
use crate::common::{headers, Headers};
use crate::error::Result;

/// Value of a parsed `Content-Encoding` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
}

#[derive(Debug, Default)]
pub struct Message {
    start_line: String,
    headers: Headers,
    /// None until a Content-Length header has been seen or a body was set.
    content_length: Option<usize>,
    body: Body,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_line(&self) -> &str {
        &self.start_line
    }

    pub fn set_start_line(&mut self, line: impl Into<String>) {
        self.start_line = line.into();
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn header(&self, name: &str) -> &str {
        self.headers.get(name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.has(name)
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    pub fn content_length(&self) -> Option<usize> {
        self.content_length
    }

    pub fn set_content_length(&mut self, length: Option<usize>) {
        self.content_length = length;
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Attach a body. With `set_length`, also record its size and set the
    /// `Content-Length` header (zero included).
    pub fn set_body(&mut self, body: Body, set_length: bool) -> Result<()> {
        self.body = body;
        if set_length {
            let size = self.body.get_size()?;
            self.content_length = Some(size);
            self.headers.set(headers::CONTENT_LENGTH, size.to_string());
        }
        Ok(())
    }

    /// Keep-alive is the HTTP/1.1 default; only `Connection: close`
    /// (case-insensitive) disables it.
    pub fn is_connection_keep_alive(&self) -> bool {
        match self.headers.get_opt(headers::CONNECTION) {
            Some(value) => !value.trim().eq_ignore_ascii_case("close"),
            None => true,
        }
    }

    pub fn content_encoding(&self) -> ContentEncoding {
        match self.headers.get(headers::CONTENT_ENCODING).trim() {
            "gzip" => ContentEncoding::Gzip,
            "deflate" => ContentEncoding::Deflate,
            _ => ContentEncoding::Identity,
        }
    }

    pub fn accept_encoding_gzip(&self) -> bool {
        self.headers.get(headers::ACCEPT_ENCODING).contains("gzip")
    }

    pub fn set_content_type(&mut self, media_type: &str, charset: &str) {
        if charset.is_empty() {
            self.headers.set(headers::CONTENT_TYPE, media_type);
        } else {
            self.headers
                .set(headers::CONTENT_TYPE, format!("{}; charset={}", media_type, charset));
        }
    }

    /// Start line and header block as a single payload buffer. The body
    /// follows via its own payload iteration.
    pub fn head_payload(&self) -> Payload {
        let mut head = String::with_capacity(self.start_line.len() + 2 + self.headers.len() * 32);
        head.push_str(&self.start_line);
        head.push_str("\r\n");
        for (name, value) in self.headers.iter() {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        vec![Bytes::from(head)]
    }

    /// Head block for logging.
    pub fn dump(&self) -> String {
        let mut out = format!("> {}\n", self.start_line);
        for (name, value) in self.headers.iter() {
            out.push_str(&format!("> {}: {}\n", name, value));
        }
        out
    }
}
