/*
 * response.rs
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

//! HTTP response: status, reason phrase, headers, body.

use std::ops::{Deref, DerefMut};

use crate::common::headers;
use crate::error::Result;
use crate::http::message::Message;
use crate::utility;

/// Status codes used across the library. Not a full list.
pub mod status_codes {
    pub const SWITCHING_PROTOCOLS: u16 = 101;
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const ACCEPTED: u16 = 202;
    pub const NO_CONTENT: u16 = 204;
    pub const NOT_MODIFIED: u16 = 304;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const NOT_IMPLEMENTED: u16 = 501;
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

/// Conventional reason phrase for a status code; "" when unknown.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

#[derive(Debug, Default)]
pub struct Response {
    message: Message,
    status: u16,
    reason: String,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            message: Message::new(),
            status,
            reason: String::new(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn set_reason(&mut self, reason: impl Into<String>) {
        self.reason = reason.into();
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body bytes as UTF-8 (lossy) for string bodies.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.message.body().data()).into_owned()
    }

    /// Finalize for sending: derive the reason phrase when none was given,
    /// build the start line, stamp `Server` and `Date`, and make sure
    /// `Content-Length` is present (zero for empty bodies; common clients
    /// require it even on 404s).
    pub fn prepare(&mut self) -> Result<()> {
        if self.reason.is_empty() {
            self.reason = reason_phrase(self.status).to_string();
        }

        let line = if self.reason.is_empty() {
            format!("HTTP/1.1 {}", self.status)
        } else {
            format!("HTTP/1.1 {} {}", self.status, self.reason)
        };
        self.message.set_start_line(line);

        if !self.message.has_header(headers::SERVER) {
            self.message.set_header(headers::SERVER, utility::user_agent());
        }
        if !self.message.has_header(headers::DATE) {
            self.message.set_header(headers::DATE, utility::http_date());
        }

        if !self.message.has_header(headers::CONTENT_LENGTH) {
            let size = self.message.body_mut().get_size()?;
            self.message.set_content_length(Some(size));
            self.message
                .set_header(headers::CONTENT_LENGTH, size.to_string());
        }

        Ok(())
    }
}

impl Deref for Response {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.message
    }
}

impl DerefMut for Response {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::Body;

    #[test]
    fn prepare_derives_reason_and_content_length() {
        let mut response = Response::new(404);
        response.prepare().unwrap();
        assert_eq!(response.start_line(), "HTTP/1.1 404 Not Found");
        assert_eq!(response.header(headers::CONTENT_LENGTH), "0");
        assert!(response.has_header(headers::DATE));
        assert!(response.has_header(headers::SERVER));
    }

    #[test]
    fn prepare_keeps_supplied_reason() {
        let mut response = Response::new(200);
        response.set_reason("Fine");
        response.prepare().unwrap();
        assert_eq!(response.start_line(), "HTTP/1.1 200 Fine");
    }

    #[test]
    fn prepare_keeps_existing_content_length() {
        let mut response = Response::new(200);
        response.set_body(Body::from("ten bytes!".to_string()), true).unwrap();
        response.prepare().unwrap();
        assert_eq!(response.header(headers::CONTENT_LENGTH), "10");
    }
}
