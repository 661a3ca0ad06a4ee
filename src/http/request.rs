/*
 * request.rs
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

//! HTTP request: method, URL, headers, body, and optional form parts.

use std::ops::{Deref, DerefMut};

use crate::body::{Body, FormBody, FormPart};
use crate::common::{headers, media_types};
use crate::error::{Error, Result};
use crate::http::message::Message;
use crate::url::Url;
use crate::utility;

/// Supported methods, as uppercase verb strings.
pub mod methods {
    pub const GET: &str = "GET";
    pub const HEAD: &str = "HEAD";
    pub const POST: &str = "POST";
    pub const PUT: &str = "PUT";
    pub const DELETE: &str = "DELETE";
    pub const PATCH: &str = "PATCH";
}

#[derive(Debug, Default)]
pub struct Request {
    message: Message,
    method: String,
    url: Url,
    /// Parts of a multipart/form-data request, before prepare() or after
    /// parsing.
    form_parts: Vec<FormPart>,
    boundary: String,
    /// Positional captures from a regex route, set by the router.
    args: Vec<String>,
}

impl Request {
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            ..Self::default()
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn set_method(&mut self, method: impl Into<String>) {
        self.method = method.into();
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn url_mut(&mut self) -> &mut Url {
        &mut self.url
    }

    pub fn set_url(&mut self, url: Url) {
        self.url = url;
    }

    pub fn host(&self) -> &str {
        self.url.host()
    }

    pub fn port(&self) -> u16 {
        self.url.effective_port()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// First query value for `key`, decoded.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.url
            .query()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn set_args(&mut self, args: Vec<String>) {
        self.args = args;
    }

    pub fn form_parts(&self) -> &[FormPart] {
        &self.form_parts
    }

    pub fn add_form_part(&mut self, part: FormPart) {
        self.form_parts.push(part);
    }

    pub fn set_form_parts(&mut self, parts: Vec<FormPart>) {
        self.form_parts = parts;
    }

    pub fn is_form(&self) -> bool {
        !self.form_parts.is_empty()
    }

    /// Finalize for sending: build the multipart body when form parts are
    /// present, then the start line and `Host` header. Fails when the URL
    /// has no host.
    pub fn prepare(&mut self) -> Result<()> {
        if self.url.host().is_empty() {
            return Err(Error::state("request URL has no host"));
        }

        if !self.form_parts.is_empty() {
            if self.boundary.is_empty() {
                self.boundary = utility::random_string(30);
            }
            self.message.set_header(
                headers::CONTENT_TYPE,
                format!("{}; boundary={}", media_types::MULTIPART_FORM_DATA, self.boundary),
            );
            let parts = std::mem::take(&mut self.form_parts);
            self.message
                .set_body(Body::Form(FormBody::new(parts, self.boundary.clone())), true)?;
        }

        self.message
            .set_start_line(format!("{} {} HTTP/1.1", self.method, self.url.request_uri()));
        self.message
            .set_header(headers::HOST, self.url.host_header());
        Ok(())
    }
}

impl Deref for Request {
    type Target = Message;

    fn deref(&self) -> &Message {
        &self.message
    }
}

impl DerefMut for Request {
    fn deref_mut(&mut self) -> &mut Message {
        &mut self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_sets_start_line_and_host() {
        let url = Url::parse("http://example.com:8080/get?k=v").unwrap();
        let mut request = Request::new(methods::GET, url);
        request.prepare().unwrap();
        assert_eq!(request.start_line(), "GET /get?k=v HTTP/1.1");
        assert_eq!(request.header(headers::HOST), "example.com:8080");
    }

    #[test]
    fn prepare_without_host_fails() {
        let url = Url::parse("/only/a/path").unwrap();
        let mut request = Request::new(methods::GET, url);
        assert!(request.prepare().is_err());
    }

    #[test]
    fn prepare_builds_multipart_body() {
        let url = Url::parse("http://example.com/upload").unwrap();
        let mut request = Request::new(methods::POST, url);
        request.add_form_part(FormPart::new("note", b"hi".to_vec(), "text/plain"));
        request.prepare().unwrap();

        let content_type = request.header(headers::CONTENT_TYPE).to_string();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let boundary = content_type.rsplit('=').next().unwrap();
        assert_eq!(boundary.len(), 30);
        assert!(request.content_length().unwrap() > 0);
    }
}
