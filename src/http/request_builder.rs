/*
 * request_builder.rs
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

//! Fluent request construction.
//!
//! ```
//! use ragnatela::RequestBuilder;
//!
//! let request = RequestBuilder::new()
//!     .get("http://example.com/things")
//!     .query("page", "2")
//!     .header("Accept", "application/json")
//!     .build()
//!     .unwrap();
//! assert_eq!(request.method(), "GET");
//! ```

use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::body::{Body, FileBody, FormPart, StringBody};
use crate::common::{charsets, headers, media_types};
use crate::error::{Error, Result};
use crate::http::request::{methods, Request};
use crate::url::Url;

#[derive(Debug, Default)]
enum BuilderBody {
    #[default]
    None,
    Data(Vec<u8>),
    File {
        path: PathBuf,
        chunk_size: usize,
    },
    Form(Vec<FormPart>),
}

/// Builds a [`Request`]. Methods chain; `build` validates and assembles.
#[derive(Debug, Default)]
pub struct RequestBuilder {
    method: String,
    url: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: BuilderBody,
    media_type: String,
    charset: String,
    gzip: bool,
}

impl RequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn get(self, url: impl Into<String>) -> Self {
        self.method(methods::GET).url(url)
    }

    pub fn head(self, url: impl Into<String>) -> Self {
        self.method(methods::HEAD).url(url)
    }

    pub fn post(self, url: impl Into<String>) -> Self {
        self.method(methods::POST).url(url)
    }

    pub fn put(self, url: impl Into<String>) -> Self {
        self.method(methods::PUT).url(url)
    }

    pub fn delete(self, url: impl Into<String>) -> Self {
        self.method(methods::DELETE).url(url)
    }

    pub fn patch(self, url: impl Into<String>) -> Self {
        self.method(methods::PATCH).url(url)
    }

    /// Append a query pair (order preserved; value encoded on the wire).
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.body = BuilderBody::Data(data.into());
        self
    }

    /// Stream a file as the request body, `chunk_size` bytes per payload
    /// (0 means the default).
    pub fn file(mut self, path: impl Into<PathBuf>, chunk_size: usize) -> Self {
        self.body = BuilderBody::File {
            path: path.into(),
            chunk_size,
        };
        self
    }

    /// Send a multipart/form-data body made of these parts.
    pub fn form(mut self, parts: Vec<FormPart>) -> Self {
        self.body = BuilderBody::Form(parts);
        self
    }

    pub fn form_part(mut self, part: FormPart) -> Self {
        match &mut self.body {
            BuilderBody::Form(parts) => parts.push(part),
            _ => self.body = BuilderBody::Form(vec![part]),
        }
        self
    }

    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Shortcut for `media_type("application/json")`.
    pub fn json(self) -> Self {
        self.media_type(media_types::APPLICATION_JSON)
    }

    /// Shortcut for `charset("utf-8")`.
    pub fn utf8(self) -> Self {
        self.charset(charsets::UTF8)
    }

    pub fn keep_alive(self, keep_alive: bool) -> Self {
        self.header(
            headers::CONNECTION,
            if keep_alive { "Keep-Alive" } else { "Close" },
        )
    }

    pub fn accept_gzip(self, accept: bool) -> Self {
        self.header(
            headers::ACCEPT_ENCODING,
            if accept { "gzip, deflate" } else { "identity" },
        )
    }

    /// Compress the request body with gzip (no-op under the threshold).
    pub fn gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    pub fn auth(self, auth_type: &str, credentials: &str) -> Self {
        self.header(headers::AUTHORIZATION, format!("{} {}", auth_type, credentials))
    }

    pub fn auth_basic(self, login: &str, password: &str) -> Self {
        let credentials = BASE64.encode(format!("{}:{}", login, password));
        self.auth("Basic", &credentials)
    }

    pub fn auth_token(self, token: &str) -> Self {
        self.auth("Token", token)
    }

    pub fn build(self) -> Result<Request> {
        if self.method.is_empty() {
            return Err(Error::syntax("request method not set"));
        }

        let mut url = Url::parse(&self.url)?;
        for (key, value) in self.query {
            url.append_query(key, value);
        }

        let mut request = Request::new(self.method, url);

        for (name, value) in self.headers {
            request.set_header(name, value);
        }

        match self.body {
            BuilderBody::None => {}
            BuilderBody::Data(data) => {
                let mut body = Body::String(StringBody::new(data, false));
                if self.gzip && body.compress()? {
                    request.set_header(headers::CONTENT_ENCODING, "gzip");
                }
                request.set_body(body, true)?;
            }
            BuilderBody::File { path, chunk_size } => {
                let body = Body::File(FileBody::new(path, chunk_size)?);
                request.set_body(body, true)?;
            }
            BuilderBody::Form(parts) => {
                // The multipart body is assembled by Request::prepare, once
                // the boundary exists.
                request.set_form_parts(parts);
            }
        }

        if !self.media_type.is_empty() && !request.has_header(headers::CONTENT_TYPE) {
            let media_type = self.media_type;
            let charset = self.charset;
            request.set_content_type(&media_type, &charset);
        }

        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_with_query_and_header() {
        let request = RequestBuilder::new()
            .get("http://example.com/get")
            .query("k1", "v1")
            .header("Accept", "application/json")
            .build()
            .unwrap();
        assert_eq!(request.method(), "GET");
        assert_eq!(request.url().request_uri(), "/get?k1=v1");
        assert_eq!(request.header("accept"), "application/json");
    }

    #[test]
    fn json_utf8_content_type() {
        let request = RequestBuilder::new()
            .post("http://example.com/post")
            .body("{}")
            .json()
            .utf8()
            .build()
            .unwrap();
        assert_eq!(
            request.header(headers::CONTENT_TYPE),
            "application/json; charset=utf-8"
        );
        assert_eq!(request.content_length(), Some(2));
    }

    #[test]
    fn auth_basic_is_base64() {
        let request = RequestBuilder::new()
            .get("http://example.com/")
            .auth_basic("Aladdin", "open sesame")
            .build()
            .unwrap();
        assert_eq!(
            request.header(headers::AUTHORIZATION),
            "Basic QWxhZGRpbjpvcGVuIHNlc2FtZQ=="
        );
    }

    #[test]
    fn gzip_small_body_stays_identity() {
        let request = RequestBuilder::new()
            .post("http://example.com/post")
            .body("tiny")
            .gzip(true)
            .build()
            .unwrap();
        assert!(!request.has_header(headers::CONTENT_ENCODING));
        assert_eq!(request.content_length(), Some(4));
    }

    #[test]
    fn gzip_large_body_compressed() {
        let text = "zxcvbnm,./".repeat(500);
        let request = RequestBuilder::new()
            .post("http://example.com/post")
            .body(text.clone())
            .gzip(true)
            .build()
            .unwrap();
        assert_eq!(request.header(headers::CONTENT_ENCODING), "gzip");
        assert!(request.content_length().unwrap() < text.len());
    }

    #[test]
    fn missing_method_rejected() {
        assert!(RequestBuilder::new().url("http://example.com/").build().is_err());
    }

    #[test]
    fn keep_alive_close_header() {
        let request = RequestBuilder::new()
            .get("http://example.com/")
            .keep_alive(false)
            .build()
            .unwrap();
        assert!(!request.is_connection_keep_alive());
    }
}
