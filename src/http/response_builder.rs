/*
 * response_builder.rs
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

//! Fluent response construction, for views.

use std::path::PathBuf;

use crate::body::{Body, FileBody, StringBody, DEFAULT_FILE_CHUNK_SIZE};
use crate::common::{charsets, headers, media_types};
use crate::error::Result;
use crate::http::response::{status_codes, Response};
use crate::utility;

#[derive(Debug, Default)]
enum BuilderBody {
    #[default]
    None,
    Data(Vec<u8>),
    File(PathBuf),
}

/// Builds a [`Response`]. Content-Type and Content-Length land on the
/// message when it is prepared for writing.
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    status: u16,
    headers: Vec<(String, String)>,
    body: BuilderBody,
    media_type: String,
    charset: String,
    gzip: bool,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self {
            status: status_codes::OK,
            ..Self::default()
        }
    }

    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn ok(self) -> Self {
        self.status(status_codes::OK)
    }

    pub fn created(self) -> Self {
        self.status(status_codes::CREATED)
    }

    pub fn bad_request(self) -> Self {
        self.status(status_codes::BAD_REQUEST)
    }

    pub fn not_found(self) -> Self {
        self.status(status_codes::NOT_FOUND)
    }

    pub fn not_implemented(self) -> Self {
        self.status(status_codes::NOT_IMPLEMENTED)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Stamp the Date header now rather than at prepare time.
    pub fn date(self) -> Self {
        let now = utility::http_date();
        self.header(headers::DATE, now)
    }

    pub fn body(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.body = BuilderBody::Data(data.into());
        self
    }

    /// Serve a file as the body; the media type falls back to the file
    /// extension when none was set.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.body = BuilderBody::File(path.into());
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

    pub fn json(self) -> Self {
        self.media_type(media_types::APPLICATION_JSON)
    }

    pub fn utf8(self) -> Self {
        self.charset(charsets::UTF8)
    }

    /// Compress the response body with gzip (no-op under the threshold).
    /// Callers should check the request's Accept-Encoding first.
    pub fn gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    pub fn build(self) -> Result<Response> {
        let mut response = Response::new(self.status);

        for (name, value) in self.headers {
            response.set_header(name, value);
        }

        let mut media_type = self.media_type;

        match self.body {
            BuilderBody::None => {}
            BuilderBody::Data(data) => {
                let mut body = Body::String(StringBody::new(data, false));
                if self.gzip && body.compress()? {
                    response.set_header(headers::CONTENT_ENCODING, "gzip");
                }
                response.set_body(body, true)?;
            }
            BuilderBody::File(path) => {
                if media_type.is_empty() {
                    media_type = utility::media_type_for_path(&path).to_string();
                }
                let body = Body::File(FileBody::new(path, DEFAULT_FILE_CHUNK_SIZE)?);
                response.set_body(body, true)?;
            }
        }

        if !media_type.is_empty() && !response.has_header(headers::CONTENT_TYPE) {
            response.set_content_type(&media_type, &self.charset);
        }

        Ok(response)
    }
}
