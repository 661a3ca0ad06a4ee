/*
 * common.rs
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

//! Header map (ordered, case-insensitive lookup), Content-Type and
//! Content-Disposition parsing.

use crate::utility::split_kv;

/// Well-known header names, written in their canonical form.
pub mod headers {
    pub const ACCEPT: &str = "Accept";
    pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
    pub const AUTHORIZATION: &str = "Authorization";
    pub const CONNECTION: &str = "Connection";
    pub const CONTENT_DISPOSITION: &str = "Content-Disposition";
    pub const CONTENT_ENCODING: &str = "Content-Encoding";
    pub const CONTENT_LENGTH: &str = "Content-Length";
    pub const CONTENT_TYPE: &str = "Content-Type";
    pub const DATE: &str = "Date";
    pub const HOST: &str = "Host";
    pub const SERVER: &str = "Server";
    pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
    pub const UPGRADE: &str = "Upgrade";
    pub const USER_AGENT: &str = "User-Agent";
    pub const SEC_WEBSOCKET_ACCEPT: &str = "Sec-WebSocket-Accept";
    pub const SEC_WEBSOCKET_KEY: &str = "Sec-WebSocket-Key";
    pub const SEC_WEBSOCKET_PROTOCOL: &str = "Sec-WebSocket-Protocol";
    pub const SEC_WEBSOCKET_VERSION: &str = "Sec-WebSocket-Version";
}

/// Common media types.
pub mod media_types {
    pub const APPLICATION_JSON: &str = "application/json";
    pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
    pub const MULTIPART_FORM_DATA: &str = "multipart/form-data";
    pub const TEXT_PLAIN: &str = "text/plain";
}

pub mod charsets {
    pub const UTF8: &str = "utf-8";
}

/// One header line: name and value as they appear on the wire.
pub type Header = (String, String);

/// Ordered list of headers with case-insensitive name lookup.
///
/// `set` overwrites the first case-insensitive match so repeated preparation
/// is idempotent; `append` always adds, preserving duplicates.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    data: Vec<Header>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header. Overwrites the first existing header with the same name
    /// (case-insensitive), otherwise appends. Empty values are rejected.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        let value = value.into();
        if value.is_empty() {
            return false;
        }
        match self.find(&name) {
            Some(i) => self.data[i].1 = value,
            None => self.data.push((name, value)),
        }
        true
    }

    /// Append without replacing an existing header of the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.data.push((name.into(), value.into()));
    }

    /// First value for `name`, case-insensitive. Missing headers read as "".
    pub fn get(&self, name: &str) -> &str {
        match self.find(name) {
            Some(i) => &self.data[i].1,
            None => "",
        }
    }

    pub fn get_opt(&self, name: &str) -> Option<&str> {
        self.find(name).map(|i| self.data[i].1.as_str())
    }

    pub fn has(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.data.iter()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    fn find(&self, name: &str) -> Option<usize> {
        self.data.iter().position(|(k, _)| k.eq_ignore_ascii_case(name))
    }
}

/// Parsed `Content-Type` value: media type plus either a charset or, for
/// `multipart/form-data`, the boundary.
#[derive(Debug, Clone, Default)]
pub struct ContentType {
    media_type: String,
    additional: String,
    multipart: bool,
}

impl ContentType {
    pub fn parse(value: &str) -> Self {
        let mut ct = ContentType::default();
        ct.init(value);
        ct
    }

    fn init(&mut self, value: &str) {
        let (media_type, other) = match value.find(';') {
            Some(i) => (&value[..i], &value[i + 1..]),
            None => (value, ""),
        };

        self.media_type = media_type.trim().to_ascii_lowercase();
        let other = other.trim();

        if self.media_type == media_types::MULTIPART_FORM_DATA {
            self.multipart = true;
            match parse_parameter(other, "boundary") {
                Some(boundary) => self.additional = boundary,
                None => tracing::error!("multipart/form-data content type has no boundary"),
            }
        } else if let Some(charset) = parse_parameter(other, "charset") {
            self.additional = charset;
        }
    }

    pub fn is_valid(&self) -> bool {
        if self.media_type.is_empty() {
            return false;
        }
        if self.multipart {
            return !self.additional.is_empty();
        }
        true
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn is_multipart(&self) -> bool {
        self.multipart
    }

    pub fn boundary(&self) -> &str {
        if self.multipart {
            &self.additional
        } else {
            ""
        }
    }

    pub fn charset(&self) -> &str {
        if self.multipart {
            ""
        } else {
            &self.additional
        }
    }

    pub fn reset(&mut self) {
        self.media_type.clear();
        self.additional.clear();
        self.multipart = false;
    }
}

/// Parse `key=value` out of a parameter section; unknown parameters ignored.
fn parse_parameter(input: &str, expected_key: &str) -> Option<String> {
    for part in input.split(';') {
        if let Some((key, value)) = split_kv(part, '=') {
            if key.eq_ignore_ascii_case(expected_key) && !value.is_empty() {
                return Some(value.trim_matches('"').to_string());
            }
        }
    }
    None
}

/// Parsed `Content-Disposition: form-data; name="x"; filename="y"`.
#[derive(Debug, Clone, Default)]
pub struct ContentDisposition {
    name: String,
    file_name: String,
    valid: bool,
}

impl ContentDisposition {
    pub fn parse(value: &str) -> Self {
        let mut parts = value.split(';');

        match parts.next() {
            Some(first) if first.trim() == "form-data" => {}
            _ => return ContentDisposition::default(),
        }

        let mut cd = ContentDisposition {
            valid: true,
            ..ContentDisposition::default()
        };

        for part in parts {
            match split_kv(part, '=') {
                Some((key, value)) => {
                    let value = value.trim_matches('"').to_string();
                    if key == "name" {
                        cd.name = value;
                    } else if key == "filename" {
                        cd.file_name = value;
                    }
                }
                None => {
                    cd.valid = false;
                    break;
                }
            }
        }

        cd
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_overwrites_first_match_case_insensitive() {
        let mut h = Headers::new();
        h.set("Content-Type", "text/plain");
        h.set("content-type", "application/json");
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("CONTENT-TYPE"), "application/json");
    }

    #[test]
    fn get_missing_is_empty() {
        let h = Headers::new();
        assert_eq!(h.get("X-Nope"), "");
        assert!(!h.has("X-Nope"));
    }

    #[test]
    fn empty_value_rejected() {
        let mut h = Headers::new();
        assert!(!h.set("X-Empty", ""));
        assert!(!h.has("X-Empty"));
    }

    #[test]
    fn insertion_order_preserved() {
        let mut h = Headers::new();
        h.set("B", "2");
        h.set("A", "1");
        h.append("B", "3");
        let names: Vec<&str> = h.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["B", "A", "B"]);
    }

    #[test]
    fn content_type_charset() {
        let ct = ContentType::parse("text/html; charset=utf-8");
        assert!(ct.is_valid());
        assert_eq!(ct.media_type(), "text/html");
        assert_eq!(ct.charset(), "utf-8");
        assert!(!ct.is_multipart());
    }

    #[test]
    fn content_type_multipart_boundary() {
        let ct = ContentType::parse("multipart/form-data; boundary=e59ff97941044");
        assert!(ct.is_valid());
        assert!(ct.is_multipart());
        assert_eq!(ct.boundary(), "e59ff97941044");
    }

    #[test]
    fn content_type_multipart_without_boundary_invalid() {
        let ct = ContentType::parse("multipart/form-data");
        assert!(!ct.is_valid());
    }

    #[test]
    fn content_disposition_with_filename() {
        let cd = ContentDisposition::parse("form-data; name=\"file\"; filename=\"a.txt\"");
        assert!(cd.is_valid());
        assert_eq!(cd.name(), "file");
        assert_eq!(cd.file_name(), "a.txt");
    }

    #[test]
    fn content_disposition_rejects_non_form_data() {
        let cd = ContentDisposition::parse("attachment; filename=\"a.txt\"");
        assert!(!cd.is_valid());
    }
}
