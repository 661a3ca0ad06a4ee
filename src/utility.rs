/*
 * utility.rs
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

//! Small helpers: random strings, HTTP dates, media type by file
//! extension, string splitting.

use std::path::Path;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};

/// Random alphanumeric string, e.g. for temp file names and boundaries.
pub fn random_string(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Current time formatted per RFC 7231 (`Tue, 15 Nov 1994 08:12:31 GMT`).
pub fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn user_agent() -> String {
    format!("ragnatela/{}", env!("CARGO_PKG_VERSION"))
}

/// Split `key<sep>value`, trimming both sides. None when `sep` is absent or
/// the key is empty.
pub fn split_kv(input: &str, sep: char) -> Option<(&str, &str)> {
    let i = input.find(sep)?;
    let key = input[..i].trim();
    let value = input[i + 1..].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Size of a file in bytes, or None if it cannot be read.
pub fn tell_size(path: &Path) -> Option<usize> {
    std::fs::metadata(path).ok().map(|m| m.len() as usize)
}

/// Media type by file extension; unknown extensions map to
/// `application/octet-stream`.
pub fn media_type_from_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "htm" | "html" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "js" => "application/javascript",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "gif" => "image/gif",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// Media type for a path, by its extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => media_type_from_extension(ext),
        None => "application/octet-stream",
    }
}
