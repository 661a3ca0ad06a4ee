/*
 * body.rs
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

//! Message bodies: in-memory string, multipart form, and file-streamed.
//!
//! A body is enumerated as payloads (scatter-gather byte-slice lists) via
//! `init_payload` / `next_payload`; an empty payload ends the iteration.
//! Payload enumeration is the hot loop of every send, so the body is a
//! variant rather than a trait object.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::common::{headers, Headers};
use crate::error::{Error, Result};
use crate::gzip;
use crate::utility;

/// Scatter-gather list of byte slices for a socket write.
pub type Payload = Vec<Bytes>;

/// Bodies at or below this size are not worth compressing.
pub const GZIP_THRESHOLD: usize = 1400;

/// Default read size for file-streamed bodies.
pub const DEFAULT_FILE_CHUNK_SIZE: usize = 1024;

pub fn payload_size(payload: &Payload) -> usize {
    payload.iter().map(|b| b.len()).sum()
}

#[derive(Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    String(StringBody),
    Form(FormBody),
    File(FileBody),
}

impl Body {
    pub fn is_empty(&self) -> bool {
        match self {
            Body::Empty => true,
            Body::String(b) => b.data.is_empty(),
            Body::Form(b) => b.parts.is_empty(),
            Body::File(_) => false,
        }
    }

    /// Exact number of bytes this body will put on the wire, including the
    /// multipart framing of a form body.
    pub fn get_size(&mut self) -> Result<usize> {
        match self {
            Body::Empty => Ok(0),
            Body::String(b) => Ok(b.data.len()),
            Body::Form(b) => b.get_size(),
            Body::File(b) => b.get_size(),
        }
    }

    /// Prepare payload iteration. Re-opens file-backed bodies so a send can
    /// be retried from the start.
    pub fn init_payload(&mut self) -> Result<()> {
        match self {
            Body::Empty => Ok(()),
            Body::String(b) => {
                b.index = 0;
                Ok(())
            }
            Body::Form(b) => {
                b.index = 0;
                Ok(())
            }
            Body::File(b) => b.open(),
        }
    }

    /// Next payload; empty means done. `free_previous` lets a form body drop
    /// file-loaded part data once it has been written.
    pub fn next_payload(&mut self, free_previous: bool) -> Result<Payload> {
        match self {
            Body::Empty => Ok(Payload::new()),
            Body::String(b) => Ok(b.next_payload()),
            Body::Form(b) => b.next_payload(free_previous),
            Body::File(b) => b.next_payload(),
        }
    }

    /// Gzip a string body in place. Returns whether compression happened
    /// (no-op below the threshold or for non-string bodies).
    pub fn compress(&mut self) -> Result<bool> {
        match self {
            Body::String(b) => b.compress(),
            _ => Ok(false),
        }
    }

    /// Reverse of `compress`. Errors unless the body was marked compressed.
    pub fn decompress(&mut self, deflate: bool) -> Result<()> {
        match self {
            Body::String(b) => b.decompress(deflate),
            _ => Err(Error::data("decompress on a non-string body")),
        }
    }

    /// Body bytes for string bodies; empty for the rest.
    pub fn data(&self) -> &[u8] {
        match self {
            Body::String(b) => &b.data,
            _ => &[],
        }
    }

    pub fn as_file(&self) -> Option<&FileBody> {
        match self {
            Body::File(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut FileBody> {
        match self {
            Body::File(b) => Some(b),
            _ => None,
        }
    }
}

impl From<String> for Body {
    fn from(data: String) -> Self {
        Body::String(StringBody::new(data.into_bytes(), false))
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Body::String(StringBody::new(data, false))
    }
}

// -----------------------------------------------------------------------------

/// Whole-buffer body. One payload, the entire buffer.
#[derive(Debug, Default)]
pub struct StringBody {
    data: Bytes,
    compressed: bool,
    index: usize,
}

impl StringBody {
    pub fn new(data: Vec<u8>, compressed: bool) -> Self {
        Self {
            data: Bytes::from(data),
            compressed,
            index: 0,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    fn next_payload(&mut self) -> Payload {
        if self.index == 0 && !self.data.is_empty() {
            self.index = 1;
            return vec![self.data.clone()];
        }
        Payload::new()
    }

    fn compress(&mut self) -> Result<bool> {
        if self.compressed {
            return Ok(true);
        }
        if self.data.len() <= GZIP_THRESHOLD {
            return Ok(false);
        }
        let packed = gzip::compress(&self.data)?;
        self.data = Bytes::from(packed);
        self.compressed = true;
        Ok(true)
    }

    fn decompress(&mut self, deflate: bool) -> Result<()> {
        if !self.compressed {
            return Err(Error::data("body is not compressed"));
        }
        let plain = if deflate {
            gzip::inflate(&self.data)?
        } else {
            gzip::decompress(&self.data)?
        };
        self.data = Bytes::from(plain);
        self.compressed = false;
        Ok(())
    }
}

// -----------------------------------------------------------------------------

/// One part of a multipart/form-data body: either an in-memory buffer or a
/// file whose contents are loaded when the part is first emitted.
#[derive(Debug, Default)]
pub struct FormPart {
    name: String,
    file_name: String,
    media_type: String,
    data: Bytes,
    path: Option<PathBuf>,
    // Derived from the fields above on first emission.
    headers: Headers,
}

impl FormPart {
    pub fn new(name: impl Into<String>, data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: Bytes::from(data),
            media_type: media_type.into(),
            ..Self::default()
        }
    }

    /// File-backed part: file name from the path, media type from the
    /// extension unless given.
    pub fn from_file(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        media_type: impl Into<String>,
    ) -> Result<Self> {
        let path = path.into();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::file(format!("bad form part path: {}", path.display())))?
            .to_string();
        let mut media_type = media_type.into();
        if media_type.is_empty() {
            media_type = utility::media_type_for_path(&path).to_string();
        }
        Ok(Self {
            name: name.into(),
            file_name,
            media_type,
            path: Some(path),
            ..Self::default()
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn set_file_name(&mut self, file_name: impl Into<String>) {
        self.file_name = file_name.into();
    }

    pub fn set_media_type(&mut self, media_type: impl Into<String>) {
        self.media_type = media_type.into();
    }

    pub fn append_data(&mut self, data: &[u8]) {
        let mut buf = Vec::with_capacity(self.data.len() + data.len());
        buf.extend_from_slice(&self.data);
        buf.extend_from_slice(data);
        self.data = Bytes::from(buf);
    }

    /// Part headers, part data, and the trailing CRLF as payload buffers.
    fn prepare(&mut self) -> Result<Payload> {
        if self.data.is_empty() {
            if let Some(path) = &self.path {
                let data = fs::read(path)
                    .map_err(|e| Error::file(format!("{}: {}", path.display(), e)))?;
                self.data = Bytes::from(data);
            }
        }

        self.build_headers();

        let mut head = String::new();
        for (name, value) in self.headers.iter() {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut payload = vec![Bytes::from(head)];
        if !self.data.is_empty() {
            payload.push(self.data.clone());
        }
        payload.push(Bytes::from_static(b"\r\n"));
        Ok(payload)
    }

    /// Release loaded file data after a write. Memory-backed parts keep
    /// their buffer (it cannot be reloaded).
    fn free(&mut self) {
        if self.path.is_some() {
            self.data = Bytes::new();
        }
    }

    /// Bytes this part contributes to the wire, framing included.
    fn get_size(&mut self) -> Result<usize> {
        self.build_headers();

        let mut size = 0;
        for (name, value) in self.headers.iter() {
            size += name.len() + 2 + value.len() + 2; // ": " and CRLF
        }
        size += 2; // blank line after part headers
        size += self.data_size()?;
        size += 2; // CRLF after part data
        Ok(size)
    }

    fn data_size(&self) -> Result<usize> {
        if !self.data.is_empty() {
            return Ok(self.data.len());
        }
        match &self.path {
            Some(path) => utility::tell_size(path)
                .ok_or_else(|| Error::file(format!("cannot stat {}", path.display()))),
            None => Ok(0),
        }
    }

    fn build_headers(&mut self) {
        if !self.headers.is_empty() {
            return;
        }

        let mut disposition = String::from("form-data");
        if !self.name.is_empty() {
            disposition.push_str(&format!("; name=\"{}\"", self.name));
        }
        if !self.file_name.is_empty() {
            disposition.push_str(&format!("; filename=\"{}\"", self.file_name));
        }
        self.headers.set(headers::CONTENT_DISPOSITION, disposition);

        if !self.media_type.is_empty() {
            self.headers.set(headers::CONTENT_TYPE, self.media_type.clone());
        }
    }
}

/// Multipart/form-data body: each payload is one boundary line plus one part.
#[derive(Debug, Default)]
pub struct FormBody {
    parts: Vec<FormPart>,
    boundary: String,
    index: usize,
}

impl FormBody {
    pub fn new(parts: Vec<FormPart>, boundary: impl Into<String>) -> Self {
        Self {
            parts,
            boundary: boundary.into(),
            index: 0,
        }
    }

    pub fn parts(&self) -> &[FormPart] {
        &self.parts
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    fn get_size(&mut self) -> Result<usize> {
        let mut size = 0;
        let boundary_len = self.boundary.len();
        for part in &mut self.parts {
            size += boundary_len + 4; // "--" + boundary + CRLF
            size += part.get_size()?;
        }
        size += boundary_len + 6; // "--" + boundary + "--" + CRLF
        Ok(size)
    }

    fn next_payload(&mut self, free_previous: bool) -> Result<Payload> {
        if free_previous && self.index > 0 {
            if let Some(part) = self.parts.get_mut(self.index - 1) {
                part.free();
            }
        }

        if self.index >= self.parts.len() {
            return Ok(Payload::new());
        }

        let boundary = Bytes::from(format!("--{}\r\n", self.boundary));
        let last = self.index + 1 == self.parts.len();

        let mut payload = vec![boundary];
        payload.extend(self.parts[self.index].prepare()?);
        if last {
            payload.push(Bytes::from(format!("--{}--\r\n", self.boundary)));
        }

        self.index += 1;
        Ok(payload)
    }
}

// -----------------------------------------------------------------------------

/// File-streamed body: read in chunks of `chunk_size` on send; on the
/// receive side wraps a temp file that is deleted on drop unless moved.
#[derive(Debug, Default)]
pub struct FileBody {
    path: PathBuf,
    chunk_size: usize,
    auto_delete: bool,
    file: Option<fs::File>,
    chunk: Vec<u8>,
}

impl FileBody {
    /// Body to send from an existing file. Fails early if the file cannot
    /// be read.
    pub fn new(path: impl Into<PathBuf>, chunk_size: usize) -> Result<Self> {
        let path = path.into();
        if utility::tell_size(&path).is_none() {
            return Err(Error::file(format!("cannot read {}", path.display())));
        }
        Ok(Self {
            path,
            chunk_size: if chunk_size == 0 { DEFAULT_FILE_CHUNK_SIZE } else { chunk_size },
            auto_delete: false,
            file: None,
            chunk: Vec::new(),
        })
    }

    /// Body over a streamed temp file (receive side).
    pub fn streamed(path: impl Into<PathBuf>, auto_delete: bool) -> Self {
        Self {
            path: path.into(),
            chunk_size: DEFAULT_FILE_CHUNK_SIZE,
            auto_delete,
            file: None,
            chunk: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_size(&mut self) -> Result<usize> {
        utility::tell_size(&self.path)
            .ok_or_else(|| Error::file(format!("cannot stat {}", self.path.display())))
    }

    fn open(&mut self) -> Result<()> {
        // Re-open every time so a retried send restarts from the beginning.
        self.file = None;
        if self.path.as_os_str().is_empty() {
            return Err(Error::file("file body has been moved away"));
        }
        let file = fs::File::open(&self.path)
            .map_err(|e| Error::file(format!("{}: {}", self.path.display(), e)))?;
        self.file = Some(file);
        self.chunk.resize(self.chunk_size, 0);
        Ok(())
    }

    fn next_payload(&mut self) -> Result<Payload> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| Error::state("init_payload was not called"))?;
        let n = file
            .read(&mut self.chunk)
            .map_err(|e| Error::file(format!("{}: {}", self.path.display(), e)))?;
        if n == 0 {
            return Ok(Payload::new());
        }
        Ok(vec![Bytes::copy_from_slice(&self.chunk[..n])])
    }

    /// Rename the underlying file to `new_path` and detach from it; later
    /// payload reads fail cleanly and drop no longer deletes anything.
    pub fn move_to(&mut self, new_path: impl AsRef<Path>) -> Result<()> {
        let new_path = new_path.as_ref();
        if self.path == new_path {
            return Ok(());
        }
        self.file = None;
        fs::rename(&self.path, new_path).map_err(|e| {
            Error::file(format!(
                "rename {} -> {}: {}",
                self.path.display(),
                new_path.display(),
                e
            ))
        })?;
        self.path = PathBuf::new();
        Ok(())
    }
}

impl Drop for FileBody {
    fn drop(&mut self) {
        if self.auto_delete && !self.path.as_os_str().is_empty() {
            self.file = None;
            if let Err(e) = fs::remove_file(&self.path) {
                tracing::error!("failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn collect(body: &mut Body) -> Vec<u8> {
        body.init_payload().unwrap();
        let mut out = Vec::new();
        loop {
            let payload = body.next_payload(false).unwrap();
            if payload.is_empty() {
                break;
            }
            for buf in payload {
                out.extend_from_slice(&buf);
            }
        }
        out
    }

    #[test]
    fn string_body_single_payload() {
        let mut body = Body::from("hello".to_string());
        assert_eq!(collect(&mut body), b"hello");
        assert_eq!(body.get_size().unwrap(), 5);
    }

    #[test]
    fn string_body_payload_restarts_after_init() {
        let mut body = Body::from("x".to_string());
        assert_eq!(collect(&mut body), b"x");
        assert_eq!(collect(&mut body), b"x");
    }

    #[test]
    fn compress_below_threshold_is_noop() {
        let mut body = Body::from("small".to_string());
        assert!(!body.compress().unwrap());
        assert_eq!(body.data(), b"small");
    }

    #[test]
    fn compress_then_decompress_roundtrip() {
        let text = "abcdefgh".repeat(400);
        let mut body = Body::from(text.clone());
        assert!(body.compress().unwrap());
        assert_ne!(body.data(), text.as_bytes());
        body.decompress(false).unwrap();
        assert_eq!(body.data(), text.as_bytes());
    }

    #[test]
    fn decompress_uncompressed_errors() {
        let mut body = Body::from("plain".to_string());
        assert!(body.decompress(false).is_err());
    }

    #[test]
    fn form_body_size_matches_emitted_bytes() {
        let parts = vec![
            FormPart::new("a", b"alpha".to_vec(), "text/plain"),
            FormPart::new("b", b"bravo!".to_vec(), ""),
        ];
        let mut body = Body::Form(FormBody::new(parts, "BOUNDARY1234"));
        let size = body.get_size().unwrap();
        let bytes = collect(&mut body);
        assert_eq!(bytes.len(), size);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("--BOUNDARY1234\r\n"));
        assert!(text.ends_with("--BOUNDARY1234--\r\n"));
        assert!(text.contains("Content-Disposition: form-data; name=\"a\""));
        assert!(text.contains("alpha"));
    }

    #[test]
    fn file_body_chunked_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let mut f = fs::File::create(&path).unwrap();
        let data = vec![7u8; 2500];
        f.write_all(&data).unwrap();
        drop(f);

        let mut body = Body::File(FileBody::new(&path, 1024).unwrap());
        assert_eq!(body.get_size().unwrap(), 2500);
        assert_eq!(collect(&mut body), data);
    }

    #[test]
    fn file_body_auto_delete_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp.bin");
        fs::write(&path, b"junk").unwrap();
        drop(FileBody::streamed(&path, true));
        assert!(!path.exists());
    }

    #[test]
    fn file_body_move_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp.bin");
        let target = dir.path().join("kept.bin");
        fs::write(&path, b"keep me").unwrap();

        let mut body = FileBody::streamed(&path, true);
        body.move_to(&target).unwrap();
        drop(body);

        assert!(!path.exists());
        assert_eq!(fs::read(&target).unwrap(), b"keep me");
    }

    #[test]
    fn moved_file_body_fails_cleanly_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("temp.bin");
        fs::write(&path, b"x").unwrap();

        let mut body = FileBody::streamed(&path, true);
        body.move_to(dir.path().join("elsewhere.bin")).unwrap();
        assert!(body.open().is_err());
    }
}
