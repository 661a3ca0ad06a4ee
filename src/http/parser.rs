/*
 * parser.rs
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

//! Incremental HTTP/1.1 message parser.
//!
//! Feed arbitrary-sized chunks with `parse`; `finished` turns true exactly
//! when the whole message (headers plus body per Content-Length,
//! Transfer-Encoding: chunked, or multipart/form-data) has been absorbed.
//! Splitting the input at any byte boundary yields the same message.
//!
//! The body goes to a string handler (in memory) or, when streaming was
//! requested, to a uniquely named temp file that becomes an auto-deleted
//! [`FileBody`]. On the server side a [`ViewMatcher`] is consulted as soon
//! as the headers end, so the route decides streaming before any body byte
//! is consumed.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Buf, BytesMut};

use crate::body::{Body, FileBody, FormPart, StringBody};
use crate::common::{headers, ContentDisposition, ContentType};
use crate::error::{Error, Result};
use crate::http::message::{ContentEncoding, Message};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::url::Url;
use crate::utility;

/// Cap on the header block (start line + headers), per message.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Route lookup performed at headers-end: `Some(stream)` when a view (or the
/// static doc root) will take the request, `None` to reject it.
pub trait ViewMatcher: Send + Sync {
    fn match_view(&self, method: &str, path: &str) -> Option<bool>;
}

// -----------------------------------------------------------------------------

/// Collects body bytes in memory; decompresses on finish when the message
/// was content-encoded.
#[derive(Default)]
struct StringBodyHandler {
    content: Vec<u8>,
}

impl StringBodyHandler {
    fn add_content(&mut self, data: &[u8]) {
        self.content.extend_from_slice(data);
    }

    fn finish(self, message: &mut Message) -> Result<()> {
        if self.content.is_empty() {
            return Ok(());
        }

        let encoding = message.content_encoding();
        let compressed = encoding != ContentEncoding::Identity;
        let mut body = Body::String(StringBody::new(self.content, compressed));
        if compressed {
            tracing::debug!("decompressing message content");
            body.decompress(encoding == ContentEncoding::Deflate)?;
        }
        message.set_body(body, false)
    }
}

/// Streams body bytes to a uniquely named file in the OS temp directory.
struct FileBodyHandler {
    temp_path: PathBuf,
    file: fs::File,
    streamed_size: usize,
}

impl FileBodyHandler {
    fn open() -> Result<Self> {
        let dir = std::env::temp_dir();
        // Collisions on the random name are handled by retrying.
        for _ in 0..10 {
            let temp_path = dir.join(utility::random_string(10));
            match fs::OpenOptions::new().write(true).create_new(true).open(&temp_path) {
                Ok(file) => {
                    tracing::trace!("streaming to temp file {}", temp_path.display());
                    return Ok(Self {
                        temp_path,
                        file,
                        streamed_size: 0,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(Error::file(format!("cannot open temp file: {}", e))),
            }
        }
        Err(Error::file("cannot generate a unique temp file name"))
    }

    fn add_content(&mut self, data: &[u8]) -> Result<()> {
        self.file
            .write_all(data)
            .map_err(|e| Error::file(format!("{}: {}", self.temp_path.display(), e)))?;
        self.streamed_size += data.len();
        Ok(())
    }

    fn finish(self, message: &mut Message) -> Result<()> {
        drop(self.file);
        message.set_body(Body::File(FileBody::streamed(self.temp_path, true)), false)
    }
}

enum BodyHandler {
    String(StringBodyHandler),
    File(FileBodyHandler),
}

impl BodyHandler {
    fn add_content(&mut self, data: &[u8]) -> Result<()> {
        match self {
            BodyHandler::String(h) => {
                h.add_content(data);
                Ok(())
            }
            BodyHandler::File(h) => h.add_content(data),
        }
    }

    fn content_length(&self) -> usize {
        match self {
            BodyHandler::String(h) => h.content.len(),
            BodyHandler::File(h) => h.streamed_size,
        }
    }

    fn finish(self, message: &mut Message) -> Result<()> {
        match self {
            BodyHandler::String(h) => h.finish(message),
            BodyHandler::File(h) => h.finish(message),
        }
    }
}

// -----------------------------------------------------------------------------

enum Target {
    Request(Request),
    Response(Response),
}

impl Target {
    fn message_mut(&mut self) -> &mut Message {
        match self {
            Target::Request(r) => r,
            Target::Response(r) => r,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MultipartStep {
    Start,
    BoundaryParsed,
    HeadersParsed,
    Ended,
}

/// Shared parser core. Use through [`RequestParser`] or [`ResponseParser`].
struct Parser {
    target: Target,
    pending: BytesMut,
    stream: bool,
    ignore_body: bool,
    max_body_size: Option<usize>,

    start_line_parsed: bool,
    header_ended: bool,
    header_length: usize,
    content_length: Option<usize>,
    content_type: ContentType,
    chunked: bool,
    chunk_size: Option<usize>,
    finished: bool,
    body_handler: Option<BodyHandler>,

    // Multipart request state.
    step: MultipartStep,
    part: Option<FormPart>,
}

impl Parser {
    fn new(target: Target) -> Self {
        Self {
            target,
            pending: BytesMut::new(),
            stream: false,
            ignore_body: false,
            max_body_size: None,
            start_line_parsed: false,
            header_ended: false,
            header_length: 0,
            content_length: None,
            content_type: ContentType::default(),
            chunked: false,
            chunk_size: None,
            finished: false,
            body_handler: None,
            step: MultipartStep::Start,
            part: None,
        }
    }

    fn reset(&mut self, target: Target, stream: bool) {
        self.target = target;
        self.pending.clear();
        self.stream = stream;
        self.ignore_body = false;
        self.start_line_parsed = false;
        self.header_ended = false;
        self.header_length = 0;
        self.content_length = None;
        self.content_type.reset();
        self.chunked = false;
        self.chunk_size = None;
        self.finished = false;
        self.body_handler = None;
        self.step = MultipartStep::Start;
        self.part = None;
    }

    fn parse(&mut self, data: &[u8], matcher: Option<&dyn ViewMatcher>) -> Result<()> {
        if self.finished {
            return Err(Error::state("parser already finished"));
        }

        if self.header_ended {
            return self.parse_content(data);
        }

        self.pending.extend_from_slice(data);
        self.parse_headers()?;

        if !self.header_ended {
            if self.pending.len() > MAX_HEADER_BYTES {
                return Err(Error::parse("header block too large"));
            }
            tracing::trace!("headers continue in next read");
            return Ok(());
        }

        self.on_headers_end(matcher)?;

        if self.ignore_body {
            return self.finish();
        }

        self.create_body_handler()?;

        // Whatever followed the blank line is still pending.
        self.parse_content(&[])
    }

    fn parse_headers(&mut self) -> Result<()> {
        let mut off = 0;

        while let Some(line_len) = find_line(&self.pending[off..]) {
            let line_end = off + line_len;

            if line_len == 0 {
                off = line_end + 2;
                self.header_ended = true;
                break;
            }

            let line = std::str::from_utf8(&self.pending[off..line_end])
                .map_err(|_| Error::parse("header line is not valid UTF-8"))?
                .to_string();
            off = line_end + 2;

            if !self.start_line_parsed {
                self.start_line_parsed = true;
                self.parse_start_line(&line)?;
            } else {
                self.parse_header_line(&line)?;
            }
        }

        self.header_length += off;
        if self.header_length > MAX_HEADER_BYTES {
            return Err(Error::parse("header block too large"));
        }
        self.pending.advance(off);
        Ok(())
    }

    fn parse_start_line(&mut self, line: &str) -> Result<()> {
        match &mut self.target {
            Target::Request(request) => {
                let mut parts = line.split_ascii_whitespace();
                let method = parts.next().unwrap_or("");
                let target = parts.next().unwrap_or("");
                let version = parts.next().unwrap_or("");
                if method.is_empty() || target.is_empty() || !version.starts_with("HTTP/") {
                    return Err(Error::parse(format!("invalid request line: {}", line)));
                }
                request.set_start_line(line);
                request.set_method(method);
                request.set_url(Url::parse(target)?);
            }
            Target::Response(response) => {
                let mut parts = line.splitn(3, ' ');
                let version = parts.next().unwrap_or("");
                let status = parts.next().unwrap_or("");
                let reason = parts.next().unwrap_or("");
                let status = status
                    .parse::<u16>()
                    .map_err(|_| Error::parse(format!("invalid status line: {}", line)))?;
                if !version.starts_with("HTTP/") {
                    return Err(Error::parse(format!("invalid status line: {}", line)));
                }
                response.set_start_line(line);
                response.set_status(status);
                response.set_reason(reason);
            }
        }
        Ok(())
    }

    fn parse_header_line(&mut self, line: &str) -> Result<()> {
        let (name, value) = utility::split_kv(line, ':')
            .ok_or_else(|| Error::parse(format!("invalid header line: {}", line)))?;

        if name.eq_ignore_ascii_case(headers::CONTENT_LENGTH) {
            let length = value
                .parse::<usize>()
                .map_err(|_| Error::parse(format!("invalid content length: {}", value)))?;
            self.content_length = Some(length);
        } else if name.eq_ignore_ascii_case(headers::CONTENT_TYPE) {
            self.content_type = ContentType::parse(value);
            if !self.content_type.is_valid() {
                return Err(Error::parse(format!("invalid content type: {}", value)));
            }
        } else if name.eq_ignore_ascii_case(headers::TRANSFER_ENCODING) && value == "chunked" {
            self.chunked = true;
        }

        // Append rather than set: duplicate names keep their order.
        self.target
            .message_mut()
            .headers_mut()
            .append(name.to_string(), value.to_string());
        Ok(())
    }

    /// Server side: resolve the view while only headers have been read, and
    /// let it decide whether the body goes to a temp file.
    fn on_headers_end(&mut self, matcher: Option<&dyn ViewMatcher>) -> Result<()> {
        if let (Target::Request(request), Some(matcher)) = (&self.target, matcher) {
            let method = request.method().to_string();
            let path = request.url().path().to_string();
            match matcher.match_view(&method, &path) {
                Some(stream) => self.stream = stream,
                None => {
                    return Err(Error::parse(format!("no view matches {} {}", method, path)));
                }
            }
        }
        Ok(())
    }

    fn create_body_handler(&mut self) -> Result<()> {
        if self.stream {
            self.body_handler = Some(BodyHandler::File(FileBodyHandler::open()?));
        } else {
            self.body_handler = Some(BodyHandler::String(StringBodyHandler::default()));
        }
        Ok(())
    }

    fn parse_content(&mut self, data: &[u8]) -> Result<()> {
        if self.chunked {
            return self.parse_chunked_content(data);
        }
        let multipart = matches!(self.target, Target::Request(_)) && self.content_type.is_multipart();
        if multipart {
            return self.parse_multipart_content(data);
        }
        self.parse_fixed_content(data)
    }

    fn parse_fixed_content(&mut self, data: &[u8]) -> Result<()> {
        let content_length = match self.content_length {
            // No Content-Length means no content.
            None => return self.finish(),
            Some(length) => length,
        };

        self.pending.extend_from_slice(data);

        let received = self.body_handler.as_ref().map(|h| h.content_length()).unwrap_or(0);
        let remaining = content_length.saturating_sub(received);
        let take = remaining.min(self.pending.len());
        if take > 0 {
            let chunk = self.pending.split_to(take);
            self.add_body_content(&chunk)?;
        }

        if self.body_received() >= content_length {
            return self.finish();
        }
        Ok(())
    }

    fn parse_chunked_content(&mut self, data: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(data);

        loop {
            if self.chunk_size.is_none() && !self.parse_chunk_size()? {
                return Ok(()); // size line incomplete
            }
            let chunk_size = match self.chunk_size {
                Some(n) => n,
                None => return Ok(()),
            };

            if chunk_size == 0 {
                // Discard optional trailers up to the terminating blank line.
                loop {
                    match find_line(&self.pending) {
                        Some(0) => {
                            self.pending.advance(2);
                            return self.finish();
                        }
                        Some(n) => {
                            tracing::trace!("discarding chunked trailer");
                            self.pending.advance(n + 2);
                        }
                        None => return Ok(()),
                    }
                }
            }

            if chunk_size + 2 <= self.pending.len() {
                let chunk = self.pending.split_to(chunk_size);
                self.add_body_content(&chunk)?;
                self.pending.advance(2); // CRLF after chunk data
                self.chunk_size = None;
            } else if chunk_size > self.pending.len() {
                let chunk = self.pending.split_to(self.pending.len());
                self.add_body_content(&chunk)?;
                self.chunk_size = Some(chunk_size - chunk.len());
                return Ok(());
            } else {
                // Chunk data complete but its CRLF not yet received.
                return Ok(());
            }
        }
    }

    /// Read the chunk-size line if it is fully buffered. Extensions after
    /// `;` are ignored.
    fn parse_chunk_size(&mut self) -> Result<bool> {
        let line_len = match find_line(&self.pending) {
            Some(n) => n,
            None => return Ok(false),
        };
        let line = self.pending.split_to(line_len + 2);
        let line = std::str::from_utf8(&line[..line_len])
            .map_err(|_| Error::parse("invalid chunk size line"))?;
        let hex = line
            .split(|c| c == ';' || c == ' ')
            .next()
            .unwrap_or(line)
            .trim();
        let size = usize::from_str_radix(hex, 16)
            .map_err(|_| Error::parse(format!("invalid chunk size: {}", hex)))?;
        tracing::trace!("chunk size: {}", size);
        self.chunk_size = Some(size);
        Ok(true)
    }

    fn parse_multipart_content(&mut self, data: &[u8]) -> Result<()> {
        self.pending.extend_from_slice(data);

        if self.content_length.is_none() {
            return Err(Error::parse("multipart request has no content length"));
        }

        loop {
            if self.pending.is_empty() {
                break;
            }

            match self.step {
                MultipartStep::Start => {
                    let line = match self.get_next_line() {
                        Some(line) => line?,
                        None => break,
                    };
                    if !self.is_boundary(&line) {
                        return Err(Error::parse(format!("invalid boundary: {}", line)));
                    }
                    self.step = MultipartStep::BoundaryParsed;
                }
                MultipartStep::BoundaryParsed => {
                    if self.part.is_none() {
                        self.part = Some(FormPart::default());
                    }
                    if !self.parse_part_headers()? {
                        break; // need more data
                    }
                    self.step = MultipartStep::HeadersParsed;
                }
                MultipartStep::HeadersParsed => {
                    let (off, count, ended) = match self.find_next_boundary()? {
                        Some(found) => found,
                        None => break, // wait until the next boundary arrives
                    };

                    if off < 2 {
                        return Err(Error::parse("invalid multipart part data"));
                    }
                    // Exclude the CRLF that precedes the boundary line.
                    let mut part = self.part.take().unwrap_or_default();
                    part.append_data(&self.pending[..off - 2]);
                    self.pending.advance(off + count + 2);

                    if let Target::Request(request) = &mut self.target {
                        request.add_form_part(part);
                    }

                    if ended {
                        self.step = MultipartStep::Ended;
                        break;
                    }
                    self.step = MultipartStep::BoundaryParsed;
                }
                MultipartStep::Ended => break,
            }
        }

        if self.step == MultipartStep::Ended {
            return self.finish();
        }
        Ok(())
    }

    /// Parse one part's header block. True when the block is complete (and
    /// consumed), false when more data is needed.
    fn parse_part_headers(&mut self) -> Result<bool> {
        let mut off = 0;

        loop {
            let line_len = match find_line(&self.pending[off..]) {
                Some(n) => n,
                None => return Ok(false),
            };
            let line_end = off + line_len;

            if line_len == 0 {
                off = line_end + 2;
                break;
            }

            let line = std::str::from_utf8(&self.pending[off..line_end])
                .map_err(|_| Error::parse("part header is not valid UTF-8"))?;

            let (name, value) = utility::split_kv(line, ':')
                .ok_or_else(|| Error::parse(format!("invalid part header: {}", line)))?;

            let Some(part) = self.part.as_mut() else {
                return Err(Error::state("no multipart part in progress"));
            };
            if name.eq_ignore_ascii_case(headers::CONTENT_DISPOSITION) {
                let disposition = ContentDisposition::parse(value);
                if !disposition.is_valid() {
                    return Err(Error::parse(format!("invalid content disposition: {}", value)));
                }
                part.set_name(disposition.name());
                part.set_file_name(disposition.file_name());
            } else if name.eq_ignore_ascii_case(headers::CONTENT_TYPE) {
                part.set_media_type(value);
            }

            off = line_end + 2;
        }

        self.pending.advance(off);
        Ok(true)
    }

    /// Scan pending data line by line for the next boundary. Returns byte
    /// offset of the line, its length, and whether it is the closing
    /// boundary.
    fn find_next_boundary(&self) -> Result<Option<(usize, usize, bool)>> {
        let mut off = 0;

        while let Some(line_len) = find_line(&self.pending[off..]) {
            if line_len > 0 {
                let line = std::str::from_utf8(&self.pending[off..off + line_len])
                    .unwrap_or("");
                if self.is_boundary(line) {
                    return Ok(Some((off, line_len, false)));
                }
                if self.is_boundary_end(line) {
                    return Ok(Some((off, line_len, true)));
                }
            }
            off += line_len + 2;
        }
        Ok(None)
    }

    fn is_boundary(&self, line: &str) -> bool {
        line.strip_prefix("--") == Some(self.content_type.boundary())
    }

    fn is_boundary_end(&self, line: &str) -> bool {
        line.strip_prefix("--")
            .and_then(|rest| rest.strip_suffix("--"))
            == Some(self.content_type.boundary())
    }

    fn get_next_line(&mut self) -> Option<Result<String>> {
        let line_len = find_line(&self.pending)?;
        let line = self.pending.split_to(line_len + 2);
        match std::str::from_utf8(&line[..line_len]) {
            Ok(s) => Some(Ok(s.to_string())),
            Err(_) => Some(Err(Error::parse("line is not valid UTF-8"))),
        }
    }

    fn add_body_content(&mut self, data: &[u8]) -> Result<()> {
        let handler = self
            .body_handler
            .as_mut()
            .ok_or_else(|| Error::state("no body handler"))?;
        handler.add_content(data)?;
        if let Some(max) = self.max_body_size {
            if handler.content_length() > max {
                return Err(Error::parse("message body too large"));
            }
        }
        Ok(())
    }

    fn body_received(&self) -> usize {
        self.body_handler.as_ref().map(|h| h.content_length()).unwrap_or(0)
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        let message = self.target.message_mut();
        message.set_content_length(self.content_length);
        if let Some(handler) = self.body_handler.take() {
            handler.finish(message)?;
        }
        Ok(())
    }
}

/// Length of the first line in `buf` (bytes before CRLF), if complete.
fn find_line(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

// -----------------------------------------------------------------------------

/// Request parser for the server side. An optional [`ViewMatcher`] is
/// consulted when the headers end; it rejects unroutable requests early and
/// decides whether the body is streamed to a temp file.
pub struct RequestParser {
    inner: Parser,
    matcher: Option<Arc<dyn ViewMatcher>>,
}

impl RequestParser {
    pub fn new(matcher: Option<Arc<dyn ViewMatcher>>) -> Self {
        Self {
            inner: Parser::new(Target::Request(Request::default())),
            matcher,
        }
    }

    /// Prepare for the next request on this connection.
    pub fn init(&mut self) {
        self.inner.reset(Target::Request(Request::default()), false);
    }

    pub fn set_max_body_size(&mut self, max: Option<usize>) {
        self.inner.max_body_size = max;
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<()> {
        let matcher = self.matcher.clone();
        self.inner.parse(data, matcher.as_deref())
    }

    pub fn finished(&self) -> bool {
        self.inner.finished
    }

    pub fn header_ended(&self) -> bool {
        self.inner.header_ended
    }

    /// The parsed request; valid once `finished` is true.
    pub fn take_request(&mut self) -> Request {
        match &mut self.inner.target {
            Target::Request(request) => std::mem::take(request),
            Target::Response(_) => unreachable!("request parser holds a request"),
        }
    }
}

/// Response parser for the client side.
pub struct ResponseParser {
    inner: Parser,
}

impl ResponseParser {
    pub fn new() -> Self {
        Self {
            inner: Parser::new(Target::Response(Response::default())),
        }
    }

    /// Prepare for the next response. With `stream`, the body goes to a
    /// temp file; with `ignore_body` (HEAD requests), parsing finishes at
    /// the header boundary even if a Content-Length is present.
    pub fn init(&mut self, stream: bool, ignore_body: bool) {
        self.inner.reset(Target::Response(Response::default()), stream);
        self.inner.ignore_body = ignore_body;
    }

    pub fn parse(&mut self, data: &[u8]) -> Result<()> {
        self.inner.parse(data, None)
    }

    pub fn finished(&self) -> bool {
        self.inner.finished
    }

    pub fn header_ended(&self) -> bool {
        self.inner.header_ended
    }

    /// Declared content length, for progress reporting. None for chunked.
    pub fn content_length(&self) -> Option<usize> {
        self.inner.content_length
    }

    /// Body bytes absorbed so far.
    pub fn body_received(&self) -> usize {
        self.inner.body_received()
    }

    /// The parsed response; valid once `finished` is true.
    pub fn take_response(&mut self) -> Response {
        match &mut self.inner.target {
            Target::Response(response) => std::mem::take(response),
            Target::Request(_) => unreachable!("response parser holds a response"),
        }
    }

    /// Bytes read past the end of the finished message (e.g. WebSocket
    /// frames that arrived right behind the 101).
    pub fn take_pending(&mut self) -> BytesMut {
        self.inner.pending.split()
    }
}

impl Default for ResponseParser {
    fn default() -> Self {
        Self::new()
    }
}
