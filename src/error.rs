/*
 * error.rs
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

//! Error taxonomy shared by client, server, parser, and WebSocket layers.
//!
//! One structured carrier: a kind tag, a human-readable detail string, and a
//! `timeout` overlay so deadline-driven aborts keep their phase's kind.

use thiserror::Error;

/// What went wrong, by phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input before any I/O (bad URL, bad builder arguments).
    Syntax,
    /// Operation attempted in the wrong state (e.g. send on a stopped session).
    State,
    /// Host name resolution failed.
    Resolve,
    /// TCP connect failed.
    Connect,
    /// TLS or WebSocket handshake failed.
    Handshake,
    SocketRead,
    SocketWrite,
    /// Protocol error while parsing a message or frame.
    Parse,
    /// Filesystem access failed (body files, temp streaming, static docs).
    File,
    /// Payload-level failure (e.g. gzip decompression).
    Data,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Syntax => "Syntax",
            ErrorKind::State => "State",
            ErrorKind::Resolve => "Resolve",
            ErrorKind::Connect => "Connect",
            ErrorKind::Handshake => "Handshake",
            ErrorKind::SocketRead => "SocketRead",
            ErrorKind::SocketWrite => "SocketWrite",
            ErrorKind::Parse => "Parse",
            ErrorKind::File => "File",
            ErrorKind::Data => "Data",
        }
    }
}

/// Library error: kind + detail, with a timeout overlay.
///
/// `timeout` is set when a deadline timer aborted the operation; the kind
/// still names the phase that was in flight (`Connect` or `SocketRead`).
#[derive(Debug, Clone, Error)]
#[error("{}: {detail}{}", kind.as_str(), if *timeout { " (timeout)" } else { "" })]
pub struct Error {
    pub kind: ErrorKind,
    pub detail: String,
    pub timeout: bool,
}

impl Error {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            timeout: false,
        }
    }

    pub fn with_timeout(mut self) -> Self {
        self.timeout = true;
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_timeout(&self) -> bool {
        self.timeout
    }

    pub fn syntax(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, detail)
    }

    pub fn state(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::State, detail)
    }

    pub fn parse(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, detail)
    }

    pub fn file(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::File, detail)
    }

    pub fn data(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Data, detail)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_detail() {
        let e = Error::new(ErrorKind::Connect, "connection refused");
        assert_eq!(e.to_string(), "Connect: connection refused");
    }

    #[test]
    fn timeout_overlay() {
        let e = Error::new(ErrorKind::SocketRead, "read aborted").with_timeout();
        assert!(e.is_timeout());
        assert_eq!(e.kind(), ErrorKind::SocketRead);
        assert!(e.to_string().contains("(timeout)"));
    }
}
