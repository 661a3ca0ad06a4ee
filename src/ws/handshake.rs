/*
 * handshake.rs
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

//! WebSocket opening handshake (RFC 6455 §4): an HTTP/1.1 GET with the
//! Upgrade headers, answered by 101 with a verifiable Sec-WebSocket-Accept.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha1::{Digest, Sha1};

use crate::common::headers;
use crate::error::{Error, ErrorKind, Result};
use crate::http::request::{methods, Request};
use crate::http::response::{status_codes, Response};
use crate::url::Url;

/// Magic GUID appended to the key before hashing (RFC 6455 §4.2.2).
const ACCEPT_MAGIC: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Fresh Sec-WebSocket-Key: 16 random bytes, base64-encoded.
pub fn new_key() -> Result<String> {
    let mut raw = [0u8; 16];
    getrandom::getrandom(&mut raw)
        .map_err(|e| Error::new(ErrorKind::Handshake, e.to_string()))?;
    Ok(BASE64.encode(raw))
}

/// Expected Sec-WebSocket-Accept for a key: base64(SHA1(key + magic)).
pub fn accept_for_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(ACCEPT_MAGIC);
    BASE64.encode(hasher.finalize())
}

/// The upgrade request for `url` (ws or wss), optionally asking for
/// subprotocols.
pub fn build_request(url: &Url, key: &str, protocols: &[&str]) -> Request {
    let mut request = Request::new(methods::GET, url.clone());
    request.set_header(headers::UPGRADE, "websocket");
    request.set_header(headers::CONNECTION, "Upgrade");
    request.set_header(headers::SEC_WEBSOCKET_KEY, key);
    request.set_header(headers::SEC_WEBSOCKET_VERSION, "13");
    if !protocols.is_empty() {
        request.set_header(headers::SEC_WEBSOCKET_PROTOCOL, protocols.join(", "));
    }
    request
}

/// Verify the server's answer: 101 status, matching accept, and (when
/// subprotocols were requested) a selection from the requested list.
pub fn verify_response(response: &Response, key: &str, protocols: &[&str]) -> Result<()> {
    if response.status() != status_codes::SWITCHING_PROTOCOLS {
        return Err(Error::new(
            ErrorKind::Handshake,
            format!("expected 101 Switching Protocols, got {}", response.status()),
        ));
    }

    let accept = response.header(headers::SEC_WEBSOCKET_ACCEPT).trim();
    if accept.is_empty() {
        return Err(Error::new(ErrorKind::Handshake, "missing Sec-WebSocket-Accept"));
    }
    if accept != accept_for_key(key) {
        return Err(Error::new(ErrorKind::Handshake, "Sec-WebSocket-Accept mismatch"));
    }

    let selected = response.header(headers::SEC_WEBSOCKET_PROTOCOL).trim();
    if !protocols.is_empty() {
        if selected.is_empty() {
            return Err(Error::new(
                ErrorKind::Handshake,
                "server selected no subprotocol",
            ));
        }
        if !protocols.iter().any(|p| p.eq_ignore_ascii_case(selected)) {
            return Err(Error::new(
                ErrorKind::Handshake,
                format!("server selected an unrequested subprotocol: {}", selected),
            ));
        }
    } else if !selected.is_empty() {
        return Err(Error::new(
            ErrorKind::Handshake,
            format!("server selected an unrequested subprotocol: {}", selected),
        ));
    }

    Ok(())
}
