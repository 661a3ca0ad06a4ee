/*
 * lib.rs
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

//! Ragnatela: a symmetric HTTP/1.1 client and server library.
//!
//! - an incremental message parser shared by both directions, with
//!   fixed-length, chunked, and multipart/form-data bodies, buffered in
//!   memory or streamed to temp files;
//! - a client session with keep-alive pooling, connect/read deadlines,
//!   cancellation, optional TLS and gzip, and streaming bodies;
//! - a server with a routing layer (literal and regex views), a bounded
//!   worker pool for blocking handlers, static file service, and optional
//!   TLS;
//! - a WebSocket (RFC 6455) frame codec and client reusing the same HTTP
//!   engine for the handshake.

pub mod body;
pub mod client;
pub mod common;
pub mod error;
pub mod gzip;
pub mod http;
pub mod net;
pub mod server;
pub mod url;
pub mod utility;
pub mod ws;

pub use body::{Body, FileBody, FormBody, FormPart, Payload, StringBody};
pub use client::{ClientSession, ProgressCallback};
pub use common::{headers, media_types, ContentType, Headers};
pub use error::{Error, ErrorKind, Result};
pub use http::{
    methods, status_codes, Message, Request, RequestBuilder, RequestParser, Response,
    ResponseBuilder, ResponseParser, ViewMatcher,
};
pub use net::SslVerify;
pub use server::{IpProtocol, Router, Server, View};
pub use url::Url;
pub use ws::{WsClient, WsFrame};
