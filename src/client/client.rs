/*
 * client.rs
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

//! One client connection: connect (plain or TLS), write a request head and
//! its body payload by payload, then read and parse the response under the
//! read deadline.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;

use crate::body::payload_size;
use crate::error::{Error, ErrorKind, Result};
use crate::http::parser::ResponseParser;
use crate::http::request::{methods, Request};
use crate::http::response::Response;
use crate::net::{self, MaybeTlsStream, SslVerify};

/// Progress callback: (transferred body bytes, total when known, is_read).
/// Chunked transfers report an unknown total.
pub type ProgressCallback = Arc<dyn Fn(usize, Option<usize>, bool) + Send + Sync>;

pub struct ClientConnection {
    stream: MaybeTlsStream,
    parser: ResponseParser,
    buffer: Vec<u8>,
}

impl ClientConnection {
    /// Resolve, connect, and handshake when the scheme is https/wss.
    pub async fn open(
        scheme: &str,
        host: &str,
        port: u16,
        ssl_verify: SslVerify,
        connect_timeout: Duration,
        buffer_size: usize,
    ) -> Result<Self> {
        let secure = matches!(scheme, "https" | "wss");
        let tcp = net::connect(host, port, connect_timeout).await?;

        let stream = if secure {
            net::tls_handshake(tcp, host, net::client_config(ssl_verify)).await?
        } else {
            MaybeTlsStream::Plain(tcp)
        };

        Ok(Self {
            stream,
            parser: ResponseParser::new(),
            buffer: vec![0u8; buffer_size.max(1)],
        })
    }

    /// Send a prepared request and read its response. With `stream` the
    /// response body goes to a temp file instead of memory.
    pub async fn send(
        &mut self,
        request: &mut Request,
        stream: bool,
        read_timeout: Duration,
        progress: Option<&ProgressCallback>,
    ) -> Result<Response> {
        self.write_request(request, progress).await?;
        self.read_response(request, stream, read_timeout, progress).await
    }

    async fn write_request(
        &mut self,
        request: &mut Request,
        progress: Option<&ProgressCallback>,
    ) -> Result<()> {
        tracing::trace!("request:\n{}", request.dump());

        for buf in request.head_payload() {
            self.write_all(&buf).await?;
        }

        let total = request.content_length();
        let mut written = 0;

        request.body_mut().init_payload()?;
        loop {
            let payload = request.body_mut().next_payload(true)?;
            if payload.is_empty() {
                break;
            }
            written += payload_size(&payload);
            for buf in payload {
                self.write_all(&buf).await?;
            }
            if let Some(callback) = progress {
                callback(written, total, false);
            }
        }

        self.stream
            .flush()
            .await
            .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))?;
        tracing::debug!("request sent ({} body bytes)", written);
        Ok(())
    }

    async fn read_response(
        &mut self,
        request: &Request,
        stream: bool,
        read_timeout: Duration,
        progress: Option<&ProgressCallback>,
    ) -> Result<Response> {
        self.parser.init(stream, request.method() == methods::HEAD);

        loop {
            let read = timeout(read_timeout, self.stream.read(&mut self.buffer)).await;
            let n = match read {
                Err(_) => {
                    self.stream.shutdown().await;
                    return Err(Error::new(ErrorKind::SocketRead, "read timed out").with_timeout());
                }
                Ok(Err(e)) => {
                    self.stream.shutdown().await;
                    return Err(Error::new(ErrorKind::SocketRead, e.to_string()));
                }
                Ok(Ok(0)) => {
                    return Err(Error::new(
                        ErrorKind::SocketRead,
                        "connection closed before the response ended",
                    ));
                }
                Ok(Ok(n)) => n,
            };

            self.parser.parse(&self.buffer[..n])?;

            if let Some(callback) = progress {
                if self.parser.header_ended() {
                    callback(self.parser.body_received(), self.parser.content_length(), true);
                }
            }

            if self.parser.finished() {
                let response = self.parser.take_response();
                tracing::trace!("response:\n{}", response.dump());
                return Ok(response);
            }
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.stream
            .write_all(data)
            .await
            .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))
    }

    /// Shut the connection down; used when it will not rejoin the pool.
    pub async fn close(&mut self) {
        self.stream.shutdown().await;
    }

    /// Hand over the underlying stream plus any bytes read past the last
    /// response (WebSocket upgrade).
    pub fn into_parts(mut self) -> (MaybeTlsStream, bytes::BytesMut) {
        let leftover = self.parser.take_pending();
        (self.stream, leftover)
    }
}
