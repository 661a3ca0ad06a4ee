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

//! WebSocket client. The handshake rides the HTTP client engine; after the
//! 101 the same socket switches to the frame codec.
//!
//! Frames sent from here are masked with a fresh key each. A ping is
//! answered with an automatic pong carrying the same payload. Close is a
//! two-way handshake: the TCP connection is torn down (exactly once) only
//! after a close frame has been both sent and received.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::client::client::ClientConnection;
use crate::error::{Error, ErrorKind, Result};
use crate::net::{MaybeTlsStream, SslVerify};
use crate::url::Url;
use crate::ws::frame::{opcodes, FrameParser, WsFrame};
use crate::ws::handshake;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const READ_CHUNK: usize = 4096;

#[derive(Debug)]
pub struct WsClient {
    stream: MaybeTlsStream,
    parser: FrameParser,
    read_buf: BytesMut,
    buffer: [u8; READ_CHUNK],
    close_sent: bool,
    close_received: bool,
    closed: bool,
}

impl WsClient {
    /// Connect to a ws:// or wss:// URL and perform the opening handshake.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with(url, &[], SslVerify::default()).await
    }

    /// Connect, requesting subprotocols and controlling TLS verification.
    /// The server's subprotocol selection is verified against `protocols`.
    pub async fn connect_with(
        url: &str,
        protocols: &[&str],
        ssl_verify: SslVerify,
    ) -> Result<Self> {
        let url = Url::parse(url)?;
        match url.scheme() {
            "ws" | "wss" => {}
            scheme => {
                return Err(Error::syntax(format!(
                    "URL scheme must be ws or wss, not '{}'",
                    scheme
                )))
            }
        }

        let mut connection = ClientConnection::open(
            url.scheme(),
            url.host(),
            url.effective_port(),
            ssl_verify,
            HANDSHAKE_TIMEOUT,
            READ_CHUNK,
        )
        .await?;

        let key = handshake::new_key()?;
        let mut request = handshake::build_request(&url, &key, protocols);
        request.prepare()?;

        let response = connection
            .send(&mut request, false, HANDSHAKE_TIMEOUT, None)
            .await?;
        handshake::verify_response(&response, &key, protocols)?;
        tracing::debug!("websocket handshake complete");

        // Frames may already sit behind the 101 in the read buffer.
        let (stream, read_buf) = connection.into_parts();

        Ok(Self {
            stream,
            parser: FrameParser::new(true),
            read_buf,
            buffer: [0u8; READ_CHUNK],
            close_sent: false,
            close_received: false,
            closed: false,
        })
    }

    pub fn close_sent(&self) -> bool {
        self.close_sent
    }

    pub fn close_received(&self) -> bool {
        self.close_received
    }

    /// Whether the TCP connection has been torn down.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub async fn send_text(&mut self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send_frame(WsFrame::text(data.into())).await
    }

    pub async fn send_binary(&mut self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send_frame(WsFrame::binary(data.into())).await
    }

    pub async fn send_ping(&mut self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send_frame(WsFrame::ping(data.into())).await
    }

    pub async fn send_pong(&mut self, data: impl Into<Vec<u8>>) -> Result<()> {
        self.send_frame(WsFrame::pong(data.into())).await
    }

    /// Initiate (or answer) the close handshake. When the peer's close has
    /// already arrived, this also tears the connection down.
    pub async fn send_close(&mut self, code: Option<u16>, reason: &str) -> Result<()> {
        if self.close_sent {
            return Ok(());
        }
        self.send_frame(WsFrame::close(code, reason)).await?;
        self.close_sent = true;
        if self.close_received {
            self.teardown().await;
        }
        Ok(())
    }

    /// Next frame from the server. Pings are answered automatically (and
    /// still delivered); a close frame completes the close handshake. None
    /// once the connection is down.
    pub async fn receive(&mut self) -> Result<Option<WsFrame>> {
        loop {
            if self.closed {
                return Ok(None);
            }

            if let Some(frame) = self.next_buffered_frame().await? {
                return Ok(Some(frame));
            }

            let n = self
                .stream
                .read(&mut self.buffer)
                .await
                .map_err(|e| Error::new(ErrorKind::SocketRead, e.to_string()))?;
            if n == 0 {
                tracing::debug!("websocket peer closed the connection");
                self.teardown().await;
                return Ok(None);
            }
            self.read_buf.extend_from_slice(&self.buffer[..n]);
        }
    }

    async fn next_buffered_frame(&mut self) -> Result<Option<WsFrame>> {
        let frame = match self.parser.receive(&mut self.read_buf) {
            Ok(frame) => frame,
            Err(e) => {
                // Masked or malformed server frame: protocol error, close.
                let _ = self.send_close(Some(1002), "protocol error").await;
                self.teardown().await;
                return Err(e);
            }
        };

        let Some(frame) = frame else {
            return Ok(None);
        };

        match frame.opcode {
            opcodes::PING => {
                tracing::trace!("ping; answering with pong");
                self.send_frame(WsFrame::pong(frame.payload.clone())).await?;
            }
            opcodes::CLOSE => {
                self.close_received = true;
                if let Some(code) = frame.close_status() {
                    tracing::debug!("close received (status {})", code);
                }
                if self.close_sent {
                    self.teardown().await;
                } else {
                    self.send_close(frame.close_status(), "").await?;
                }
            }
            _ => {}
        }

        Ok(Some(frame))
    }

    async fn send_frame(&mut self, mut frame: WsFrame) -> Result<()> {
        if self.closed {
            return Err(Error::state("websocket connection is closed"));
        }

        let mut key = [0u8; 4];
        getrandom::getrandom(&mut key)
            .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))?;
        frame.set_masking_key(key);

        let mut wire = BytesMut::with_capacity(14 + frame.payload.len());
        frame.encode(&mut wire)?;

        self.stream
            .write_all(&wire)
            .await
            .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))?;
        self.stream
            .flush()
            .await
            .map_err(|e| Error::new(ErrorKind::SocketWrite, e.to_string()))
    }

    /// Close the TCP connection. Idempotent.
    async fn teardown(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stream.shutdown().await;
        }
    }
}
