/*
 * session.rs
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

//! Client session: default headers, timeouts, keep-alive pooling, and
//! cancellation across requests to any number of hosts.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tokio::sync::Notify;

use crate::client::client::{ClientConnection, ProgressCallback};
use crate::client::pool::{ConnectionPool, PoolKey};
use crate::common::{headers, Headers};
use crate::error::{Error, ErrorKind, Result};
use crate::http::request::Request;
use crate::http::response::Response;
use crate::net::SslVerify;
use crate::utility;

const DEFAULT_BUFFER_SIZE: usize = 1024;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// A client session. Holds default headers applied to every request, the
/// connect/read deadlines, and a keep-alive connection pool keyed by
/// (scheme, host, port).
///
/// `send` resolves, connects (with TLS for https), writes the request, and
/// parses the response; `cancel` aborts the request in flight.
pub struct ClientSession {
    buffer_size: usize,
    connect_timeout: Duration,
    read_timeout: Duration,
    ssl_verify: SslVerify,
    headers: Headers,
    media_type: String,
    charset: String,
    progress: Option<ProgressCallback>,

    pool: ConnectionPool,
    cancel: Arc<Notify>,
    in_flight: AtomicBool,
    connect_count: AtomicUsize,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSession {
    pub fn new() -> Self {
        let mut headers = Headers::new();
        headers.set(headers::USER_AGENT, utility::user_agent());
        headers.set(headers::ACCEPT, "*/*");
        // Accept-Encoding defaults to identity; opt in via accept_gzip().
        headers.set(headers::ACCEPT_ENCODING, "identity");
        headers.set(headers::CONNECTION, "Keep-Alive");

        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            ssl_verify: SslVerify::default(),
            headers,
            media_type: String::new(),
            charset: String::new(),
            progress: None,
            pool: ConnectionPool::new(),
            cancel: Arc::new(Notify::new()),
            in_flight: AtomicBool::new(false),
            connect_count: AtomicUsize::new(0),
        }
    }

    pub fn set_buffer_size(&mut self, size: usize) {
        if size > 0 {
            self.buffer_size = size;
        }
    }

    pub fn set_connect_timeout(&mut self, timeout: Duration) {
        self.connect_timeout = timeout;
    }

    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    pub fn set_ssl_verify(&mut self, verify: SslVerify) {
        self.ssl_verify = verify;
    }

    /// Default `Accept` header for every request of this session.
    pub fn accept(&mut self, content_types: &str) {
        if !content_types.is_empty() {
            self.headers.set(headers::ACCEPT, content_types);
        }
    }

    /// Ask servers for gzip responses (default is identity).
    pub fn accept_gzip(&mut self, gzip: bool) {
        self.headers.set(
            headers::ACCEPT_ENCODING,
            if gzip { "gzip, deflate" } else { "identity" },
        );
    }

    /// Default Content-Type for requests that carry a body but none.
    pub fn set_media_type(&mut self, media_type: &str, charset: &str) {
        self.media_type = media_type.to_string();
        self.charset = charset.to_string();
    }

    pub fn auth(&mut self, auth_type: &str, credentials: &str) {
        self.headers
            .set(headers::AUTHORIZATION, format!("{} {}", auth_type, credentials));
    }

    pub fn auth_basic(&mut self, login: &str, password: &str) {
        let credentials = BASE64.encode(format!("{}:{}", login, password));
        self.auth("Basic", &credentials);
    }

    pub fn auth_token(&mut self, token: &str) {
        self.auth("Token", token);
    }

    pub fn set_progress_callback(&mut self, callback: ProgressCallback) {
        self.progress = Some(callback);
    }

    /// Idle connections currently pooled (test hook for keep-alive).
    pub fn idle_connections(&self) -> usize {
        self.pool.idle_count()
    }

    /// TCP connections established so far (test hook for keep-alive).
    pub fn connect_count(&self) -> usize {
        self.connect_count.load(Ordering::Relaxed)
    }

    /// Send a request and await its response. With `stream`, the response
    /// body goes to an auto-deleted temp file ([`crate::body::FileBody`])
    /// which `move_to` can persist.
    ///
    /// A keep-alive response puts the connection back into the pool; any
    /// error discards it. A pooled connection that fails on reuse is not
    /// retried; the caller decides.
    pub async fn send(&self, mut request: Request, stream: bool) -> Result<Response> {
        for (name, value) in self.headers.iter() {
            if !request.has_header(name) {
                request.set_header(name.clone(), value.clone());
            }
        }

        if !request.body().is_empty()
            && !self.media_type.is_empty()
            && !request.has_header(headers::CONTENT_TYPE)
        {
            let media_type = self.media_type.clone();
            let charset = self.charset.clone();
            request.set_content_type(&media_type, &charset);
        }

        request.prepare()?;

        let scheme = request.url().scheme().to_string();
        match scheme.as_str() {
            "http" | "https" => {}
            _ => {
                return Err(Error::state(format!(
                    "cannot send over scheme '{}'",
                    scheme
                )))
            }
        }
        let host = request.host().to_string();
        let port = request.port();
        let key = PoolKey::new(&scheme, &host, port);

        let mut connection = match self.pool.take(&key) {
            Some(connection) => connection,
            None => {
                self.connect_count.fetch_add(1, Ordering::Relaxed);
                ClientConnection::open(
                    &scheme,
                    &host,
                    port,
                    self.ssl_verify,
                    self.connect_timeout,
                    self.buffer_size,
                )
                .await?
            }
        };

        self.in_flight.store(true, Ordering::SeqCst);
        let result = {
            let send = connection.send(
                &mut request,
                stream,
                self.read_timeout,
                self.progress.as_ref(),
            );
            tokio::select! {
                result = send => result,
                _ = self.cancel.notified() => {
                    Err(Error::new(ErrorKind::SocketRead, "request canceled"))
                }
            }
        };
        self.in_flight.store(false, Ordering::SeqCst);

        match &result {
            Ok(response) if response.is_connection_keep_alive() => {
                tracing::debug!("keeping the connection alive");
                self.pool.put(key, connection);
            }
            _ => {
                connection.close().await;
            }
        }

        result
    }

    /// Abort the request in flight, if any. The pending `send` returns a
    /// socket error with the timeout flag unset, and its connection does
    /// not rejoin the pool.
    pub fn cancel(&self) -> bool {
        if self.in_flight.load(Ordering::SeqCst) {
            tracing::debug!("canceling the request in flight");
            self.cancel.notify_waiters();
            true
        } else {
            false
        }
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request_builder::RequestBuilder;

    #[tokio::test]
    async fn relative_url_rejected() {
        let session = ClientSession::new();
        let request = RequestBuilder::new().get("/no/host").build();
        // The URL parses, but send refuses a request without a scheme.
        let err = match request {
            Ok(request) => session.send(request, false).await.unwrap_err(),
            Err(e) => e,
        };
        assert!(matches!(err.kind(), ErrorKind::State | ErrorKind::Syntax));
    }

    #[tokio::test]
    async fn cancel_without_request_is_noop() {
        let session = ClientSession::new();
        assert!(!session.cancel());
    }
}
