/*
 * connection.rs
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

//! One accepted connection: read and parse requests, enqueue them for the
//! worker pool, write the responses, and keep the connection alive between
//! requests when the client allows it.
//!
//! Workers never touch the socket. They receive the parsed request plus a
//! oneshot sender; this task awaits the response and performs the write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{oneshot, watch};

use crate::common::headers;
use crate::error::Error;
use crate::http::parser::{RequestParser, ViewMatcher};
use crate::http::request::{methods, Request};
use crate::http::response::{status_codes, Response};
use crate::http::response_builder::ResponseBuilder;
use crate::server::queue::JobQueue;
use crate::server::router::Router;
use crate::server::view::View;

/// A fully parsed request on its way to a worker, with the channel that
/// brings the response back to the connection.
pub(crate) struct ServerJob {
    pub request: Request,
    pub view: Arc<dyn View>,
    pub responder: oneshot::Sender<Response>,
}

/// Shared state of a running server, one per `start`.
pub(crate) struct ServerContext {
    pub router: Router,
    pub doc_root: Option<PathBuf>,
    pub queue: Arc<JobQueue<ServerJob>>,
    pub buffer_size: usize,
    pub max_body_size: Option<usize>,
}

/// Route lookup used by the parser at headers-end. Requests that no route
/// takes still pass when a doc root can serve GETs.
struct ServerMatcher {
    context: Arc<ServerContext>,
}

impl ViewMatcher for ServerMatcher {
    fn match_view(&self, method: &str, path: &str) -> Option<bool> {
        if let Some(stream) = self.context.router.match_view(method, path) {
            return Some(stream);
        }
        if self.context.doc_root.is_some() && method == methods::GET {
            return Some(false);
        }
        None
    }
}

enum ReadOutcome {
    Request(Request),
    BadRequest(Error),
    Closed,
}

pub(crate) struct Connection {
    stream: crate::net::MaybeTlsStream,
    parser: RequestParser,
    buffer: Vec<u8>,
    context: Arc<ServerContext>,
    shutdown: watch::Receiver<bool>,
}

impl Connection {
    pub fn new(
        stream: crate::net::MaybeTlsStream,
        context: Arc<ServerContext>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let matcher: Arc<dyn ViewMatcher> = Arc::new(ServerMatcher {
            context: context.clone(),
        });
        let mut parser = RequestParser::new(Some(matcher));
        parser.set_max_body_size(context.max_body_size);
        Self {
            stream,
            parser,
            buffer: vec![0u8; context.buffer_size.max(1)],
            context,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        loop {
            let request = match self.read_request().await {
                ReadOutcome::Request(request) => request,
                ReadOutcome::BadRequest(e) => {
                    tracing::warn!("bad request: {}", e);
                    let mut response = error_response(status_codes::BAD_REQUEST);
                    response.set_header(headers::CONNECTION, "Close");
                    let _ = self.write_response(response).await;
                    break;
                }
                ReadOutcome::Closed => break,
            };

            tracing::debug!("{} {}", request.method(), request.url().path());
            let keep_alive = request.is_connection_keep_alive();

            let mut response = match self.dispatch(request).await {
                Some(response) => response,
                None => break, // server is stopping
            };

            response.set_header(
                headers::CONNECTION,
                if keep_alive { "Keep-Alive" } else { "Close" },
            );

            if !self.write_response(response).await {
                break;
            }

            if !keep_alive {
                break;
            }
            // Keep-alive: loop to read the next request.
        }

        self.stream.shutdown().await;
    }

    async fn read_request(&mut self) -> ReadOutcome {
        self.parser.init();

        loop {
            let n = tokio::select! {
                _ = self.shutdown.changed() => return ReadOutcome::Closed,
                read = self.stream.read(&mut self.buffer) => match read {
                    Ok(0) => return ReadOutcome::Closed,
                    Ok(n) => n,
                    Err(e) => {
                        tracing::debug!("socket read error: {}", e);
                        return ReadOutcome::Closed;
                    }
                },
            };

            if let Err(e) = self.parser.parse(&self.buffer[..n]) {
                return ReadOutcome::BadRequest(e);
            }

            if self.parser.finished() {
                return ReadOutcome::Request(self.parser.take_request());
            }
        }
    }

    /// Hand the request to a worker through the queue and await the
    /// response; serve static docs when no route matched. None means the
    /// workers are gone and the connection should close.
    async fn dispatch(&mut self, mut request: Request) -> Option<Response> {
        let found = self
            .context
            .router
            .find_view(request.method(), request.url().path());

        let (view, args) = match found {
            Some(found) => found,
            None => {
                let doc_root = self.context.doc_root.clone();
                return Some(match doc_root {
                    Some(root) => serve_static(&root, &request),
                    None => error_response(status_codes::NOT_FOUND),
                });
            }
        };
        request.set_args(args);

        let (responder, response) = oneshot::channel();
        let job = ServerJob {
            request,
            view,
            responder,
        };

        if !self.context.queue.push(job) {
            tracing::warn!("worker queue is full");
            return Some(error_response(status_codes::SERVICE_UNAVAILABLE));
        }

        match response.await {
            Ok(response) => Some(response),
            Err(_) => None,
        }
    }

    async fn write_response(&mut self, mut response: Response) -> bool {
        if let Err(e) = response.prepare() {
            tracing::error!("cannot prepare the response: {}", e);
            response = error_response(status_codes::INTERNAL_SERVER_ERROR);
        }

        tracing::trace!("response:\n{}", response.dump());

        for buf in response.head_payload() {
            if let Err(e) = self.stream.write_all(&buf).await {
                tracing::debug!("socket write error: {}", e);
                return false;
            }
        }

        if let Err(e) = response.body_mut().init_payload() {
            tracing::error!("cannot read the response body: {}", e);
            return false;
        }
        loop {
            let payload = match response.body_mut().next_payload(true) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::error!("cannot read the response body: {}", e);
                    return false;
                }
            };
            if payload.is_empty() {
                break;
            }
            for buf in payload {
                if let Err(e) = self.stream.write_all(&buf).await {
                    tracing::debug!("socket write error: {}", e);
                    return false;
                }
            }
        }

        if let Err(e) = self.stream.flush().await {
            tracing::debug!("socket flush error: {}", e);
            return false;
        }

        tracing::debug!("response sent ({})", response.status());
        true
    }
}

/// Empty-body response for a status code; includes `Content-Length: 0`.
pub(crate) fn error_response(status: u16) -> Response {
    let mut response = Response::new(status);
    if let Err(e) = response.prepare() {
        tracing::error!("cannot prepare a {} response: {}", status, e);
    }
    response
}

/// Serve a file under the doc root. Paths that escape the root, point at
/// directories, or do not exist are 404.
fn serve_static(doc_root: &Path, request: &Request) -> Response {
    let Ok(root) = doc_root.canonicalize() else {
        return error_response(status_codes::NOT_FOUND);
    };

    let relative = request.url().path().trim_start_matches('/');
    if relative.is_empty() {
        return error_response(status_codes::NOT_FOUND);
    }

    let Ok(path) = root.join(relative).canonicalize() else {
        return error_response(status_codes::NOT_FOUND);
    };
    if !path.starts_with(&root) || path.is_dir() {
        return error_response(status_codes::NOT_FOUND);
    }

    match ResponseBuilder::new().ok().file(&path).build() {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("cannot serve {}: {}", path.display(), e);
            error_response(status_codes::NOT_FOUND)
        }
    }
}
