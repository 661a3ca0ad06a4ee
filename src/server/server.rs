/*
 * server.rs
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

//! HTTP server: a listener with SO_REUSEADDR, an accept loop spawning one
//! task per connection, and a pool of OS worker threads consuming fully
//! parsed requests from a bounded queue.
//!
//! `start` binds and returns; `stop` shuts everything down in order
//! (acceptor, queue and workers, connections) and the server can be
//! started again.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, TcpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tokio_rustls::rustls::server::ServerConfig;

use crate::error::{Error, ErrorKind, Result};
use crate::http::request::methods;
use crate::http::response::status_codes;
use crate::net::{self, MaybeTlsStream};
use crate::server::connection::{error_response, Connection, ServerContext, ServerJob};
use crate::server::queue::JobQueue;
use crate::server::router::Router;
use crate::server::view::View;

const DEFAULT_BUFFER_SIZE: usize = 1024;
const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_MAX_BODY_SIZE: usize = 1 << 30;

const GET_ONLY: &[&str] = &[methods::GET];

/// Listener address family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IpProtocol {
    #[default]
    V4,
    V6,
}

struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    acceptor: JoinHandle<()>,
    workers: Vec<std::thread::JoinHandle<()>>,
    queue: Arc<JobQueue<ServerJob>>,
}

pub struct Server {
    protocol: IpProtocol,
    port: u16,
    doc_root: Option<PathBuf>,
    tls: Option<Arc<ServerConfig>>,
    router: Router,
    buffer_size: usize,
    queue_capacity: usize,
    max_body_size: Option<usize>,
    state: Mutex<Option<Running>>,
}

impl Server {
    /// A server for `port`. Port 0 binds an ephemeral port; see
    /// `local_addr` after `start`.
    pub fn new(protocol: IpProtocol, port: u16) -> Self {
        Self {
            protocol,
            port,
            doc_root: None,
            tls: None,
            router: Router::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_body_size: Some(DEFAULT_MAX_BODY_SIZE),
            state: Mutex::new(None),
        }
    }

    /// Serve static files from this directory for GETs no route takes.
    pub fn set_doc_root(&mut self, doc_root: impl Into<PathBuf>) {
        self.doc_root = Some(doc_root.into());
    }

    /// Serve TLS with the given PEM certificate chain and private key.
    pub fn enable_tls(&mut self, cert_file: &Path, key_file: &Path) -> Result<()> {
        self.tls = Some(net::server_config(cert_file, key_file)?);
        Ok(())
    }

    pub fn set_buffer_size(&mut self, size: usize) {
        if size > 0 {
            self.buffer_size = size;
        }
    }

    pub fn set_queue_capacity(&mut self, capacity: usize) {
        self.queue_capacity = capacity.max(1);
    }

    /// Cap on streamed request bodies; None disables the cap.
    pub fn set_max_body_size(&mut self, max: Option<usize>) {
        self.max_body_size = max;
    }

    /// Add a literal route (defaults to GET when `methods` is empty).
    pub fn route(&mut self, url: impl Into<String>, view: Arc<dyn View>, methods: &[&str]) {
        let methods = if methods.is_empty() { GET_ONLY } else { methods };
        self.router.route(url, view, methods);
    }

    /// Add a regex route (defaults to GET when `methods` is empty).
    pub fn route_regex(
        &mut self,
        pattern: &str,
        view: Arc<dyn View>,
        methods: &[&str],
    ) -> Result<()> {
        let methods = if methods.is_empty() { GET_ONLY } else { methods };
        self.router.route_regex(pattern, view, methods)
    }

    /// Bound address once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.state.lock().unwrap().as_ref().map(|r| r.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap().is_some()
    }

    /// Bind the listener, start the accept loop and `workers` worker
    /// threads, and return. Use `stop` (or drop) to shut down.
    pub async fn start(&self, workers: usize) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.is_some() {
            return Err(Error::state("server is already running"));
        }

        let listener = self.bind()?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::new(ErrorKind::Connect, e.to_string()))?;
        tracing::info!("server listening on {}", local_addr);

        let queue = Arc::new(JobQueue::new(self.queue_capacity));
        let context = Arc::new(ServerContext {
            router: self.router.clone(),
            doc_root: self.doc_root.clone(),
            queue: queue.clone(),
            buffer_size: self.buffer_size,
            max_body_size: self.max_body_size,
        });

        let worker_handles = (0..workers.max(1))
            .map(|_| {
                let queue = queue.clone();
                std::thread::spawn(move || worker_routine(queue))
            })
            .collect();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let tls = self.tls.clone();
        let acceptor = tokio::spawn(accept_loop(listener, context, tls, shutdown_rx));

        *state = Some(Running {
            local_addr,
            shutdown: shutdown_tx,
            acceptor,
            workers: worker_handles,
            queue,
        });
        Ok(())
    }

    /// Start, then wait until `stop` is called from elsewhere.
    pub async fn run(&self, workers: usize) -> Result<()> {
        self.start(workers).await?;
        let mut shutdown = {
            let state = self.state.lock().unwrap();
            match state.as_ref() {
                Some(running) => running.shutdown.subscribe(),
                None => return Ok(()),
            }
        };
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
        Ok(())
    }

    /// Graceful shutdown: cancel the acceptor, clear the queue and stop the
    /// workers, close connections, and join everything. The server can be
    /// started again afterwards.
    pub async fn stop(&self) {
        let running = match self.state.lock().unwrap().take() {
            Some(running) => running,
            None => return,
        };
        tracing::info!("stopping the server");

        // Connections and the acceptor observe the flag.
        let _ = running.shutdown.send(true);
        running.acceptor.abort();
        let _ = running.acceptor.await;

        // Pending jobs are dropped; their connections see a closed channel.
        running.queue.clear();
        running.queue.push_sentinel();

        for worker in running.workers {
            let _ = tokio::task::spawn_blocking(move || worker.join()).await;
        }
        tracing::info!("server stopped");
    }

    fn bind(&self) -> Result<TcpListener> {
        let (socket, addr) = match self.protocol {
            IpProtocol::V4 => (
                TcpSocket::new_v4(),
                SocketAddr::from(([0, 0, 0, 0], self.port)),
            ),
            IpProtocol::V6 => (
                TcpSocket::new_v6(),
                SocketAddr::from(([0u16, 0, 0, 0, 0, 0, 0, 0], self.port)),
            ),
        };
        let socket = socket.map_err(|e| Error::new(ErrorKind::Connect, e.to_string()))?;
        socket
            .set_reuseaddr(true)
            .map_err(|e| Error::new(ErrorKind::Connect, e.to_string()))?;
        socket
            .bind(addr)
            .map_err(|e| Error::new(ErrorKind::Connect, format!("bind {}: {}", addr, e)))?;
        socket
            .listen(1024)
            .map_err(|e| Error::new(ErrorKind::Connect, e.to_string()))
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // Without an async context left, at least unblock the workers.
        if let Some(running) = self.state.lock().unwrap().take() {
            let _ = running.shutdown.send(true);
            running.acceptor.abort();
            running.queue.clear();
            running.queue.push_sentinel();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    context: Arc<ServerContext>,
    tls: Option<Arc<ServerConfig>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => accepted,
        };

        let (tcp, peer) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                tracing::warn!("accept error: {}", e);
                continue;
            }
        };
        tracing::debug!("accepted a connection from {}", peer);

        let context = context.clone();
        let tls = tls.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let stream = match tls {
                Some(config) => match net::tls_accept(tcp, config).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::warn!("TLS accept failed for {}: {}", peer, e);
                        return;
                    }
                },
                None => MaybeTlsStream::Plain(tcp),
            };
            Connection::new(stream, context, shutdown).run().await;
            tracing::debug!("connection from {} done", peer);
        });
    }
}

fn worker_routine(queue: Arc<JobQueue<ServerJob>>) {
    tracing::debug!("worker is running");

    while let Some(job) = queue.pop_or_wait() {
        let ServerJob {
            request,
            view,
            responder,
        } = job;

        let response = match view.handle(request) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("view failed: {}", e);
                error_response(status_codes::INTERNAL_SERVER_ERROR)
            }
        };

        // The connection may have gone away; nothing to do then.
        let _ = responder.send(response);
    }

    // Sentinel received: put it back for the next worker and exit.
    queue.push_sentinel();
    tracing::debug!("worker stopped");
}
