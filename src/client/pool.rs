/*
 * pool.rs
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

//! Keep-alive pool: idle connections keyed by (scheme, host, port),
//! least-recently-used first.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::client::client::ClientConnection;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    scheme: String,
    host: String,
    port: u16,
}

impl PoolKey {
    pub fn new(scheme: &str, host: &str, port: u16) -> Self {
        Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
        }
    }
}

#[derive(Default)]
pub struct ConnectionPool {
    idle: Mutex<HashMap<PoolKey, VecDeque<ClientConnection>>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take an idle connection for reuse, oldest first.
    pub fn take(&self, key: &PoolKey) -> Option<ClientConnection> {
        let mut idle = self.idle.lock().unwrap();
        let connection = idle.get_mut(key)?.pop_front();
        if connection.is_some() {
            tracing::debug!("reusing a pooled connection for {:?}", key);
        }
        connection
    }

    /// Return a connection after a keep-alive response.
    pub fn put(&self, key: PoolKey, connection: ClientConnection) {
        let mut idle = self.idle.lock().unwrap();
        idle.entry(key).or_default().push_back(connection);
    }

    /// Drop every idle connection.
    pub fn clear(&self) {
        self.idle.lock().unwrap().clear();
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap().values().map(|v| v.len()).sum()
    }
}
