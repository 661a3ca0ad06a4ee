/*
 * view.rs
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

//! A view handles the requests routed to it. Views run on worker threads
//! and may block; an error becomes a 500 response and never kills the
//! worker.

use crate::error::Result;
use crate::http::request::Request;
use crate::http::response::Response;

pub trait View: Send + Sync {
    fn handle(&self, request: Request) -> Result<Response>;

    /// Whether the request body for `method` should be streamed to a temp
    /// file instead of held in memory. Decided before body bytes arrive.
    fn stream(&self, _method: &str) -> bool {
        false
    }
}

impl<F> View for F
where
    F: Fn(Request) -> Result<Response> + Send + Sync,
{
    fn handle(&self, request: Request) -> Result<Response> {
        self(request)
    }
}
