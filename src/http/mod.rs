/*
 * mod.rs
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

//! HTTP/1.1 messages: request/response types, fluent builders, and the
//! incremental push parser shared by both directions.

pub mod message;
pub mod parser;
pub mod request;
pub mod request_builder;
pub mod response;
pub mod response_builder;

pub use message::{ContentEncoding, Message};
pub use parser::{RequestParser, ResponseParser, ViewMatcher};
pub use request::{methods, Request};
pub use request_builder::RequestBuilder;
pub use response::{reason_phrase, status_codes, Response};
pub use response_builder::ResponseBuilder;
