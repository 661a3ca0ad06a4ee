/*
 * router.rs
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

//! URL-to-view table. Literal routes match the whole path
//! case-insensitively; regex routes match the whole path and pass their
//! capture groups to the view as positional arguments. First match wins, in
//! insertion order.

use std::sync::Arc;

use regex::Regex;

use crate::error::{Error, Result};
use crate::server::view::View;

#[derive(Clone)]
struct Route {
    url: String,
    regex: Option<Regex>,
    view: Arc<dyn View>,
    methods: Vec<String>,
}

#[derive(Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a literal route.
    pub fn route(&mut self, url: impl Into<String>, view: Arc<dyn View>, methods: &[&str]) {
        self.routes.push(Route {
            url: url.into(),
            regex: None,
            view,
            methods: methods.iter().map(|m| m.to_string()).collect(),
        });
    }

    /// Add a regex route. The pattern must match the whole path; capture
    /// groups become the request's positional args.
    pub fn route_regex(
        &mut self,
        pattern: &str,
        view: Arc<dyn View>,
        methods: &[&str],
    ) -> Result<()> {
        let regex = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| Error::syntax(format!("invalid route pattern: {}", e)))?;
        self.routes.push(Route {
            url: String::new(),
            regex: Some(regex),
            view,
            methods: methods.iter().map(|m| m.to_string()).collect(),
        });
        Ok(())
    }

    /// Find the view for a request, with regex capture values.
    pub fn find_view(&self, method: &str, path: &str) -> Option<(Arc<dyn View>, Vec<String>)> {
        for route in &self.routes {
            if !route.methods.iter().any(|m| m == method) {
                continue;
            }

            match &route.regex {
                Some(regex) => {
                    if let Some(captures) = regex.captures(path) {
                        let args = captures
                            .iter()
                            .skip(1)
                            .map(|c| c.map(|m| m.as_str().to_string()).unwrap_or_default())
                            .collect();
                        return Some((route.view.clone(), args));
                    }
                }
                None => {
                    if route.url.eq_ignore_ascii_case(path) {
                        return Some((route.view.clone(), Vec::new()));
                    }
                }
            }
        }
        None
    }

    /// Whether any view takes this request, and whether it wants the body
    /// streamed. Used at headers-end, before the body is consumed.
    pub fn match_view(&self, method: &str, path: &str) -> Option<bool> {
        self.find_view(method, path)
            .map(|(view, _)| view.stream(method))
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::request::Request;
    use crate::http::response_builder::ResponseBuilder;
    use crate::http::response::Response;

    fn dummy_view() -> Arc<dyn View> {
        Arc::new(|_request: Request| -> crate::Result<Response> {
            ResponseBuilder::new().ok().build()
        })
    }

    struct StreamingView;

    impl View for StreamingView {
        fn handle(&self, _request: Request) -> crate::Result<Response> {
            ResponseBuilder::new().ok().build()
        }

        fn stream(&self, method: &str) -> bool {
            method == "POST"
        }
    }

    #[test]
    fn literal_match_is_case_insensitive() {
        let mut router = Router::new();
        router.route("/Books", dummy_view(), &["GET"]);
        assert!(router.find_view("GET", "/books").is_some());
        assert!(router.find_view("POST", "/books").is_none());
        assert!(router.find_view("GET", "/books/1").is_none());
    }

    #[test]
    fn regex_captures_become_args() {
        let mut router = Router::new();
        router
            .route_regex("/books/(\\d+)", dummy_view(), &["GET", "DELETE"])
            .unwrap();
        let (_, args) = router.find_view("GET", "/books/42").unwrap();
        assert_eq!(args, ["42"]);
        assert!(router.find_view("GET", "/books/x").is_none());
        assert!(router.find_view("GET", "/books/42/extra").is_none());
    }

    #[test]
    fn first_match_wins() {
        let mut router = Router::new();
        router.route_regex("/a/(.+)", dummy_view(), &["GET"]).unwrap();
        router.route("/a/b", dummy_view(), &["GET"]);
        let (_, args) = router.find_view("GET", "/a/b").unwrap();
        assert_eq!(args, ["b"]);
    }

    #[test]
    fn match_view_reports_streaming() {
        let mut router = Router::new();
        router.route("/upload", Arc::new(StreamingView), &["GET", "POST"]);
        assert_eq!(router.match_view("POST", "/upload"), Some(true));
        assert_eq!(router.match_view("GET", "/upload"), Some(false));
        assert_eq!(router.match_view("GET", "/nope"), None);
    }

    #[test]
    fn invalid_regex_rejected() {
        let mut router = Router::new();
        assert!(router.route_regex("/books/(", dummy_view(), &["GET"]).is_err());
    }
}
