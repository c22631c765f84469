//! Read-only view of an inbound request, as seen by the matching stages.
//!
//! # Responsibilities
//! - Hold method, normalized path, parameter multi-map and headers
//! - Decode the query string (and optionally a form body) into parameters
//! - Normalize the path once so the pattern matcher never has to

use std::collections::HashMap;

use axum::http::header::{HeaderName, ACCEPT, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, Request};

/// The parts of a request the matcher consults.
#[derive(Debug, Clone)]
pub struct RequestView {
    method: Method,
    path: String,
    params: HashMap<String, Vec<String>>,
    headers: HeaderMap,
}

impl RequestView {
    /// A request with no parameters or headers. `path` is normalized.
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: normalize_path(path),
            params: HashMap::new(),
            headers: HeaderMap::new(),
        }
    }

    /// Build a view from an `http` request, decoding its query string.
    pub fn from_http<B>(request: &Request<B>) -> Self {
        let mut view = Self::new(request.method().clone(), request.uri().path());
        if let Some(query) = request.uri().query() {
            view.extend_params(query.as_bytes());
        }
        view.headers = request.headers().clone();
        view
    }

    /// Add one query/form parameter value.
    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
        self
    }

    /// Add one header value. Names or values that are not valid HTTP are
    /// dropped.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::try_from(name),
            HeaderValue::try_from(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    /// Merge `application/x-www-form-urlencoded` pairs (a query string or a
    /// form body already read by the caller) into the parameters.
    pub fn extend_params(&mut self, encoded: &[u8]) {
        for (name, value) in url::form_urlencoded::parse(encoded) {
            self.params
                .entry(name.into_owned())
                .or_default()
                .push(value.into_owned());
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// All values of a parameter; empty when absent.
    pub fn param_values(&self, name: &str) -> impl Iterator<Item = &str> {
        self.params
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// All values of a header that are valid visible ASCII; empty when
    /// absent.
    pub fn header_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> {
        self.headers
            .get_all(name)
            .into_iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Raw `Content-Type`, if present.
    ///
    /// `Err(())` means the header exists but is not valid text.
    pub fn content_type(&self) -> Option<Result<&str, ()>> {
        self.headers
            .get(CONTENT_TYPE)
            .map(|v| v.to_str().map_err(|_| ()))
    }

    /// Every `Accept` header line, in order.
    pub fn accept_values(&self) -> impl Iterator<Item = &str> {
        self.header_values(ACCEPT.as_str())
    }
}

/// Collapse repeated slashes and resolve `.`/`..` segments.
///
/// A trailing slash is kept because patterns distinguish `/a` from `/a/`.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in &segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    let trailing = path.len() > 1
        && (path.ends_with('/') || path.ends_with("/.") || path.ends_with("/.."));
    if normalized.is_empty() || trailing {
        normalized.push('/');
    }
    normalized
}
