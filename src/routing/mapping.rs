//! Declarative route criteria.

use axum::http::Method;
use serde::Serialize;

/// What a route answers to, in declarative form.
///
/// Built once with the chained setters and never changed afterwards; it is
/// compiled into a [`crate::routing::RoutePredicate`] on registration, which
/// is where malformed entries are rejected. Every list keeps declaration
/// order and drops duplicates; an empty list matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Mapping {
    paths: Vec<String>,
    methods: Vec<String>,
    params: Vec<String>,
    headers: Vec<String>,
    consumes: Vec<String>,
    produces: Vec<String>,
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path pattern such as `/users/*` or `/static/**`.
    pub fn path(mut self, pattern: impl Into<String>) -> Self {
        push_unique(&mut self.paths, pattern.into());
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        push_unique(&mut self.methods, method.as_str().to_string());
        self
    }

    /// Add a method by name, e.g. from a config file. Validated on compile.
    pub fn method_name(mut self, method: impl Into<String>) -> Self {
        push_unique(&mut self.methods, method.into().to_ascii_uppercase());
        self
    }

    /// Add a parameter expression: `name`, `!name`, `name=value` or `name!=value`.
    pub fn param(mut self, expression: impl Into<String>) -> Self {
        push_unique(&mut self.params, expression.into());
        self
    }

    /// Add a header expression, same grammar as [`Mapping::param`].
    pub fn header(mut self, expression: impl Into<String>) -> Self {
        push_unique(&mut self.headers, expression.into());
        self
    }

    /// Add an accepted request body type, optionally negated with `!`.
    pub fn consumes(mut self, media_type: impl Into<String>) -> Self {
        push_unique(&mut self.consumes, media_type.into());
        self
    }

    /// Add a producible response type, optionally negated with `!`.
    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        push_unique(&mut self.produces, media_type.into());
        self
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn consumes_types(&self) -> &[String] {
        &self.consumes
    }

    pub fn produces_types(&self) -> &[String] {
        &self.produces
    }
}
