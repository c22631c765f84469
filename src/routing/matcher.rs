//! Request matching stages.
//!
//! # Responsibilities
//! - Test one criterion of a route against a request: path pattern, method,
//!   parameters, headers, request body type (consumes) and acceptable
//!   response types (produces)
//! - Report which stage rejected a request
//! - Decide, per stage, whether two routes could accept a common request
//!
//! # Design Decisions
//! - Empty criteria always match (wildcard)
//! - Header names are case-insensitive, parameter names are not
//! - A malformed `Content-Type` or `Accept` is a mismatch of its stage, never an error
//! - No regex, so every stage is linear in its inputs

use std::fmt;

use axum::http::{Method, StatusCode};
use serde::Serialize;

use crate::routing::expression::{may_coexist, NameValueExpression};
use crate::routing::media_type::{
    by_quality_and_specificity, by_specificity, MediaType, MediaTypeExpression,
};
use crate::routing::pattern::PathPattern;
use crate::routing::request::RequestView;

/// The stage that rejected a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MismatchReason {
    PatternMismatch,
    MethodMismatch,
    ParamMismatch,
    HeaderMismatch,
    ConsumesMismatch,
    ProducesMismatch,
}

impl MismatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MismatchReason::PatternMismatch => "PATTERN_MISMATCH",
            MismatchReason::MethodMismatch => "METHOD_MISMATCH",
            MismatchReason::ParamMismatch => "PARAM_MISMATCH",
            MismatchReason::HeaderMismatch => "HEADER_MISMATCH",
            MismatchReason::ConsumesMismatch => "CONSUMES_MISMATCH",
            MismatchReason::ProducesMismatch => "PRODUCES_MISMATCH",
        }
    }

    /// Response status a server should answer with when this was the last
    /// recorded reason.
    pub fn status_code(&self) -> StatusCode {
        match self {
            MismatchReason::MethodMismatch => StatusCode::METHOD_NOT_ALLOWED,
            MismatchReason::ConsumesMismatch => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            MismatchReason::ProducesMismatch => StatusCode::NOT_ACCEPTABLE,
            _ => StatusCode::NOT_FOUND,
        }
    }
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Match,
    Mismatch(MismatchReason),
}

impl Outcome {
    fn from_bool(matched: bool, reason: MismatchReason) -> Self {
        if matched {
            Outcome::Match
        } else {
            Outcome::Mismatch(reason)
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::Match)
    }
}

/// Trait for matching requests against one criterion.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Test the request against this stage.
    fn test(&self, req: &RequestView) -> Outcome;
}

/// Matches the normalized request path against any declared pattern.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    patterns: Vec<PathPattern>,
}

impl PatternMatcher {
    pub fn new(patterns: Vec<PathPattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    pub fn may_overlap(&self, other: &PatternMatcher) -> bool {
        self.patterns.is_empty()
            || other.patterns.is_empty()
            || self
                .patterns
                .iter()
                .any(|a| other.patterns.iter().any(|b| a.may_overlap(b)))
    }
}

impl Matcher for PatternMatcher {
    fn test(&self, req: &RequestView) -> Outcome {
        let matched =
            self.patterns.is_empty() || self.patterns.iter().any(|p| p.matches(req.path()));
        Outcome::from_bool(matched, MismatchReason::PatternMismatch)
    }
}

/// Matches the request method. `HEAD` is served by routes declaring `GET`.
#[derive(Debug, Clone)]
pub struct MethodMatcher {
    methods: Vec<Method>,
}

impl MethodMatcher {
    pub fn new(methods: Vec<Method>) -> Self {
        Self { methods }
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn may_overlap(&self, other: &MethodMatcher) -> bool {
        self.methods.is_empty()
            || other.methods.is_empty()
            || self.methods.iter().any(|m| other.methods.contains(m))
            || (self.serves_head() && other.serves_head())
    }

    /// True if a `HEAD` request passes this matcher.
    fn serves_head(&self) -> bool {
        self.methods.contains(&Method::HEAD) || self.methods.contains(&Method::GET)
    }
}

impl Matcher for MethodMatcher {
    fn test(&self, req: &RequestView) -> Outcome {
        let method = req.method();
        let matched = self.methods.is_empty()
            || self.methods.contains(method)
            || (method == Method::HEAD && self.methods.contains(&Method::GET));
        Outcome::from_bool(matched, MismatchReason::MethodMismatch)
    }
}

/// Conjunction of parameter expressions against the query/form multi-map.
#[derive(Debug, Clone)]
pub struct ParamMatcher {
    expressions: Vec<NameValueExpression>,
}

impl ParamMatcher {
    pub fn new(expressions: Vec<NameValueExpression>) -> Self {
        Self { expressions }
    }

    pub fn expressions(&self) -> &[NameValueExpression] {
        &self.expressions
    }

    pub fn may_overlap(&self, other: &ParamMatcher) -> bool {
        may_coexist(&self.expressions, &other.expressions)
    }
}

impl Matcher for ParamMatcher {
    fn test(&self, req: &RequestView) -> Outcome {
        let matched = self
            .expressions
            .iter()
            .all(|e| e.holds(req.param_values(e.name())));
        Outcome::from_bool(matched, MismatchReason::ParamMismatch)
    }
}

/// Conjunction of header expressions. Names are compared ignoring case.
#[derive(Debug, Clone)]
pub struct HeaderMatcher {
    expressions: Vec<NameValueExpression>,
}

impl HeaderMatcher {
    pub fn new(expressions: Vec<NameValueExpression>) -> Self {
        Self { expressions }
    }

    pub fn expressions(&self) -> &[NameValueExpression] {
        &self.expressions
    }

    pub fn may_overlap(&self, other: &HeaderMatcher) -> bool {
        may_coexist(&self.expressions, &other.expressions)
    }
}

impl Matcher for HeaderMatcher {
    fn test(&self, req: &RequestView) -> Outcome {
        let matched = self
            .expressions
            .iter()
            .all(|e| e.holds(req.header_values(e.name())));
        Outcome::from_bool(matched, MismatchReason::HeaderMismatch)
    }
}

/// Matches the request `Content-Type` against the declared body types.
#[derive(Debug, Clone)]
pub struct ConsumesMatcher {
    expressions: Vec<MediaTypeExpression>,
}

impl ConsumesMatcher {
    pub fn new(expressions: Vec<MediaTypeExpression>) -> Self {
        Self { expressions }
    }

    pub fn expressions(&self) -> &[MediaTypeExpression] {
        &self.expressions
    }

    pub fn may_overlap(&self, other: &ConsumesMatcher) -> bool {
        expressions_may_overlap(&self.expressions, &other.expressions)
    }
}

impl Matcher for ConsumesMatcher {
    fn test(&self, req: &RequestView) -> Outcome {
        if self.expressions.is_empty() {
            return Outcome::Match;
        }
        let content_type = match req.content_type() {
            None => Some(MediaType::octet_stream()),
            Some(Ok(raw)) => MediaType::parse(raw).ok(),
            Some(Err(())) => None,
        };
        let matched = content_type
            .map(|ct| self.expressions.iter().any(|e| e.accepts_body(&ct)))
            .unwrap_or(false);
        Outcome::from_bool(matched, MismatchReason::ConsumesMismatch)
    }
}

/// Outcome of content negotiation for one route.
#[derive(Debug, Clone, PartialEq)]
pub enum Negotiation {
    /// No acceptable type is producible.
    Mismatch,
    /// Compatible, but the route declares no concrete producible type.
    Unconstrained,
    /// The producible type to respond with, carrying the client's quality.
    Selected(MediaType),
}

/// Matches the request `Accept` list against the declared response types.
#[derive(Debug, Clone)]
pub struct ProducesMatcher {
    expressions: Vec<MediaTypeExpression>,
    /// Non-negated declarations, most specific first.
    producible: Vec<MediaType>,
}

impl ProducesMatcher {
    pub fn new(expressions: Vec<MediaTypeExpression>) -> Self {
        let mut producible: Vec<MediaType> = expressions
            .iter()
            .filter(|e| !e.is_negated())
            .map(|e| e.media_type().clone())
            .collect();
        producible.sort_by(by_specificity);
        Self {
            expressions,
            producible,
        }
    }

    pub fn expressions(&self) -> &[MediaTypeExpression] {
        &self.expressions
    }

    pub fn may_overlap(&self, other: &ProducesMatcher) -> bool {
        expressions_may_overlap(&self.expressions, &other.expressions)
    }

    /// Pick the producible type for this request.
    ///
    /// Acceptable types are visited by descending quality then specificity;
    /// the first one compatible with a producible type selects the most
    /// specific such type, which inherits the acceptable type's quality.
    pub fn negotiate(&self, req: &RequestView) -> Negotiation {
        if self.expressions.is_empty() {
            return Negotiation::Unconstrained;
        }

        let mut accepted = Vec::new();
        for line in req.accept_values() {
            match MediaType::parse_list(line) {
                Ok(types) => accepted.extend(types),
                Err(_) => return Negotiation::Mismatch,
            }
        }
        if accepted.is_empty() {
            accepted.push(MediaType::any());
        }
        accepted.sort_by(by_quality_and_specificity);

        if !self.expressions.iter().any(|e| e.satisfies_accept(&accepted)) {
            return Negotiation::Mismatch;
        }

        for acceptable in accepted.iter().filter(|a| a.quality() > 0.0) {
            if let Some(chosen) = self
                .producible
                .iter()
                .find(|p| p.is_compatible_with(acceptable))
            {
                return Negotiation::Selected(chosen.with_quality(acceptable.quality()));
            }
        }
        Negotiation::Unconstrained
    }
}

impl Matcher for ProducesMatcher {
    fn test(&self, req: &RequestView) -> Outcome {
        let matched = self.negotiate(req) != Negotiation::Mismatch;
        Outcome::from_bool(matched, MismatchReason::ProducesMismatch)
    }
}

/// Conservative overlap for media type declarations: negations are assumed
/// to leave room for a common request.
fn expressions_may_overlap(a: &[MediaTypeExpression], b: &[MediaTypeExpression]) -> bool {
    if a.is_empty() || b.is_empty() {
        return true;
    }
    if a.iter().chain(b).any(|e| e.is_negated()) {
        return true;
    }
    a.iter()
        .any(|x| b.iter().any(|y| x.media_type().is_compatible_with(y.media_type())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::expression::NameCase;

    fn produces(types: &[&str]) -> ProducesMatcher {
        ProducesMatcher::new(
            types
                .iter()
                .map(|t| MediaTypeExpression::parse(t).unwrap())
                .collect(),
        )
    }

    fn consumes(types: &[&str]) -> ConsumesMatcher {
        ConsumesMatcher::new(
            types
                .iter()
                .map(|t| MediaTypeExpression::parse(t).unwrap())
                .collect(),
        )
    }

    fn get(path: &str) -> RequestView {
        RequestView::new(Method::GET, path)
    }

    #[test]
    fn test_pattern_matcher() {
        let m = PatternMatcher::new(vec![
            PathPattern::parse("/a/*").unwrap(),
            PathPattern::parse("/b/**").unwrap(),
        ]);
        assert!(m.test(&get("/a/x")).is_match());
        assert!(m.test(&get("/b/x/y")).is_match());
        assert_eq!(
            m.test(&get("/c")),
            Outcome::Mismatch(MismatchReason::PatternMismatch)
        );
        assert!(PatternMatcher::new(vec![]).test(&get("/anything")).is_match());
    }

    #[test]
    fn test_method_matcher() {
        let m = MethodMatcher::new(vec![Method::GET, Method::PUT]);
        assert!(m.test(&get("/")).is_match());
        assert!(m.test(&RequestView::new(Method::HEAD, "/")).is_match());
        assert_eq!(
            m.test(&RequestView::new(Method::DELETE, "/")),
            Outcome::Mismatch(MismatchReason::MethodMismatch)
        );
        assert!(MethodMatcher::new(vec![])
            .test(&RequestView::new(Method::PATCH, "/"))
            .is_match());
    }

    #[test]
    fn test_param_and_header_matchers() {
        let params = ParamMatcher::new(vec![
            NameValueExpression::parse("v=2", NameCase::Sensitive).unwrap(),
            NameValueExpression::parse("!legacy", NameCase::Sensitive).unwrap(),
        ]);
        assert!(params.test(&get("/").with_param("v", "2")).is_match());
        assert!(!params
            .test(&get("/").with_param("v", "2").with_param("legacy", "1"))
            .is_match());
        assert_eq!(
            params.test(&get("/")),
            Outcome::Mismatch(MismatchReason::ParamMismatch)
        );

        let headers = HeaderMatcher::new(vec![NameValueExpression::parse(
            "X-Env=prod",
            NameCase::Insensitive,
        )
        .unwrap()]);
        assert!(headers.test(&get("/").with_header("x-env", "prod")).is_match());
        assert_eq!(
            headers.test(&get("/").with_header("X-ENV", "dev")),
            Outcome::Mismatch(MismatchReason::HeaderMismatch)
        );
    }

    #[test]
    fn test_consumes_matcher() {
        let m = consumes(&["application/json", "text/*"]);
        assert!(m
            .test(&get("/").with_header("content-type", "application/json; charset=utf-8"))
            .is_match());
        assert!(m.test(&get("/").with_header("content-type", "text/csv")).is_match());
        assert_eq!(
            m.test(&get("/").with_header("content-type", "image/png")),
            Outcome::Mismatch(MismatchReason::ConsumesMismatch)
        );
        assert!(!m.test(&get("/").with_header("content-type", "garbage")).is_match());
        // no body type means application/octet-stream
        assert!(!m.test(&get("/")).is_match());

        let negated = consumes(&["!text/plain"]);
        assert!(negated.test(&get("/")).is_match());
        assert!(!negated
            .test(&get("/").with_header("content-type", "text/plain"))
            .is_match());
    }

    #[test]
    fn test_produces_negotiation() {
        let m = produces(&["application/json", "text/html"]);

        let req = get("/").with_header("accept", "application/json;q=0.5, text/html");
        match m.negotiate(&req) {
            Negotiation::Selected(t) => {
                assert_eq!(t.essence(), "text/html");
                assert_eq!(t.quality(), 1.0);
            }
            other => panic!("unexpected negotiation {:?}", other),
        }

        let req = get("/").with_header("accept", "application/*;q=0.8");
        match m.negotiate(&req) {
            Negotiation::Selected(t) => {
                assert_eq!(t.essence(), "application/json");
                assert_eq!(t.quality(), 0.8);
            }
            other => panic!("unexpected negotiation {:?}", other),
        }

        assert!(matches!(m.negotiate(&get("/")), Negotiation::Selected(_)));
        assert_eq!(
            m.test(&get("/").with_header("accept", "image/png")),
            Outcome::Mismatch(MismatchReason::ProducesMismatch)
        );
        assert_eq!(
            m.negotiate(&get("/").with_header("accept", "not a type")),
            Negotiation::Mismatch
        );
        assert_eq!(produces(&[]).negotiate(&get("/")), Negotiation::Unconstrained);
    }

    #[test]
    fn test_produces_prefers_specific_type() {
        let m = produces(&["*/*", "text/*", "text/plain"]);
        let req = get("/").with_header("accept", "text/*");
        match m.negotiate(&req) {
            Negotiation::Selected(t) => assert_eq!(t.essence(), "text/plain"),
            other => panic!("unexpected negotiation {:?}", other),
        }
    }

    #[test]
    fn test_produces_negated_only() {
        let m = produces(&["!text/plain"]);
        assert_eq!(
            m.negotiate(&get("/").with_header("accept", "application/json")),
            Negotiation::Unconstrained
        );
        assert_eq!(
            m.negotiate(&get("/").with_header("accept", "text/plain")),
            Negotiation::Mismatch
        );
    }

    #[test]
    fn test_stage_overlap() {
        assert!(MethodMatcher::new(vec![]).may_overlap(&MethodMatcher::new(vec![Method::GET])));
        assert!(!MethodMatcher::new(vec![Method::POST])
            .may_overlap(&MethodMatcher::new(vec![Method::GET])));
        assert!(MethodMatcher::new(vec![Method::HEAD])
            .may_overlap(&MethodMatcher::new(vec![Method::GET])));
        assert!(!MethodMatcher::new(vec![Method::HEAD])
            .may_overlap(&MethodMatcher::new(vec![Method::POST])));
        assert!(produces(&["application/json"]).may_overlap(&produces(&["application/*"])));
        assert!(!produces(&["application/json"]).may_overlap(&produces(&["text/html"])));
        assert!(consumes(&[]).may_overlap(&consumes(&["text/html"])));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(MismatchReason::MethodMismatch.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            MismatchReason::ConsumesMismatch.status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(MismatchReason::ProducesMismatch.status_code(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(MismatchReason::HeaderMismatch.status_code(), StatusCode::NOT_FOUND);
    }
}
