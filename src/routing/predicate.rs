//! Compiled route predicate.
//!
//! # Responsibilities
//! - Compile a [`Mapping`] into typed stages once, failing fast on bad input
//! - Evaluate stages in a fixed order: pattern, method, params, headers,
//!   consumes, produces
//! - Compare two predicates for possible ambiguity
//!
//! # Design Decisions
//! - An empty criterion compiles to an absent stage, which is vacuously true
//! - `Accept` / `Content-Type` header expressions are moved into the produces /
//!   consumes stages, so media types are negotiated in one place
//! - The first mismatching stage short-circuits and names the reason

use axum::http::Method;

use crate::error::{RouteError, RouteResult};
use crate::routing::expression::{NameCase, NameValueExpression};
use crate::routing::mapping::Mapping;
use crate::routing::matcher::{
    ConsumesMatcher, HeaderMatcher, Matcher, MethodMatcher, MismatchReason, Negotiation,
    Outcome, ParamMatcher, PatternMatcher, ProducesMatcher,
};
use crate::routing::media_type::{MediaType, MediaTypeExpression};
use crate::routing::pattern::PathPattern;
use crate::routing::request::RequestView;

/// Conjunction of the stages compiled from one [`Mapping`].
#[derive(Debug, Clone, Default)]
pub struct RoutePredicate {
    pattern: Option<PatternMatcher>,
    method: Option<MethodMatcher>,
    params: Option<ParamMatcher>,
    headers: Option<HeaderMatcher>,
    consumes: Option<ConsumesMatcher>,
    produces: Option<ProducesMatcher>,
}

fn non_empty<T, M>(items: Vec<T>, build: impl FnOnce(Vec<T>) -> M) -> Option<M> {
    if items.is_empty() {
        None
    } else {
        Some(build(items))
    }
}

fn parse_media_list(raw: &str, negated: bool) -> RouteResult<Vec<MediaTypeExpression>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            if negated {
                MediaTypeExpression::parse(&format!("!{}", s))
            } else {
                MediaTypeExpression::parse(s)
            }
        })
        .collect()
}

/// Both `Option`s present means the stage is declared on both sides.
fn stage_overlaps<T>(a: &Option<T>, b: &Option<T>, overlap: impl FnOnce(&T, &T) -> bool) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => overlap(a, b),
        _ => true,
    }
}

impl RoutePredicate {
    /// Compile a mapping. Any malformed pattern, method, expression or media
    /// type fails the whole compile.
    pub fn compile(mapping: &Mapping) -> RouteResult<Self> {
        let patterns = mapping
            .paths()
            .iter()
            .map(|p| PathPattern::parse(p))
            .collect::<RouteResult<Vec<_>>>()?;

        let methods = mapping
            .methods()
            .iter()
            .map(|m| {
                Method::from_bytes(m.to_ascii_uppercase().as_bytes())
                    .map_err(|_| RouteError::InvalidMethod(m.clone()))
            })
            .collect::<RouteResult<Vec<_>>>()?;

        let params = mapping
            .params()
            .iter()
            .map(|p| NameValueExpression::parse(p, NameCase::Sensitive))
            .collect::<RouteResult<Vec<_>>>()?;

        let mut consumes = mapping
            .consumes_types()
            .iter()
            .map(|c| MediaTypeExpression::parse(c))
            .collect::<RouteResult<Vec<_>>>()?;
        let mut produces = mapping
            .produces_types()
            .iter()
            .map(|p| MediaTypeExpression::parse(p))
            .collect::<RouteResult<Vec<_>>>()?;

        let mut headers = Vec::new();
        for raw in mapping.headers() {
            let expr = NameValueExpression::parse(raw, NameCase::Insensitive)?;
            let redirected = match (expr.name(), expr.value()) {
                ("accept", Some(value)) => {
                    Some((&mut produces, parse_media_list(value, expr.is_negated())?))
                }
                ("content-type", Some(value)) => {
                    Some((&mut consumes, parse_media_list(value, expr.is_negated())?))
                }
                _ => None,
            };
            match redirected {
                Some((stage, types)) => stage.extend(types),
                None => headers.push(expr),
            }
        }

        Ok(Self {
            pattern: non_empty(patterns, PatternMatcher::new),
            method: non_empty(methods, MethodMatcher::new),
            params: non_empty(params, ParamMatcher::new),
            headers: non_empty(headers, HeaderMatcher::new),
            consumes: non_empty(consumes, ConsumesMatcher::new),
            produces: non_empty(produces, ProducesMatcher::new),
        })
    }

    /// Stages before content negotiation, in evaluation order.
    fn leading_stages(&self) -> [Option<&dyn Matcher>; 5] {
        [
            self.pattern.as_ref().map(|m| m as &dyn Matcher),
            self.method.as_ref().map(|m| m as &dyn Matcher),
            self.params.as_ref().map(|m| m as &dyn Matcher),
            self.headers.as_ref().map(|m| m as &dyn Matcher),
            self.consumes.as_ref().map(|m| m as &dyn Matcher),
        ]
    }

    /// Run every stage. On success returns the negotiated response type, if
    /// the route declares producible types.
    pub fn evaluate(&self, req: &RequestView) -> Result<Option<MediaType>, MismatchReason> {
        for stage in self.leading_stages().into_iter().flatten() {
            if let Outcome::Mismatch(reason) = stage.test(req) {
                return Err(reason);
            }
        }
        match &self.produces {
            None => Ok(None),
            Some(produces) => match produces.negotiate(req) {
                Negotiation::Mismatch => Err(MismatchReason::ProducesMismatch),
                Negotiation::Unconstrained => Ok(None),
                Negotiation::Selected(media_type) => Ok(Some(media_type)),
            },
        }
    }

    /// Symmetric check: could one request satisfy both predicates?
    ///
    /// Over-approximates; a `true` is a hint for diagnostics, not a proof.
    pub fn may_ambiguous_with(&self, other: &RoutePredicate) -> bool {
        stage_overlaps(&self.pattern, &other.pattern, PatternMatcher::may_overlap)
            && stage_overlaps(&self.method, &other.method, MethodMatcher::may_overlap)
            && stage_overlaps(&self.params, &other.params, ParamMatcher::may_overlap)
            && stage_overlaps(&self.headers, &other.headers, HeaderMatcher::may_overlap)
            && stage_overlaps(&self.consumes, &other.consumes, ConsumesMatcher::may_overlap)
            && stage_overlaps(&self.produces, &other.produces, ProducesMatcher::may_overlap)
    }

    /// Number of declared stages.
    pub fn stage_count(&self) -> usize {
        self.leading_stages().iter().flatten().count() + usize::from(self.produces.is_some())
    }
}

impl Matcher for RoutePredicate {
    fn test(&self, req: &RequestView) -> Outcome {
        match self.evaluate(req) {
            Ok(_) => Outcome::Match,
            Err(reason) => Outcome::Mismatch(reason),
        }
    }
}
