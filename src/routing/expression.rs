//! `name`, `!name`, `name=value` and `name!=value` expressions used by the
//! parameter and header stages.

use std::fmt;

use crate::error::{RouteError, RouteResult};

/// Whether names compare exactly (query/form params) or ignoring ASCII case
/// (headers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameCase {
    Sensitive,
    Insensitive,
}

/// A single compiled name/value expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameValueExpression {
    name: String,
    value: Option<String>,
    negated: bool,
    case: NameCase,
}

impl NameValueExpression {
    /// Parse an expression.
    ///
    /// Header names are stored lowercased so lookups against an
    /// `http::HeaderMap` (which lowercases on insert) line up.
    pub fn parse(expression: &str, case: NameCase) -> RouteResult<Self> {
        let trimmed = expression.trim();
        let invalid = |reason| RouteError::InvalidExpression {
            expression: expression.to_string(),
            reason,
        };

        let (name, value, negated) = if let Some((name, value)) = trimmed.split_once("!=") {
            (name, Some(value), true)
        } else if let Some((name, value)) = trimmed.split_once('=') {
            (name, Some(value), false)
        } else if let Some(name) = trimmed.strip_prefix('!') {
            (name, None, true)
        } else {
            (trimmed, None, false)
        };

        let name = name.trim();
        if name.is_empty() {
            return Err(invalid("missing name"));
        }
        if name.starts_with('!') {
            return Err(invalid("negation cannot be combined with a value"));
        }
        if name.contains(|c: char| c.is_whitespace() || c == '=') {
            return Err(invalid("name contains whitespace or `=`"));
        }

        let name = match case {
            NameCase::Sensitive => name.to_string(),
            NameCase::Insensitive => name.to_ascii_lowercase(),
        };

        Ok(Self {
            name,
            value: value.map(|v| v.trim().to_string()),
            negated,
            case,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// True if this expression names `other` (respecting the name case rule).
    pub fn is_named(&self, other: &str) -> bool {
        match self.case {
            NameCase::Sensitive => self.name == other,
            NameCase::Insensitive => self.name.eq_ignore_ascii_case(other),
        }
    }

    /// Evaluate against every value the request carries under this name.
    ///
    /// An empty iterator means the name is absent.
    pub fn holds<'a, I>(&self, values: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut values = values.into_iter().peekable();
        let matched = match &self.value {
            Some(expected) => values.any(|v| v == expected.as_str()),
            None => values.peek().is_some(),
        };
        matched != self.negated
    }

    /// True if no request can satisfy both expressions at once.
    ///
    /// Two different required values for one name never contradict: a
    /// multi-valued parameter or repeated header can carry both.
    pub fn contradicts(&self, other: &NameValueExpression) -> bool {
        if !self.is_named(&other.name) {
            return false;
        }
        match (&self.value, self.negated, &other.value, other.negated) {
            // `!a` against `a` or `a=v`
            (None, true, _, false) | (_, false, None, true) => true,
            (Some(l), false, Some(r), true) | (Some(l), true, Some(r), false) => l == r,
            _ => false,
        }
    }
}

impl fmt::Display for NameValueExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.negated) {
            (Some(v), true) => write!(f, "{}!={}", self.name, v),
            (Some(v), false) => write!(f, "{}={}", self.name, v),
            (None, true) => write!(f, "!{}", self.name),
            (None, false) => f.write_str(&self.name),
        }
    }
}

/// True if some request could satisfy every expression of both sets.
pub fn may_coexist(a: &[NameValueExpression], b: &[NameValueExpression]) -> bool {
    !a.iter().any(|x| b.iter().any(|y| x.contradicts(y)))
}
