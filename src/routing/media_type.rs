//! Media types for the consumes and produces stages.
//!
//! # Responsibilities
//! - Parse `type/subtype;param=value;q=0.8` and comma-separated lists
//! - Decide inclusion and compatibility, including `*` and `*+suffix`
//! - Rank types by specificity and by client quality value

use std::cmp::Ordering;
use std::fmt;

use crate::error::{RouteError, RouteResult};

/// A parsed media type with its quality value.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaType {
    main_type: String,
    subtype: String,
    params: Vec<(String, String)>,
    quality: f32,
}

impl MediaType {
    /// `*/*`
    pub fn any() -> Self {
        Self {
            main_type: "*".to_string(),
            subtype: "*".to_string(),
            params: Vec::new(),
            quality: 1.0,
        }
    }

    /// `application/octet-stream`, assumed when a request has no body type.
    pub fn octet_stream() -> Self {
        Self {
            main_type: "application".to_string(),
            subtype: "octet-stream".to_string(),
            params: Vec::new(),
            quality: 1.0,
        }
    }

    pub fn parse(value: &str) -> RouteResult<Self> {
        let invalid = |reason| RouteError::InvalidMediaType {
            media_type: value.to_string(),
            reason,
        };

        let mut parts = value.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        if essence.is_empty() {
            return Err(invalid("empty media type"));
        }
        // A bare `*` is accepted by many clients as `*/*`
        let (main_type, subtype) = if essence == "*" {
            ("*", "*")
        } else {
            essence
                .split_once('/')
                .ok_or_else(|| invalid("missing `/`"))?
        };
        let main_type = main_type.trim();
        let subtype = subtype.trim();
        if !is_token(main_type) || !is_token(subtype) {
            return Err(invalid("type and subtype must be non-empty tokens"));
        }
        if main_type == "*" && subtype != "*" {
            return Err(invalid("wildcard type requires wildcard subtype"));
        }

        let mut params = Vec::new();
        let mut quality = 1.0;
        for param in parts {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (name, val) = param
                .split_once('=')
                .ok_or_else(|| invalid("parameter without `=`"))?;
            let name = name.trim().to_ascii_lowercase();
            let val = val.trim().trim_matches('"').to_string();
            if !is_token(&name) {
                return Err(invalid("invalid parameter name"));
            }
            if name == "q" {
                quality = val
                    .parse::<f32>()
                    .ok()
                    .filter(|q| (0.0..=1.0).contains(q))
                    .ok_or_else(|| invalid("quality must be within 0..=1"))?;
            } else {
                params.push((name, val));
            }
        }

        Ok(Self {
            main_type: main_type.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params,
            quality,
        })
    }

    /// Parse a comma-separated header value such as an `Accept` list.
    ///
    /// Commas inside quoted parameter values do not split.
    pub fn parse_list(value: &str) -> RouteResult<Vec<Self>> {
        let mut types = Vec::new();
        let mut start = 0;
        let mut quoted = false;
        for (i, c) in value.char_indices() {
            match c {
                '"' => quoted = !quoted,
                ',' if !quoted => {
                    push_non_blank(&mut types, &value[start..i])?;
                    start = i + 1;
                }
                _ => {}
            }
        }
        push_non_blank(&mut types, &value[start..])?;
        Ok(types)
    }

    pub fn main_type(&self) -> &str {
        &self.main_type
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Copy of this type carrying another quality value.
    pub fn with_quality(&self, quality: f32) -> Self {
        Self {
            quality,
            ..self.clone()
        }
    }

    pub fn is_wildcard_type(&self) -> bool {
        self.main_type == "*"
    }

    /// `*` or `*+suffix`
    pub fn is_wildcard_subtype(&self) -> bool {
        self.subtype == "*" || self.subtype.starts_with("*+")
    }

    pub fn is_concrete(&self) -> bool {
        !self.is_wildcard_type() && !self.is_wildcard_subtype()
    }

    fn suffix(&self) -> Option<&str> {
        self.subtype.rsplit_once('+').map(|(_, s)| s)
    }

    /// True if every type matched by `other` is also matched by `self`.
    pub fn includes(&self, other: &MediaType) -> bool {
        if self.is_wildcard_type() {
            return true;
        }
        if self.main_type != other.main_type {
            return false;
        }
        if self.subtype == other.subtype || self.subtype == "*" {
            return true;
        }
        // `application/*+xml` includes `application/soap+xml`
        match (self.subtype.strip_prefix("*+"), other.suffix()) {
            (Some(own), Some(theirs)) => own == theirs,
            _ => false,
        }
    }

    /// Symmetric: true if `self` includes `other` or the reverse.
    pub fn is_compatible_with(&self, other: &MediaType) -> bool {
        self.includes(other) || other.includes(self)
    }

    fn specificity_rank(&self) -> u8 {
        if self.is_wildcard_type() {
            0
        } else if self.is_wildcard_subtype() {
            1
        } else {
            2
        }
    }

    /// Type without the quality parameter, e.g. `text/html;level=1`.
    pub fn essence(&self) -> String {
        let mut out = format!("{}/{}", self.main_type, self.subtype);
        for (name, val) in &self.params {
            out.push(';');
            out.push_str(name);
            out.push('=');
            out.push_str(val);
        }
        out
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
        })
}

fn push_non_blank(types: &mut Vec<MediaType>, raw: &str) -> RouteResult<()> {
    if !raw.trim().is_empty() {
        types.push(MediaType::parse(raw)?);
    }
    Ok(())
}

/// Orders more specific types first: concrete, then `type/*`, then `*/*`;
/// among equals, the one with more parameters first.
pub fn by_specificity(a: &MediaType, b: &MediaType) -> Ordering {
    b.specificity_rank()
        .cmp(&a.specificity_rank())
        .then_with(|| b.params.len().cmp(&a.params.len()))
}

/// Orders acceptable types by descending quality, then by specificity.
pub fn by_quality_and_specificity(a: &MediaType, b: &MediaType) -> Ordering {
    b.quality
        .partial_cmp(&a.quality)
        .unwrap_or(Ordering::Equal)
        .then_with(|| by_specificity(a, b))
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.essence())?;
        if self.quality < 1.0 {
            write!(f, ";q={}", self.quality)?;
        }
        Ok(())
    }
}

/// A consumes/produces declaration, optionally negated with a leading `!`.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaTypeExpression {
    media_type: MediaType,
    negated: bool,
}

impl MediaTypeExpression {
    pub fn parse(expression: &str) -> RouteResult<Self> {
        let trimmed = expression.trim();
        let (raw, negated) = match trimmed.strip_prefix('!') {
            Some(rest) => (rest, true),
            None => (trimmed, false),
        };
        Ok(Self {
            media_type: MediaType::parse(raw)?,
            negated,
        })
    }

    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Whether a request body of type `content_type` satisfies this expression.
    pub fn accepts_body(&self, content_type: &MediaType) -> bool {
        self.media_type.includes(content_type) != self.negated
    }

    /// Whether any of the client's acceptable types satisfies this expression.
    pub fn satisfies_accept(&self, accepted: &[MediaType]) -> bool {
        let compatible = accepted
            .iter()
            .any(|a| a.quality() > 0.0 && self.media_type.is_compatible_with(a));
        compatible != self.negated
    }
}

impl fmt::Display for MediaTypeExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        write!(f, "{}", self.media_type)
    }
}
