//! Glob-style path pattern matching.
//!
//! # Responsibilities
//! - Parse `/`-delimited patterns into segments once, at registration
//! - Match a normalized request path segment by segment
//! - Decide whether two patterns could match a common path
//!
//! # Syntax
//! - `?` matches exactly one character within a segment
//! - `*` matches zero or more characters within a segment
//! - `**` matches zero or more whole segments and must stand alone
//!
//! # Design Decisions
//! - Case-sensitive, no decoding or slash normalization (callers normalize)
//! - Literal segments compare as plain strings; globs and `**` both use a
//!   last-star backtracking scan, so matching never allocates
//! - Overlap checks memoize failed positions, so they stay polynomial in
//!   the number of wildcards
//! - Immutable after parse, so one pattern is shared by every worker thread

use std::collections::HashSet;
use std::fmt;

use crate::error::{RouteError, RouteResult};

/// Wildcard token inside a single segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobToken {
    Char(char),
    AnyChar,
    AnyRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Glob(Vec<GlobToken>),
    /// `**`
    Deep,
}

impl Segment {
    fn parse(raw: &str, pattern: &str) -> RouteResult<Self> {
        if raw == "**" {
            return Ok(Segment::Deep);
        }
        if raw.contains("**") {
            return Err(RouteError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "`**` must occupy a whole segment",
            });
        }
        if !raw.contains(['*', '?']) {
            return Ok(Segment::Literal(raw.to_string()));
        }
        let tokens = raw
            .chars()
            .map(|c| match c {
                '*' => GlobToken::AnyRun,
                '?' => GlobToken::AnyChar,
                other => GlobToken::Char(other),
            })
            .collect();
        Ok(Segment::Glob(tokens))
    }

    fn matches(&self, text: &str) -> bool {
        match self {
            Segment::Literal(lit) => lit == text,
            Segment::Glob(tokens) => glob_matches(tokens, text),
            Segment::Deep => true,
        }
    }

    fn tokens(&self) -> Vec<GlobToken> {
        match self {
            Segment::Literal(lit) => lit.chars().map(GlobToken::Char).collect(),
            Segment::Glob(tokens) => tokens.clone(),
            Segment::Deep => vec![GlobToken::AnyRun],
        }
    }
}

/// Last-star backtracking wildcard match over one segment.
///
/// Only the most recent `*` is ever retried: any text an earlier star could
/// take instead can be absorbed by the later one.
fn glob_matches(tokens: &[GlobToken], text: &str) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while let Some(c) = text[t..].chars().next() {
        match tokens.get(p) {
            Some(GlobToken::AnyRun) => {
                star = Some((p, t));
                p += 1;
            }
            Some(GlobToken::AnyChar) => {
                p += 1;
                t += c.len_utf8();
            }
            Some(GlobToken::Char(expected)) if *expected == c => {
                p += 1;
                t += c.len_utf8();
            }
            _ => match star {
                Some((star_p, star_t)) => {
                    // the star takes one more character
                    let taken = text[star_t..].chars().next().map_or(1, char::len_utf8);
                    p = star_p + 1;
                    t = star_t + taken;
                    star = Some((star_p, t));
                }
                None => return false,
            },
        }
    }

    tokens[p..].iter().all(|tok| *tok == GlobToken::AnyRun)
}

/// Whether some string is accepted by both token sequences.
fn glob_overlap(a: &[GlobToken], b: &[GlobToken]) -> bool {
    fn walk(
        a: &[GlobToken],
        b: &[GlobToken],
        i: usize,
        j: usize,
        failed: &mut HashSet<(usize, usize)>,
    ) -> bool {
        if failed.contains(&(i, j)) {
            return false;
        }
        let overlap = match (a.get(i), b.get(j)) {
            (None, None) => true,
            (Some(GlobToken::AnyRun), _) => {
                walk(a, b, i + 1, j, failed) || (j < b.len() && walk(a, b, i, j + 1, failed))
            }
            (_, Some(GlobToken::AnyRun)) => {
                walk(a, b, i, j + 1, failed) || (i < a.len() && walk(a, b, i + 1, j, failed))
            }
            (None, _) | (_, None) => false,
            (Some(x), Some(y)) => {
                let compatible = match (x, y) {
                    (GlobToken::Char(l), GlobToken::Char(r)) => l == r,
                    _ => true,
                };
                compatible && walk(a, b, i + 1, j + 1, failed)
            }
        };
        if !overlap {
            failed.insert((i, j));
        }
        overlap
    }

    walk(a, b, 0, 0, &mut HashSet::new())
}

/// Segment-level overlap walk over two patterns.
struct SegmentOverlap<'a> {
    a: &'a [Segment],
    b: &'a [Segment],
    same_trailing: bool,
    failed: HashSet<(usize, usize)>,
}

impl SegmentOverlap<'_> {
    fn walk(&mut self, i: usize, j: usize) -> bool {
        if self.failed.contains(&(i, j)) {
            return false;
        }
        let (a, b) = (self.a, self.b);
        let overlap = match (a.get(i), b.get(j)) {
            (None, None) => self.same_trailing,
            (Some(Segment::Deep), _) => {
                i + 1 == a.len()
                    || self.walk(i + 1, j)
                    || (j < b.len() && self.walk(i, j + 1))
            }
            (_, Some(Segment::Deep)) => {
                j + 1 == b.len()
                    || self.walk(i, j + 1)
                    || (i < a.len() && self.walk(i + 1, j))
            }
            (None, _) | (_, None) => false,
            (Some(sa), Some(sb)) => {
                let head = match (sa, sb) {
                    (Segment::Literal(l), Segment::Literal(r)) => l == r,
                    (Segment::Literal(l), glob) | (glob, Segment::Literal(l)) => glob.matches(l),
                    _ => glob_overlap(&sa.tokens(), &sb.tokens()),
                };
                head && self.walk(i + 1, j + 1)
            }
        };
        if !overlap {
            self.failed.insert((i, j));
        }
        overlap
    }
}

/// A compiled path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
    trailing_slash: bool,
}

impl PathPattern {
    /// Parse a pattern such as `/api/*/items/**`.
    pub fn parse(pattern: &str) -> RouteResult<Self> {
        if pattern.is_empty() {
            return Err(RouteError::InvalidPattern {
                pattern: String::new(),
                reason: "pattern is empty",
            });
        }
        if !pattern.starts_with('/') {
            return Err(RouteError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern must start with `/`",
            });
        }

        let mut segments: Vec<Segment> = Vec::new();
        for raw in pattern.split('/').filter(|s| !s.is_empty()) {
            let segment = Segment::parse(raw, pattern)?;
            // `/**/**` is the same as `/**`
            if segment == Segment::Deep && segments.last() == Some(&Segment::Deep) {
                continue;
            }
            segments.push(segment);
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
            trailing_slash: pattern.len() > 1 && pattern.ends_with('/'),
        })
    }

    /// The pattern as written at registration.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True if the pattern contains no wildcard at all.
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Test a normalized request path against this pattern.
    pub fn matches(&self, path: &str) -> bool {
        if !path.starts_with('/') {
            return false;
        }
        let trailing = path.len() > 1 && path.ends_with('/');

        // Same last-star scan as within a segment, with `**` as the star and
        // whole segments as the characters.
        let mut parts = path.split('/').filter(|s| !s.is_empty());
        let mut p = 0;
        let mut star = None;
        loop {
            let mut ahead = parts.clone();
            let Some(part) = ahead.next() else {
                break;
            };
            match self.segments.get(p) {
                Some(Segment::Deep) => {
                    star = Some((p, parts.clone()));
                    p += 1;
                }
                Some(segment) if segment.matches(part) => {
                    p += 1;
                    parts = ahead;
                }
                _ => match star.as_mut() {
                    Some((star_p, star_parts)) => {
                        // `**` takes one more segment
                        star_parts.next();
                        p = *star_p + 1;
                        parts = star_parts.clone();
                    }
                    None => return false,
                },
            }
        }

        match &self.segments[p..] {
            [] => self.trailing_slash == trailing,
            rest => rest.iter().all(|s| *s == Segment::Deep),
        }
    }

    /// True if at least one path could be matched by both patterns.
    pub fn may_overlap(&self, other: &PathPattern) -> bool {
        SegmentOverlap {
            a: &self.segments,
            b: &other.segments,
            same_trailing: self.trailing_slash == other.trailing_slash,
            failed: HashSet::new(),
        }
        .walk(0, 0)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// One-off match of `path` against an uncompiled `pattern`.
///
/// A pattern that fails to parse matches nothing.
pub fn matches(pattern: &str, path: &str) -> bool {
    PathPattern::parse(pattern)
        .map(|p| p.matches(path))
        .unwrap_or(false)
}
