//! Compiled path patterns.
//!
//! # Responsibilities
//! - Parse `/user/{userId}` style patterns once, at registration time
//! - Match request paths segment by segment
//! - Bind placeholder segments to named path parameters
//!
//! # Design Decisions
//! - Exact segment count, no prefixes or catch-all wildcards
//! - Literal segments are case-sensitive
//! - A placeholder never matches an empty segment
//! - Trailing slash is significant (`/conversation/` is not `/conversation`)

use std::fmt;

use thiserror::Error;

/// Error raised when a route pattern cannot be compiled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern `{0}` must start with '/'")]
    MissingLeadingSlash(String),

    #[error("pattern `{0}` contains an empty segment")]
    EmptySegment(String),

    #[error("pattern `{0}` contains a placeholder without a name")]
    UnnamedPlaceholder(String),

    #[error("pattern `{pattern}` has a malformed placeholder in segment `{segment}`")]
    MalformedPlaceholder { pattern: String, segment: String },

    #[error("pattern `{pattern}` binds `{name}` more than once")]
    DuplicatePlaceholder { pattern: String, name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A route pattern compiled into literal and placeholder segments.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Compile a pattern such as `/conversation/{conversationId}`.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let rest = pattern
            .strip_prefix('/')
            .ok_or_else(|| PatternError::MissingLeadingSlash(pattern.to_string()))?;

        let mut segments = Vec::new();
        if !rest.is_empty() {
            for raw in rest.split('/') {
                segments.push(Self::parse_segment(pattern, raw)?);
            }
        }

        let mut seen: Vec<&str> = Vec::new();
        for segment in &segments {
            if let Segment::Param(name) = segment {
                if seen.contains(&name.as_str()) {
                    return Err(PatternError::DuplicatePlaceholder {
                        pattern: pattern.to_string(),
                        name: name.clone(),
                    });
                }
                seen.push(name);
            }
        }

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    fn parse_segment(pattern: &str, raw: &str) -> Result<Segment, PatternError> {
        if raw.is_empty() {
            return Err(PatternError::EmptySegment(pattern.to_string()));
        }

        match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some("") => Err(PatternError::UnnamedPlaceholder(pattern.to_string())),
            Some(name) if !name.contains(['{', '}']) => Ok(Segment::Param(name.to_string())),
            Some(_) => Err(PatternError::MalformedPlaceholder {
                pattern: pattern.to_string(),
                segment: raw.to_string(),
            }),
            None if raw.contains(['{', '}']) => Err(PatternError::MalformedPlaceholder {
                pattern: pattern.to_string(),
                segment: raw.to_string(),
            }),
            None => Ok(Segment::Literal(raw.to_string())),
        }
    }

    /// The pattern text as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Match a request path, returning the bound parameters on success.
    ///
    /// Placeholder values are percent-decoded; a segment that does not decode
    /// to UTF-8 does not match.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let rest = path.strip_prefix('/')?;
        let parts: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };

        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::default();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    let value = urlencoding::decode(part).ok()?;
                    params.insert(name.clone(), value.into_owned());
                }
            }
        }

        Some(params)
    }

    /// Two patterns have the same shape when they match exactly the same
    /// paths, whatever their placeholders are called.
    pub fn same_shape(&self, other: &PathPattern) -> bool {
        self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    (Segment::Param(_), Segment::Param(_)) => true,
                    _ => false,
                })
    }

    /// Leftmost literal wins: at the first position where one pattern has a
    /// literal and the other a placeholder, the literal one is more specific.
    pub fn more_specific_than(&self, other: &PathPattern) -> bool {
        for pair in self.segments.iter().zip(&other.segments) {
            match pair {
                (Segment::Literal(_), Segment::Param(_)) => return true,
                (Segment::Param(_), Segment::Literal(_)) => return false,
                _ => {}
            }
        }
        false
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Parameters bound by a matched pattern, in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    entries: Vec<(String, String)>,
}

impl PathParams {
    fn insert(&mut self, name: String, value: String) {
        self.entries.push((name, value));
    }

    /// Look up a bound parameter by placeholder name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
