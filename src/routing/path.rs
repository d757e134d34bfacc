//! Route patterns and request path segmentation.
//!
//! # Responsibilities
//! - Split raw paths into segments (the only place this happens)
//! - Parse route patterns into literal and parameter segments
//! - Remember parameter positions and read them back from request paths
//!
//! # Design Decisions
//! - Surrounding whitespace is trimmed and empty segments are dropped, so
//!   `/a//b/`, `a/b` and `/a/b` are the same path
//! - Parameters are positional: the name only matters when building the
//!   parameter map handed to callbacks

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::RegistrationError;

/// Prefix marking a parameter segment in a route pattern.
pub const PARAM_MARKER: char = ':';

/// Split a path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    path.trim().split('/').filter(|s| !s.is_empty()).collect()
}

/// Normalize a concrete path to its canonical `/a/b` form.
pub fn normalize(path: &str) -> String {
    let parts = segments(path);
    if parts.is_empty() {
        return "/".to_string();
    }
    let mut out = String::with_capacity(path.len() + 1);
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    out
}

/// A single segment of a route pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Matches exactly this text.
    Literal(String),
    /// Matches any single segment; holds the parameter name without the marker.
    Param(String),
}

impl PathSegment {
    fn parse(pattern: &str, raw: &str) -> Result<Self, RegistrationError> {
        match raw.strip_prefix(PARAM_MARKER) {
            Some("") => Err(RegistrationError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "parameter segment without a name",
            }),
            Some(name) => Ok(Self::Param(name.to_string())),
            None => Ok(Self::Literal(raw.to_string())),
        }
    }

    pub fn is_param(&self) -> bool {
        matches!(self, Self::Param(_))
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(text),
            Self::Param(name) => write!(f, "{PARAM_MARKER}{name}"),
        }
    }
}

/// A parsed route pattern such as `/users/:id/posts`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutePath {
    segments: Vec<PathSegment>,
}

impl RoutePath {
    pub fn parse(pattern: &str) -> Result<Self, RegistrationError> {
        let segments = segments(pattern)
            .into_iter()
            .map(|raw| PathSegment::parse(pattern, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root pattern `/`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Positions and names of the parameter segments.
    pub fn param_positions(&self) -> ParamPositions {
        ParamPositions(
            self.segments
                .iter()
                .enumerate()
                .filter_map(|(index, segment)| match segment {
                    PathSegment::Param(name) => Some((index, name.clone())),
                    PathSegment::Literal(_) => None,
                })
                .collect(),
        )
    }
}

impl FromStr for RoutePath {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}

/// Parameter names by segment index, captured at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamPositions(Vec<(usize, String)>);

impl ParamPositions {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Zip the stored positions against the segments of a concrete request path.
    pub fn extract(&self, request_segments: &[&str]) -> Params {
        if self.0.is_empty() {
            return Params::default();
        }
        Params(
            self.0
                .iter()
                .filter_map(|(index, name)| {
                    request_segments
                        .get(*index)
                        .map(|value| (name.clone(), (*value).to_string()))
                })
                .collect(),
        )
    }
}

/// Path parameters of one request, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(HashMap<String, String>);

impl Params {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &HashMap<String, String> {
        &self.0
    }
}
