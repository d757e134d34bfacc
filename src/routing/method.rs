//! HTTP method arbiters.
//!
//! An arbiter decides whether a route entry accepts a request method. Arbiters
//! compare by value, so two `any_method()` arbiters (or two arbiters over the
//! same method set) are interchangeable, which is what aggregate removal
//! relies on.

use std::fmt;
use std::str::FromStr;

use axum::http::Method;

use crate::error::RegistrationError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    Single(Method),
    Any,
    AnyOf(Vec<Method>),
}

/// Predicate over HTTP methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodArbiter(Kind);

impl MethodArbiter {
    pub const DELETE: Self = Self(Kind::Single(Method::DELETE));
    pub const GET: Self = Self(Kind::Single(Method::GET));
    pub const HEAD: Self = Self(Kind::Single(Method::HEAD));
    pub const OPTIONS: Self = Self(Kind::Single(Method::OPTIONS));
    pub const PATCH: Self = Self(Kind::Single(Method::PATCH));
    pub const POST: Self = Self(Kind::Single(Method::POST));
    pub const PUT: Self = Self(Kind::Single(Method::PUT));
    pub const TRACE: Self = Self(Kind::Single(Method::TRACE));

    /// Accepts exactly one method.
    pub fn single(method: Method) -> Self {
        Self(Kind::Single(method))
    }

    /// Accepts every method.
    pub fn any_method() -> Self {
        Self(Kind::Any)
    }

    /// Accepts any method of the given set.
    ///
    /// The set is normalized (sorted, deduplicated); a one-element set is the
    /// same arbiter as [`MethodArbiter::single`] and an empty set accepts
    /// nothing.
    pub fn any_of<I>(methods: I) -> Self
    where
        I: IntoIterator<Item = Method>,
    {
        let mut methods: Vec<Method> = methods.into_iter().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods.dedup();
        if methods.len() == 1 {
            if let Some(method) = methods.pop() {
                return Self::single(method);
            }
        }
        Self(Kind::AnyOf(methods))
    }

    pub fn accepts(&self, method: &Method) -> bool {
        match &self.0 {
            Kind::Single(accepted) => accepted == method,
            Kind::Any => true,
            Kind::AnyOf(accepted) => accepted.contains(method),
        }
    }

    /// Whether this arbiter accepts the representative value of `other`.
    ///
    /// A single-method arbiter is represented by its method. Aggregate
    /// arbiters are represented by their accepted set, which only an equal set
    /// or `any_method()` accepts.
    pub fn accepts_arbiter(&self, other: &MethodArbiter) -> bool {
        match &other.0 {
            Kind::Single(method) => self.accepts(method),
            Kind::Any => matches!(self.0, Kind::Any),
            Kind::AnyOf(_) => matches!(self.0, Kind::Any) || self == other,
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self.0, Kind::Any)
    }
}

impl From<Method> for MethodArbiter {
    fn from(method: Method) -> Self {
        Self::single(method)
    }
}

/// Parses `*`, a single method such as `GET`, or a `|`-separated set.
impl FromStr for MethodArbiter {
    type Err = RegistrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" {
            return Ok(Self::any_method());
        }
        let methods = s
            .split('|')
            .map(|part| {
                let part = part.trim().to_ascii_uppercase();
                if part.is_empty() {
                    return Err(RegistrationError::InvalidMethod(s.to_string()));
                }
                Method::from_bytes(part.as_bytes())
                    .map_err(|_| RegistrationError::InvalidMethod(s.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::any_of(methods))
    }
}

impl fmt::Display for MethodArbiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Kind::Single(method) => f.write_str(method.as_str()),
            Kind::Any => f.write_str("*"),
            Kind::AnyOf(methods) => {
                let names: Vec<&str> = methods.iter().map(Method::as_str).collect();
                f.write_str(&names.join("|"))
            }
        }
    }
}
