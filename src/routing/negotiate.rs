//! Content negotiation against the `Accept` header.
//!
//! # Algorithm
//! For every offered type, the most specific matching media range decides its
//! score: an exact `type/subtype` match weighs 3, `type/*` weighs 2 and `*/*`
//! weighs 1, multiplied by the range's quality (`q`, default 1). The offer with
//! the highest score wins; ties go to the offer declared first. A score of zero
//! for every offer means nothing is acceptable.
//!
//! Routes that accept everything skip negotiation entirely, and a missing
//! `Accept` header selects the first offer.

use std::fmt;

use axum::http::HeaderValue;

use crate::error::RegistrationError;

/// Sentinel content type for routes that accept everything.
pub const ANY: &str = "*/*";

/// A concrete `type/subtype` a route can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    kind: String,
    subtype: String,
    header: HeaderValue,
}

impl MediaType {
    /// Parse a concrete offered type. Wildcards and parameters are rejected.
    pub fn parse(raw: &str) -> Result<Self, RegistrationError> {
        let invalid = |reason| RegistrationError::InvalidContentType {
            content_type: raw.to_string(),
            reason,
        };

        let trimmed = raw.trim();
        if trimmed.starts_with('/') || trimmed.ends_with('/') {
            return Err(invalid("must not start or end with '/'"));
        }
        let (kind, subtype) = trimmed
            .split_once('/')
            .ok_or_else(|| invalid("expected `type/subtype`"))?;
        if kind.is_empty() || subtype.is_empty() || subtype.contains('/') {
            return Err(invalid("expected `type/subtype`"));
        }
        if trimmed.contains('*') {
            return Err(invalid("wildcards are not allowed in offered types"));
        }
        if trimmed.contains(';') {
            return Err(invalid("parameters are not allowed in offered types"));
        }
        if !trimmed.chars().all(is_token_char) {
            return Err(invalid("contains characters not allowed in a media type"));
        }

        let kind = kind.to_ascii_lowercase();
        let subtype = subtype.to_ascii_lowercase();
        let header = HeaderValue::from_str(&format!("{kind}/{subtype}"))
            .map_err(|_| invalid("not a valid header value"))?;
        Ok(Self {
            kind,
            subtype,
            header,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// The type as a ready-made `content-type` header value.
    pub fn header_value(&self) -> &HeaderValue {
        &self.header
    }

    pub fn as_str(&self) -> &str {
        // Built from ASCII tokens in `parse`.
        self.header.to_str().unwrap_or_default()
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)
    }
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$&-^_.+/".contains(c)
}

/// The content types a route declares it can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Offers {
    /// No restriction: negotiation is skipped.
    Everything,
    /// Concrete types in declaration order.
    Only(Vec<MediaType>),
}

impl Offers {
    /// Parse an optional comma-separated list of offered types.
    ///
    /// `None` and `*/*` both mean "accept everything". A subtype joined with
    /// `+` offers each part separately: `text/html+xml` is `text/html` then
    /// `text/xml`.
    pub fn parse(offered: Option<&str>) -> Result<Self, RegistrationError> {
        let Some(offered) = offered.map(str::trim) else {
            return Ok(Self::Everything);
        };
        if offered == ANY {
            return Ok(Self::Everything);
        }
        let mut types = Vec::new();
        for part in offered.split(',') {
            for media in expand_subtypes(part) {
                types.push(MediaType::parse(&media)?);
            }
        }
        Ok(Self::Only(types))
    }

    pub fn is_everything(&self) -> bool {
        matches!(self, Self::Everything)
    }
}

fn expand_subtypes(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    match trimmed.split_once('/') {
        Some((kind, subtypes)) if subtypes.contains('+') => subtypes
            .split('+')
            .map(|subtype| format!("{kind}/{subtype}"))
            .collect(),
        _ => vec![trimmed.to_string()],
    }
}

/// Result of a successful negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiated<'a> {
    /// The route accepts everything.
    Any,
    /// The selected concrete type.
    Type(&'a MediaType),
}

impl Negotiated<'_> {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Any => ANY,
            Self::Type(media) => media.as_str(),
        }
    }
}

/// Pick the best offer for an `Accept` header; `None` means no offer is acceptable.
pub fn negotiate<'a>(offers: &'a Offers, accept: Option<&str>) -> Option<Negotiated<'a>> {
    let types = match offers {
        Offers::Everything => return Some(Negotiated::Any),
        Offers::Only(types) => types,
    };

    let accept = match accept.map(str::trim) {
        Some(header) if !header.is_empty() => header,
        _ => return Some(types.first().map_or(Negotiated::Any, Negotiated::Type)),
    };

    let ranges = parse_accept(accept);
    let mut best: Option<(&MediaType, u32)> = None;
    for offer in types {
        let score = score(offer, &ranges);
        if score == 0 {
            continue;
        }
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((offer, score));
        }
    }
    best.map(|(offer, _)| Negotiated::Type(offer))
}

/// One entry of an `Accept` header. Quality is kept in thousandths.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MediaRange<'h> {
    kind: &'h str,
    subtype: &'h str,
    quality: u32,
}

impl MediaRange<'_> {
    fn specificity(&self, offer: &MediaType) -> Option<u32> {
        let kind_matches = self.kind.eq_ignore_ascii_case(offer.kind());
        match (self.kind, self.subtype) {
            ("*", "*") => Some(1),
            (_, "*") if kind_matches => Some(2),
            (_, subtype) if kind_matches && subtype.eq_ignore_ascii_case(offer.subtype()) => {
                Some(3)
            }
            _ => None,
        }
    }
}

fn parse_accept(header: &str) -> Vec<MediaRange<'_>> {
    header.split(',').filter_map(parse_range).collect()
}

fn parse_range(raw: &str) -> Option<MediaRange<'_>> {
    let mut parts = raw.split(';');
    let essence = parts.next()?.trim();
    let (kind, subtype) = match essence {
        // Some clients send a bare `*`.
        "*" => ("*", "*"),
        _ => essence.split_once('/')?,
    };
    let (kind, subtype) = (kind.trim(), subtype.trim());
    if kind.is_empty() || subtype.is_empty() || (kind == "*" && subtype != "*") {
        return None;
    }

    let mut quality = 1000;
    for param in parts {
        if let Some((name, value)) = param.split_once('=') {
            if name.trim().eq_ignore_ascii_case("q") {
                quality = parse_quality(value.trim())?;
            }
        }
    }
    Some(MediaRange {
        kind,
        subtype,
        quality,
    })
}

fn parse_quality(value: &str) -> Option<u32> {
    let q: f32 = value.parse().ok()?;
    if !(0.0..=1.0).contains(&q) {
        return None;
    }
    Some((q * 1000.0).round() as u32)
}

fn score(offer: &MediaType, ranges: &[MediaRange<'_>]) -> u32 {
    ranges
        .iter()
        .filter_map(|range| range.specificity(offer).map(|s| (s, range.quality)))
        .max()
        .map_or(0, |(specificity, quality)| specificity * quality)
}
