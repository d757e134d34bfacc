//! Payload codecs.
//!
//! The routing core does not own a serialization format. Callbacks send and
//! receive values through a [`PayloadCodec`], which maps between
//! `serde_json::Value` and bytes on the wire. A [`CodecRegistry`] picks the
//! codec for a media type: the negotiated type when sending, the request's
//! `content-type` when receiving.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while encoding or decoding payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request payload is too big ({size} bytes, limit {limit})")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("payload is not valid UTF-8")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("failed to write response body: {0}")]
    Io(#[from] std::io::Error),
}

/// Maps values to and from payload bytes.
pub trait PayloadCodec: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, payload: &[u8]) -> Result<Value, CodecError>;

    /// The payload as a plain string, for lenient codecs.
    ///
    /// Tried when the decoded value does not fit the requested type.
    fn decode_raw(&self, _payload: &[u8]) -> Option<Value> {
        None
    }
}

/// Strict JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, payload: &[u8]) -> Result<Value, CodecError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// Lenient text: strings travel verbatim, anything else as JSON text.
///
/// Decoding yields JSON when the payload parses as JSON and a plain string
/// otherwise. The raw text stays available, so `42` still decodes into a
/// `String`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextCodec;

impl PayloadCodec for PlainTextCodec {
    fn name(&self) -> &'static str {
        "text"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::String(text) => Ok(text.as_bytes().to_vec()),
            other => Ok(serde_json::to_vec(other)?),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Value, CodecError> {
        let text = std::str::from_utf8(payload)?;
        Ok(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
    }

    fn decode_raw(&self, payload: &[u8]) -> Option<Value> {
        std::str::from_utf8(payload)
            .ok()
            .map(|text| Value::String(text.to_string()))
    }
}

/// Codec selection in configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Text,
    Json,
}

impl CodecKind {
    pub fn build(self) -> Arc<dyn PayloadCodec> {
        match self {
            Self::Text => Arc::new(PlainTextCodec),
            Self::Json => Arc::new(JsonCodec),
        }
    }
}

/// Codecs keyed by media type.
///
/// Lookup tries the exact `type/subtype`, then `type/*`, then the fallback.
/// Parameters such as `charset` are ignored.
#[derive(Clone)]
pub struct CodecRegistry {
    by_type: HashMap<String, Arc<dyn PayloadCodec>>,
    fallback: Arc<dyn PayloadCodec>,
}

impl CodecRegistry {
    /// JSON for `application/json`, text for `text/*`, `fallback` for the rest.
    pub fn new(fallback: Arc<dyn PayloadCodec>) -> Self {
        Self::empty(fallback)
            .with("application/json", Arc::new(JsonCodec))
            .with("text/*", Arc::new(PlainTextCodec))
    }

    /// Only the fallback, whatever the media type.
    pub fn empty(fallback: Arc<dyn PayloadCodec>) -> Self {
        Self {
            by_type: HashMap::new(),
            fallback,
        }
    }

    /// Use `codec` for `media`, which is `type/subtype` or `type/*`.
    pub fn with(mut self, media: &str, codec: Arc<dyn PayloadCodec>) -> Self {
        self.by_type.insert(essence(media), codec);
        self
    }

    pub fn fallback(&self) -> &dyn PayloadCodec {
        Arc::as_ref(&self.fallback)
    }

    pub fn for_media(&self, media: &str) -> &dyn PayloadCodec {
        let media = essence(media);
        let codec = self.by_type.get(&media).or_else(|| {
            media
                .split_once('/')
                .and_then(|(kind, _)| self.by_type.get(&format!("{kind}/*")))
        });
        Arc::as_ref(codec.unwrap_or(&self.fallback))
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self
            .by_type
            .iter()
            .map(|(media, codec)| format!("{media}={}", codec.name()))
            .collect();
        types.sort();
        f.debug_struct("CodecRegistry")
            .field("types", &types)
            .field("fallback", &self.fallback.name())
            .finish()
    }
}

fn essence(media: &str) -> String {
    media
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
