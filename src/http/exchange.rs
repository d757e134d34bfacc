//! The per-request object handed to handlers and filters.

use std::io::Write;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{CodecError, CodecRegistry, PayloadCodec};
use crate::http::request::RequestContext;
use crate::http::response::ResponseSink;
use crate::routing::path::Params;

/// Request/response pair for one callback invocation.
pub struct Exchange<'a> {
    request: &'a RequestContext,
    response: &'a mut dyn ResponseSink,
    params: Params,
    content_type: &'a str,
    codecs: &'a CodecRegistry,
    max_body_size: usize,
}

impl<'a> Exchange<'a> {
    pub(crate) fn new(
        request: &'a RequestContext,
        response: &'a mut dyn ResponseSink,
        params: Params,
        content_type: &'a str,
        codecs: &'a CodecRegistry,
        max_body_size: usize,
    ) -> Self {
        Self {
            request,
            response,
            params,
            content_type,
            codecs,
            max_body_size,
        }
    }

    pub fn request(&self) -> &RequestContext {
        self.request
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn path(&self) -> &str {
        self.request.path()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// The negotiated content type, or `*/*` for unrestricted routes.
    pub fn content_type(&self) -> &str {
        self.content_type
    }

    /// The response output stream.
    pub fn out(&mut self) -> &mut dyn Write {
        self.response.body()
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.response.set_status(status);
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.response.set_header(name, value);
    }

    /// Freeze the response so no later entry handles this request.
    pub fn finalize(&mut self) {
        self.response.finalize();
    }

    /// Encode `value` with the codec for the negotiated content type and
    /// write it, newline terminated.
    pub fn send<T>(&mut self, value: &T) -> Result<(), CodecError>
    where
        T: Serialize + ?Sized,
    {
        let value = serde_json::to_value(value)?;
        let mut payload = self.codecs.for_media(self.content_type).encode(&value)?;
        payload.push(b'\n');
        self.response.body().write_all(&payload)?;
        Ok(())
    }

    /// Like [`Exchange::send`], but `None` answers 404 with an empty body.
    pub fn send_opt<T>(&mut self, value: Option<&T>) -> Result<(), CodecError>
    where
        T: Serialize + ?Sized,
    {
        match value {
            Some(value) => self.send(value),
            None => {
                self.response.set_status(StatusCode::NOT_FOUND);
                Ok(())
            }
        }
    }

    /// Decode the request body into `T` with the codec for the request's
    /// `content-type`.
    pub fn receive<T>(&self) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        let body = self.request.body();
        if body.len() > self.max_body_size {
            return Err(CodecError::PayloadTooLarge {
                size: body.len(),
                limit: self.max_body_size,
            });
        }
        let codec = self.request_codec();
        let value = codec.decode(body)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Ok(decoded),
            Err(e) => match codec.decode_raw(body) {
                Some(raw) => serde_json::from_value(raw).map_err(|_| CodecError::Json(e)),
                None => Err(e.into()),
            },
        }
    }

    fn request_codec(&self) -> &'a dyn PayloadCodec {
        match self
            .request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            Some(media) => self.codecs.for_media(media),
            None => self.codecs.fallback(),
        }
    }
}
