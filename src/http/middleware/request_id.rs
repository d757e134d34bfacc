//! Request ID middleware.
//! Tags every request and its response with an `x-request-id`.

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::http::request::X_REQUEST_ID;

/// Reuse the caller's request ID or generate a UUID v4 one.
pub async fn request_id_middleware(mut req: Request<Body>, next: Next) -> Response {
    let request_id = match req.headers().get(X_REQUEST_ID) {
        Some(existing) => existing.clone(),
        None => match HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            Ok(generated) => generated,
            Err(_) => return next.run(req).await,
        },
    };

    req.headers_mut().insert(X_REQUEST_ID, request_id.clone());
    let mut response = next.run(req).await;
    response.headers_mut().insert(X_REQUEST_ID, request_id);
    response
}
