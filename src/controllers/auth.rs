//! API-key check shared by every authenticated endpoint.
//!
//! The token may arrive as `Authorization: Bearer <token>` or as
//! `X-Api-Key: <token>`. Failure yields 401 before any session is touched.

use actix_web::{http::header, HttpRequest, HttpResponse};
use serde_json::json;

use crate::config::Config;
use crate::errors::EngineError;

pub fn authorize(req: &HttpRequest, config: &Config) -> Result<(), EngineError> {
    let presented = bearer_token(req).or_else(|| api_key_header(req));
    match presented {
        Some(token) if token == config.api_token => Ok(()),
        _ => Err(EngineError::AuthFailure),
    }
}

pub fn rejection() -> HttpResponse {
    HttpResponse::Unauthorized().json(json!({
        "status": "error",
        "error": EngineError::AuthFailure.detail(),
    }))
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn api_key_header(req: &HttpRequest) -> Option<&str> {
    req.headers().get("X-Api-Key")?.to_str().ok().map(str::trim)
}
