//! Single-shot request/response endpoint.
//!
//! `POST /api/analyze` runs the same pipeline a stream turn runs, but to
//! completion within the request, returning every frame the turn produced.
//! Each submission is a fresh invocation; nothing is deduplicated or cached.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::auth;
use crate::dispatch::FrameCollector;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct AnalyzeRequest {
    prompt: String,
    #[serde(default)]
    session_id: Option<String>,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/analyze").route(web::post().to(analyze)));
}

async fn analyze(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<AnalyzeRequest>,
) -> impl Responder {
    if auth::authorize(&req, &state.config).is_err() {
        return auth::rejection();
    }

    let prompt = body.prompt.trim();
    if prompt.is_empty() {
        return HttpResponse::BadRequest().json(json!({
            "status": "error",
            "error": { "kind": "bad_request", "message": "prompt must not be empty" },
        }));
    }

    let session_id = body
        .session_id
        .clone()
        .filter(|id| !id.is_empty())
        .or_else(|| {
            req.headers()
                .get("X-Session-Id")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .filter(|id| !id.is_empty())
        })
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    // The turn runs on its own task: if the client goes away mid-request the
    // handler future is dropped, but the invocation still reaches a terminal
    // status instead of staying pending forever. The token is never
    // cancelled; the request itself is the connection.
    let dispatcher = Arc::clone(&state.dispatcher);
    let turn = {
        let session_id = session_id.clone();
        let prompt = prompt.to_string();
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let collector = FrameCollector::new();
            dispatcher
                .handle_turn(&session_id, &prompt, &collector, &cancel)
                .await;
            collector.take()
        })
    };

    match turn.await {
        Ok(frames) => HttpResponse::Ok().json(json!({
            "session_id": session_id,
            "frames": frames,
        })),
        Err(e) => {
            log::error!("[DISPATCH] Single-shot turn for {} aborted: {}", session_id, e);
            HttpResponse::InternalServerError().json(json!({
                "status": "error",
                "error": { "kind": "internal", "message": "turn execution failed" },
            }))
        }
    }
}
