//! Companion endpoint for pushing turns into a live stream session.
//!
//! `POST /api/messages?session_id=...` accepts the turn and returns at once;
//! progress and results arrive on the session's event stream. A session id
//! with no live stream is a 404 — the caller should (re)open the stream
//! first.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::auth;
use crate::dispatch::HubSink;
use crate::errors::EngineError;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct MessageQuery {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct MessageRequest {
    prompt: String,
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/messages").route(web::post().to(post_message)));
}

async fn post_message(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<MessageQuery>,
    body: web::Json<MessageRequest>,
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

    let session_id = query.session_id.clone();
    if !state.hub.is_live(&session_id) {
        let error = EngineError::UnknownSession(session_id.clone());
        return HttpResponse::NotFound().json(json!({
            "status": "error",
            "error": error.detail(),
        }));
    }

    // Belongs to the stream connection; going away mid-turn cancels the work.
    let cancel = match state.hub.cancellation(&session_id) {
        Some(token) => token,
        None => {
            let error = EngineError::UnknownSession(session_id.clone());
            return HttpResponse::NotFound().json(json!({
                "status": "error",
                "error": error.detail(),
            }));
        }
    };

    let dispatcher = Arc::clone(&state.dispatcher);
    let sink = HubSink::new(Arc::clone(&state.hub), session_id.clone());
    let prompt = prompt.to_string();
    {
        let session_id = session_id.clone();
        tokio::spawn(async move {
            dispatcher
                .handle_turn(&session_id, &prompt, &sink, &cancel)
                .await;
        });
    }

    HttpResponse::Accepted().json(json!({
        "accepted": true,
        "session_id": session_id,
    }))
}
