//! Session inspection and explicit session end.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use serde_json::json;

use super::auth;
use crate::sessions::SESSION_TURN_LIMIT;
use crate::AppState;

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/sessions/{session_id}/history").route(web::get().to(session_history)),
    )
    .service(web::resource("/api/sessions/{session_id}").route(web::delete().to(end_session)));
}

async fn session_history(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    if auth::authorize(&req, &state.config).is_err() {
        return auth::rejection();
    }

    let session_id = path.into_inner();
    let meta = match state.store.meta(&session_id) {
        Some(meta) => meta,
        None => {
            return HttpResponse::NotFound().json(json!({
                "status": "error",
                "error": { "kind": "unknown_session", "message": format!("no session '{}'", session_id) },
            }))
        }
    };

    HttpResponse::Ok().json(json!({
        "session_id": meta.session_id,
        "created_at": meta.created_at,
        "last_activity_at": meta.last_activity_at,
        "turns": state.store.read_context(&session_id, SESSION_TURN_LIMIT),
        "invocations": state.store.invocations(&session_id),
    }))
}

/// Explicit session-end signal. Refused while a turn is in flight — sessions
/// are never destroyed mid-invocation.
async fn end_session(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> impl Responder {
    if auth::authorize(&req, &state.config).is_err() {
        return auth::rejection();
    }

    let session_id = path.into_inner();
    if state.lanes.is_held(&session_id) {
        return HttpResponse::Conflict().json(json!({
            "status": "error",
            "error": { "kind": "busy", "message": "a turn is in flight for this session" },
        }));
    }

    // Close the stream first so the client sees the stream end, then drop
    // the stored history.
    state.hub.connection_closed(&session_id);
    if state.store.end_session(&session_id) {
        log::info!("[SESSIONS] Session {} ended by request", session_id);
        HttpResponse::Ok().json(json!({ "ended": true, "session_id": session_id }))
    } else {
        HttpResponse::NotFound().json(json!({
            "status": "error",
            "error": { "kind": "unknown_session", "message": format!("no session '{}'", session_id) },
        }))
    }
}
