//! Persistent event-stream endpoint.
//!
//! `GET /api/stream` authenticates, binds (or creates) a session, and holds
//! the connection open. The first event is the handshake with the session id
//! and the tool catalogue; afterwards frames queued through the hub flow out
//! as `message` events, with comment keepalives while nothing happens. The
//! response body going away is the disconnect signal: its Drop moves the
//! connection to draining and cancels that session's in-flight work.

use actix_web::{http::header, web, HttpRequest, HttpResponse, Responder};
use futures_util::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::auth;
use crate::gateway::{StreamFrame, StreamHub, SSE_KEEPALIVE};
use crate::AppState;

const KEEPALIVE_PERIOD: Duration = Duration::from_secs(15);

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/stream").route(web::get().to(open_stream)));
}

async fn open_stream(state: web::Data<AppState>, req: HttpRequest) -> impl Responder {
    if auth::authorize(&req, &state.config).is_err() {
        return auth::rejection();
    }

    let session_id = req
        .headers()
        .get("X-Session-Id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    state.store.get_or_create(&session_id);
    let (receiver, _cancel, generation) = state.hub.register(&session_id);

    let handshake = StreamFrame::Handshake {
        session_id: session_id.clone(),
        tools: state.registry.list(),
    };
    let body = SseBody::new(
        state.hub.clone(),
        session_id.clone(),
        generation,
        receiver,
        handshake,
    );
    state.hub.activate(&session_id);

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header(("X-Session-Id", session_id))
        .streaming(body)
}

/// SSE body for one stream connection.
///
/// Ends when the hub drops the connection's sender (explicit session end);
/// dropping it (client disconnect) closes the connection in the hub.
struct SseBody {
    hub: Arc<StreamHub>,
    session_id: String,
    generation: u64,
    frames: ReceiverStream<StreamFrame>,
    keepalive: tokio::time::Interval,
    handshake: Option<StreamFrame>,
}

impl SseBody {
    fn new(
        hub: Arc<StreamHub>,
        session_id: String,
        generation: u64,
        receiver: tokio::sync::mpsc::Receiver<StreamFrame>,
        handshake: StreamFrame,
    ) -> Self {
        // First keepalive only after a full quiet period; the handshake
        // already proves liveness at open.
        let keepalive =
            tokio::time::interval_at(tokio::time::Instant::now() + KEEPALIVE_PERIOD, KEEPALIVE_PERIOD);
        SseBody {
            hub,
            session_id,
            generation,
            frames: ReceiverStream::new(receiver),
            keepalive,
            handshake: Some(handshake),
        }
    }
}

impl Stream for SseBody {
    type Item = Result<web::Bytes, actix_web::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Some(handshake) = this.handshake.take() {
            return Poll::Ready(Some(Ok(web::Bytes::from(handshake.to_sse()))));
        }

        match Pin::new(&mut this.frames).poll_next(cx) {
            Poll::Ready(Some(frame)) => {
                this.keepalive.reset();
                return Poll::Ready(Some(Ok(web::Bytes::from(frame.to_sse()))));
            }
            // Sender gone: the session was ended explicitly.
            Poll::Ready(None) => return Poll::Ready(None),
            Poll::Pending => {}
        }

        match this.keepalive.poll_tick(cx) {
            Poll::Ready(_) => Poll::Ready(Some(Ok(web::Bytes::from_static(
                SSE_KEEPALIVE.as_bytes(),
            )))),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for SseBody {
    fn drop(&mut self) {
        self.hub
            .connection_closed_if_current(&self.session_id, self.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn fixture_body(hub: &Arc<StreamHub>, session_id: &str) -> SseBody {
        let (receiver, _cancel, generation) = hub.register(session_id);
        let handshake = StreamFrame::Handshake {
            session_id: session_id.to_string(),
            tools: vec![],
        };
        let body = SseBody::new(
            hub.clone(),
            session_id.to_string(),
            generation,
            receiver,
            handshake,
        );
        hub.activate(session_id);
        body
    }

    #[tokio::test]
    async fn test_handshake_is_the_first_event() {
        let hub = Arc::new(StreamHub::new());
        let mut body = fixture_body(&hub, "s1");

        hub.send("s1", StreamFrame::Done);
        let first = body.next().await.unwrap().unwrap();
        let first = std::str::from_utf8(&first).unwrap();
        assert!(first.starts_with("event: handshake\n"));

        let second = body.next().await.unwrap().unwrap();
        let second = std::str::from_utf8(&second).unwrap();
        assert!(second.starts_with("event: message\n"));
        assert!(second.contains(r#""type":"done""#));
    }

    #[tokio::test]
    async fn test_body_ends_when_session_is_closed() {
        let hub = Arc::new(StreamHub::new());
        let mut body = fixture_body(&hub, "s1");
        assert!(body.next().await.is_some()); // handshake

        hub.connection_closed("s1");
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_body_drains_the_connection() {
        let hub = Arc::new(StreamHub::new());
        let body = fixture_body(&hub, "s1");
        let cancel = hub.cancellation("s1").unwrap();
        drop(body);

        assert!(cancel.is_cancelled());
        assert!(hub.state("s1").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_fills_idle_gaps() {
        let hub = Arc::new(StreamHub::new());
        let mut body = fixture_body(&hub, "s1");
        assert!(body.next().await.is_some()); // handshake

        let next = body.next().await.unwrap().unwrap();
        assert_eq!(std::str::from_utf8(&next).unwrap(), SSE_KEEPALIVE);
    }
}
