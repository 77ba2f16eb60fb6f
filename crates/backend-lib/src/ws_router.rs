// ============================
// watchparty-backend/src/ws_router.rs
// ============================
//! HTTP router, static stream serving and WebSocket connection handling.
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::HeaderValue,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use futures_util::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use tokio::sync::mpsc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{debug, warn};
use watchparty_common::ServerToClient;

use crate::handlers::party;
use crate::metrics::{WS_ACTIVE, WS_CONNECTION};
use crate::websocket::{ConnectionHandler, Flow};
use crate::AppState;

/// How long queued frames may take to flush once the client is gone
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Build the full application router
pub fn create_router(state: AppState) -> Router {
    let streams = ServeDir::new(&state.settings.stream.streams_dir);
    let cors = cors_layer(&state.settings.cors_origins);

    Router::new()
        .route("/api/create-party", post(party::create_party))
        .route("/api/join-party", post(party::join_party))
        .route("/api/set-video", post(party::set_video))
        .route("/api/start-stream", post(party::start_stream))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .nest_service("/streams", streams)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            },
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn health() -> &'static str {
    "Healthy"
}

/// Handler for WebSocket connections
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    counter!(WS_CONNECTION).increment(1);
    gauge!(WS_ACTIVE).increment(1.0);

    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) =
        mpsc::channel::<ServerToClient>(state.settings.outbound_queue);
    let mut handler = ConnectionHandler::new(state, outbound_tx);
    let connection = handler.id();

    // Writer: runs until every sender (ours and the party's) is gone
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "failed to serialize frame");
                    continue;
                },
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                return;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    while let Some(Ok(message)) = stream.next().await {
        let flow = match message {
            Message::Text(text) => handler.handle_text(text.as_str()).await,
            Message::Close(_) => Flow::Close,
            _ => Flow::Continue,
        };
        if flow == Flow::Close {
            break;
        }
    }

    handler.disconnect();
    drop(handler);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        debug!(%connection, "writer did not drain in time");
        writer.abort();
    }

    gauge!(WS_ACTIVE).decrement(1.0);
}
