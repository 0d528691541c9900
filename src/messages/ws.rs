use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Query, State, WebSocketUpgrade, ws::Message as WsMessage},
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use crate::{log::Message, room::Room, validate::parse_user, visibility::is_visible, AppResult, AppState};

#[derive(Deserialize)]
pub(crate) struct WsQuery {
    user: Option<String>,
}

/// Streams every newly appended message the caller may see. Browsers cannot
/// set headers on a websocket handshake, so `?user=` is accepted as well.
#[debug_handler(state = AppState)]
pub(crate) async fn messages_ws(
    State(room): State<Room>,
    Query(WsQuery { user }): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let raw = headers
        .get("user")
        .map(|v| v.as_bytes())
        .or(user.as_deref().map(str::as_bytes));
    let viewer = parse_user(raw)?;
    let mut rx = room.log().subscribe();

    Ok(ws.on_upgrade(async move |stream| {
        let (mut sender, mut receiver) = stream.split();

        let feed_viewer = viewer.clone();
        let mut feed_task = tokio::spawn(async move {
            while let Some(msg) = next_visible(&mut rx, &feed_viewer).await {
                let Ok(json) = serde_json::to_string(&*msg) else {
                    continue;
                };
                if sender.send(WsMessage::Text(json.into())).await.is_err() {
                    break;
                }
            }
        });

        // the feed is one-way; drain until the client goes away
        let mut recv_task = tokio::spawn(async move {
            while let Some(Ok(msg)) = receiver.next().await {
                if matches!(msg, WsMessage::Close(_)) {
                    break;
                }
            }
        });

        tokio::select! {
            _ = &mut feed_task => recv_task.abort(),
            _ = &mut recv_task => feed_task.abort(),
        };
        debug!(viewer = %viewer, "feed closed");
    }).into_response())
}

/// Waits for the next message on the feed that `viewer` may see. `None` once
/// the log is gone.
pub(crate) async fn next_visible(
    rx: &mut broadcast::Receiver<Arc<Message>>,
    viewer: &str,
) -> Option<Arc<Message>> {
    loop {
        match rx.recv().await {
            Ok(msg) if is_visible(viewer, &msg) => return Some(msg),
            Ok(_) => continue,
            Err(RecvError::Lagged(skipped)) => {
                warn!(viewer, skipped, "feed subscriber lagged");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
