mod list;
mod send;
mod ws;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", get(list::messages).post(send::send))
        .route("/messages/ws", get(ws::messages_ws))
}
