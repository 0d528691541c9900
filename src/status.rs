use axum::{debug_handler, extract::State, http::StatusCode, routing::post, Router};
use tracing::debug;

use crate::{room::Room, AppResult, AppState, User};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", post(heartbeat))
}

#[debug_handler(state = AppState)]
pub(crate) async fn heartbeat(
    State(room): State<Room>,
    User(name): User,
) -> AppResult<StatusCode> {
    room.heartbeat(&name)?;
    debug!(name = %name, "heartbeat");

    Ok(StatusCode::OK)
}
