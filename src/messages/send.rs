use axum::{debug_handler, extract::State, http::StatusCode, Json};
use tracing::debug;

use crate::{room::Room, validate::SendBody, AppResult, AppState, User};

#[debug_handler(state = AppState)]
pub(crate) async fn send(
    State(room): State<Room>,
    User(from): User,
    Json(body): Json<SendBody>,
) -> AppResult<StatusCode> {
    let message = room.send(&from, body.validate()?)?;
    debug!(from = %message.from, to = %message.to, kind = ?message.kind, "message sent");

    Ok(StatusCode::CREATED)
}
