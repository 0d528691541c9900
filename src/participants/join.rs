use axum::{debug_handler, extract::State, http::StatusCode, Json};
use tracing::info;

use crate::{room::Room, validate::JoinBody, AppResult, AppState};

#[debug_handler(state = AppState)]
pub(crate) async fn join(
    State(room): State<Room>,
    Json(body): Json<JoinBody>,
) -> AppResult<StatusCode> {
    let participant = room.join(body.validate()?)?;
    info!(name = %participant.name, "participant joined");

    Ok(StatusCode::CREATED)
}
