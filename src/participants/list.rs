use axum::{debug_handler, extract::State, Json};

use crate::{registry::Participant, room::Room, AppState};

#[debug_handler(state = AppState)]
pub(crate) async fn participants(
    State(room): State<Room>,
) -> Json<Vec<Participant>> {
    Json(room.participants())
}
