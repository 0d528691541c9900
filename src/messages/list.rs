use axum::{debug_handler, extract::{Query, State}, Json};
use serde::Deserialize;

use crate::{log::Message, room::Room, validate::parse_limit, AppResult, AppState, User};

#[derive(Deserialize)]
pub(crate) struct MessagesQuery {
    limit: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn messages(
    State(room): State<Room>,
    User(viewer): User,
    Query(MessagesQuery { limit }): Query<MessagesQuery>,
) -> AppResult<Json<Vec<Message>>> {
    let limit = parse_limit(limit.as_deref())?;
    Ok(Json(room.messages(&viewer, limit)))
}
