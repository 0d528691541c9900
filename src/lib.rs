pub mod clock;
pub mod config;
pub mod error;
pub mod log;
pub mod messages;
pub mod participants;
pub mod reaper;
pub mod registry;
pub mod room;
pub mod status;
pub mod validate;
pub mod visibility;

use axum::{
    Json, Router,
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_http::cors::CorsLayer;

use error::ChatError;
use room::Room;
use validate::ValidationError;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub room: Room,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(participants::router())
        .merge(messages::router())
        .merge(status::router())
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Shown when joining with a name someone else holds.
pub const NAME_TAKEN: &str = "Esse nome já está em uso! Por favor, tente um diferente.";
/// Shown when a heartbeat comes from someone who is not (or no longer) in the room.
pub const NOT_IN_ROOM: &str = "Você não está na sala. Entre novamente para continuar.";

pub type AppResult<T> = Result<T, AppError>;
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(v) = self.0.downcast_ref::<ValidationError>() {
            return (StatusCode::UNPROCESSABLE_ENTITY, Json(v)).into_response();
        }
        match self.0.downcast_ref::<ChatError>() {
            Some(ChatError::Conflict(_)) => (StatusCode::CONFLICT, NAME_TAKEN).into_response(),
            Some(ChatError::NotFound(_)) => (StatusCode::NOT_FOUND, NOT_IN_ROOM).into_response(),
            Some(ChatError::Validation(v)) => (StatusCode::UNPROCESSABLE_ENTITY, Json(v)).into_response(),
            None => {
                tracing::error!(error = %self.0, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("{}\n\n{}", self.0, self.0.backtrace()),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Caller identity, taken from the `User` header.
#[derive(Debug, Clone)]
pub struct User(pub String);

impl<S: Send + Sync> FromRequestParts<S> for User {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts.headers.get("user").map(|v| v.as_bytes());
        let name = validate::parse_user(raw)?;
        Ok(User(name))
    }
}
