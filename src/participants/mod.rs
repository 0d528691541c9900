mod join;
mod list;

use axum::{routing::get, Router};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/participants", get(list::participants).post(join::join))
}
