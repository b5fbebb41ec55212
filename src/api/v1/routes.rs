/*
 * Responsibility
 * - v1 URL layout
 * - /login, /me, /session (liveness lives at the root: /health)
 */
use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

use crate::api::v1::handlers::session::{login, logout, me};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/session", delete(logout))
}
