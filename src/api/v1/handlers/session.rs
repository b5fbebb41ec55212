/*
 * Responsibility
 * - Sign in / restore / sign out of the `user` scope
 * - Hand the proxy's environment back through the response so the token
 *   dispatcher can relay a minted token
 */
use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::{AppendHeaders, IntoResponse},
};

use crate::{
    api::v1::{
        dto::session::{LoginRequest, UserResponse},
        extractors::{AuthRequest, SESSION_COOKIE},
    },
    error::AppError,
    manager::{EventKind, ScopeLogout},
    state::AppState,
    user::User,
};

/// Scope the HTTP surface signs users into.
pub const USER_SCOPE: &str = "user";

pub async fn login(
    State(state): State<AppState>,
    request: AuthRequest,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()
        .map_err(|message| AppError::bad_request("INVALID_BODY", message))?;

    let user = User {
        id: req.user_id,
        email: req.email.trim().to_string(),
    };

    let mut auth = state
        .manager
        .proxy(request.meta(), request.session_id.clone());
    auth.set_user(user.clone(), USER_SCOPE, EventKind::Authentication)?;
    let (env, session_id) = auth.finish();

    let session_id = session_id.ok_or(AppError::Internal)?;
    let cookie = format!("{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax");

    Ok((
        StatusCode::OK,
        env,
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        Json(UserResponse::from(user)),
    ))
}

pub async fn me(
    State(state): State<AppState>,
    request: AuthRequest,
) -> Result<impl IntoResponse, AppError> {
    let mut auth = state
        .manager
        .proxy(request.meta(), request.session_id.clone());
    let user = auth.user(USER_SCOPE)?;
    let (env, _) = auth.finish();

    let user = user.ok_or(AppError::Unauthorized)?;
    Ok((env, Json(UserResponse::from(user))))
}

pub async fn logout(
    State(state): State<AppState>,
    request: AuthRequest,
) -> Result<impl IntoResponse, AppError> {
    let mut auth = state
        .manager
        .proxy(request.meta(), request.session_id.clone());
    auth.logout(USER_SCOPE)?;

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(
            header::SET_COOKIE,
            format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
        )]),
    ))
}
