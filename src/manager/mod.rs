/*
 * Responsibility
 * - Authentication manager contract seen by the hooks (events, logout)
 * - In-memory session-backed manager used by the HTTP surface
 */
use axum::http::Extensions;
use thiserror::Error;

use crate::hooks::{HookError, RequestMeta};

pub mod session;

pub use session::{DEFAULT_SESSION_TTL, Manager, Proxy};

/// Why a user was set on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A strategy authenticated the user on this request.
    Authentication,
    /// The application set the user explicitly.
    SetUser,
    /// The user was restored from the session.
    Fetch,
}

pub struct SetUserEvent<'a, U> {
    pub kind: EventKind,
    pub user: &'a U,
    pub scope: &'a str,
    pub request: RequestMeta<'a>,
    pub env: &'a mut Extensions,
}

pub struct FetchEvent<'a> {
    pub scope: &'a str,
    pub request: RequestMeta<'a>,
    pub logout: &'a mut dyn ScopeLogout,
}

#[derive(Debug, Error)]
pub enum LogoutError {
    #[error("no active session")]
    NoSession,
}

/// Invalidates the login of one scope on the current request's session.
pub trait ScopeLogout {
    fn logout(&mut self, scope: &str) -> Result<(), LogoutError>;
}

/// Event source exposed by an authentication manager.
///
/// Handlers run synchronously in registration order; the first error stops
/// the chain and is returned to the caller that triggered the event.
pub trait LifecycleEvents<U> {
    fn on_after_set_user<F>(&mut self, hook: F)
    where
        F: Fn(SetUserEvent<'_, U>) -> Result<(), HookError> + Send + Sync + 'static;

    fn on_after_fetch<F>(&mut self, hook: F)
    where
        F: Fn(FetchEvent<'_>) -> Result<(), HookError> + Send + Sync + 'static;
}
