//! Bearer-token dispatch policy for a session-based authentication manager.
//!
//! On every "user set" event the [`hooks::Hooks`] decide whether the request
//! should receive a freshly minted token; on every "user fetched from session"
//! event they decide whether a token-only scope must be logged out.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod hooks;
pub mod manager;
pub mod middleware;
pub mod services;
pub mod state;
pub mod user;

pub use hooks::{Hooks, PREPARED_TOKEN_ENV_KEY, PreparedToken};
