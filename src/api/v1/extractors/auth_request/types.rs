/*
 * Responsibility
 * - Owned copy of the request data the authentication manager needs
 * - Handlers borrow a RequestMeta from it for the lifetime of the proxy
 */
use axum::http::{HeaderMap, Method, Uri};

use crate::hooks::RequestMeta;

/// Cookie carrying the session id.
pub const SESSION_COOKIE: &str = "sid";

#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub method: Method,
    /// Full request URI, before any router nesting strips a prefix.
    pub uri: Uri,
    pub headers: HeaderMap,
    pub session_id: Option<String>,
}

impl AuthRequest {
    pub fn meta(&self) -> RequestMeta<'_> {
        RequestMeta::new(&self.method, &self.uri, &self.headers)
    }
}
