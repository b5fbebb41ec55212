use std::convert::Infallible;

use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::{HeaderMap, header, request::Parts};

use super::{AuthRequest, SESSION_COOKIE};

/// Never rejects: a missing session cookie simply means no session.
impl<S> FromRequestParts<S> for AuthRequest
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let uri = parts
            .extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| parts.uri.clone());

        Ok(AuthRequest {
            method: parts.method.clone(),
            uri,
            headers: parts.headers.clone(),
            session_id: session_cookie(&parts.headers),
        })
    }
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
