//! Request metadata as seen by the lifecycle hooks.
//!
//! `RequestMeta` is a borrowed view over the parts of an HTTP request that the
//! dispatch and session-leak decisions need. It never owns the request.

use axum::http::{HeaderMap, HeaderName, Method, Uri, header, request::Parts};

#[derive(Debug, Clone, Copy)]
pub struct RequestMeta<'a> {
    method: &'a Method,
    path: &'a str,
    headers: &'a HeaderMap,
}

impl<'a> RequestMeta<'a> {
    pub fn new(method: &'a Method, uri: &'a Uri, headers: &'a HeaderMap) -> Self {
        Self {
            method,
            path: uri.path(),
            headers,
        }
    }

    pub fn from_parts(parts: &'a Parts) -> Self {
        Self::new(&parts.method, &parts.uri, &parts.headers)
    }

    pub fn method(&self) -> &'a Method {
        self.method
    }

    pub fn path(&self) -> &'a str {
        self.path
    }

    pub fn header(&self, name: &HeaderName) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Audience value to hand to the token encoder.
    ///
    /// An empty or non-UTF-8 header value counts as absent.
    pub fn audience(&self, name: &HeaderName) -> Option<&'a str> {
        self.header(name)
            .map(str::trim)
            .filter(|aud| !aud.is_empty())
    }
}

/// Decides whether a request is a genuine API request.
///
/// The session-leak guard logs a token scope out when this returns `false`,
/// so implementations control a security-relevant decision.
pub trait ApiRequestClassifier: Send + Sync {
    fn is_api_request(&self, request: &RequestMeta<'_>) -> bool;
}

/// Content-negotiation heuristic.
///
/// A request is an API request when `Accept` or `Content-Type` names a JSON
/// media type and `Accept` does not list `text/html`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MediaTypeClassifier;

impl ApiRequestClassifier for MediaTypeClassifier {
    fn is_api_request(&self, request: &RequestMeta<'_>) -> bool {
        let accept = request.header(&header::ACCEPT).unwrap_or_default();
        let content_type = request.header(&header::CONTENT_TYPE).unwrap_or_default();

        if media_types(accept).any(|mt| mt == "text/html") {
            return false;
        }

        media_types(accept)
            .chain(media_types(content_type))
            .any(is_json_media_type)
    }
}

// Yields bare, lowercased media types from a header value (parameters dropped).
fn media_types(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .filter_map(|item| item.split(';').next())
        .map(|mt| mt.trim().to_ascii_lowercase())
        .filter(|mt| !mt.is_empty())
}

fn is_json_media_type(mt: String) -> bool {
    mt == "application/json" || mt.ends_with("+json")
}
