//! Lifecycle hooks deciding token dispatch and session-leak logout.
//!
//! Two handlers are attached to the authentication manager:
//! - after a user is set (login or session restore), mint a bearer token when
//!   the scope is a token scope and the request matches a dispatch rule;
//! - after a user is fetched from the session, log a token scope out unless
//!   the request is an API request.
//!
//! Collaborator failures (encoding, logout) propagate unchanged. Every other
//! outcome is a silent no-op.

use std::fmt;
use std::sync::Arc;

use axum::http::{Extensions, HeaderName, Method};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::manager::{LifecycleEvents, LogoutError, ScopeLogout};
use crate::services::auth::{EncodeError, JwtSubject, MintedToken, TokenEncoder};

pub mod request;
pub mod rules;

pub use request::{ApiRequestClassifier, MediaTypeClassifier, RequestMeta};
pub use rules::{DispatchRule, DispatchRules, RuleError, ScopeRegistry};

/// Name of the per-request slot holding a freshly minted token.
///
/// The relay step reads the slot under this name; it must not change.
pub const PREPARED_TOKEN_ENV_KEY: &str = "warden-jwt_auth.token";

/// Header the audience is read from unless configured otherwise.
pub const DEFAULT_AUD_HEADER: &str = "jwt-aud";

/// Token minted for the current request, waiting to be relayed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedToken(String);

impl PreparedToken {
    pub const ENV_KEY: &'static str = PREPARED_TOKEN_ENV_KEY;

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Logout(#[from] LogoutError),
}

pub struct Hooks {
    scopes: ScopeRegistry,
    dispatch: DispatchRules,
    aud_header: HeaderName,
    encoder: Arc<dyn TokenEncoder>,
    classifier: Arc<dyn ApiRequestClassifier>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("scopes", &self.scopes)
            .field("dispatch", &self.dispatch)
            .field("aud_header", &self.aud_header)
            .finish_non_exhaustive()
    }
}

impl Hooks {
    pub fn new(
        scopes: ScopeRegistry,
        dispatch: DispatchRules,
        encoder: Arc<dyn TokenEncoder>,
    ) -> Self {
        Self {
            scopes,
            dispatch,
            aud_header: HeaderName::from_static(DEFAULT_AUD_HEADER),
            encoder,
            classifier: Arc::new(MediaTypeClassifier),
        }
    }

    pub fn with_aud_header(mut self, aud_header: HeaderName) -> Self {
        self.aud_header = aud_header;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ApiRequestClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Attaches both handlers to an authentication manager.
    pub fn register<U, S>(self: Arc<Self>, source: &mut S)
    where
        U: JwtSubject + 'static,
        S: LifecycleEvents<U>,
    {
        let hooks = Arc::clone(&self);
        source.on_after_set_user(move |event| {
            hooks.after_set_user(event.user, event.scope, &event.request, event.env)
        });

        let hooks = self;
        source.on_after_fetch(move |event| {
            hooks.after_fetch(event.scope, &event.request, event.logout)
        });
    }

    pub fn is_jwt_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn request_matches(&self, method: &Method, path: &str) -> bool {
        self.dispatch.matches(method, path)
    }

    /// Mints a token into `env` when `scope` is a token scope and the request
    /// matches a dispatch rule.
    pub fn after_set_user(
        &self,
        user: &dyn JwtSubject,
        scope: &str,
        request: &RequestMeta<'_>,
        env: &mut Extensions,
    ) -> Result<(), HookError> {
        if !self.is_jwt_scope(scope) {
            debug!(scope, "not a token scope; no dispatch");
            return Ok(());
        }
        if !self.request_matches(request.method(), request.path()) {
            debug!(
                scope,
                method = %request.method(),
                path = request.path(),
                "no dispatch rule matched"
            );
            return Ok(());
        }

        let aud = request.audience(&self.aud_header);
        let MintedToken { token, claims } =
            self.encoder.encode(user, scope, aud).inspect_err(|e| {
                error!(scope, error = %e, "failed to encode token for dispatch");
            })?;

        if let Some(observer) = user.dispatch_observer() {
            observer.on_jwt_dispatch(&token, &claims);
        }

        env.insert(PreparedToken(token));
        info!(
            scope,
            path = request.path(),
            key = PREPARED_TOKEN_ENV_KEY,
            "token prepared for dispatch"
        );
        Ok(())
    }

    /// Logs a token scope out when it was restored from the session on a
    /// request that is not an API request.
    pub fn after_fetch(
        &self,
        scope: &str,
        request: &RequestMeta<'_>,
        logout: &mut dyn ScopeLogout,
    ) -> Result<(), HookError> {
        if !self.is_jwt_scope(scope) {
            return Ok(());
        }
        if self.classifier.is_api_request(request) {
            return Ok(());
        }

        info!(
            scope,
            path = request.path(),
            "token scope restored from session outside an API request; logging out"
        );
        logout.logout(scope)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::sync::Mutex;

    use axum::http::{HeaderMap, HeaderValue, Uri};
    use serde_json::{Map, Value};

    use crate::services::auth::OnJwtDispatch;

    #[derive(Default)]
    struct RecordingEncoder {
        calls: Mutex<Vec<(String, String, Option<String>)>>,
        fail: bool,
    }

    impl RecordingEncoder {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<(String, String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl TokenEncoder for RecordingEncoder {
        fn encode(
            &self,
            user: &dyn JwtSubject,
            scope: &str,
            aud: Option<&str>,
        ) -> Result<MintedToken, EncodeError> {
            self.calls.lock().unwrap().push((
                user.jwt_subject(),
                scope.to_string(),
                aud.map(str::to_string),
            ));
            if self.fail {
                return Err(EncodeError::UnsupportedAlgorithm("none".into()));
            }
            let mut claims = Map::new();
            claims.insert("sub".into(), Value::String(user.jwt_subject()));
            Ok(MintedToken {
                token: format!("token-for-{}-{}", user.jwt_subject(), scope),
                claims,
            })
        }
    }

    struct User;

    impl JwtSubject for User {
        fn jwt_subject(&self) -> String {
            "1".to_string()
        }
    }

    #[derive(Default)]
    struct ObservingUser {
        seen: RefCell<Vec<String>>,
    }

    impl JwtSubject for ObservingUser {
        fn jwt_subject(&self) -> String {
            "2".to_string()
        }

        fn dispatch_observer(&self) -> Option<&dyn OnJwtDispatch> {
            Some(self)
        }
    }

    impl OnJwtDispatch for ObservingUser {
        fn on_jwt_dispatch(&self, token: &str, payload: &Map<String, Value>) {
            assert_eq!(payload["sub"], "2");
            self.seen.borrow_mut().push(token.to_string());
        }
    }

    struct HeaderPresence(HeaderName);

    impl ApiRequestClassifier for HeaderPresence {
        fn is_api_request(&self, request: &RequestMeta<'_>) -> bool {
            request.header(&self.0).is_some()
        }
    }

    #[derive(Default)]
    struct RecordingLogout {
        scopes: Vec<String>,
        fail: bool,
    }

    impl ScopeLogout for RecordingLogout {
        fn logout(&mut self, scope: &str) -> Result<(), LogoutError> {
            if self.fail {
                return Err(LogoutError::NoSession);
            }
            self.scopes.push(scope.to_string());
            Ok(())
        }
    }

    fn hooks(encoder: Arc<RecordingEncoder>) -> Hooks {
        let scopes = ScopeRegistry::new().with_scope("user_jwt", "User");
        let dispatch = DispatchRules::parse("POST ^/api/login$").unwrap();
        Hooks::new(scopes, dispatch, encoder)
    }

    fn request(method: Method, uri: &str, headers: &[(&'static str, &str)]) -> (Method, Uri, HeaderMap) {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        (method, uri.parse().unwrap(), map)
    }

    #[test]
    fn test_dispatch_on_matching_login() {
        let encoder = Arc::new(RecordingEncoder::default());
        let hooks = hooks(encoder.clone());
        let (method, uri, headers) = request(Method::POST, "/api/login", &[]);
        let mut env = Extensions::new();

        hooks
            .after_set_user(&User, "user_jwt", &RequestMeta::new(&method, &uri, &headers), &mut env)
            .unwrap();

        assert_eq!(
            encoder.calls(),
            vec![("1".to_string(), "user_jwt".to_string(), None)]
        );
        assert_eq!(
            env.get::<PreparedToken>().map(PreparedToken::as_str),
            Some("token-for-1-user_jwt")
        );
    }

    #[test]
    fn test_no_dispatch_without_matching_rule() {
        let encoder = Arc::new(RecordingEncoder::default());
        let hooks = hooks(encoder.clone());
        let (method, uri, headers) = request(Method::GET, "/dashboard", &[]);
        let mut env = Extensions::new();

        hooks
            .after_set_user(&User, "user_jwt", &RequestMeta::new(&method, &uri, &headers), &mut env)
            .unwrap();

        assert!(encoder.calls().is_empty());
        assert!(env.is_empty());
    }

    #[test]
    fn test_no_dispatch_for_unregistered_scope() {
        let encoder = Arc::new(RecordingEncoder::default());
        let hooks = hooks(encoder.clone());
        let mut env = Extensions::new();

        for (method, path) in [(Method::POST, "/api/login"), (Method::GET, "/dashboard")] {
            let (method, uri, headers) = request(method, path, &[]);
            hooks
                .after_set_user(
                    &User,
                    "html_session",
                    &RequestMeta::new(&method, &uri, &headers),
                    &mut env,
                )
                .unwrap();
        }

        assert!(encoder.calls().is_empty());
        assert!(env.is_empty());
    }

    #[test]
    fn test_method_must_match_exactly() {
        let encoder = Arc::new(RecordingEncoder::default());
        let hooks = hooks(encoder.clone());
        let lower = Method::from_bytes(b"post").unwrap();
        let (_, uri, headers) = request(Method::POST, "/api/login", &[]);
        let mut env = Extensions::new();

        hooks
            .after_set_user(&User, "user_jwt", &RequestMeta::new(&lower, &uri, &headers), &mut env)
            .unwrap();

        assert!(encoder.calls().is_empty());
        assert!(env.is_empty());
    }

    #[test]
    fn test_audience_header_is_forwarded() {
        let encoder = Arc::new(RecordingEncoder::default());
        let hooks = hooks(encoder.clone());
        let (method, uri, headers) = request(Method::POST, "/api/login", &[("jwt-aud", "android")]);
        let mut env = Extensions::new();

        hooks
            .after_set_user(&User, "user_jwt", &RequestMeta::new(&method, &uri, &headers), &mut env)
            .unwrap();

        assert_eq!(encoder.calls()[0].2.as_deref(), Some("android"));
    }

    #[test]
    fn test_custom_audience_header() {
        let encoder = Arc::new(RecordingEncoder::default());
        let hooks = hooks(encoder.clone()).with_aud_header(HeaderName::from_static("x-client"));
        let (method, uri, headers) = request(
            Method::POST,
            "/api/login",
            &[("jwt-aud", "android"), ("x-client", "web")],
        );
        let mut env = Extensions::new();

        hooks
            .after_set_user(&User, "user_jwt", &RequestMeta::new(&method, &uri, &headers), &mut env)
            .unwrap();

        assert_eq!(encoder.calls()[0].2.as_deref(), Some("web"));
    }

    #[test]
    fn test_observer_sees_token_before_store() {
        let encoder = Arc::new(RecordingEncoder::default());
        let hooks = hooks(encoder);
        let (method, uri, headers) = request(Method::POST, "/api/login", &[]);
        let user = ObservingUser::default();
        let mut env = Extensions::new();

        hooks
            .after_set_user(&user, "user_jwt", &RequestMeta::new(&method, &uri, &headers), &mut env)
            .unwrap();

        assert_eq!(*user.seen.borrow(), vec!["token-for-2-user_jwt".to_string()]);
        assert_eq!(
            env.get::<PreparedToken>().map(PreparedToken::as_str),
            Some("token-for-2-user_jwt")
        );
    }

    #[test]
    fn test_encoding_failure_propagates_without_store() {
        let encoder = Arc::new(RecordingEncoder::failing());
        let hooks = hooks(encoder);
        let (method, uri, headers) = request(Method::POST, "/api/login", &[]);
        let mut env = Extensions::new();

        let err = hooks
            .after_set_user(&User, "user_jwt", &RequestMeta::new(&method, &uri, &headers), &mut env)
            .unwrap_err();

        assert!(matches!(err, HookError::Encode(_)));
        assert!(env.get::<PreparedToken>().is_none());
    }

    #[test]
    fn test_guard_logs_out_token_scope_on_browser_request() {
        let hooks = hooks(Arc::new(RecordingEncoder::default()));
        let (method, uri, headers) = request(Method::GET, "/dashboard", &[("accept", "text/html")]);
        let mut logout = RecordingLogout::default();

        hooks
            .after_fetch("user_jwt", &RequestMeta::new(&method, &uri, &headers), &mut logout)
            .unwrap();

        assert_eq!(logout.scopes, vec!["user_jwt".to_string()]);
    }

    #[test]
    fn test_guard_keeps_api_request() {
        let hooks = hooks(Arc::new(RecordingEncoder::default()));
        let (method, uri, headers) =
            request(Method::GET, "/api/me", &[("accept", "application/json")]);
        let mut logout = RecordingLogout::default();

        hooks
            .after_fetch("user_jwt", &RequestMeta::new(&method, &uri, &headers), &mut logout)
            .unwrap();

        assert!(logout.scopes.is_empty());
    }

    #[test]
    fn test_guard_ignores_session_scope() {
        let hooks = hooks(Arc::new(RecordingEncoder::default()));
        let mut logout = RecordingLogout::default();

        for accept in ["text/html", "application/json"] {
            let (method, uri, headers) = request(Method::GET, "/dashboard", &[("accept", accept)]);
            hooks
                .after_fetch(
                    "html_session",
                    &RequestMeta::new(&method, &uri, &headers),
                    &mut logout,
                )
                .unwrap();
        }

        assert!(logout.scopes.is_empty());
    }

    #[test]
    fn test_guard_uses_configured_classifier() {
        let hooks = hooks(Arc::new(RecordingEncoder::default()))
            .with_classifier(Arc::new(HeaderPresence(HeaderName::from_static("x-api"))));
        let (method, uri, headers) = request(Method::GET, "/me", &[("x-api", "1")]);
        let mut logout = RecordingLogout::default();

        hooks
            .after_fetch("user_jwt", &RequestMeta::new(&method, &uri, &headers), &mut logout)
            .unwrap();

        assert!(logout.scopes.is_empty());
    }

    #[test]
    fn test_guard_propagates_logout_failure() {
        let hooks = hooks(Arc::new(RecordingEncoder::default()));
        let (method, uri, headers) = request(Method::GET, "/dashboard", &[]);
        let mut logout = RecordingLogout {
            fail: true,
            ..RecordingLogout::default()
        };

        let err = hooks
            .after_fetch("user_jwt", &RequestMeta::new(&method, &uri, &headers), &mut logout)
            .unwrap_err();

        assert!(matches!(err, HookError::Logout(LogoutError::NoSession)));
    }
}
