//! Relays a token minted during the request to the client.
//!
//! The lifecycle hooks store a `PreparedToken` in the environment the
//! handler returns with its response. This layer takes it out (so it is read
//! at most once) and exposes it as `Authorization: Bearer <token>`.

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Request, header},
    middleware::{self, Next},
    response::Response,
};
use tracing::{debug, warn};

use crate::hooks::PreparedToken;

pub fn apply(router: Router) -> Router {
    router.layer(middleware::from_fn(dispatch_token))
}

async fn dispatch_token(req: Request<Body>, next: Next) -> Response {
    let mut response = next.run(req).await;

    let Some(token) = response.extensions_mut().remove::<PreparedToken>() else {
        return response;
    };

    match HeaderValue::try_from(format!("Bearer {}", token.as_str())) {
        Ok(value) => {
            response.headers_mut().insert(header::AUTHORIZATION, value);
            debug!(key = PreparedToken::ENV_KEY, "token relayed in Authorization header");
        }
        Err(err) => {
            warn!(error = %err, "prepared token is not a valid header value; dropped");
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Extension, routing::get};
    use tower::ServiceExt;

    fn router() -> Router {
        let app = Router::new()
            .route(
                "/with",
                get(|| async { (Extension(PreparedToken::new("abc.def.ghi")), "ok") }),
            )
            .route("/without", get(|| async { "ok" }))
            .route(
                "/broken",
                get(|| async { (Extension(PreparedToken::new("bad\ntoken")), "ok") }),
            );
        apply(app)
    }

    async fn call(path: &str) -> Response {
        router()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_token_moves_to_authorization_header() {
        let response = call("/with").await;
        assert_eq!(
            response.headers()[header::AUTHORIZATION],
            "Bearer abc.def.ghi"
        );
        assert!(response.extensions().get::<PreparedToken>().is_none());
    }

    #[tokio::test]
    async fn test_no_token_no_header() {
        let response = call("/without").await;
        assert!(response.headers().get(header::AUTHORIZATION).is_none());
    }

    #[tokio::test]
    async fn test_invalid_token_is_dropped() {
        let response = call("/broken").await;
        assert!(response.headers().get(header::AUTHORIZATION).is_none());
    }
}
