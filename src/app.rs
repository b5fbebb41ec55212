/*
 * Responsibility
 * - Config -> dependencies (hooks registered on the manager) -> Router
 * - Apply middleware (token relay, request id, tracing, limits)
 * - Serve with axum::serve()
 */
use std::{panic, process};

use anyhow::Result;
use axum::{Router, routing::get};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::{AppEnv, Config};
use crate::middleware;
use crate::state::AppState;

// RUST_LOG wins; otherwise development also shows this crate's hook
// decisions (no-match outcomes are logged at debug).
fn init_telemetry(app_env: AppEnv) {
    let default_directive = if app_env.is_production() {
        "info,tower_http=info".to_string()
    } else {
        format!("info,tower_http=debug,{}=debug", env!("CARGO_CRATE_NAME"))
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(!app_env.is_production()))
        .init();

    let abort_on_panic = !app_env.is_production();
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<non-string panic payload>");
        let location = info.location().map(ToString::to_string).unwrap_or_default();
        tracing::error!(%location, payload, "panic");

        if abort_on_panic {
            process::abort();
        }
        default_hook(info);
    }));
}

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;
    init_telemetry(config.app_env);

    tracing::info!(
        scopes = config.mappings.len(),
        dispatch_rules = config.dispatch_requests.len(),
        algorithm = %config.jwt.algorithm,
        "starting in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = AppState::from_config(&config)?;
    let app = middleware::http::apply(build_router(state), &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Routes plus the token relay; transport layers are added by `run`.
pub fn build_router(state: AppState) -> Router {
    async fn health() -> &'static str {
        "ok"
    }

    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::v1::routes())
        .with_state(state);

    middleware::token_dispatcher::apply(router)
}
