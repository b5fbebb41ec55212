/*
 * Responsibility
 * - Read environment variables (.env supported) into a typed Config
 * - Materialize token scopes and dispatch rules once, at startup
 * - Fail startup on missing or malformed values
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderName;
use thiserror::Error;

use crate::hooks::{DEFAULT_AUD_HEADER, DispatchRules, ScopeRegistry};
use crate::manager::DEFAULT_SESSION_TTL;
use crate::services::auth::SigningAlgorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),

    #[error("invalid configuration: {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl ToString) -> Self {
        Self::Invalid {
            key,
            reason: reason.to_string(),
        }
    }
}

/// Signing material for minted tokens.
#[derive(Clone)]
pub enum SigningKey {
    Secret(String),
    Ed25519Pem(String),
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Do not print key material
        match self {
            Self::Secret(_) => f.write_str("Secret(..)"),
            Self::Ed25519Pem(_) => f.write_str("Ed25519Pem(..)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub algorithm: SigningAlgorithm,
    pub key: SigningKey,
    pub issuer: Option<String>,
    pub expiration_seconds: u64,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub jwt: JwtConfig,
    // scope -> user model label; membership marks a token scope
    pub mappings: ScopeRegistry,
    pub dispatch_requests: DispatchRules,
    pub aud_header: HeaderName,

    pub session_ttl: Duration,

    pub http_timeout: Duration,
    pub http_body_limit_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = lookup("PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|e| ConfigError::invalid("PORT", e))?;

        let app_env = AppEnv::parse(lookup("APP_ENV").as_deref());

        let jwt = jwt_config(&lookup)?;

        let mappings = parse_mappings(&lookup("JWT_MAPPINGS").unwrap_or_default());

        let dispatch_requests = DispatchRules::parse(
            &lookup("JWT_DISPATCH_REQUESTS").unwrap_or_default(),
        )
        .map_err(|e| ConfigError::invalid("JWT_DISPATCH_REQUESTS", e))?;

        let aud_header = parse_aud_header(
            lookup("JWT_AUD_HEADER")
                .as_deref()
                .unwrap_or(DEFAULT_AUD_HEADER),
        )?;

        let session_ttl = lookup("SESSION_TTL_SECONDS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SESSION_TTL);

        let http_timeout = Duration::from_secs(
            lookup("HTTP_TIMEOUT_SECONDS")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        );

        let http_body_limit_bytes = lookup("HTTP_BODY_LIMIT_BYTES")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(1024 * 1024);

        Ok(Self {
            addr,
            app_env,
            jwt,
            mappings,
            dispatch_requests,
            aud_header,
            session_ttl,
            http_timeout,
            http_body_limit_bytes,
        })
    }
}

fn jwt_config<F>(lookup: &F) -> Result<JwtConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let algorithm = lookup("JWT_ALGORITHM")
        .as_deref()
        .unwrap_or("HS256")
        .parse::<SigningAlgorithm>()
        .map_err(|e| ConfigError::invalid("JWT_ALGORITHM", e))?;

    let key = if algorithm.is_hmac() {
        let secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;
        SigningKey::Secret(secret)
    } else {
        let pem = lookup("JWT_PRIVATE_KEY_PEM")
            .ok_or(ConfigError::Missing("JWT_PRIVATE_KEY_PEM"))?
            .replace("\\n", "\n");
        SigningKey::Ed25519Pem(pem)
    };

    let issuer = lookup("JWT_ISSUER").filter(|s| !s.trim().is_empty());

    let expiration_seconds = lookup("JWT_EXPIRATION_SECONDS")
        .and_then(|s| s.parse().ok())
        .unwrap_or(3600);

    Ok(JwtConfig {
        algorithm,
        key,
        issuer,
        expiration_seconds,
    })
}

// `user_jwt=User,admin` -> {user_jwt: User, admin: admin}
fn parse_mappings(value: &str) -> ScopeRegistry {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once('=') {
            Some((scope, model)) => (scope.trim().to_string(), model.trim().to_string()),
            None => (entry.to_string(), entry.to_string()),
        })
        .collect()
}

// Accepts `jwt-aud`, `JWT_AUD` and the CGI form `HTTP_JWT_AUD`.
fn parse_aud_header(value: &str) -> Result<HeaderName, ConfigError> {
    let trimmed = value.trim();
    let name = trimmed
        .strip_prefix("HTTP_")
        .unwrap_or(trimmed)
        .to_ascii_lowercase()
        .replace('_', "-");

    HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::invalid("JWT_AUD_HEADER", e))
}
