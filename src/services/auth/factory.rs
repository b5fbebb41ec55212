/// Factory: build the token encoder and hooks from application `Config`.
use std::sync::Arc;

use crate::config::{Config, SigningKey};
use crate::hooks::Hooks;
use crate::services::auth::{EncodeError, JwtIssuer, UserEncoder};

pub fn build_encoder(config: &Config) -> Result<UserEncoder, EncodeError> {
    let jwt = &config.jwt;
    let issuer = match &jwt.key {
        SigningKey::Secret(secret) => {
            JwtIssuer::from_secret(jwt.algorithm, secret.as_bytes(), jwt.expiration_seconds)?
        }
        SigningKey::Ed25519Pem(pem) => JwtIssuer::from_ed_pem(pem, jwt.expiration_seconds)?,
    };

    let issuer = match &jwt.issuer {
        Some(name) => issuer.with_issuer(name.clone()),
        None => issuer,
    };

    Ok(UserEncoder::new(issuer))
}

pub fn build_hooks(config: &Config) -> Result<Arc<Hooks>, EncodeError> {
    let encoder = build_encoder(config)?;
    let hooks = Hooks::new(
        config.mappings.clone(),
        config.dispatch_requests.clone(),
        Arc::new(encoder),
    )
    .with_aud_header(config.aud_header.clone());

    Ok(Arc::new(hooks))
}
