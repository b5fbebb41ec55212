use std::fmt;
use std::str::FromStr;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unsupported signing algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("invalid signing key: {0}")]
    InvalidKey(#[source] jsonwebtoken::errors::Error),

    #[error("token lifetime of {0} seconds is out of range")]
    InvalidTtl(u64),

    #[error("failed to sign token: {0}")]
    Sign(#[source] jsonwebtoken::errors::Error),
}

/// Signing algorithms accepted by [`JwtIssuer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    Hs256,
    Hs384,
    Hs512,
    EdDsa,
}

impl SigningAlgorithm {
    fn to_jwt(self) -> Algorithm {
        match self {
            Self::Hs256 => Algorithm::HS256,
            Self::Hs384 => Algorithm::HS384,
            Self::Hs512 => Algorithm::HS512,
            Self::EdDsa => Algorithm::EdDSA,
        }
    }

    pub fn is_hmac(self) -> bool {
        !matches!(self, Self::EdDsa)
    }
}

impl FromStr for SigningAlgorithm {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HS256" => Ok(Self::Hs256),
            "HS384" => Ok(Self::Hs384),
            "HS512" => Ok(Self::Hs512),
            "EDDSA" => Ok(Self::EdDsa),
            _ => Err(EncodeError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hs256 => "HS256",
            Self::Hs384 => "HS384",
            Self::Hs512 => "HS512",
            Self::EdDsa => "EdDSA",
        };
        f.write_str(name)
    }
}

/// Signs claim sets with a single configured key.
#[derive(Clone)]
pub struct JwtIssuer {
    algorithm: SigningAlgorithm,
    issuer: Option<String>,
    ttl_seconds: u64,
    encoding_key: EncodingKey,
}

impl fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("JwtIssuer")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl JwtIssuer {
    /// HMAC issuer (HS256/HS384/HS512) over a shared secret.
    pub fn from_secret(
        algorithm: SigningAlgorithm,
        secret: &[u8],
        ttl_seconds: u64,
    ) -> Result<Self, EncodeError> {
        if !algorithm.is_hmac() {
            return Err(EncodeError::UnsupportedAlgorithm(format!(
                "{algorithm} needs a private key, not a secret"
            )));
        }

        Ok(Self {
            algorithm,
            issuer: None,
            ttl_seconds,
            encoding_key: EncodingKey::from_secret(secret),
        })
    }

    /// `private_key_pem` must be an Ed25519 private key in PKCS#8 PEM format.
    pub fn from_ed_pem(private_key_pem: &str, ttl_seconds: u64) -> Result<Self, EncodeError> {
        let encoding_key = EncodingKey::from_ed_pem(private_key_pem.as_bytes()).map_err(|e| {
            warn!(error = %e, "failed to parse JWT private key PEM (expected Ed25519 PKCS#8 PEM)");
            EncodeError::InvalidKey(e)
        })?;

        Ok(Self {
            algorithm: SigningAlgorithm::EdDsa,
            issuer: None,
            ttl_seconds,
            encoding_key,
        })
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, EncodeError> {
        let mut header = Header::new(self.algorithm.to_jwt());
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, claims, &self.encoding_key).map_err(|e| {
            error!(error = %e, "failed to sign JWT");
            EncodeError::Sign(e)
        })
    }
}
