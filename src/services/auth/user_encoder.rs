use serde_json::{Map, Value};
use uuid::Uuid;

use crate::services::auth::jwt::{EncodeError, JwtIssuer};
use crate::services::auth::subject::JwtSubject;

/// A signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub claims: Map<String, Value>,
}

/// Encodes a `(user, scope, audience)` triple into a signed token.
pub trait TokenEncoder: Send + Sync {
    fn encode(
        &self,
        user: &dyn JwtSubject,
        scope: &str,
        aud: Option<&str>,
    ) -> Result<MintedToken, EncodeError>;
}

/// Default encoder backed by [`JwtIssuer`].
///
/// Claims:
/// - `sub` from the user, `scp` the scope, `aud` only when given
/// - `iat`, `exp` (= `iat` + TTL), `jti` (UUID v4), `iss` when configured
/// - the user's own payload last, so it may override any of the above
#[derive(Debug, Clone)]
pub struct UserEncoder {
    jwt: JwtIssuer,
}

impl UserEncoder {
    pub fn new(jwt: JwtIssuer) -> Self {
        Self { jwt }
    }

    pub fn issuer(&self) -> &JwtIssuer {
        &self.jwt
    }

    fn claims_for(
        &self,
        user: &dyn JwtSubject,
        scope: &str,
        aud: Option<&str>,
    ) -> Result<Map<String, Value>, EncodeError> {
        let ttl = self.jwt.ttl_seconds();
        let iat = chrono::Utc::now().timestamp();
        let exp = i64::try_from(ttl)
            .ok()
            .and_then(|ttl| iat.checked_add(ttl))
            .ok_or(EncodeError::InvalidTtl(ttl))?;

        let mut claims = Map::new();
        claims.insert("sub".into(), Value::String(user.jwt_subject()));
        claims.insert("scp".into(), Value::String(scope.to_string()));
        if let Some(aud) = aud {
            claims.insert("aud".into(), Value::String(aud.to_string()));
        }
        claims.insert("iat".into(), iat.into());
        claims.insert("exp".into(), exp.into());
        claims.insert("jti".into(), Value::String(Uuid::new_v4().to_string()));
        if let Some(iss) = self.jwt.issuer() {
            claims.insert("iss".into(), Value::String(iss.to_string()));
        }

        claims.extend(user.jwt_payload());
        Ok(claims)
    }
}

impl TokenEncoder for UserEncoder {
    fn encode(
        &self,
        user: &dyn JwtSubject,
        scope: &str,
        aud: Option<&str>,
    ) -> Result<MintedToken, EncodeError> {
        let claims = self.claims_for(user, scope, aud)?;
        let token = self.jwt.sign(&claims)?;
        Ok(MintedToken { token, claims })
    }
}
