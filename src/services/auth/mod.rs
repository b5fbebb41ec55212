/*
 * Responsibility
 * - Token encoding: user + scope + audience -> signed JWT and its claims
 * - Key handling stays inside `jwt`; callers only see `TokenEncoder`
 */
pub mod factory;
pub mod jwt;
pub mod subject;
pub mod user_encoder;

pub use factory::{build_encoder, build_hooks};
pub use jwt::{EncodeError, JwtIssuer, SigningAlgorithm};
pub use subject::{JwtSubject, OnJwtDispatch};
pub use user_encoder::{MintedToken, TokenEncoder, UserEncoder};
