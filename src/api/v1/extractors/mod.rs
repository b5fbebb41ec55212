mod auth_request;

pub use auth_request::{AuthRequest, SESSION_COOKIE};
