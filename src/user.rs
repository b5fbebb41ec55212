/*
 * Responsibility
 * - The user model signed into the `user` scope
 * - How it is encoded into tokens (JwtSubject) and observes dispatch
 */
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use crate::services::auth::{JwtSubject, OnJwtDispatch};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
}

impl JwtSubject for User {
    fn jwt_subject(&self) -> String {
        self.id.to_string()
    }

    fn jwt_payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("email".into(), Value::String(self.email.clone()));
        payload
    }

    fn dispatch_observer(&self) -> Option<&dyn OnJwtDispatch> {
        Some(self)
    }
}

impl OnJwtDispatch for User {
    fn on_jwt_dispatch(&self, _token: &str, payload: &Map<String, Value>) {
        info!(
            user_id = %self.id,
            jti = payload.get("jti").and_then(|jti| jti.as_str()),
            "token dispatched"
        );
    }
}
