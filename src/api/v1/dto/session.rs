/*
 * Responsibility
 * - Session (login/me) request/response DTO
 */
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::user::User;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub user_id: Uuid,
    pub email: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        let email = self.email.trim();
        if email.is_empty() {
            return Err("email is required");
        }
        if !email.contains('@') || email.len() > 254 {
            return Err("email is invalid");
        }

        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}
