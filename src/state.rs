/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 * - Cheap to clone (Arc inside)
 */
use std::sync::Arc;

use crate::config::Config;
use crate::manager::Manager;
use crate::services::auth::{EncodeError, build_hooks};
use crate::user::User;

#[derive(Clone, Debug)]
pub struct AppState {
    pub manager: Arc<Manager<User>>,
}

impl AppState {
    pub fn new(manager: Arc<Manager<User>>) -> Self {
        Self { manager }
    }

    /// Builds the manager with the token hooks registered on it.
    pub fn from_config(config: &Config) -> Result<Self, EncodeError> {
        let hooks = build_hooks(config)?;
        let mut manager = Manager::with_session_ttl(config.session_ttl);
        hooks.register::<User, _>(&mut manager);

        Ok(Self::new(Arc::new(manager)))
    }
}
