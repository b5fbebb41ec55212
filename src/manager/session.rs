use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};
use std::time::{Duration, Instant};

use axum::http::Extensions;
use tracing::debug;
use uuid::Uuid;

use crate::hooks::{HookError, RequestMeta};
use crate::manager::{EventKind, FetchEvent, LifecycleEvents, LogoutError, ScopeLogout, SetUserEvent};

type SetUserHook<U> = Box<dyn Fn(SetUserEvent<'_, U>) -> Result<(), HookError> + Send + Sync>;
type FetchHook = Box<dyn Fn(FetchEvent<'_>) -> Result<(), HookError> + Send + Sync>;

/// Idle lifetime of a session unless configured otherwise.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct Session<U> {
    // scope -> user
    users: HashMap<String, U>,
    last_seen: Instant,
}

impl<U> Session<U> {
    fn new(now: Instant) -> Self {
        Self {
            users: HashMap::new(),
            last_seen: now,
        }
    }

    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) >= ttl
    }
}

// Sessions expire after `ttl` without access. Expired entries are swept on
// every write and dropped when read.
struct SessionStore<U> {
    sessions: RwLock<HashMap<String, Session<U>>>,
    ttl: Duration,
}

impl<U: Clone> SessionStore<U> {
    fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Session<U>>> {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now, self.ttl));
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "expired sessions swept");
        }
        sessions
    }

    fn get(&self, session_id: &str, scope: &str) -> Option<U> {
        let mut sessions = self.write();
        let session = sessions.get_mut(session_id)?;
        session.last_seen = Instant::now();
        session.users.get(scope).cloned()
    }

    fn contains(&self, session_id: &str) -> bool {
        self.write().contains_key(session_id)
    }

    fn insert(&self, session_id: &str, scope: &str, user: U) {
        let now = Instant::now();
        let mut sessions = self.write();
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(now));
        session.last_seen = now;
        session.users.insert(scope.to_string(), user);
    }

    /// Moves the users of `old` (if it is a live session) under `new`.
    fn rotate(&self, old: Option<&str>, new: &str) {
        let mut sessions = self.write();
        let Some(mut session) = old.and_then(|old| sessions.remove(old)) else {
            return;
        };
        session.last_seen = Instant::now();
        sessions.insert(new.to_string(), session);
    }

    // `false` when the session itself is unknown.
    fn remove(&self, session_id: &str, scope: &str) -> bool {
        let mut sessions = self.write();
        match sessions.get_mut(session_id) {
            Some(session) => {
                session.users.remove(scope);
                if session.users.is_empty() {
                    sessions.remove(session_id);
                }
                true
            }
            None => false,
        }
    }
}

/// Session-backed authentication manager.
///
/// Users are kept per session and scope. Hooks are registered once at startup
/// and then shared read-only by every request.
pub struct Manager<U> {
    store: SessionStore<U>,
    after_set_user: Vec<SetUserHook<U>>,
    after_fetch: Vec<FetchHook>,
}

impl<U> fmt::Debug for Manager<U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("after_set_user", &self.after_set_user.len())
            .field("after_fetch", &self.after_fetch.len())
            .finish_non_exhaustive()
    }
}

impl<U: Clone> Default for Manager<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: Clone> Manager<U> {
    pub fn new() -> Self {
        Self::with_session_ttl(DEFAULT_SESSION_TTL)
    }

    /// Manager whose sessions expire after `ttl` without access.
    pub fn with_session_ttl(ttl: Duration) -> Self {
        Self {
            store: SessionStore::new(ttl),
            after_set_user: Vec::new(),
            after_fetch: Vec::new(),
        }
    }

    /// Per-request handle. `session_id` comes from the client (cookie) and
    /// may be unknown to the store.
    pub fn proxy<'r>(&'r self, request: RequestMeta<'r>, session_id: Option<String>) -> Proxy<'r, U> {
        Proxy {
            manager: self,
            request,
            session_id,
            users: HashMap::new(),
            env: Extensions::new(),
        }
    }
}

impl<U> LifecycleEvents<U> for Manager<U> {
    fn on_after_set_user<F>(&mut self, hook: F)
    where
        F: Fn(SetUserEvent<'_, U>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.after_set_user.push(Box::new(hook));
    }

    fn on_after_fetch<F>(&mut self, hook: F)
    where
        F: Fn(FetchEvent<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.after_fetch.push(Box::new(hook));
    }
}

/// Authentication state of a single request.
///
/// Hooks write into the proxy's own environment; `finish` hands it back so the
/// response can carry it to the relay step.
pub struct Proxy<'r, U> {
    manager: &'r Manager<U>,
    request: RequestMeta<'r>,
    session_id: Option<String>,
    users: HashMap<String, U>,
    env: Extensions,
}

impl<'r, U: Clone> Proxy<'r, U> {
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn env(&self) -> &Extensions {
        &self.env
    }

    /// Stores `user` for `scope` in the session and runs the set-user hooks.
    ///
    /// Any event but `Fetch` renews the session id: users already held by a
    /// live session move to the new id, and an id the store does not know is
    /// never adopted.
    pub fn set_user(&mut self, user: U, scope: &str, kind: EventKind) -> Result<(), HookError> {
        let session_id = match kind {
            EventKind::Fetch => match self.session_id.take() {
                Some(id) if self.manager.store.contains(&id) => id,
                _ => Uuid::new_v4().to_string(),
            },
            EventKind::Authentication | EventKind::SetUser => {
                let renewed = Uuid::new_v4().to_string();
                self.manager
                    .store
                    .rotate(self.session_id.as_deref(), &renewed);
                renewed
            }
        };
        self.manager.store.insert(&session_id, scope, user.clone());
        self.session_id = Some(session_id);

        let request = self.request;
        self.users.insert(scope.to_string(), user);
        let user = &self.users[scope];
        for hook in &self.manager.after_set_user {
            hook(SetUserEvent {
                kind,
                user,
                scope,
                request,
                env: &mut self.env,
            })?;
        }
        Ok(())
    }

    /// Returns the user of `scope`, restoring it from the session when this
    /// request has not seen it yet.
    ///
    /// A restore runs the set-user hooks (as `Fetch`) and then the fetch
    /// hooks; if those log the scope out, `None` is returned.
    pub fn user(&mut self, scope: &str) -> Result<Option<U>, HookError> {
        if let Some(user) = self.users.get(scope) {
            return Ok(Some(user.clone()));
        }

        let Some(session_id) = self.session_id.as_deref() else {
            return Ok(None);
        };
        let Some(user) = self.manager.store.get(session_id, scope) else {
            debug!(scope, "no user in session");
            return Ok(None);
        };

        let manager = self.manager;
        let request = self.request;
        self.users.insert(scope.to_string(), user.clone());

        for hook in &manager.after_set_user {
            hook(SetUserEvent {
                kind: EventKind::Fetch,
                user: &user,
                scope,
                request,
                env: &mut self.env,
            })?;
        }
        for hook in &manager.after_fetch {
            hook(FetchEvent {
                scope,
                request,
                logout: &mut *self,
            })?;
        }

        Ok(self.users.get(scope).cloned())
    }

    pub fn finish(self) -> (Extensions, Option<String>) {
        (self.env, self.session_id)
    }
}

impl<U: Clone> ScopeLogout for Proxy<'_, U> {
    fn logout(&mut self, scope: &str) -> Result<(), LogoutError> {
        self.users.remove(scope);
        let Some(session_id) = self.session_id.as_deref() else {
            return Err(LogoutError::NoSession);
        };
        if !self.manager.store.remove(session_id, scope) {
            return Err(LogoutError::NoSession);
        }
        debug!(scope, "scope logged out");
        Ok(())
    }
}
