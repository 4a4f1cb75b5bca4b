//! Session emulation.
//!
//! Sign-up and sign-in always succeed: unknown emails are enrolled on the
//! spot and passwords are stored as given and never checked. This is a
//! stand-in for a hosted auth service during local runs, not a security
//! boundary.

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids;
use crate::records::Role;
use crate::storage::{read_json, write_json, KeyValueStore, StorageKeys};

/// The identity stored in the session and under the user key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
}

/// Entry in the email-keyed users map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
}

impl UserRecord {
    pub fn session_user(&self) -> SessionUser {
        SessionUser {
            id: self.id.clone(),
            email: self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthChangeEvent {
    #[serde(rename = "SIGNED_IN")]
    SignedIn,
    #[serde(rename = "SIGNED_OUT")]
    SignedOut,
}

impl AuthChangeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthChangeEvent::SignedIn => "SIGNED_IN",
            AuthChangeEvent::SignedOut => "SIGNED_OUT",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub role: Option<Role>,
}

impl SignUpRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            full_name: String::new(),
            role: None,
        }
    }

    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: UserRecord,
    pub session: Session,
}

type UsersByEmail = BTreeMap<String, UserRecord>;

pub type AuthListener = dyn Fn(AuthChangeEvent, Option<&Session>) + Send + Sync;

/// Auth state listeners, keyed by subscription id.
///
/// Ids come from a monotonic counter, so iterating the map visits listeners
/// in registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<BTreeMap<u64, Arc<AuthListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> u64
    where
        F: Fn(AuthChangeEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, Arc::new(listener));
        debug!("Auth listener {id} subscribed");
        id
    }

    /// Returns `false` when `id` was not subscribed.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!("Auth listener {id} unsubscribed");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every listener in registration order. A panicking listener is
    /// logged and skipped; the rest still run.
    pub fn notify(&self, event: AuthChangeEvent, session: Option<&Session>) {
        // Snapshot first so listeners may subscribe or unsubscribe re-entrantly.
        let snapshot: Vec<(u64, Arc<AuthListener>)> = self
            .lock()
            .iter()
            .map(|(id, listener)| (*id, Arc::clone(listener)))
            .collect();

        for (id, listener) in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener(event, session)));
            if outcome.is_err() {
                warn!("Auth listener {id} panicked on {}", event.as_str());
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, Arc<AuthListener>>> {
        self.listeners.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Handle returned by [`Auth::on_auth_state_change`].
///
/// Dropping it keeps the listener registered; call
/// [`AuthSubscription::unsubscribe`] to remove it.
#[derive(Debug, Clone)]
pub struct AuthSubscription {
    id: u64,
    registry: Weak<ListenerRegistry>,
}

impl AuthSubscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns `false` if already unsubscribed or the client is gone.
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.unsubscribe(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Auth operations over a borrowed store. Obtained from
/// [`crate::client::LocalClient::auth`].
pub struct Auth<'a, S: ?Sized> {
    store: &'a S,
    keys: &'a StorageKeys,
    listeners: &'a Arc<ListenerRegistry>,
}

impl<'a, S: KeyValueStore + ?Sized> Auth<'a, S> {
    pub(crate) fn new(store: &'a S, keys: &'a StorageKeys, listeners: &'a Arc<ListenerRegistry>) -> Self {
        Self { store, keys, listeners }
    }

    /// Creates the user if the email is new, then opens a session for it.
    ///
    /// A repeated sign-up with a known email keeps the stored record and its
    /// id; only the session is replaced. A supplied role is written to the
    /// legacy user id -> role map.
    pub fn sign_up(&self, request: SignUpRequest) -> Result<AuthResponse> {
        let mut users = self.users();
        let user = match users.get(&request.email) {
            Some(existing) => {
                debug!("Sign-up for known email {}; reusing {}", request.email, existing.id);
                existing.clone()
            }
            None => {
                let user = UserRecord {
                    id: ids::user_id(),
                    email: request.email.clone(),
                    password: request.password.clone(),
                    full_name: request.full_name.clone(),
                };
                users.insert(request.email.clone(), user.clone());
                write_json(self.store, &self.keys.users(), &users)?;
                info!("Enrolled {} as {}", user.email, user.id);
                user
            }
        };

        if let Some(role) = request.role {
            let mut roles: BTreeMap<String, Role> =
                read_json(self.store, &self.keys.roles()).unwrap_or_default();
            roles.insert(user.id.clone(), role);
            write_json(self.store, &self.keys.roles(), &roles)?;
        }

        self.open_session(user)
    }

    /// Signs in any email with any password, enrolling unknown emails.
    pub fn sign_in_with_password(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let mut users = self.users();
        let user = match users.get(email) {
            Some(existing) => existing.clone(),
            None => {
                let user = UserRecord {
                    id: ids::user_id(),
                    email: email.to_string(),
                    password: password.to_string(),
                    full_name: String::new(),
                };
                users.insert(email.to_string(), user.clone());
                write_json(self.store, &self.keys.users(), &users)?;
                info!("Auto-enrolled {} on sign-in as {}", email, user.id);
                user
            }
        };

        self.open_session(user)
    }

    /// Both keys are removed and listeners notified even if one removal
    /// fails; the first failure is returned afterwards.
    pub fn sign_out(&self) -> Result<()> {
        let session = self.store.remove_item(&self.keys.session());
        let user = self.store.remove_item(&self.keys.user());
        match (&session, &user) {
            (Ok(()), Ok(())) => info!("Signed out"),
            _ => warn!("Signed out with a storage failure"),
        }
        self.listeners.notify(AuthChangeEvent::SignedOut, None);
        session.and(user)
    }

    pub fn get_session(&self) -> Option<Session> {
        read_json(self.store, &self.keys.session())
    }

    pub fn get_user(&self) -> Option<SessionUser> {
        read_json(self.store, &self.keys.user())
    }

    /// Full stored record of the signed-in user.
    pub fn get_user_record(&self) -> Option<UserRecord> {
        let user = self.get_user()?;
        self.users().remove(&user.email)
    }

    pub fn on_auth_state_change<F>(&self, listener: F) -> AuthSubscription
    where
        F: Fn(AuthChangeEvent, Option<&Session>) + Send + Sync + 'static,
    {
        let id = self.listeners.subscribe(listener);
        AuthSubscription {
            id,
            registry: Arc::downgrade(self.listeners),
        }
    }

    fn users(&self) -> UsersByEmail {
        read_json(self.store, &self.keys.users()).unwrap_or_default()
    }

    fn open_session(&self, user: UserRecord) -> Result<AuthResponse> {
        let session = Session {
            user: user.session_user(),
        };
        write_json(self.store, &self.keys.session(), &session)?;
        write_json(self.store, &self.keys.user(), &session.user)?;
        self.listeners.notify(AuthChangeEvent::SignedIn, Some(&session));
        Ok(AuthResponse { user, session })
    }
}
