// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process auth service and row store.
//!
//! Behaves like the hosted backend closely enough for the session manager
//! and the HTTP API to run against it: accounts, sessions and the change
//! stream, the four application tables, and the "create a `users` row on
//! sign-up" trigger (optionally delayed). Faults and latencies can be
//! injected per operation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{
    AuthBackend, AuthChange, AuthEvent, Database, OAuthProvider, SignUpMetadata, SignUpOutcome,
    AUTH_CHANNEL_CAPACITY,
};
use crate::error::BackendError;
use crate::models::{
    Agent, AgentContactUpdate, AuthUser, Favorite, NewAgent, NewFavorite, NewUserRow, Property,
    PropertyQuery, Session, UserRow, UserType,
};

const MIN_PASSWORD_LEN: usize = 6;
const SESSION_TTL_SECS: i64 = 3600;

/// What the backend does with the `users` table when an account is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileTrigger {
    /// No row is created; the application must provision it.
    Disabled,
    /// A buyer row is created as part of sign-up.
    Immediate,
    /// A buyer row is created after the given delay.
    Delayed(Duration),
}

struct Account {
    user: AuthUser,
    password: Option<String>,
}

#[derive(Default)]
struct Faults {
    get_session: AtomicBool,
    sign_out: AtomicBool,
    user_fetch: AtomicBool,
    user_insert: AtomicBool,
}

/// In-memory backend implementing both [`AuthBackend`] and [`Database`].
pub struct MemoryBackend {
    base_url: String,
    trigger: ProfileTrigger,
    auto_confirm: bool,
    accounts: DashMap<String, Account>,
    session: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthChange>,
    users: Arc<DashMap<Uuid, UserRow>>,
    /// Keyed by `user_id`, which is unique per agent.
    agents: DashMap<Uuid, Agent>,
    properties: DashMap<Uuid, Property>,
    /// Keyed by `(user_id, property_id)`.
    favorites: DashMap<(Uuid, Uuid), Favorite>,
    user_fetch_delays: DashMap<Uuid, Duration>,
    faults: Faults,
}

impl MemoryBackend {
    /// Empty backend with an immediate profile trigger and auto-confirmed sign-ups.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(AUTH_CHANNEL_CAPACITY);
        Self {
            base_url: "http://localhost:54321".to_string(),
            trigger: ProfileTrigger::Immediate,
            auto_confirm: true,
            accounts: DashMap::new(),
            session: RwLock::new(None),
            events,
            users: Arc::new(DashMap::new()),
            agents: DashMap::new(),
            properties: DashMap::new(),
            favorites: DashMap::new(),
            user_fetch_delays: DashMap::new(),
            faults: Faults::default(),
        }
    }

    pub fn with_profile_trigger(mut self, trigger: ProfileTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    /// Require email confirmation: sign-up returns no session.
    pub fn with_email_confirmation(mut self) -> Self {
        self.auto_confirm = false;
        self
    }

    // ─── Fault Injection ─────────────────────────────────────────

    pub fn fail_get_session(&self, fail: bool) {
        self.faults.get_session.store(fail, Ordering::SeqCst);
    }

    pub fn fail_sign_out(&self, fail: bool) {
        self.faults.sign_out.store(fail, Ordering::SeqCst);
    }

    pub fn fail_user_fetch(&self, fail: bool) {
        self.faults.user_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_user_insert(&self, fail: bool) {
        self.faults.user_insert.store(fail, Ordering::SeqCst);
    }

    /// Delay every `users` read for the given id.
    pub fn set_user_fetch_delay(&self, user_id: Uuid, delay: Duration) {
        self.user_fetch_delays.insert(user_id, delay);
    }

    // ─── Seeding & Inspection ────────────────────────────────────

    /// Create an identity without a password and without a `users` row,
    /// as an external identity provider would on first sign-in.
    pub fn create_identity(&self, email: &str) -> AuthUser {
        let user = new_auth_user(email, serde_json::Value::Null);
        self.accounts.insert(
            email.to_lowercase(),
            Account {
                user: user.clone(),
                password: None,
            },
        );
        user
    }

    /// Complete an OAuth sign-in for `email`, creating the identity if needed.
    ///
    /// The profile trigger does not fire for OAuth identities.
    pub async fn complete_oauth_sign_in(&self, email: &str) -> Session {
        let existing = self
            .accounts
            .get(&email.to_lowercase())
            .map(|a| a.user.clone());
        let user = existing.unwrap_or_else(|| self.create_identity(email));
        self.start_session(user).await
    }

    /// Issue a fresh session for `user` without publishing a change.
    pub fn issue_session(&self, user: &AuthUser) -> Session {
        Session {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            token_type: "bearer".to_string(),
            expires_at: Utc::now() + chrono::Duration::seconds(SESSION_TTL_SECS),
            user: user.clone(),
        }
    }

    /// Replace the stored session without publishing a change.
    pub async fn set_session(&self, session: Option<Session>) {
        *self.session.write().await = session;
    }

    /// Publish a change to all subscribers.
    pub fn emit(&self, change: AuthChange) {
        // No subscribers is fine.
        let _ = self.events.send(change);
    }

    pub fn seed_user_row(&self, id: Uuid, email: Option<&str>, user_type: UserType) -> UserRow {
        let row = UserRow {
            id,
            email: email.map(str::to_string),
            user_type,
            created_at: Some(Utc::now()),
        };
        self.users.insert(id, row.clone());
        row
    }

    pub fn seed_agent(&self, user_id: Uuid, name: &str, phone: &str) -> Agent {
        let agent = Agent {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            phone: phone.to_string(),
            whatsapp: phone.to_string(),
            profile_photo: None,
            credits_balance: 0,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        self.agents.insert(user_id, agent.clone());
        agent
    }

    pub fn seed_property(&self, property: Property) {
        self.properties.insert(property.id, property);
    }

    pub fn user_row(&self, id: Uuid) -> Option<UserRow> {
        self.users.get(&id).map(|r| r.clone())
    }

    pub fn user_row_count(&self) -> usize {
        self.users.len()
    }

    pub fn agent_for_user(&self, user_id: Uuid) -> Option<Agent> {
        self.agents.get(&user_id).map(|a| a.clone())
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    // ─── Internals ───────────────────────────────────────────────

    async fn start_session(&self, mut user: AuthUser) -> Session {
        user.last_sign_in_at = Some(Utc::now());
        if let Some(email) = &user.email {
            if let Some(mut account) = self.accounts.get_mut(&email.to_lowercase()) {
                account.user.last_sign_in_at = user.last_sign_in_at;
            }
        }

        let session = self.issue_session(&user);
        *self.session.write().await = Some(session.clone());
        self.emit(AuthChange::new(AuthEvent::SignedIn, Some(session.clone())));
        session
    }

    fn run_profile_trigger(&self, user: &AuthUser) {
        let row = UserRow {
            id: user.id,
            email: user.email.clone(),
            user_type: UserType::Buyer,
            created_at: Some(Utc::now()),
        };

        match self.trigger {
            ProfileTrigger::Disabled => {}
            ProfileTrigger::Immediate => {
                self.users.entry(row.id).or_insert(row);
            }
            ProfileTrigger::Delayed(delay) => {
                let users = Arc::clone(&self.users);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    users.entry(row.id).or_insert(row);
                });
            }
        }
    }

    fn simulated_failure(what: &str) -> BackendError {
        BackendError::Api {
            status: 500,
            message: format!("simulated {} failure", what),
        }
    }

    fn conflict(constraint: &str) -> BackendError {
        BackendError::Api {
            status: BackendError::CONFLICT,
            message: format!(
                "duplicate key value violates unique constraint \"{}\"",
                constraint
            ),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn new_auth_user(email: &str, metadata: serde_json::Value) -> AuthUser {
    AuthUser {
        id: Uuid::new_v4(),
        email: Some(email.to_string()),
        created_at: Utc::now(),
        last_sign_in_at: None,
        user_metadata: metadata,
    }
}

#[async_trait]
impl AuthBackend for MemoryBackend {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        if self.faults.get_session.load(Ordering::SeqCst) {
            return Err(BackendError::Network("session lookup failed".to_string()));
        }
        Ok(self.session.read().await.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let user = self
            .accounts
            .get(&email.to_lowercase())
            .filter(|a| a.password.as_deref() == Some(password))
            .map(|a| a.user.clone())
            .ok_or_else(|| BackendError::Auth("Invalid login credentials".to_string()))?;

        Ok(self.start_session(user).await)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpOutcome, BackendError> {
        if !email.contains('@') {
            return Err(BackendError::Auth(
                "Unable to validate email address: invalid format".to_string(),
            ));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(BackendError::Auth(
                "Password should be at least 6 characters.".to_string(),
            ));
        }

        let key = email.to_lowercase();
        if self.accounts.contains_key(&key) {
            return Err(BackendError::Auth("User already registered".to_string()));
        }

        let metadata = serde_json::to_value(metadata)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        let user = new_auth_user(email, metadata);
        self.accounts.insert(
            key,
            Account {
                user: user.clone(),
                password: Some(password.to_string()),
            },
        );
        self.run_profile_trigger(&user);

        let session = if self.auto_confirm {
            Some(self.start_session(user.clone()).await)
        } else {
            None
        };

        Ok(SignUpOutcome { user, session })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        if self.faults.sign_out.load(Ordering::SeqCst) {
            return Err(BackendError::Network("sign-out request failed".to_string()));
        }
        *self.session.write().await = None;
        self.emit(AuthChange::signed_out());
        Ok(())
    }

    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<String, BackendError> {
        Ok(format!(
            "{}/auth/v1/authorize?provider={}&redirect_to={}",
            self.base_url,
            provider.as_str(),
            urlencoding::encode(redirect_to)
        ))
    }
}

#[async_trait]
impl Database for MemoryBackend {
    async fn get_user_row(&self, id: Uuid) -> Result<UserRow, BackendError> {
        let delay = self.user_fetch_delays.get(&id).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.faults.user_fetch.load(Ordering::SeqCst) {
            return Err(Self::simulated_failure("users select"));
        }
        self.user_row(id).ok_or(BackendError::NoRows)
    }

    async fn insert_user_row(&self, row: &NewUserRow) -> Result<UserRow, BackendError> {
        if self.faults.user_insert.load(Ordering::SeqCst) {
            return Err(Self::simulated_failure("users insert"));
        }
        let stored = UserRow {
            id: row.id,
            email: row.email.clone(),
            user_type: row.user_type,
            created_at: Some(Utc::now()),
        };
        match self.users.entry(row.id) {
            Entry::Occupied(_) => Err(Self::conflict("users_pkey")),
            Entry::Vacant(slot) => {
                slot.insert(stored.clone());
                Ok(stored)
            }
        }
    }

    async fn update_user_type(
        &self,
        id: Uuid,
        user_type: UserType,
    ) -> Result<UserRow, BackendError> {
        let mut row = self.users.get_mut(&id).ok_or(BackendError::NoRows)?;
        row.user_type = user_type;
        Ok(row.clone())
    }

    async fn get_agent(&self, id: Uuid) -> Result<Agent, BackendError> {
        self.agents
            .iter()
            .find(|a| a.id == id)
            .map(|a| a.clone())
            .ok_or(BackendError::NoRows)
    }

    async fn get_agent_by_user_id(&self, user_id: Uuid) -> Result<Agent, BackendError> {
        self.agent_for_user(user_id).ok_or(BackendError::NoRows)
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, BackendError> {
        let mut agents: Vec<Agent> = self.agents.iter().map(|a| a.clone()).collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(agents)
    }

    async fn insert_agent(&self, agent: &NewAgent) -> Result<Agent, BackendError> {
        let Entry::Vacant(slot) = self.agents.entry(agent.user_id) else {
            return Err(Self::conflict("agents_user_id_key"));
        };
        let now = Utc::now();
        let stored = Agent {
            id: Uuid::new_v4(),
            user_id: agent.user_id,
            name: agent.name.clone(),
            phone: agent.phone.clone(),
            whatsapp: agent.whatsapp.clone(),
            profile_photo: None,
            credits_balance: 0,
            created_at: Some(now),
            updated_at: Some(now),
        };
        slot.insert(stored.clone());
        Ok(stored)
    }

    async fn update_agent_contact(
        &self,
        user_id: Uuid,
        update: &AgentContactUpdate,
    ) -> Result<Agent, BackendError> {
        let mut agent = self.agents.get_mut(&user_id).ok_or(BackendError::NoRows)?;
        agent.name = update.name.clone();
        agent.phone = update.phone.clone();
        agent.whatsapp = update.whatsapp.clone();
        agent.updated_at = Some(update.updated_at);
        Ok(agent.clone())
    }

    async fn get_property(&self, id: Uuid) -> Result<Property, BackendError> {
        self.properties
            .get(&id)
            .map(|p| p.clone())
            .ok_or(BackendError::NoRows)
    }

    async fn query_properties(
        &self,
        query: &PropertyQuery,
    ) -> Result<Vec<Property>, BackendError> {
        let mut rows: Vec<Property> = self
            .properties
            .iter()
            .filter(|p| query.matches(p))
            .map(|p| p.clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn list_favorites(&self, user_id: Uuid) -> Result<Vec<Favorite>, BackendError> {
        let mut rows: Vec<Favorite> = self
            .favorites
            .iter()
            .filter(|f| f.user_id == user_id)
            .map(|f| f.clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_favorite(&self, favorite: &NewFavorite) -> Result<Favorite, BackendError> {
        let key = (favorite.user_id, favorite.property_id);
        let Entry::Vacant(slot) = self.favorites.entry(key) else {
            return Err(Self::conflict("favorites_user_id_property_id_key"));
        };
        let stored = Favorite {
            id: Uuid::new_v4(),
            user_id: favorite.user_id,
            property_id: favorite.property_id,
            created_at: Utc::now(),
        };
        slot.insert(stored.clone());
        Ok(stored)
    }

    async fn delete_favorite(&self, user_id: Uuid, property_id: Uuid) -> Result<(), BackendError> {
        self.favorites.remove(&(user_id, property_id));
        Ok(())
    }
}
