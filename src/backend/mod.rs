// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Boundary to the hosted auth service and row store.
//!
//! Two object-safe traits describe everything the application needs:
//! - [`AuthBackend`]: sessions, sign-in/up/out and the change stream
//! - [`Database`]: typed reads and writes over the application tables
//!
//! [`SupabaseClient`] talks to the hosted service over HTTP and
//! [`MemoryBackend`] keeps everything in process.

pub mod memory;
pub mod supabase;

pub use memory::MemoryBackend;
pub use supabase::SupabaseClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::BackendError;
use crate::models::{
    Agent, AgentContactUpdate, AuthUser, Favorite, NewAgent, NewFavorite, NewUserRow, Property,
    PropertyQuery, Session, UserRow, UserType,
};

/// Table names as constants.
pub mod tables {
    pub const USERS: &str = "users";
    pub const AGENTS: &str = "agents";
    pub const PROPERTIES: &str = "properties";
    pub const FAVORITES: &str = "favorites";
}

/// Capacity of the auth change channel.
pub const AUTH_CHANNEL_CAPACITY: usize = 32;

/// Kind of auth state change published by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A single notification on the auth change stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthChange {
    pub event: AuthEvent,
    pub session: Option<Session>,
}

impl AuthChange {
    pub fn new(event: AuthEvent, session: Option<Session>) -> Self {
        Self { event, session }
    }

    pub fn signed_out() -> Self {
        Self::new(AuthEvent::SignedOut, None)
    }
}

/// Metadata attached to the identity at sign-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignUpMetadata {
    pub name: String,
    pub user_type: UserType,
}

/// Result of a successful sign-up.
///
/// `session` is `None` when the account still needs email confirmation.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<Session>,
}

/// External identity providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
        }
    }
}

/// Managed authentication service.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Current session, if any (refreshed transparently when near expiry).
    async fn get_session(&self) -> Result<Option<Session>, BackendError>;

    /// Subscribe to auth changes. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<AuthChange>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpOutcome, BackendError>;

    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Provider authorisation URL that returns the browser to `redirect_to`.
    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<String, BackendError>;
}

/// Managed row store.
///
/// Single-row reads return [`BackendError::NoRows`] when nothing matches.
#[async_trait]
pub trait Database: Send + Sync {
    // ─── users ───────────────────────────────────────────────────
    async fn get_user_row(&self, id: Uuid) -> Result<UserRow, BackendError>;
    async fn insert_user_row(&self, row: &NewUserRow) -> Result<UserRow, BackendError>;
    /// Set `user_type`; `NoRows` if the row does not exist.
    async fn update_user_type(&self, id: Uuid, user_type: UserType)
        -> Result<UserRow, BackendError>;

    // ─── agents ──────────────────────────────────────────────────
    async fn get_agent(&self, id: Uuid) -> Result<Agent, BackendError>;
    async fn get_agent_by_user_id(&self, user_id: Uuid) -> Result<Agent, BackendError>;
    /// All agents ordered by name.
    async fn list_agents(&self) -> Result<Vec<Agent>, BackendError>;
    async fn insert_agent(&self, agent: &NewAgent) -> Result<Agent, BackendError>;
    async fn update_agent_contact(
        &self,
        user_id: Uuid,
        update: &AgentContactUpdate,
    ) -> Result<Agent, BackendError>;

    // ─── properties ──────────────────────────────────────────────
    async fn get_property(&self, id: Uuid) -> Result<Property, BackendError>;
    async fn query_properties(&self, query: &PropertyQuery)
        -> Result<Vec<Property>, BackendError>;

    // ─── favorites ───────────────────────────────────────────────
    /// Favourites of a user, newest first.
    async fn list_favorites(&self, user_id: Uuid) -> Result<Vec<Favorite>, BackendError>;
    async fn insert_favorite(&self, favorite: &NewFavorite) -> Result<Favorite, BackendError>;
    /// Delete a favourite; deleting a missing one succeeds.
    async fn delete_favorite(&self, user_id: Uuid, property_id: Uuid)
        -> Result<(), BackendError>;
}
