// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session manager: keeps "who is signed in and what is their profile" in
//! step with the auth service's change stream.
//!
//! State is published as a single [`SessionState`] snapshot on a
//! `tokio::sync::watch` channel. Every state change that starts a profile
//! hydration takes a new generation number; a hydration only commits if
//! the generation is unchanged and its user is still the current user, so
//! a slow fetch for an earlier notification never overwrites a newer one.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

use crate::backend::{AuthBackend, AuthChange, AuthEvent, Database, OAuthProvider, SignUpMetadata};
use crate::error::AuthError;
use crate::models::{AuthUser, Profile, Session, UserType};
use crate::services::profile::{ensure_profile_row, resolve_profile};
use crate::services::registration::{RegistrationError, RegistrationForm};
use crate::services::role_sync::{promote_to_agent, RoleSyncPolicy};

/// Path the identity provider returns to after OAuth.
pub const OAUTH_CALLBACK_PATH: &str = "/auth/callback";

/// Tunables for [`SessionManager`].
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Public site origin used to build the OAuth redirect
    pub site_origin: String,
    pub profile_fetch_timeout: Duration,
    pub role_sync: RoleSyncPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            site_origin: "http://localhost:3000".to_string(),
            profile_fetch_timeout: Duration::from_secs(5),
            role_sync: RoleSyncPolicy::default(),
        }
    }
}

/// Snapshot observed by consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<AuthUser>,
    pub profile: Option<Profile>,
    pub session: Option<Session>,
    /// True until the first reconciliation has completed
    pub loading: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            user: None,
            profile: None,
            session: None,
            loading: true,
        }
    }
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    fn sign_out(&mut self) {
        self.user = None;
        self.profile = None;
        self.session = None;
        self.loading = false;
    }
}

/// Navigation the caller must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// Full page reload at the given path
    Reload(String),
    /// Client-side navigation within the site
    Push(String),
    /// Leave the site (identity provider)
    External(String),
}

/// Profile details collected at registration.
#[derive(Debug, Clone, PartialEq)]
pub struct SignUpRequest {
    pub name: String,
    pub user_type: UserType,
    pub phone: Option<String>,
}

struct Inner {
    auth: Arc<dyn AuthBackend>,
    db: Arc<dyn Database>,
    settings: SessionSettings,
    state: watch::Sender<SessionState>,
    generation: AtomicU64,
    initialized: AtomicBool,
}

/// Reconciles local session state with the auth service.
///
/// Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

/// Keeps the change-stream listener alive. Dropping it unsubscribes.
pub struct SessionHandle {
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn stop(self) {}
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl SessionManager {
    pub fn new(
        auth: Arc<dyn AuthBackend>,
        db: Arc<dyn Database>,
        settings: SessionSettings,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(Inner {
                auth,
                db,
                settings,
                state,
                generation: AtomicU64::new(0),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Current state.
    pub fn snapshot(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    fn current_user_id(&self) -> Option<Uuid> {
        self.inner.state.borrow().user.as_ref().map(|u| u.id)
    }

    /// Subscribe to the auth change stream, initialize, and keep applying
    /// changes until the returned handle is dropped.
    pub fn start(&self) -> SessionHandle {
        // Subscribe before initializing so no change is missed.
        let mut changes = self.inner.auth.subscribe();
        let manager = self.clone();

        let task = tokio::spawn(async move {
            manager.initialize().await;

            // Dropped with this task: aborting the listener aborts its hydrations.
            let mut hydrations = JoinSet::new();
            loop {
                tokio::select! {
                    change = changes.recv() => match change {
                        Ok(change) => {
                            tracing::debug!(event = ?change.event, "Auth change");
                            if let Some((generation, user)) = manager.apply_change(&change, None) {
                                let m = manager.clone();
                                hydrations.spawn(async move { m.hydrate(generation, user).await });
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Auth change stream lagged, resynchronising");
                            if let Some((generation, user)) = manager.resync().await {
                                let m = manager.clone();
                                hydrations.spawn(async move { m.hydrate(generation, user).await });
                            }
                        }
                        Err(RecvError::Closed) => {
                            tracing::debug!("Auth change stream closed");
                            break;
                        }
                    },
                    Some(_) = hydrations.join_next(), if !hydrations.is_empty() => {}
                }
            }

            // Let hydrations already under way finish.
            while hydrations.join_next().await.is_some() {}
        });

        SessionHandle { task }
    }

    /// Load the current session once. Later calls do nothing.
    pub async fn initialize(&self) {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            tracing::debug!("Session manager already initialized");
            return;
        }

        let expected = self.inner.generation.load(Ordering::SeqCst);
        let session = match self.inner.auth.get_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load current session");
                None
            }
        };

        // A change that arrived meanwhile is newer than this lookup.
        let change = AuthChange::new(AuthEvent::InitialSession, session);
        if let Some((generation, user)) = self.apply_change(&change, Some(expected)) {
            self.hydrate(generation, user).await;
        }
    }

    /// Apply one auth change and wait for the resulting profile hydration.
    pub async fn handle_auth_change(&self, change: AuthChange) {
        if let Some((generation, user)) = self.apply_change(&change, None) {
            self.hydrate(generation, user).await;
        }
    }

    /// Re-read the current user's profile.
    pub async fn refresh_profile(&self) {
        let mut target = None;

        // User and generation are taken together under the state lock.
        self.inner.state.send_if_modified(|state| {
            if let Some(user) = &state.user {
                let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                target = Some((generation, user.clone()));
            }
            false
        });

        if let Some((generation, user)) = target {
            self.hydrate(generation, user).await;
        }
    }

    /// Update user/session from `change` synchronously.
    ///
    /// Returns the generation and user to hydrate, if any. With `expected`
    /// set, nothing is applied unless the generation still matches.
    fn apply_change(&self, change: &AuthChange, expected: Option<u64>) -> Option<(u64, AuthUser)> {
        let mut hydrate = None;

        self.inner.state.send_if_modified(|state| {
            let current = self.inner.generation.load(Ordering::SeqCst);
            if expected.is_some_and(|g| g != current) {
                return false;
            }
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

            match (&change.event, &change.session) {
                (AuthEvent::SignedOut, _) | (_, None) => state.sign_out(),
                (_, Some(session)) => {
                    let user = &session.user;
                    if state.profile.as_ref().is_some_and(|p| p.id() != user.id) {
                        state.profile = None;
                    }
                    state.user = Some(user.clone());
                    state.session = Some(session.clone());
                    hydrate = Some((generation, user.clone()));
                }
            }
            true
        });

        hydrate
    }

    /// Fetch the profile of `user` and commit it if still current.
    async fn hydrate(&self, generation: u64, user: AuthUser) {
        let profile = resolve_profile(
            self.inner.db.as_ref(),
            user.id,
            user.email.as_deref(),
            self.inner.settings.profile_fetch_timeout,
        )
        .await;

        let committed = self.inner.state.send_if_modified(|state| {
            let current = self.inner.generation.load(Ordering::SeqCst) == generation
                && state.user.as_ref().map(|u| u.id) == Some(user.id);
            if current {
                state.profile = Some(profile);
                state.loading = false;
            }
            current
        });

        if !committed {
            tracing::debug!(user_id = %user.id, generation, "Discarding stale profile");
        }
    }

    /// Reload state from the auth service after missed notifications.
    ///
    /// Returns the hydration to run, if any.
    async fn resync(&self) -> Option<(u64, AuthUser)> {
        match self.inner.auth.get_session().await {
            Ok(session) => {
                let change = AuthChange::new(AuthEvent::InitialSession, session);
                self.apply_change(&change, None)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session resync failed");
                None
            }
        }
    }

    // ─── Actions ─────────────────────────────────────────────────

    /// Create an account. Agent accounts are promoted after creation;
    /// failures there are logged and do not fail the sign-up.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        request: SignUpRequest,
    ) -> Result<(), AuthError> {
        let metadata = SignUpMetadata {
            name: request.name.clone(),
            user_type: request.user_type,
        };

        let outcome = self
            .inner
            .auth
            .sign_up(email, password, &metadata)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Sign-up rejected");
                AuthError::from(e)
            })?;

        tracing::info!(
            user_id = %outcome.user.id,
            user_type = %request.user_type,
            confirmed = outcome.session.is_some(),
            "Account created"
        );

        if request.user_type == UserType::Agent {
            if let Err(e) = promote_to_agent(
                self.inner.db.as_ref(),
                &outcome.user,
                &request.name,
                request.phone.as_deref(),
                &self.inner.settings.role_sync,
            )
            .await
            {
                tracing::error!(user_id = %outcome.user.id, error = %e, "Agent role sync failed");
            }

            if self.current_user_id() == Some(outcome.user.id) {
                self.refresh_profile().await;
            }
        }

        Ok(())
    }

    /// Validate a registration form, then sign up.
    pub async fn register(&self, form: RegistrationForm) -> Result<(), RegistrationError> {
        let (email, password, request) = form.into_sign_up()?;
        self.sign_up(&email, &password, request).await?;
        Ok(())
    }

    /// Password sign-in. State follows through the change stream.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        self.inner
            .auth
            .sign_in_with_password(email, password)
            .await
            .map(|_| ())
            .map_err(AuthError::from)
    }

    /// Where to send the browser to sign in with Google.
    pub fn sign_in_with_google(&self) -> Result<Navigation, AuthError> {
        let redirect_to = format!(
            "{}{}",
            self.inner.settings.site_origin.trim_end_matches('/'),
            OAUTH_CALLBACK_PATH
        );
        let url = self
            .inner
            .auth
            .oauth_authorize_url(OAuthProvider::Google, &redirect_to)?;
        Ok(Navigation::External(url))
    }

    /// Finish an OAuth round trip on the callback page.
    pub async fn complete_oauth_callback(&self) -> Navigation {
        match self.inner.auth.get_session().await {
            Ok(Some(session)) => {
                if let Err(e) = ensure_profile_row(self.inner.db.as_ref(), &session.user).await {
                    tracing::warn!(
                        user_id = %session.user.id,
                        error = %e,
                        "Could not ensure profile row after OAuth sign-in"
                    );
                }
                Navigation::Push("/".to_string())
            }
            Ok(None) => Navigation::Push("/login".to_string()),
            Err(e) => {
                tracing::error!(error = %e, "OAuth callback session lookup failed");
                Navigation::Push("/login?error=callback_failed".to_string())
            }
        }
    }

    /// Sign out locally, then remotely. Always succeeds.
    pub async fn sign_out(&self) -> Navigation {
        self.inner.state.send_modify(|state| {
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            state.sign_out();
        });

        if let Err(e) = self.inner.auth.sign_out().await {
            tracing::warn!(error = %e, "Remote sign-out failed");
        }

        Navigation::Reload("/".to_string())
    }
}
