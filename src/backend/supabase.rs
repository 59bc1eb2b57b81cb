// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP client for the hosted auth service and row store.
//!
//! Handles:
//! - Password sign-in, sign-up and sign-out (`/auth/v1`)
//! - Session caching with refresh shortly before expiry
//! - The auth change stream for subscribers
//! - Typed row access through the REST interface (`/rest/v1`)

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use super::{
    tables, AuthBackend, AuthChange, AuthEvent, Database, OAuthProvider, SignUpMetadata,
    SignUpOutcome, AUTH_CHANNEL_CAPACITY,
};
use crate::config::Config;
use crate::error::BackendError;
use crate::models::{
    Agent, AgentContactUpdate, AuthUser, Favorite, NewAgent, NewFavorite, NewUserRow, Property,
    PropertyQuery, Session, UserRow, UserType,
};

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;
/// Lifetime assumed when the service does not report one.
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;
/// Media type asking the REST interface for exactly one object.
const OBJECT_MEDIA_TYPE: &str = "application/vnd.pgrst.object+json";
/// REST error code for "single object requested, zero rows matched".
const NO_ROWS_CODE: &str = "PGRST116";

/// Which API produced an error response.
#[derive(Clone, Copy)]
enum Surface {
    Auth,
    Rest,
}

/// Client for the hosted backend.
///
/// One instance models one browser tab: it holds at most one session and
/// sends that session's access token with row requests. Share it behind an
/// `Arc`.
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    session: RwLock<Option<Session>>,
    /// Serialises token refreshes so only one request is in flight.
    refresh_lock: Mutex<()>,
    events: broadcast::Sender<AuthChange>,
}

impl SupabaseClient {
    /// Create a client for `base_url` authenticating with `api_key`.
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let (events, _) = broadcast::channel(AUTH_CHANNEL_CAPACITY);
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            session: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            events,
        }
    }

    /// Client for server-side row access.
    pub fn server(config: &Config) -> Self {
        Self::new(&config.supabase_url, config.server_api_key())
    }

    /// Adopt tokens handed to the OAuth callback and publish `SignedIn`.
    pub async fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<Session, BackendError> {
        let response = self
            .http
            .get(self.auth_endpoint("user"))
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let user: AuthUser = self.check_response_json(response, Surface::Auth).await?;

        let session = Session {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            token_type: "bearer".to_string(),
            expires_at: Utc::now() + Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
            user,
        };
        self.store_session(session.clone(), AuthEvent::SignedIn).await;
        Ok(session)
    }

    fn auth_endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn publish(&self, change: AuthChange) {
        // No subscribers is fine.
        let _ = self.events.send(change);
    }

    async fn store_session(&self, session: Session, event: AuthEvent) {
        *self.session.write().await = Some(session.clone());
        self.publish(AuthChange::new(event, Some(session)));
    }

    async fn clear_session(&self) {
        *self.session.write().await = None;
        self.publish(AuthChange::signed_out());
    }

    /// Token sent as `Authorization`: the session's access token, or the API key.
    async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.api_key.clone())
    }

    /// Exchange a refresh token for a new session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, BackendError> {
        let response = self
            .http
            .post(self.auth_endpoint("token"))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let tokens: TokenResponse = self.check_response_json(response, Surface::Auth).await?;
        Ok(tokens.into_session())
    }

    /// Check response status and return error if not successful.
    async fn check_response(
        &self,
        response: Response,
        surface: Surface,
    ) -> Result<Response, BackendError> {
        if response.status().is_success() {
            return Ok(response);
        }
        Err(error_from_response(response, surface).await)
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: Response,
        surface: Surface,
    ) -> Result<T, BackendError> {
        let response = self.check_response(response, surface).await?;
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(format!("JSON parse error: {}", e)))
    }

    // ─── REST helpers ────────────────────────────────────────────

    async fn rest_request(&self, method: Method, table: &str) -> RequestBuilder {
        let bearer = self.bearer().await;
        self.http
            .request(method, self.rest_endpoint(table))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: Vec<(String, String)>,
    ) -> Result<T, BackendError> {
        let mut params = vec![select_all()];
        params.extend(filters);

        let response = self
            .rest_request(Method::GET, table)
            .await
            .query(&params)
            .header(ACCEPT, OBJECT_MEDIA_TYPE)
            .send()
            .await?;
        self.check_response_json(response, Surface::Rest).await
    }

    async fn select_many<T: DeserializeOwned>(
        &self,
        table: &str,
        params: Vec<(String, String)>,
    ) -> Result<Vec<T>, BackendError> {
        let response = self
            .rest_request(Method::GET, table)
            .await
            .query(&params)
            .send()
            .await?;
        self.check_response_json(response, Surface::Rest).await
    }

    async fn insert_one<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        table: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .rest_request(Method::POST, table)
            .await
            .header("Prefer", "return=representation")
            .header(ACCEPT, OBJECT_MEDIA_TYPE)
            .json(body)
            .send()
            .await?;
        self.check_response_json(response, Surface::Rest).await
    }

    /// Update exactly one row; zero matches surface as `NoRows`.
    async fn update_one<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        table: &str,
        filters: Vec<(String, String)>,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .rest_request(Method::PATCH, table)
            .await
            .query(&filters)
            .header("Prefer", "return=representation")
            .header(ACCEPT, OBJECT_MEDIA_TYPE)
            .json(body)
            .send()
            .await?;
        self.check_response_json(response, Surface::Rest).await
    }

    async fn delete_where(
        &self,
        table: &str,
        filters: Vec<(String, String)>,
    ) -> Result<(), BackendError> {
        let response = self
            .rest_request(Method::DELETE, table)
            .await
            .query(&filters)
            .send()
            .await?;
        self.check_response(response, Surface::Rest).await?;
        Ok(())
    }
}

/// Map a failed response to a [`BackendError`].
async fn error_from_response(response: Response, surface: Surface) -> BackendError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
    let message = parsed.message().unwrap_or_else(|| {
        if body.is_empty() {
            status.to_string()
        } else {
            body.clone()
        }
    });

    match surface {
        Surface::Rest if parsed.code() == Some(NO_ROWS_CODE) => BackendError::NoRows,
        Surface::Auth if status.is_client_error() => BackendError::Auth(message),
        _ => {
            tracing::warn!(status = %status, error = %message, "Backend request failed");
            BackendError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}

fn select_all() -> (String, String) {
    ("select".to_string(), "*".to_string())
}

fn eq(column: &str, value: impl std::fmt::Display) -> (String, String) {
    (column.to_string(), format!("eq.{}", value))
}

fn order(column: &str, ascending: bool) -> (String, String) {
    let direction = if ascending { "asc" } else { "desc" };
    ("order".to_string(), format!("{}.{}", column, direction))
}

/// Render a listing query as REST query parameters.
pub fn property_query_params(query: &PropertyQuery) -> Vec<(String, String)> {
    let f = &query.filters;
    let mut params = vec![select_all()];

    if let Some(status) = query.status {
        params.push(eq("status", status.as_str()));
    }
    if let Some(location) = &f.location {
        params.push(("location".to_string(), format!("ilike.*{}*", location)));
    }
    if let Some(property_type) = &f.property_type {
        params.push(eq("property_type", property_type));
    }
    if let Some(min) = f.min_price {
        params.push(("price".to_string(), format!("gte.{}", min)));
    }
    if let Some(max) = f.max_price {
        params.push(("price".to_string(), format!("lte.{}", max)));
    }
    if let Some(bedrooms) = f.bedrooms {
        params.push(("bedrooms".to_string(), format!("gte.{}", bedrooms)));
    }
    if let Some(id) = query.exclude_id {
        params.push(("id".to_string(), format!("neq.{}", id)));
    }

    params.push(order("created_at", false));
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

#[async_trait]
impl AuthBackend for SupabaseClient {
    async fn get_session(&self) -> Result<Option<Session>, BackendError> {
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        // Fast path: cached session still valid
        match self.session.read().await.as_ref() {
            None => return Ok(None),
            Some(s) if !s.expires_within(margin) => return Ok(Some(s.clone())),
            Some(_) => {}
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we were waiting.
        let current = match self.session.read().await.clone() {
            None => return Ok(None),
            Some(s) if !s.expires_within(margin) => return Ok(Some(s)),
            Some(s) => s,
        };

        tracing::info!(user_id = %current.user.id, "Access token expiring, refreshing");

        match self.refresh_session(&current.refresh_token).await {
            Ok(session) => {
                self.store_session(session.clone(), AuthEvent::TokenRefreshed)
                    .await;
                Ok(Some(session))
            }
            Err(BackendError::Auth(msg)) => {
                tracing::warn!(
                    user_id = %current.user.id,
                    error = %msg,
                    "Refresh token rejected, ending session"
                );
                self.clear_session().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, BackendError> {
        let response = self
            .http
            .post(self.auth_endpoint("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        let tokens: TokenResponse = self.check_response_json(response, Surface::Auth).await?;
        let session = tokens.into_session();
        self.store_session(session.clone(), AuthEvent::SignedIn).await;

        tracing::info!(user_id = %session.user.id, "Signed in with password");
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        metadata: &SignUpMetadata,
    ) -> Result<SignUpOutcome, BackendError> {
        let response = self
            .http
            .post(self.auth_endpoint("signup"))
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": metadata,
            }))
            .send()
            .await?;

        let body: serde_json::Value = self.check_response_json(response, Surface::Auth).await?;

        // Auto-confirmed projects return a session; otherwise just the user.
        if body.get("access_token").is_some() {
            let tokens: TokenResponse = serde_json::from_value(body)
                .map_err(|e| BackendError::Decode(e.to_string()))?;
            let session = tokens.into_session();
            self.store_session(session.clone(), AuthEvent::SignedIn)
                .await;
            return Ok(SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            });
        }

        let user: AuthUser =
            serde_json::from_value(body).map_err(|e| BackendError::Decode(e.to_string()))?;
        tracing::info!(user_id = %user.id, "Account created, awaiting email confirmation");
        Ok(SignUpOutcome {
            user,
            session: None,
        })
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        let access_token = self
            .session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone());

        // The local session is dropped even if the revoke request fails.
        let result = match access_token {
            Some(token) => {
                let response = self
                    .http
                    .post(self.auth_endpoint("logout"))
                    .header("apikey", &self.api_key)
                    .bearer_auth(token)
                    .send()
                    .await;
                match response {
                    Ok(response) => self
                        .check_response(response, Surface::Auth)
                        .await
                        .map(|_| ()),
                    Err(e) => Err(e.into()),
                }
            }
            None => Ok(()),
        };

        self.clear_session().await;
        result
    }

    fn oauth_authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
    ) -> Result<String, BackendError> {
        Ok(format!(
            "{}?provider={}&redirect_to={}",
            self.auth_endpoint("authorize"),
            provider.as_str(),
            urlencoding::encode(redirect_to)
        ))
    }
}

#[async_trait]
impl Database for SupabaseClient {
    async fn get_user_row(&self, id: Uuid) -> Result<UserRow, BackendError> {
        self.select_one(tables::USERS, vec![eq("id", id)]).await
    }

    async fn insert_user_row(&self, row: &NewUserRow) -> Result<UserRow, BackendError> {
        self.insert_one(tables::USERS, row).await
    }

    async fn update_user_type(
        &self,
        id: Uuid,
        user_type: UserType,
    ) -> Result<UserRow, BackendError> {
        self.update_one(
            tables::USERS,
            vec![eq("id", id)],
            &serde_json::json!({ "user_type": user_type }),
        )
        .await
    }

    async fn get_agent(&self, id: Uuid) -> Result<Agent, BackendError> {
        self.select_one(tables::AGENTS, vec![eq("id", id)]).await
    }

    async fn get_agent_by_user_id(&self, user_id: Uuid) -> Result<Agent, BackendError> {
        self.select_one(tables::AGENTS, vec![eq("user_id", user_id)])
            .await
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, BackendError> {
        self.select_many(tables::AGENTS, vec![select_all(), order("name", true)])
            .await
    }

    async fn insert_agent(&self, agent: &NewAgent) -> Result<Agent, BackendError> {
        self.insert_one(tables::AGENTS, agent).await
    }

    async fn update_agent_contact(
        &self,
        user_id: Uuid,
        update: &AgentContactUpdate,
    ) -> Result<Agent, BackendError> {
        self.update_one(tables::AGENTS, vec![eq("user_id", user_id)], update)
            .await
    }

    async fn get_property(&self, id: Uuid) -> Result<Property, BackendError> {
        self.select_one(tables::PROPERTIES, vec![eq("id", id)]).await
    }

    async fn query_properties(
        &self,
        query: &PropertyQuery,
    ) -> Result<Vec<Property>, BackendError> {
        self.select_many(tables::PROPERTIES, property_query_params(query))
            .await
    }

    async fn list_favorites(&self, user_id: Uuid) -> Result<Vec<Favorite>, BackendError> {
        self.select_many(
            tables::FAVORITES,
            vec![
                select_all(),
                eq("user_id", user_id),
                order("created_at", false),
            ],
        )
        .await
    }

    async fn insert_favorite(&self, favorite: &NewFavorite) -> Result<Favorite, BackendError> {
        self.insert_one(tables::FAVORITES, favorite).await
    }

    async fn delete_favorite(&self, user_id: Uuid, property_id: Uuid) -> Result<(), BackendError> {
        self.delete_where(
            tables::FAVORITES,
            vec![eq("user_id", user_id), eq("property_id", property_id)],
        )
        .await
    }
}

/// Token grant response from the auth service.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix timestamp
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| {
                Utc::now() + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS))
            });

        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: self.user,
        }
    }
}

/// Error body shapes used by the auth service and the REST interface.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    /// REST error code (string) or auth HTTP code (number)
    #[serde(default)]
    code: Option<serde_json::Value>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn message(&self) -> Option<String> {
        self.msg
            .as_ref()
            .or(self.error_description.as_ref())
            .or(self.message.as_ref())
            .or(self.error.as_ref())
            .cloned()
    }

    fn code(&self) -> Option<&str> {
        self.code.as_ref().and_then(|c| c.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SearchFilters;

    #[test]
    fn test_property_query_params() {
        let id = Uuid::new_v4();
        let query = PropertyQuery::active()
            .with_filters(SearchFilters {
                location: Some("Bangsar".to_string()),
                property_type: Some("Condo".to_string()),
                min_price: Some(500_000.0),
                max_price: None,
                bedrooms: Some(3),
            })
            .excluding(id)
            .limit(3);

        let params = property_query_params(&query);
        let get = |k: &str| -> Vec<&str> {
            params
                .iter()
                .filter(|(key, _)| key == k)
                .map(|(_, v)| v.as_str())
                .collect()
        };

        assert_eq!(get("status"), vec!["eq.active"]);
        assert_eq!(get("location"), vec!["ilike.*Bangsar*"]);
        assert_eq!(get("property_type"), vec!["eq.Condo"]);
        assert_eq!(get("price"), vec!["gte.500000"]);
        assert_eq!(get("bedrooms"), vec!["gte.3"]);
        assert_eq!(get("id"), vec![format!("neq.{}", id).as_str()]);
        assert_eq!(get("order"), vec!["created_at.desc"]);
        assert_eq!(get("limit"), vec!["3"]);
    }

    #[test]
    fn test_error_body_prefers_auth_message() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"code":400,"error_code":"invalid_credentials","msg":"Invalid login credentials"}"#,
        )
        .unwrap();

        assert_eq!(body.message().as_deref(), Some("Invalid login credentials"));
        assert_eq!(body.code(), None);
    }

    #[test]
    fn test_token_response_uses_reported_expiry() {
        let tokens: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_at": 1_900_000_000,
            "user": {
                "id": Uuid::new_v4(),
                "email": "a@test.com",
                "created_at": "2025-01-01T00:00:00Z"
            }
        }))
        .unwrap();

        let session = tokens.into_session();
        assert_eq!(session.expires_at.timestamp(), 1_900_000_000);
        assert_eq!(session.token_type, "bearer");
    }
}
