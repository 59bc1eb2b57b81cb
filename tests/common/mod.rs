// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Response;
use chrono::{TimeZone, Utc};
use superhomes::backend::MemoryBackend;
use superhomes::config::Config;
use superhomes::middleware::auth::create_jwt;
use superhomes::models::{Property, PropertyStatus};
use superhomes::routes::create_router;
use superhomes::services::{RoleSyncPolicy, SessionManager, SessionSettings, SessionState};
use superhomes::AppState;
use uuid::Uuid;

/// Create a test app over an in-memory backend.
/// Returns the router and the backend for seeding.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let state = Arc::new(AppState::new(Config::default(), backend.clone()));
    (create_router(state), backend)
}

/// Access token for `user_id` signed with the test secret.
#[allow(dead_code)]
pub fn token_for(user_id: Uuid, email: Option<&str>) -> String {
    create_jwt(user_id, email, &Config::default().jwt_secret).unwrap()
}

/// Session settings with short delays for tests.
#[allow(dead_code)]
pub fn test_settings() -> SessionSettings {
    SessionSettings {
        profile_fetch_timeout: Duration::from_secs(2),
        role_sync: RoleSyncPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
        },
        ..SessionSettings::default()
    }
}

#[allow(dead_code)]
pub fn session_manager(backend: &Arc<MemoryBackend>) -> SessionManager {
    SessionManager::new(backend.clone(), backend.clone(), test_settings())
}

/// Wait until `predicate` holds for the manager's state.
#[allow(dead_code)]
pub async fn wait_for_state(
    manager: &SessionManager,
    predicate: impl FnMut(&SessionState) -> bool,
) -> SessionState {
    let mut rx = manager.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for session state")
        .expect("session state channel closed");
    state.clone()
}

/// Listing owned by `agent_id`, created `age_days` days ago.
#[allow(dead_code)]
pub fn property(
    title: &str,
    property_type: &str,
    location: &str,
    price: f64,
    bedrooms: u32,
    agent_id: Uuid,
    age_days: i64,
) -> Property {
    let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        - chrono::Duration::days(age_days);
    Property {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: format!("{} in {}", property_type, location),
        price,
        location: location.to_string(),
        property_type: property_type.to_string(),
        bedrooms,
        bathrooms: 2,
        built_up_size: 1200.0,
        tenure: "Freehold".to_string(),
        furnishing: None,
        images: vec![],
        status: PropertyStatus::Active,
        agent_id,
        created_at,
        updated_at: created_at,
        listing_id: None,
        original_url: None,
        city: None,
        state: None,
        land_size: None,
    }
}

/// Collect a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
