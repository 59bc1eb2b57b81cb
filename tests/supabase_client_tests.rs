// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP client tests against an in-process stub of the hosted service.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::Query,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use superhomes::backend::{
    AuthBackend, AuthEvent, Database, OAuthProvider, SignUpMetadata, SupabaseClient,
};
use superhomes::error::BackendError;
use superhomes::models::UserType;
use uuid::Uuid;

const API_KEY: &str = "test_anon_key";
const USER_ID: &str = "6f1c2d3e-4a5b-4c6d-8e7f-9a0b1c2d3e4f";

/// Serve `router` on an ephemeral port and return its base URL.
async fn spawn_stub(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn user_json() -> Value {
    json!({
        "id": USER_ID,
        "email": "buyer@test.com",
        "created_at": "2026-01-01T00:00:00Z",
        "user_metadata": { "name": "Buyer" }
    })
}

fn token_json(access_token: &str, expires_in: i64) -> Value {
    json!({
        "access_token": access_token,
        "refresh_token": format!("{}-refresh", access_token),
        "token_type": "bearer",
        "expires_in": expires_in,
        "user": user_json()
    })
}

fn has_api_key(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some(API_KEY)
}

fn no_rows() -> axum::response::Response {
    (
        StatusCode::NOT_ACCEPTABLE,
        Json(json!({
            "code": "PGRST116",
            "details": "The result contains 0 rows",
            "hint": null,
            "message": "JSON object requested, multiple (or no) rows returned"
        })),
    )
        .into_response()
}

/// Token endpoint: password grant for one fixed account, refresh grant
/// answered by `refresh_status`.
fn auth_router(expires_in: i64, refresh_status: StatusCode) -> Router {
    Router::new().route(
        "/auth/v1/token",
        post(
            move |Query(q): Query<HashMap<String, String>>,
                  headers: HeaderMap,
                  Json(body): Json<Value>| async move {
                if !has_api_key(&headers) {
                    return StatusCode::UNAUTHORIZED.into_response();
                }
                match q.get("grant_type").map(String::as_str) {
                    Some("password") if body["password"] == "secret123" => {
                        Json(token_json("first", expires_in)).into_response()
                    }
                    Some("password") => (
                        StatusCode::BAD_REQUEST,
                        Json(json!({
                            "code": 400,
                            "error_code": "invalid_credentials",
                            "msg": "Invalid login credentials"
                        })),
                    )
                        .into_response(),
                    Some("refresh_token") if refresh_status.is_success() => {
                        assert_eq!(body["refresh_token"], "first-refresh");
                        Json(token_json("second", 3600)).into_response()
                    }
                    Some("refresh_token") => (
                        refresh_status,
                        Json(json!({
                            "error": "invalid_grant",
                            "error_description": "Invalid Refresh Token: Already Used"
                        })),
                    )
                        .into_response(),
                    _ => StatusCode::BAD_REQUEST.into_response(),
                }
            },
        ),
    )
}

#[tokio::test]
async fn test_password_sign_in_stores_session_and_publishes() {
    let base = spawn_stub(auth_router(3600, StatusCode::OK)).await;
    let client = SupabaseClient::new(&base, API_KEY);
    let mut changes = client.subscribe();

    let session = client
        .sign_in_with_password("buyer@test.com", "secret123")
        .await
        .unwrap();

    assert_eq!(session.access_token, "first");
    assert_eq!(session.user.id.to_string(), USER_ID);
    assert_eq!(client.get_session().await.unwrap(), Some(session.clone()));

    let change = changes.recv().await.unwrap();
    assert_eq!(change.event, AuthEvent::SignedIn);
    assert_eq!(change.session, Some(session));
}

#[tokio::test]
async fn test_bad_credentials_surface_service_message() {
    let base = spawn_stub(auth_router(3600, StatusCode::OK)).await;
    let client = SupabaseClient::new(&base, API_KEY);

    let err = client
        .sign_in_with_password("buyer@test.com", "wrong")
        .await
        .unwrap_err();

    assert_eq!(err, BackendError::Auth("Invalid login credentials".to_string()));
    assert_eq!(client.get_session().await.unwrap(), None);
}

#[tokio::test]
async fn test_expiring_session_is_refreshed() {
    // 60 s left is inside the refresh margin
    let base = spawn_stub(auth_router(60, StatusCode::OK)).await;
    let client = SupabaseClient::new(&base, API_KEY);
    client
        .sign_in_with_password("buyer@test.com", "secret123")
        .await
        .unwrap();
    let mut changes = client.subscribe();

    let session = client.get_session().await.unwrap().unwrap();

    assert_eq!(session.access_token, "second");
    assert_eq!(changes.recv().await.unwrap().event, AuthEvent::TokenRefreshed);
}

#[tokio::test]
async fn test_rejected_refresh_signs_out() {
    let base = spawn_stub(auth_router(60, StatusCode::BAD_REQUEST)).await;
    let client = SupabaseClient::new(&base, API_KEY);
    client
        .sign_in_with_password("buyer@test.com", "secret123")
        .await
        .unwrap();
    let mut changes = client.subscribe();

    assert_eq!(client.get_session().await.unwrap(), None);
    assert_eq!(changes.recv().await.unwrap().event, AuthEvent::SignedOut);
}

/// `/auth/v1/user` accepting only the OAuth access token.
fn user_router() -> Router {
    Router::new().route(
        "/auth/v1/user",
        get(|headers: HeaderMap| async move {
            let bearer = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());
            if has_api_key(&headers) && bearer == Some("Bearer oauth-access") {
                Json(user_json()).into_response()
            } else {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "code": 401, "msg": "invalid JWT" })),
                )
                    .into_response()
            }
        }),
    )
}

#[tokio::test]
async fn test_set_session_adopts_callback_tokens() {
    let base = spawn_stub(user_router()).await;
    let client = SupabaseClient::new(&base, API_KEY);
    let mut changes = client.subscribe();

    let session = client
        .set_session("oauth-access", "oauth-refresh")
        .await
        .unwrap();

    assert_eq!(session.access_token, "oauth-access");
    assert_eq!(session.refresh_token, "oauth-refresh");
    assert_eq!(session.user.id.to_string(), USER_ID);
    assert_eq!(client.get_session().await.unwrap(), Some(session.clone()));

    let change = changes.recv().await.unwrap();
    assert_eq!(change.event, AuthEvent::SignedIn);
    assert_eq!(change.session, Some(session));
}

#[tokio::test]
async fn test_set_session_with_bad_token_keeps_no_session() {
    let base = spawn_stub(user_router()).await;
    let client = SupabaseClient::new(&base, API_KEY);

    let err = client
        .set_session("forged", "oauth-refresh")
        .await
        .unwrap_err();

    assert_eq!(err, BackendError::Auth("invalid JWT".to_string()));
    assert_eq!(client.get_session().await.unwrap(), None);
}

#[tokio::test]
async fn test_sign_up_awaiting_confirmation_has_no_session() {
    let router = Router::new().route(
        "/auth/v1/signup",
        post(|Json(body): Json<Value>| async move {
            assert_eq!(body["data"]["user_type"], "agent");
            assert_eq!(body["data"]["name"], "Agent Smith");
            Json(user_json())
        }),
    );
    let base = spawn_stub(router).await;
    let client = SupabaseClient::new(&base, API_KEY);

    let metadata = SignUpMetadata {
        name: "Agent Smith".to_string(),
        user_type: UserType::Agent,
    };
    let outcome = client
        .sign_up("agent@test.com", "secret123", &metadata)
        .await
        .unwrap();

    assert!(outcome.session.is_none());
    assert_eq!(outcome.user.id.to_string(), USER_ID);
    assert_eq!(client.get_session().await.unwrap(), None);
}

#[tokio::test]
async fn test_sign_out_clears_session_when_revoke_fails() {
    let router = auth_router(3600, StatusCode::OK).route(
        "/auth/v1/logout",
        post(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = spawn_stub(router).await;
    let client = SupabaseClient::new(&base, API_KEY);
    client
        .sign_in_with_password("buyer@test.com", "secret123")
        .await
        .unwrap();
    let mut changes = client.subscribe();

    let result = client.sign_out().await;

    assert!(matches!(result, Err(BackendError::Api { status: 500, .. })));
    assert_eq!(client.get_session().await.unwrap(), None);
    assert_eq!(changes.recv().await.unwrap().event, AuthEvent::SignedOut);
}

#[tokio::test]
async fn test_select_one_sends_filter_and_session_token() {
    let router = auth_router(3600, StatusCode::OK).route(
        "/rest/v1/users",
        get(
            |Query(q): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                assert!(has_api_key(&headers));
                assert_eq!(
                    headers.get(header::ACCEPT).unwrap(),
                    "application/vnd.pgrst.object+json"
                );
                assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Bearer first");
                assert_eq!(q.get("id").map(String::as_str), Some(&*format!("eq.{}", USER_ID)));
                Json(json!({ "id": USER_ID, "email": "buyer@test.com", "user_type": "agent" }))
            },
        ),
    );
    let base = spawn_stub(router).await;
    let client = SupabaseClient::new(&base, API_KEY);
    client
        .sign_in_with_password("buyer@test.com", "secret123")
        .await
        .unwrap();

    let row = client
        .get_user_row(Uuid::parse_str(USER_ID).unwrap())
        .await
        .unwrap();

    assert_eq!(row.user_type, UserType::Agent);
    assert_eq!(row.created_at, None);
}

#[tokio::test]
async fn test_missing_row_is_no_rows() {
    let router = Router::new().route(
        "/rest/v1/users",
        get(|| async { no_rows() }).patch(|| async { no_rows() }),
    );
    let base = spawn_stub(router).await;
    let client = SupabaseClient::new(&base, API_KEY);
    let id = Uuid::new_v4();

    assert_eq!(client.get_user_row(id).await.unwrap_err(), BackendError::NoRows);
    assert_eq!(
        client
            .update_user_type(id, UserType::Agent)
            .await
            .unwrap_err(),
        BackendError::NoRows
    );
}

#[tokio::test]
async fn test_unique_violation_is_conflict() {
    let router = Router::new().route(
        "/rest/v1/users",
        post(|headers: HeaderMap| async move {
            assert_eq!(headers.get("Prefer").unwrap(), "return=representation");
            (
                StatusCode::CONFLICT,
                Json(json!({
                    "code": "23505",
                    "message": "duplicate key value violates unique constraint \"users_pkey\""
                })),
            )
        }),
    );
    let base = spawn_stub(router).await;
    let client = SupabaseClient::new(&base, API_KEY);

    let row = superhomes::models::NewUserRow {
        id: Uuid::new_v4(),
        email: None,
        user_type: UserType::Buyer,
    };
    let err = client.insert_user_row(&row).await.unwrap_err();

    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_delete_favorite_filters_by_user_and_property() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let user_id = Uuid::new_v4();
    let property_id = Uuid::new_v4();

    let router = Router::new().route(
        "/rest/v1/favorites",
        axum::routing::delete(move |Query(q): Query<HashMap<String, String>>| {
            let seen = seen.clone();
            async move {
                assert_eq!(q["user_id"], format!("eq.{}", user_id));
                assert_eq!(q["property_id"], format!("eq.{}", property_id));
                seen.fetch_add(1, Ordering::SeqCst);
                StatusCode::NO_CONTENT
            }
        }),
    );
    let base = spawn_stub(router).await;
    let client = SupabaseClient::new(&base, API_KEY);

    client.delete_favorite(user_id, property_id).await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unreachable_service_is_network_error() {
    let client = SupabaseClient::new("http://127.0.0.1:1", API_KEY);

    let err = client.get_user_row(Uuid::new_v4()).await.unwrap_err();

    assert!(matches!(err, BackendError::Network(_)));
}

#[test]
fn test_oauth_url_encodes_redirect() {
    let client = SupabaseClient::new("https://project.supabase.co/", API_KEY);

    let url = client
        .oauth_authorize_url(OAuthProvider::Google, "https://superhomes.my/auth/callback")
        .unwrap();

    assert_eq!(
        url,
        "https://project.supabase.co/auth/v1/authorize?provider=google&redirect_to=https%3A%2F%2Fsuperhomes.my%2Fauth%2Fcallback"
    );
}
