// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public listing and agent API tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use superhomes::models::PropertyStatus;
use tower::ServiceExt;
use uuid::Uuid;

mod common;
use common::{create_test_app, json_body, property};

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = create_test_app();

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_filters_lists_static_choices() {
    let (app, _) = create_test_app();

    let body = json_body(app.oneshot(get("/api/filters")).await.unwrap()).await;

    assert_eq!(body["property_types"][0], "Condo");
    assert!(body["locations"]
        .as_array()
        .unwrap()
        .iter()
        .any(|l| l == "Putrajaya"));
}

#[tokio::test]
async fn test_search_filters_and_orders_newest_first() {
    let (app, backend) = create_test_app();
    let agent = Uuid::new_v4();
    backend.seed_property(property("Old Condo", "Condo", "Mont Kiara", 800_000.0, 3, agent, 10));
    backend.seed_property(property("New Condo", "Condo", "Mont Kiara", 900_000.0, 4, agent, 1));
    backend.seed_property(property("Small Condo", "Condo", "Mont Kiara", 400_000.0, 1, agent, 2));
    backend.seed_property(property("Shoplot", "Commercial", "Mont Kiara", 850_000.0, 0, agent, 3));
    let mut draft = property("Draft Condo", "Condo", "Mont Kiara", 850_000.0, 3, agent, 0);
    draft.status = PropertyStatus::Draft;
    backend.seed_property(draft);

    let response = app
        .oneshot(get(
            "/api/properties?location=mont%20kiara&property_type=Condo&min_price=500000&max_price=&bedrooms=2",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["New Condo", "Old Condo"]);
}

#[tokio::test]
async fn test_search_rejects_infinite_price() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(get("/api/properties?min_price=inf"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_rejects_inverted_price_range() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(get("/api/properties?min_price=900000&max_price=100000"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "bad_request");
}

#[tokio::test]
async fn test_featured_is_limited_to_six() {
    let (app, backend) = create_test_app();
    let agent = Uuid::new_v4();
    for i in 0..8 {
        backend.seed_property(property(&format!("Home {}", i), "Landed", "Cheras", 500_000.0, 3, agent, i));
    }

    let body = json_body(app.oneshot(get("/api/properties/featured")).await.unwrap()).await;

    let listings = body.as_array().unwrap();
    assert_eq!(listings.len(), 6);
    assert_eq!(listings[0]["title"], "Home 0");
}

#[tokio::test]
async fn test_property_detail_with_whatsapp_link() {
    let (app, backend) = create_test_app();
    let agent = backend.seed_agent(Uuid::new_v4(), "Aisha", "+60 12-345 6789");
    let listing = property("Bangsar Condo", "Condo", "Bangsar", 1_250_000.0, 3, agent.id, 0);
    let id = listing.id;
    backend.seed_property(listing);

    let response = app
        .oneshot(get(&format!("/api/properties/{}", id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["formatted_price"], "RM1,250,000");
    assert_eq!(body["agent"]["name"], "Aisha");
    assert_eq!(
        body["whatsapp_url"],
        "https://wa.me/60123456789?text=Hi%2C%20I%27m%20interested%20in%20Bangsar%20Condo%20listed%20at%20RM1%2C250%2C000"
    );
}

#[tokio::test]
async fn test_property_detail_without_agent() {
    let (app, backend) = create_test_app();
    let listing = property("Orphan", "Condo", "Bangsar", 700_000.0, 2, Uuid::new_v4(), 0);
    let id = listing.id;
    backend.seed_property(listing);

    let body = json_body(
        app.oneshot(get(&format!("/api/properties/{}", id)))
            .await
            .unwrap(),
    )
    .await;

    assert!(body["agent"].is_null());
    assert!(body["whatsapp_url"].is_null());
}

#[tokio::test]
async fn test_unknown_property_is_not_found() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(get(&format!("/api/properties/{}", Uuid::new_v4())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "not_found");
}

#[tokio::test]
async fn test_similar_excludes_self_and_other_types() {
    let (app, backend) = create_test_app();
    let agent = Uuid::new_v4();
    let subject = property("Subject", "Landed", "Cheras", 600_000.0, 3, agent, 0);
    let subject_id = subject.id;
    backend.seed_property(subject);
    for i in 1..=4 {
        backend.seed_property(property(&format!("Landed {}", i), "Landed", "Kajang", 500_000.0, 3, agent, i));
    }
    backend.seed_property(property("Condo", "Condo", "Cheras", 500_000.0, 3, agent, 1));

    let body = json_body(
        app.oneshot(get(&format!("/api/properties/{}/similar", subject_id)))
            .await
            .unwrap(),
    )
    .await;

    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Landed 1", "Landed 2", "Landed 3"]);
}

#[tokio::test]
async fn test_agents_listed_by_name() {
    let (app, backend) = create_test_app();
    backend.seed_agent(Uuid::new_v4(), "Zainal", "+60111111111");
    let aisha = backend.seed_agent(Uuid::new_v4(), "Aisha", "+60122222222");

    let body = json_body(app.clone().oneshot(get("/api/agents")).await.unwrap()).await;
    assert_eq!(body[0]["name"], "Aisha");
    assert_eq!(body[1]["name"], "Zainal");

    let response = app
        .oneshot(get(&format!("/api/agents/{}", aisha.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["phone"], "+60122222222");
}
