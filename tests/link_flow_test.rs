mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use chrono::Duration;
use common::*;
use linklapse::entities::{prelude::*, *};
use linklapse::utils::clock::Clock;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn test_countdown_windows_are_per_viewer() {
    let t = setup().await;
    let token = register_and_login(&t.app, "owner@example.com").await;
    let doc_id = upload_document(&t.app, &token).await;
    let (_, share) = create_link(
        &t.app,
        &token,
        json!({"document_id": doc_id, "expiry_mode": "countdown", "countdown_seconds": 60}),
    )
    .await;

    // viewer A opens and starts their window
    let (status, body) = view_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
    assert_eq!(body["remaining_seconds"], 60);
    assert!(body["watermark"]["viewer_ip"].as_str().unwrap() == "203.0.113.1");
    // watermark time comes from the injected clock, not the wall clock
    assert_eq!(body["watermark"]["timestamp"], json!(t.clock.now()));
    let deadline_a = body["expires_at"].as_str().unwrap().to_string();

    // re-opening does not reset the window
    t.clock.advance(Duration::seconds(20));
    let (_, body) = view_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(body["remaining_seconds"], 40);
    assert_eq!(body["expires_at"].as_str().unwrap(), deadline_a);

    // viewer B starts fresh with a full window
    let (_, body) = view_as(&t.app, &share, "203.0.113.2").await;
    assert_eq!(body["remaining_seconds"], 60);
    assert_ne!(body["expires_at"].as_str().unwrap(), deadline_a);

    // content is fetchable while active
    let response = fetch_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "no-store"
    );

    // A's window closes while B's is still open
    t.clock.advance(Duration::seconds(45));
    let (status, body) = view_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "expired");
    assert_eq!(body["message"], "Your viewing session has expired");

    let (_, body) = view_as(&t.app, &share, "203.0.113.2").await;
    assert_eq!(body["status"], "active");

    // the closed window blocks the fetch path too
    let response = fetch_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(response.status(), StatusCode::GONE);
}

#[tokio::test]
async fn test_fetch_without_session_is_forbidden() {
    let t = setup().await;
    let token = register_and_login(&t.app, "owner@example.com").await;
    let doc_id = upload_document(&t.app, &token).await;
    let (_, share) = create_link(
        &t.app,
        &token,
        json!({"document_id": doc_id, "expiry_mode": "countdown", "countdown_seconds": 60}),
    )
    .await;

    let response = fetch_as(&t.app, &share, "203.0.113.9").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // no session means no window was started
    let sessions = ViewerSessions::find().all(&t.state.db).await.unwrap();
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn test_revocation_is_terminal_and_idempotent() {
    let t = setup().await;
    let token = register_and_login(&t.app, "owner@example.com").await;
    let doc_id = upload_document(&t.app, &token).await;
    let (link_id, share) = create_link(
        &t.app,
        &token,
        json!({"document_id": doc_id, "expiry_mode": "manual"}),
    )
    .await;

    for _ in 0..2 {
        let response = t
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(&format!("/links/{}/revoke", link_id))
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "revoked");
    }

    let (status, body) = view_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "revoked");
    assert_eq!(body["message"], "This link has been revoked");

    // revoked content looks exactly like a missing token
    let response = fetch_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_fixed_deadline_is_shared_and_persisted() {
    let t = setup().await;
    let token = register_and_login(&t.app, "owner@example.com").await;
    let doc_id = upload_document(&t.app, &token).await;
    let deadline = t.clock.now() + Duration::hours(1);
    let (link_id, share) = create_link(
        &t.app,
        &token,
        json!({"document_id": doc_id, "expiry_mode": "fixed", "fixed_deadline": deadline}),
    )
    .await;

    // two viewers, one deadline; no resolve step needed before fetch
    let (_, body_a) = view_as(&t.app, &share, "203.0.113.1").await;
    t.clock.advance(Duration::minutes(10));
    let (_, body_b) = view_as(&t.app, &share, "203.0.113.2").await;
    assert_eq!(body_a["expires_at"], body_b["expires_at"]);
    assert!(body_b["remaining_seconds"].as_i64().unwrap() < 3600);

    let response = fetch_as(&t.app, &share, "203.0.113.3").await;
    assert_eq!(response.status(), StatusCode::OK);

    t.clock.advance(Duration::hours(1));
    let (_, body) = view_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(body["status"], "expired");
    assert_eq!(body["message"], "This link has expired");

    // the first expired resolve persists the status
    let link = Links::find_by_id(link_id.as_str())
        .one(&t.state.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(link.status, "expired");
}

#[tokio::test]
async fn test_inactive_owner_blocks_creation_and_viewing() {
    let t = setup().await;
    let token = register_and_login(&t.app, "owner@example.com").await;
    let doc_id = upload_document(&t.app, &token).await;
    let (_, share) = create_link(
        &t.app,
        &token,
        json!({
            "document_id": doc_id,
            "expiry_mode": "manual",
            "custom_expired_message": "Visit our new site!",
            "custom_expired_redirect": "https://example.com/new"
        }),
    )
    .await;

    let user = Users::find()
        .filter(users::Column::Email.eq("owner@example.com"))
        .one(&t.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: users::ActiveModel = user.into();
    active.subscription_status = Set("inactive".to_string());
    active.update(&t.state.db).await.unwrap();

    // viewers get the subscription message, never the owner's custom branding
    let (status, body) = view_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "expired");
    assert_eq!(body["message"], "The owner's subscription is inactive");
    assert!(body.get("redirect_url").is_none());

    // the fetch path denies with the same stock message
    let response = fetch_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(response.status(), StatusCode::GONE);
    let body = body_json(response).await;
    assert_eq!(body["error"], "The owner's subscription is inactive");

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/links")
                .header("Authorization", format!("Bearer {}", token))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({"document_id": doc_id, "expiry_mode": "manual"}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_custom_expired_message_and_redirect() {
    let t = setup().await;
    let token = register_and_login(&t.app, "owner@example.com").await;
    let doc_id = upload_document(&t.app, &token).await;
    let deadline = t.clock.now() + Duration::minutes(5);
    let (_, share) = create_link(
        &t.app,
        &token,
        json!({
            "document_id": doc_id,
            "expiry_mode": "fixed",
            "fixed_deadline": deadline,
            "custom_expired_message": "Offer closed",
            "custom_expired_redirect": "https://example.com/offers"
        }),
    )
    .await;

    t.clock.advance(Duration::minutes(6));
    let (_, body) = view_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(body["status"], "expired");
    assert_eq!(body["message"], "Offer closed");
    assert_eq!(body["redirect_url"], "https://example.com/offers");
}

#[tokio::test]
async fn test_deleting_document_revokes_its_links() {
    let t = setup().await;
    let token = register_and_login(&t.app, "owner@example.com").await;
    let doc_id = upload_document(&t.app, &token).await;
    let (_, share_a) = create_link(
        &t.app,
        &token,
        json!({"document_id": doc_id, "expiry_mode": "manual"}),
    )
    .await;
    let (_, share_b) = create_link(
        &t.app,
        &token,
        json!({"document_id": doc_id, "expiry_mode": "countdown", "countdown_seconds": 60}),
    )
    .await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(&format!("/documents/{}", doc_id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["revoked_links"], 2);

    // the link records survive as revoked, they are not deleted
    for share in [&share_a, &share_b] {
        let (status, body) = view_as(&t.app, share, "203.0.113.1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "revoked");
    }
}

#[tokio::test]
async fn test_unknown_token_is_not_found() {
    let t = setup().await;
    let (status, _) = view_as(&t.app, "no-such-token", "203.0.113.1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = fetch_as(&t.app, "no-such-token", "203.0.113.1").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stats_track_opens_and_viewers() {
    let t = setup().await;
    let token = register_and_login(&t.app, "owner@example.com").await;
    let doc_id = upload_document(&t.app, &token).await;
    let (link_id, share) = create_link(
        &t.app,
        &token,
        json!({"document_id": doc_id, "expiry_mode": "countdown", "countdown_seconds": 600}),
    )
    .await;

    view_as(&t.app, &share, "203.0.113.1").await;
    view_as(&t.app, &share, "203.0.113.1").await;
    view_as(&t.app, &share, "203.0.113.2").await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(&format!("/links/{}/stats", link_id))
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["link"]["open_count"], 3);
    assert_eq!(stats["unique_viewers"], 2);
    assert_eq!(stats["recent_log"].as_array().unwrap().len(), 3);

    // first_opened_at was stamped by the very first session and never moves
    let link = Links::find_by_id(link_id.as_str())
        .one(&t.state.db)
        .await
        .unwrap()
        .unwrap();
    assert!(link.first_opened_at.is_some());

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/dashboard/stats")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let dashboard = body_json(response).await;
    assert_eq!(dashboard["total_links"], 1);
    assert_eq!(dashboard["total_opens"], 3);
    assert_eq!(dashboard["unique_viewers"], 2);
    assert_eq!(dashboard["recent_opens"], 3);
}

#[tokio::test]
async fn test_owners_cannot_touch_each_others_links() {
    let t = setup().await;
    let owner = register_and_login(&t.app, "owner@example.com").await;
    let other = register_and_login(&t.app, "other@example.com").await;
    let doc_id = upload_document(&t.app, &owner).await;
    let (link_id, _) = create_link(
        &t.app,
        &owner,
        json!({"document_id": doc_id, "expiry_mode": "manual"}),
    )
    .await;

    // a foreign link id answers like a missing one
    for (method, uri) in [
        ("POST", format!("/links/{}/revoke", link_id)),
        ("DELETE", format!("/links/{}", link_id)),
        ("GET", format!("/links/{}/stats", link_id)),
    ] {
        let response = t
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(&uri)
                    .header("Authorization", format!("Bearer {}", other))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn test_invalid_link_parameters_rejected() {
    let t = setup().await;
    let token = register_and_login(&t.app, "owner@example.com").await;
    let doc_id = upload_document(&t.app, &token).await;

    let cases = [
        json!({"document_id": doc_id, "expiry_mode": "countdown"}),
        json!({"document_id": doc_id, "expiry_mode": "countdown", "countdown_seconds": 0}),
        json!({"document_id": doc_id, "expiry_mode": "fixed"}),
        json!({"document_id": doc_id, "expiry_mode": "fixed", "fixed_deadline": t.clock.now() - Duration::hours(1)}),
        json!({"document_id": doc_id, "expiry_mode": "never"}),
    ];

    for payload in cases {
        let response = t
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/links")
                    .header("Authorization", format!("Bearer {}", token))
                    .header("Content-Type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_admin_endpoints_require_role() {
    let t = setup().await;
    let owner = register_and_login(&t.app, "owner@example.com").await;
    let admin = register_and_login(&t.app, "admin@example.com").await;
    let doc_id = upload_document(&t.app, &owner).await;
    let (link_id, share) = create_link(
        &t.app,
        &owner,
        json!({"document_id": doc_id, "expiry_mode": "manual"}),
    )
    .await;

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/admin/stats")
                .header("Authorization", format!("Bearer {}", owner))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let user = Users::find()
        .filter(users::Column::Email.eq("admin@example.com"))
        .one(&t.state.db)
        .await
        .unwrap()
        .unwrap();
    let mut active: users::ActiveModel = user.into();
    active.role = Set("admin".to_string());
    active.update(&t.state.db).await.unwrap();

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/admin/stats")
                .header("Authorization", format!("Bearer {}", admin))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let stats = body_json(response).await;
    assert_eq!(stats["total_users"], 2);
    assert_eq!(stats["total_links"], 1);

    let response = t
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(&format!("/admin/links/{}/revoke", link_id))
                .header("Authorization", format!("Bearer {}", admin))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = view_as(&t.app, &share, "203.0.113.1").await;
    assert_eq!(body["status"], "revoked");
}
