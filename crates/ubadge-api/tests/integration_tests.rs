//! # Integration Tests for ubadge-api
//!
//! Drives the full router: health probes, authentication and role scoping,
//! issuer and badge management, the issue → invite → intro flow, direct
//! certification of addressed recipients, revocation, and the public
//! issuer documents.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use ubadge_api::state::{AppConfig, AppState};
use ubadge_core::UserId;
use ubadge_issuance::{InMemoryArtifacts, Outbox};

const SECRET: &str = "test-secret";

/// Helper: app with auth disabled, in-memory artifacts, and a recording outbox.
fn test_app() -> (axum::Router, Outbox, InMemoryArtifacts) {
    test_app_with_config(AppConfig {
        api_url: "https://badges.example".into(),
        ..AppConfig::default()
    })
}

/// Helper: app with auth enabled.
fn test_app_with_auth(token: &str) -> (axum::Router, Outbox, InMemoryArtifacts) {
    test_app_with_config(AppConfig {
        auth_token: Some(token.to_string()),
        api_url: "https://badges.example".into(),
        ..AppConfig::default()
    })
}

fn test_app_with_config(config: AppConfig) -> (axum::Router, Outbox, InMemoryArtifacts) {
    let outbox = Outbox::new();
    let artifacts = InMemoryArtifacts::new();
    let state = AppState::with_collaborators(
        config,
        Arc::new(artifacts.clone()),
        Arc::new(outbox.clone()),
    );
    (ubadge_api::app(state), outbox, artifacts)
}

/// Helper: read response body as string.
async fn body_string(response: axum::http::Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::http::Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

fn send_json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

async fn call(app: &axum::Router, request: Request<Body>) -> axum::http::Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn create_issuer(app: &axum::Router, owner: UserId, name: &str, token: Option<&str>) -> Value {
    let response = call(
        app,
        send_json(
            "POST",
            "/issuers",
            token,
            json!({
                "owner_id": owner.to_string(),
                "name": name,
                "email": "badges@acme.org",
                "url": "https://acme.org",
                "key": {"public_key": "pubK", "private_key": "privK"}
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn create_badge(app: &axum::Router, issuer_id: &str, name: &str, token: Option<&str>) -> Value {
    let response = call(
        app,
        send_json(
            "POST",
            &format!("/issuers/{issuer_id}/badges"),
            token,
            json!({
                "name": name,
                "description": "Completed the course",
                "criteria": "Pass all modules",
                "signature_lines": [{"name": "Dr. Ada", "jobTitle": "Dean"}]
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

async fn issue(app: &axum::Router, issuer_id: &str, badge_id: &str, email: &str) -> Value {
    let response = call(
        app,
        send_json(
            "POST",
            &format!("/issuers/{issuer_id}/badges/{badge_id}/issue"),
            None,
            json!({"recipients": [{"name": "Ann", "email": email}]}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

fn nonce_in(outbox: &Outbox, to: &str) -> String {
    let body = outbox.messages_to(to).last().unwrap().body.clone();
    let start = body.find("<strong>").unwrap() + "<strong>".len();
    let end = body.find("</strong>").unwrap();
    body[start..end].to_string()
}

async fn intro(app: &axum::Router, issuer_id: &str, nonce: &str, address: &str) -> axum::http::Response<Body> {
    call(
        app,
        send_json(
            "POST",
            &format!("/issuers/{issuer_id}/intro"),
            None,
            json!({"nonce": nonce, "bitcoinAddress": address}),
        ),
    )
    .await
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let (app, _, _) = test_app_with_auth(SECRET);
    let response = call(&app, get("/health/liveness", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_readiness_probe() {
    let (app, _, _) = test_app_with_auth(SECRET);
    let response = call(&app, get("/health/readiness", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ready");
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_issuers_require_token_when_auth_enabled() {
    let (app, _, _) = test_app_with_auth(SECRET);
    let response = call(&app, get("/issuers", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_only_admin_creates_issuers() {
    let (app, _, _) = test_app_with_auth(SECRET);
    let owner = UserId::new();
    let token = format!("owner:{owner}:{SECRET}");
    let response = call(
        &app,
        send_json(
            "POST",
            "/issuers",
            Some(&token),
            json!({"owner_id": owner.to_string(), "name": "Acme", "email": "a@acme.org", "url": "https://acme.org"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_owner_scoping() {
    let (app, _, _) = test_app_with_auth(SECRET);
    let alice = UserId::new();
    let bob = UserId::new();
    let acme = create_issuer(&app, alice, "Acme", Some(SECRET)).await;
    create_issuer(&app, bob, "Globex", Some(SECRET)).await;
    let acme_id = acme["id"].as_str().unwrap();

    let alice_token = format!("owner:{alice}:{SECRET}");
    let listed = body_json(call(&app, get("/issuers", Some(&alice_token))).await).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["name"], "Acme");

    let bob_token = format!("owner:{bob}:{SECRET}");
    let response = call(&app, get(&format!("/issuers/{acme_id}"), Some(&bob_token))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Managers bound to the owner may create badges but not rotate keys.
    let manager_token = format!("manager:{alice}:{SECRET}");
    create_badge(&app, acme_id, "B1", Some(&manager_token)).await;
    let response = call(
        &app,
        Request::builder()
            .method("POST")
            .uri(format!("/issuers/{acme_id}/keys"))
            .header("Authorization", format!("Bearer {manager_token}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_public_documents_need_no_token() {
    let (app, _, _) = test_app_with_auth(SECRET);
    let issuer = create_issuer(&app, UserId::new(), "Acme", Some(SECRET)).await;
    let id = issuer["id"].as_str().unwrap();

    let response = call(&app, get(&format!("/issuers/{id}/profile"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = call(&app, get(&format!("/issuers/{id}/revocations"), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// -- Issuers ------------------------------------------------------------------

#[tokio::test]
async fn test_issuer_responses_never_carry_private_keys() {
    let (app, _, _) = test_app();
    let issuer = create_issuer(&app, UserId::new(), "Acme", None).await;
    let rendered = issuer.to_string();
    assert!(!rendered.contains("privK"));
    assert_eq!(issuer["keys"][0]["public_key"], "pubK");
    assert!(issuer["keys"][0]["date_revoked"].is_null());
}

#[tokio::test]
async fn test_duplicate_issuer_name_conflicts() {
    let (app, _, _) = test_app();
    let owner = UserId::new();
    create_issuer(&app, owner, "Acme", None).await;
    let response = call(
        &app,
        send_json(
            "POST",
            "/issuers",
            None,
            json!({"owner_id": owner.to_string(), "name": "Acme", "email": "x@acme.org", "url": "https://acme.org"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_invalid_issuer_email_is_validation_error() {
    let (app, _, _) = test_app();
    let response = call(
        &app,
        send_json(
            "POST",
            "/issuers",
            None,
            json!({"owner_id": UserId::new().to_string(), "name": "Acme", "email": "nope", "url": "https://acme.org"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _, _) = test_app();
    let response = call(
        &app,
        Request::builder()
            .method("POST")
            .uri("/issuers")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_renames_and_rotates() {
    let (app, _, _) = test_app();
    let issuer = create_issuer(&app, UserId::new(), "Acme", None).await;
    let id = issuer["id"].as_str().unwrap();

    let response = call(
        &app,
        send_json(
            "PUT",
            &format!("/issuers/{id}"),
            None,
            json!({"name": "Acme Labs", "key": {"public_key": "pubK2", "private_key": "privK2"}}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let updated = body_json(response).await;
    assert_eq!(updated["name"], "Acme Labs");
    let keys = updated["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 2);
    assert!(!keys[0]["date_revoked"].is_null());
    assert!(keys[1]["date_revoked"].is_null());
}

#[tokio::test]
async fn test_rotation_without_body_generates_key() {
    let (app, _, _) = test_app();
    let issuer = create_issuer(&app, UserId::new(), "Acme", None).await;
    let id = issuer["id"].as_str().unwrap();

    let response = call(
        &app,
        Request::builder()
            .method("POST")
            .uri(format!("/issuers/{id}/keys"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = body_json(response).await;
    let new_key = rotated["keys"][1]["public_key"].as_str().unwrap();
    assert_eq!(new_key.len(), 64);

    let profile = body_json(call(&app, get(&format!("/issuers/{id}/profile"), None)).await).await;
    assert_eq!(profile["publicKey"].as_array().unwrap().len(), 2);
    assert!(profile["publicKey"][0].get("expires").is_some());
}

#[tokio::test]
async fn test_unknown_issuer_is_not_found() {
    let (app, _, _) = test_app();
    let id = uuid::Uuid::new_v4();
    let response = call(&app, get(&format!("/issuers/{id}"), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let response = call(&app, get(&format!("/issuers/{id}/profile"), None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Issuance flow ------------------------------------------------------------

#[tokio::test]
async fn test_invite_then_accept_issues_certificate() {
    let (app, outbox, artifacts) = test_app();
    let issuer = create_issuer(&app, UserId::new(), "Acme", None).await;
    let issuer_id = issuer["id"].as_str().unwrap();
    let badge = create_badge(&app, issuer_id, "B1", None).await;
    let badge_id = badge["id"].as_str().unwrap();

    let report = issue(&app, issuer_id, badge_id, "a@x.com").await;
    assert_eq!(report["results"][0]["status"], "invited");
    assert_eq!(report["results"][0]["notified"], true);
    assert_eq!(outbox.len(), 1);
    assert!(artifacts.is_empty());

    let invites = body_json(call(&app, get(&format!("/issuers/{issuer_id}/invites"), None)).await).await;
    assert_eq!(invites.as_array().unwrap().len(), 1);
    assert_eq!(invites[0]["badges"][0], badge_id);
    assert!(invites[0].get("nonce").is_none());

    let nonce = nonce_in(&outbox, "a@x.com");
    let response = intro(&app, issuer_id, &nonce, "addr").await;
    assert_eq!(response.status(), StatusCode::OK);
    let accepted = body_json(response).await;
    assert_eq!(accepted["results"][0]["status"], "certified");
    assert_eq!(artifacts.len(), 1);

    let recipient_id = accepted["recipient_id"].as_str().unwrap();
    let recipient = body_json(call(&app, get(&format!("/recipients/{recipient_id}"), None)).await).await;
    assert_eq!(recipient["addresses"][issuer_id], "addr");
    assert_eq!(recipient["certificates"].as_array().unwrap().len(), 1);
    assert_eq!(recipient["certificates"][0]["badge_id"], badge_id);

    let invites = body_json(call(&app, get(&format!("/issuers/{issuer_id}/invites"), None)).await).await;
    assert!(invites.as_array().unwrap().is_empty());

    // The nonce is single-use.
    let response = intro(&app, issuer_id, &nonce, "addr").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_addressed_recipient_is_certified_directly() {
    let (app, outbox, artifacts) = test_app();
    let issuer = create_issuer(&app, UserId::new(), "Acme", None).await;
    let issuer_id = issuer["id"].as_str().unwrap();
    let b1 = create_badge(&app, issuer_id, "B1", None).await;
    let b2 = create_badge(&app, issuer_id, "B2", None).await;

    issue(&app, issuer_id, b1["id"].as_str().unwrap(), "a@x.com").await;
    let nonce = nonce_in(&outbox, "a@x.com");
    intro(&app, issuer_id, &nonce, "addr0").await;
    let emails_before = outbox.len();

    let report = issue(&app, issuer_id, b2["id"].as_str().unwrap(), "a@x.com").await;
    assert_eq!(report["results"][0]["status"], "certified");
    assert!(report["results"][0]["certificate_id"].is_string());
    assert_eq!(outbox.len(), emails_before);
    assert_eq!(artifacts.len(), 2);

    let invites = body_json(call(&app, get(&format!("/issuers/{issuer_id}/invites"), None)).await).await;
    assert!(invites.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_repeat_issue_is_already_invited() {
    let (app, outbox, _) = test_app();
    let issuer = create_issuer(&app, UserId::new(), "Acme", None).await;
    let issuer_id = issuer["id"].as_str().unwrap();
    let badge = create_badge(&app, issuer_id, "B1", None).await;
    let badge_id = badge["id"].as_str().unwrap();

    issue(&app, issuer_id, badge_id, "a@x.com").await;
    let again = issue(&app, issuer_id, badge_id, "a@x.com").await;
    assert_eq!(again["results"][0]["status"], "already_invited");
    assert_eq!(again["results"][0]["notified"], true);
    let sent = outbox.messages_to("a@x.com");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].body, sent[1].body);
    let invites = body_json(call(&app, get(&format!("/issuers/{issuer_id}/invites"), None)).await).await;
    assert_eq!(invites.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_nonce_from_other_issuer_is_rejected_like_unknown_nonce() {
    let (app, outbox, _) = test_app();
    let acme = create_issuer(&app, UserId::new(), "Acme", None).await;
    let globex = create_issuer(&app, UserId::new(), "Globex", None).await;
    let acme_id = acme["id"].as_str().unwrap();
    let globex_id = globex["id"].as_str().unwrap();
    let badge = create_badge(&app, acme_id, "B1", None).await;
    issue(&app, acme_id, badge["id"].as_str().unwrap(), "a@x.com").await;
    let nonce = nonce_in(&outbox, "a@x.com");

    let mismatch = intro(&app, globex_id, &nonce, "addr").await;
    assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
    let mismatch = body_json(mismatch).await;

    let unknown = body_json(intro(&app, acme_id, "not-a-nonce", "addr").await).await;
    assert_eq!(mismatch["error"]["message"], unknown["error"]["message"]);

    // The invite survives the failed attempt.
    let response = intro(&app, acme_id, &nonce, "addr").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_issue_unknown_badge_is_not_found() {
    let (app, _, _) = test_app();
    let issuer = create_issuer(&app, UserId::new(), "Acme", None).await;
    let issuer_id = issuer["id"].as_str().unwrap();
    let response = call(
        &app,
        send_json(
            "POST",
            &format!("/issuers/{issuer_id}/badges/{}/issue", uuid::Uuid::new_v4()),
            None,
            json!({"recipients": [{"name": "Ann", "email": "a@x.com"}]}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_issue_rejects_bad_recipient_email() {
    let (app, _, _) = test_app();
    let issuer = create_issuer(&app, UserId::new(), "Acme", None).await;
    let issuer_id = issuer["id"].as_str().unwrap();
    let badge = create_badge(&app, issuer_id, "B1", None).await;
    let response = call(
        &app,
        send_json(
            "POST",
            &format!("/issuers/{issuer_id}/badges/{}/issue", badge["id"].as_str().unwrap()),
            None,
            json!({"recipients": [{"name": "Ann", "email": "not-an-email"}]}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// -- Revocation ---------------------------------------------------------------

#[tokio::test]
async fn test_revoke_certificate_appears_in_revocation_list() {
    let (app, outbox, _) = test_app();
    let issuer = create_issuer(&app, UserId::new(), "Acme", None).await;
    let issuer_id = issuer["id"].as_str().unwrap();
    let badge = create_badge(&app, issuer_id, "B1", None).await;
    issue(&app, issuer_id, badge["id"].as_str().unwrap(), "a@x.com").await;
    let nonce = nonce_in(&outbox, "a@x.com");
    let accepted = body_json(intro(&app, issuer_id, &nonce, "addr").await).await;
    let cert_id = accepted["results"][0]["certificate_id"].as_str().unwrap().to_string();

    let revoke = |reason: &str| {
        send_json(
            "POST",
            &format!("/issuers/{issuer_id}/revoke"),
            None,
            json!({"certificate_id": cert_id, "reason": reason}),
        )
    };
    let response = call(&app, revoke("Issued in error")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = call(&app, revoke("Again")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let list = body_json(call(&app, get(&format!("/issuers/{issuer_id}/revocations"), None)).await).await;
    assert_eq!(list["type"], "RevocationList");
    assert_eq!(list["revokedAssertions"][0]["id"], format!("urn:uuid:{cert_id}"));
    assert_eq!(list["revokedAssertions"][0]["revocationReason"], "Issued in error");
}

#[tokio::test]
async fn test_revoke_unknown_certificate_is_not_found() {
    let (app, _, _) = test_app();
    let issuer = create_issuer(&app, UserId::new(), "Acme", None).await;
    let issuer_id = issuer["id"].as_str().unwrap();
    let response = call(
        &app,
        send_json(
            "POST",
            &format!("/issuers/{issuer_id}/revoke"),
            None,
            json!({"certificate_id": uuid::Uuid::new_v4(), "reason": "nope"}),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Public documents ---------------------------------------------------------

#[tokio::test]
async fn test_profile_document_shape() {
    let (app, _, _) = test_app();
    let issuer = create_issuer(&app, UserId::new(), "Acme", None).await;
    let id = issuer["id"].as_str().unwrap();
    let profile = body_json(call(&app, get(&format!("/issuers/{id}/profile"), None)).await).await;
    assert_eq!(profile["type"], "Profile");
    assert_eq!(profile["id"], format!("https://badges.example/issuers/{id}/profile"));
    assert_eq!(profile["introductionURL"], format!("https://badges.example/issuers/{id}/intro"));
    assert_eq!(profile["revocationList"], format!("https://badges.example/issuers/{id}/revocations"));
    assert_eq!(profile["publicKey"][0]["id"], "ecdsa-koblitz-pubkey:pubK");
}

// -- OpenAPI ------------------------------------------------------------------

#[tokio::test]
async fn test_openapi_document_lists_issuance_paths() {
    let (app, _, _) = test_app();
    let response = call(&app, get("/openapi.json", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let spec = body_json(response).await;
    assert!(spec["paths"]
        .get("/issuers/{id}/badges/{badge_id}/issue")
        .is_some());
    assert!(spec["paths"].get("/issuers/{id}/intro").is_some());
}
