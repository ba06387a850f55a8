//! End-to-end proxy tests: a real gateway listener in front of a wiremock
//! upstream, driven over HTTP. Covers the login → token → forward flow,
//! scope rejection, upstream error relay and upstream timeout handling.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flowgate::identity::{
    hash_password, Authenticator, MokaTokenCache, Principal, Role, StaticPrincipalStore,
};
use flowgate::inspect::RuleSet;
use flowgate::server::{build_router, AppState};
use flowgate::upstream::Forwarder;

const PASSWORD: &str = "s3cr3t!";

fn principals() -> Vec<Principal> {
    vec![
        Principal {
            username: "alice".into(),
            password_hash: hash_password(PASSWORD).expect("hash"),
            role: Role::Operator,
            workspaces: vec!["ws1".into()],
            is_active: true,
        },
        Principal {
            username: "rita".into(),
            password_hash: hash_password(PASSWORD).expect("hash"),
            role: Role::ReadOnly,
            workspaces: vec!["ws1".into()],
            is_active: true,
        },
    ]
}

fn state_for(upstream_url: &str, upstream_timeout: Duration) -> AppState {
    let ttl = Duration::from_secs(60);
    let store = Arc::new(StaticPrincipalStore::new(principals()));
    let cache = Arc::new(MokaTokenCache::new(ttl, 1024));
    AppState {
        authenticator: Arc::new(Authenticator::new(store, cache, ttl)),
        rules: Arc::new(RuleSet::default_policy()),
        forwarder: Arc::new(Forwarder::new(upstream_url, upstream_timeout, 8).expect("forwarder")),
    }
}

async fn spawn_gateway(state: AppState) -> String {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    format!("http://{}", addr)
}

async fn login(client: &reqwest::Client, base: &str, username: &str, password: &str) -> reqwest::Response {
    client
        .post(format!("{}/auth/login", base))
        .json(&json!({"username": username, "password": password}))
        .send()
        .await
        .expect("login request")
}

async fn token_for(client: &reqwest::Client, base: &str, username: &str) -> String {
    let resp = login(client, base, username, PASSWORD).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.expect("json");
    assert_eq!(body["success"], json!(true));
    body["token"].as_str().expect("token").to_string()
}

async fn post_graphql(
    client: &reqwest::Client,
    base: &str,
    token: Option<&str>,
    query: &str,
) -> reqwest::Response {
    let mut req = client
        .post(format!("{}/graphql", base))
        .json(&json!({"query": query}));
    if let Some(t) = token {
        req = req.bearer_auth(t);
    }
    req.send().await.expect("graphql request")
}

#[tokio::test]
async fn liveness_probe_answers() -> Result<()> {
    let upstream = MockServer::start().await;
    let base = spawn_gateway(state_for(&format!("{}/graphql", upstream.uri()), Duration::from_secs(5))).await;
    let body = reqwest::get(&base).await?.text().await?;
    assert_eq!(body, "flowgate ok");
    Ok(())
}

#[tokio::test]
async fn login_success_and_uniform_failure() -> Result<()> {
    let upstream = MockServer::start().await;
    let base = spawn_gateway(state_for(&format!("{}/graphql", upstream.uri()), Duration::from_secs(5))).await;
    let client = reqwest::Client::new();

    let ok = login(&client, &base, "alice", PASSWORD).await;
    assert_eq!(ok.status(), 200);
    let body: serde_json::Value = ok.json().await?;
    assert_eq!(body["success"], json!(true));
    assert!(!body["token"].as_str().unwrap_or_default().is_empty());

    // Wrong password and unknown user are indistinguishable from outside
    let wrong = login(&client, &base, "alice", "nope").await;
    let unknown = login(&client, &base, "nobody", "nope").await;
    assert_eq!(wrong.status(), 401);
    assert_eq!(unknown.status(), 401);
    let wrong_body: serde_json::Value = wrong.json().await?;
    let unknown_body: serde_json::Value = unknown.json().await?;
    assert_eq!(wrong_body, unknown_body, "failure bodies must not distinguish the cause");
    Ok(())
}

#[tokio::test]
async fn operator_query_in_scope_is_forwarded_and_relayed() -> Result<()> {
    let upstream = MockServer::start().await;
    let upstream_body = json!({"data": {"workspace": {"flows": ["hello-flow"]}}});
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains("ws1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(upstream_body.clone()))
        .expect(1)
        .mount(&upstream)
        .await;

    let base = spawn_gateway(state_for(&format!("{}/graphql", upstream.uri()), Duration::from_secs(5))).await;
    let client = reqwest::Client::new();
    let token = token_for(&client, &base, "alice").await;

    let resp = post_graphql(&client, &base, Some(&token), r#"{ workspace(id: "ws1") { flows } }"#).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body, upstream_body, "upstream response is relayed verbatim");
    Ok(())
}

#[tokio::test]
async fn operator_query_out_of_scope_is_forbidden_before_forwarding() -> Result<()> {
    let upstream = MockServer::start().await;
    // No mock mounted: any upstream call would 404 and fail the relay check
    let base = spawn_gateway(state_for(&format!("{}/graphql", upstream.uri()), Duration::from_secs(5))).await;
    let client = reqwest::Client::new();
    let token = token_for(&client, &base, "alice").await;

    let resp = post_graphql(&client, &base, Some(&token), r#"{ workspace(id: "ws2") { flows } }"#).await;
    assert_eq!(resp.status(), 403);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["type"], "forbidden");
    assert_eq!(upstream.received_requests().await.unwrap_or_default().len(), 0);
    Ok(())
}

#[tokio::test]
async fn missing_workspace_argument_is_injected_before_forwarding() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(body_string_contains(r#"id: \"ws1\""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"workspace": null}})))
        .expect(1)
        .mount(&upstream)
        .await;

    let base = spawn_gateway(state_for(&format!("{}/graphql", upstream.uri()), Duration::from_secs(5))).await;
    let client = reqwest::Client::new();
    let token = token_for(&client, &base, "alice").await;

    let resp = post_graphql(&client, &base, Some(&token), "{ workspace { flows } }").await;
    assert_eq!(resp.status(), 200, "rewritten document should reach the upstream mock");
    Ok(())
}

#[tokio::test]
async fn read_only_mutation_is_forbidden() -> Result<()> {
    let upstream = MockServer::start().await;
    let base = spawn_gateway(state_for(&format!("{}/graphql", upstream.uri()), Duration::from_secs(5))).await;
    let client = reqwest::Client::new();
    let token = token_for(&client, &base, "rita").await;

    let resp = post_graphql(
        &client,
        &base,
        Some(&token),
        r#"mutation { create_flow_run(input: {}) { id } }"#,
    )
    .await;
    assert_eq!(resp.status(), 403);
    Ok(())
}

#[tokio::test]
async fn requests_without_or_with_stale_tokens_are_unauthenticated() -> Result<()> {
    let upstream = MockServer::start().await;
    let base = spawn_gateway(state_for(&format!("{}/graphql", upstream.uri()), Duration::from_secs(5))).await;
    let client = reqwest::Client::new();

    let no_token = post_graphql(&client, &base, None, "{ flow_run { id } }").await;
    assert_eq!(no_token.status(), 401);

    let bogus = post_graphql(&client, &base, Some("not-a-real-token"), "{ flow_run { id } }").await;
    assert_eq!(bogus.status(), 401);

    // A logged-out token behaves like an expired one
    let token = token_for(&client, &base, "alice").await;
    let logout = client
        .post(format!("{}/auth/logout", base))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(logout.status(), 200);
    let after = post_graphql(&client, &base, Some(&token), "{ flow_run { id } }").await;
    assert_eq!(after.status(), 401);
    Ok(())
}

#[tokio::test]
async fn malformed_document_is_rejected_without_forwarding() -> Result<()> {
    let upstream = MockServer::start().await;
    let base = spawn_gateway(state_for(&format!("{}/graphql", upstream.uri()), Duration::from_secs(5))).await;
    let client = reqwest::Client::new();
    let token = token_for(&client, &base, "alice").await;

    let resp = post_graphql(&client, &base, Some(&token), "{ workspace(id: ").await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["type"], "invalid_operation");
    assert_eq!(upstream.received_requests().await.unwrap_or_default().len(), 0);
    Ok(())
}

#[tokio::test]
async fn upstream_error_status_is_relayed_with_its_body() -> Result<()> {
    let upstream = MockServer::start().await;
    let error_body = json!({"errors": [{"message": "boom"}]});
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(ResponseTemplate::new(500).set_body_json(error_body.clone()))
        .mount(&upstream)
        .await;

    let base = spawn_gateway(state_for(&format!("{}/graphql", upstream.uri()), Duration::from_secs(5))).await;
    let client = reqwest::Client::new();
    let token = token_for(&client, &base, "alice").await;

    let resp = post_graphql(&client, &base, Some(&token), r#"{ workspace(id: "ws1") { flows } }"#).await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body, error_body, "GraphQL-level errors stay visible to the client");
    Ok(())
}

#[tokio::test]
async fn upstream_timeout_maps_to_unavailable_with_retry_hint() -> Result<()> {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": null}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&upstream)
        .await;

    // Forwarder timeout far below the mock's delay
    let base = spawn_gateway(state_for(&format!("{}/graphql", upstream.uri()), Duration::from_millis(200))).await;
    let client = reqwest::Client::new();
    let token = token_for(&client, &base, "alice").await;

    let resp = post_graphql(&client, &base, Some(&token), r#"{ workspace(id: "ws1") { flows } }"#).await;
    assert_eq!(resp.status(), 503);
    assert_eq!(
        resp.headers().get("retry-after").and_then(|v| v.to_str().ok()),
        Some("5")
    );
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["type"], "upstream_unavailable");
    assert!(body["message"].as_str().unwrap_or_default().contains("timed out"));
    Ok(())
}

#[tokio::test]
async fn unreachable_upstream_maps_to_unavailable() -> Result<()> {
    // Point at a port nothing listens on
    let base = spawn_gateway(state_for("http://127.0.0.1:9/graphql", Duration::from_millis(500))).await;
    let client = reqwest::Client::new();
    let token = token_for(&client, &base, "alice").await;

    let resp = post_graphql(&client, &base, Some(&token), r#"{ workspace(id: "ws1") { flows } }"#).await;
    assert_eq!(resp.status(), 503);
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["type"], "upstream_unavailable");
    Ok(())
}
