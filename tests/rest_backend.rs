use std::time::Duration;

use httpmock::MockServer;
use serde_json::{Value, json};
use url::Url;

use agencia::application::backend::{
    AuthBackend, DataBackend, Filter, Row, Table, TableQuery,
};
use agencia::config::BackendSettings;
use agencia::infra::error::InfraError;
use agencia::infra::rest::RestBackend;

const ANON_KEY: &str = "anon-key";

fn backend(server: &MockServer) -> RestBackend {
    let settings = BackendSettings {
        url: Some(Url::parse(&server.base_url()).expect("base url")),
        anon_key: Some(ANON_KEY.to_string()),
        timeout: Duration::from_secs(5),
    };
    RestBackend::new(&settings).expect("backend")
}

fn row(value: Value) -> Row {
    match value {
        Value::Object(row) => row,
        other => panic!("not an object: {other}"),
    }
}

#[test]
fn missing_url_is_a_configuration_error() {
    let settings = BackendSettings {
        url: None,
        anon_key: None,
        timeout: Duration::from_secs(5),
    };
    let err = RestBackend::new(&settings).expect_err("no url");
    assert!(matches!(err, InfraError::Configuration { .. }));
}

#[tokio::test]
async fn select_sends_filters_order_and_key() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/rest/v1/articles")
            .query_param("status", "eq.published")
            .query_param("published_at", "lte.2026-03-01T12:00:00Z")
            .query_param("order", "published_at.desc")
            .query_param("select", "*")
            .header("apikey", ANON_KEY)
            .header("authorization", "Bearer anon-key");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"slug":"a"},{"slug":"b"}]"#);
    });

    let rows = backend(&server)
        .select(
            &TableQuery::from(Table::Articles)
                .filter(Filter::eq("status", "published"))
                .filter(Filter::lte("published_at", "2026-03-01T12:00:00Z"))
                .order_desc("published_at"),
        )
        .await
        .expect("select");

    mock.assert();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].get("slug"), Some(&Value::from("b")));
}

#[tokio::test]
async fn single_read_maps_the_no_rows_response() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("GET")
            .path("/rest/v1/profiles")
            .query_param("id", "eq.42")
            .header("accept", "application/vnd.pgrst.object+json");
        then.status(406)
            .header("content-type", "application/json")
            .body(r#"{"code":"PGRST116","message":"JSON object requested, multiple (or no) rows returned","details":"The result contains 0 rows"}"#);
    });

    let err = backend(&server)
        .select_single(&TableQuery::from(Table::Profiles).filter(Filter::eq("id", "42")))
        .await
        .expect_err("no rows");

    mock.assert();
    assert!(err.is_no_rows());
    assert_eq!(err.status, Some(406));
}

#[tokio::test]
async fn insert_asks_for_the_stored_row() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/rest/v1/authors")
            .header("prefer", "return=representation")
            .json_body(json!({"name": "Marina"}));
        then.status(201)
            .header("content-type", "application/json")
            .body(r#"{"id":"7b1d3c1e-8f0e-4b7e-9a55-3f0a0d2b9c11","name":"Marina"}"#);
    });

    let stored = backend(&server)
        .insert(Table::Authors, row(json!({"name": "Marina"})))
        .await
        .expect("insert");

    mock.assert();
    assert_eq!(
        stored.get("id"),
        Some(&Value::from("7b1d3c1e-8f0e-4b7e-9a55-3f0a0d2b9c11"))
    );
}

#[tokio::test]
async fn unique_violations_keep_code_and_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/rest/v1/newsletter_subscriptions");
        then.status(409)
            .header("content-type", "application/json")
            .body(r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#);
    });

    let err = backend(&server)
        .insert(
            Table::NewsletterSubscriptions,
            row(json!({"email": "a@b.co"})),
        )
        .await
        .expect_err("duplicate");

    assert!(err.is_unique_violation());
    assert_eq!(err.status, Some(409));
    assert_eq!(err.message, "duplicate key value violates unique constraint");
}

#[tokio::test]
async fn upsert_names_the_conflict_column() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/rest/v1/profiles")
            .query_param("on_conflict", "id")
            .header("prefer", "return=representation,resolution=merge-duplicates");
        then.status(201)
            .header("content-type", "application/json")
            .body(r#"{"id":"u1","role":"author","approved":true}"#);
    });

    let stored = backend(&server)
        .upsert(
            Table::Profiles,
            row(json!({"id": "u1", "role": "author", "approved": true})),
            "id",
        )
        .await
        .expect("upsert");

    mock.assert();
    assert_eq!(stored.get("approved"), Some(&Value::Bool(true)));
}

#[tokio::test]
async fn procedures_accept_empty_responses() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST")
            .path("/rest/v1/rpc/increment_article_views")
            .json_body(json!({"article_slug": "growth"}));
        then.status(204);
    });

    let result = backend(&server)
        .rpc("increment_article_views", json!({"article_slug": "growth"}))
        .await
        .expect("rpc");

    mock.assert();
    assert_eq!(result, Value::Null);
}

#[tokio::test]
async fn server_functions_live_under_functions_path() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method("POST").path("/functions/v1/send-contact-email");
        then.status(500)
            .header("content-type", "application/json")
            .body(r#"{"error":"mail provider unavailable"}"#);
    });

    let err = backend(&server)
        .invoke("send-contact-email", json!({"name": "Ana"}))
        .await
        .expect_err("function failed");

    mock.assert();
    assert_eq!(err.status, Some(500));
    assert_eq!(err.message, "mail provider unavailable");
}

#[tokio::test]
async fn sign_in_switches_requests_to_the_session_token() {
    let server = MockServer::start();
    let token = server.mock(|when, then| {
        when.method("POST")
            .path("/auth/v1/token")
            .query_param("grant_type", "password")
            .json_body(json!({"email": "ana@agencia.test", "password": "segredo"}));
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"access_token":"tok-123","token_type":"bearer","user":{"id":"2f4d8a5e-1c1b-4d8e-9b0a-5e6f7a8b9c0d","email":"ana@agencia.test"}}"#);
    });
    let user = server.mock(|when, then| {
        when.method("GET")
            .path("/auth/v1/user")
            .header("authorization", "Bearer tok-123");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":"2f4d8a5e-1c1b-4d8e-9b0a-5e6f7a8b9c0d","email":"ana@agencia.test"}"#);
    });
    let logout = server.mock(|when, then| {
        when.method("POST")
            .path("/auth/v1/logout")
            .header("authorization", "Bearer tok-123");
        then.status(204);
    });

    let backend = backend(&server);
    assert!(backend.current_user().await.expect("anonymous").is_none());

    let signed_in = backend
        .sign_in("ana@agencia.test", "segredo")
        .await
        .expect("sign in");
    let current = backend.current_user().await.expect("current");
    assert_eq!(current.as_ref(), Some(&signed_in));

    backend.sign_out().await.expect("sign out");
    assert!(backend.current_user().await.expect("signed out").is_none());

    token.assert();
    user.assert();
    logout.assert();
}

#[tokio::test]
async fn bad_credentials_surface_the_auth_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("POST").path("/auth/v1/token");
        then.status(400)
            .header("content-type", "application/json")
            .body(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#);
    });

    let backend = backend(&server);
    let err = backend
        .sign_in("ana@agencia.test", "errada")
        .await
        .expect_err("rejected");

    assert_eq!(err.message, "Invalid login credentials");
    assert_eq!(err.status, Some(400));
    assert!(backend.current_user().await.expect("still anonymous").is_none());
}
