//! End-to-end authenticator tests
//!
//! Runs the full pipeline against mock servers:
//! - Background requests fetch a `client_credentials` token per request
//! - Interactive requests use (and refresh) the user's stored token
//! - Token endpoint failures stop the request before it is sent
//! - Issuer discovery resolves token endpoints at load time

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mcp_client_auth::config::Config;
use mcp_client_auth::oauth::{AccessToken, AuthorizedClient, AuthorizedClientStore};
use mcp_client_auth::transport::{ClientRequest, FilteredClient};
use mcp_client_auth::{Error, RequestAuthenticator, RequestOrigin};

const BASIC_MCP_CLIENT: &str = "Basic bWNwLWNsaWVudDpzZWNyZXQ=";

fn write_config(dir: &tempfile::TempDir, yaml: &str) -> Config {
    let path = dir.path().join("auth.yaml");
    std::fs::write(&path, yaml).unwrap();
    Config::load(Some(&path)).unwrap()
}

fn config_for(dir: &tempfile::TempDir, auth_server: &MockServer, cc_method: &str) -> Config {
    let token_uri = format!("{}/oauth2/token", auth_server.uri());
    write_config(
        dir,
        &format!(
            r#"
registrations:
  authserver:
    client_id: mcp-client
    client_secret: secret
    authorization_grant_type: authorization_code
    token_uri: "{token_uri}"
  authserver-client-credentials:
    client_id: mcp-client
    client_secret: secret
    authorization_grant_type: client_credentials
    client_authentication_method: {cc_method}
    scopes: [mcp.read]
    token_uri: "{token_uri}"
"#
        ),
    )
}

async fn pipeline(config: &Config, store: Arc<AuthorizedClientStore>) -> FilteredClient {
    let authenticator = Arc::new(RequestAuthenticator::from_config(config, store).await.unwrap());
    FilteredClient::builder()
        .apply(&authenticator.configuration())
        .build(Arc::new(reqwest::Client::new()))
}

fn tools_list(mcp_server: &MockServer, origin: RequestOrigin) -> ClientRequest {
    let request = reqwest::Client::new()
        .post(format!("{}/mcp/message", mcp_server.uri()))
        .header("X-Custom", "1")
        .body(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#)
        .build()
        .unwrap();
    ClientRequest::new(request, origin)
}

#[tokio::test]
async fn background_request_carries_client_credentials_token() {
    let auth_server = MockServer::start().await;
    let mcp_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("authorization", BASIC_MCP_CLIENT))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("scope=mcp.read"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-123",
            "token_type": "Bearer",
            "expires_in": 300
        })))
        .expect(1)
        .mount(&auth_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mcp/message"))
        .and(header("authorization", "Bearer tok-123"))
        .and(header("x-custom", "1"))
        .and(body_string_contains("tools/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&mcp_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir, &auth_server, "client_secret_basic");
    let client = pipeline(&config, Arc::new(AuthorizedClientStore::new())).await;

    let response = client
        .execute(tools_list(&mcp_server, RequestOrigin::Background))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn client_secret_post_sends_credentials_in_body() {
    let auth_server = MockServer::start().await;
    let mcp_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("client_id=mcp-client"))
        .and(body_string_contains("client_secret=secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-post",
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(&auth_server)
        .await;

    Mock::given(method("POST"))
        .and(header("authorization", "Bearer tok-post"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mcp_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir, &auth_server, "client_secret_post");
    let client = pipeline(&config, Arc::new(AuthorizedClientStore::new())).await;

    client
        .execute(tools_list(&mcp_server, RequestOrigin::Background))
        .await
        .unwrap();
}

#[tokio::test]
async fn each_background_request_fetches_a_fresh_token() {
    let auth_server = MockServer::start().await;
    let mcp_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-123",
            "token_type": "Bearer"
        })))
        .expect(3)
        .mount(&auth_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&mcp_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir, &auth_server, "client_secret_basic");
    let client = pipeline(&config, Arc::new(AuthorizedClientStore::new())).await;

    for _ in 0..3 {
        client
            .execute(tools_list(&mcp_server, RequestOrigin::Background))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn token_endpoint_rejection_never_reaches_mcp_server() {
    let auth_server = MockServer::start().await;
    let mcp_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Client authentication failed"
        })))
        .expect(1)
        .mount(&auth_server)
        .await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mcp_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir, &auth_server, "client_secret_basic");
    let client = pipeline(&config, Arc::new(AuthorizedClientStore::new())).await;

    let err = client
        .execute(tools_list(&mcp_server, RequestOrigin::Background))
        .await
        .unwrap_err();

    assert!(err.is_token_endpoint(), "unexpected error: {err}");
    assert!(err.to_string().contains("invalid_client"));
}

#[tokio::test]
async fn interactive_request_uses_stored_user_token() {
    let auth_server = MockServer::start().await;
    let mcp_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&auth_server)
        .await;

    Mock::given(method("POST"))
        .and(header("authorization", "Bearer user-tok"))
        .and(header("x-custom", "1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mcp_server)
        .await;

    let store = Arc::new(AuthorizedClientStore::new());
    store.save(AuthorizedClient {
        registration_id: "authserver".to_string(),
        principal_name: "alice".to_string(),
        access_token: AccessToken::bearer("user-tok").expires_in(3600),
    });

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir, &auth_server, "client_secret_basic");
    let client = pipeline(&config, store).await;

    client
        .execute(tools_list(&mcp_server, RequestOrigin::interactive("alice")))
        .await
        .unwrap();
}

#[tokio::test]
async fn expired_user_token_is_refreshed() {
    let auth_server = MockServer::start().await;
    let mcp_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=r-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "user-tok-2",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&auth_server)
        .await;

    Mock::given(method("POST"))
        .and(header("authorization", "Bearer user-tok-2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mcp_server)
        .await;

    let store = Arc::new(AuthorizedClientStore::new());
    store.save(AuthorizedClient {
        registration_id: "authserver".to_string(),
        principal_name: "alice".to_string(),
        access_token: AccessToken::bearer("user-tok-1")
            .expires_in(0)
            .with_refresh_token("r-1"),
    });

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir, &auth_server, "client_secret_basic");
    let client = pipeline(&config, store.clone()).await;

    // second call uses the refreshed token without another refresh
    for _ in 0..2 {
        client
            .execute(tools_list(&mcp_server, RequestOrigin::interactive("alice")))
            .await
            .unwrap();
    }

    let saved = store.load("authserver", "alice").unwrap();
    assert_eq!(saved.access_token.token_value, "user-tok-2");
    assert_eq!(saved.access_token.refresh_token.as_deref(), Some("r-1"));
}

#[tokio::test]
async fn interactive_user_without_token_needs_authorization() {
    let auth_server = MockServer::start().await;
    let mcp_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mcp_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir, &auth_server, "client_secret_basic");
    let client = pipeline(&config, Arc::new(AuthorizedClientStore::new())).await;

    let err = client
        .execute(tools_list(&mcp_server, RequestOrigin::interactive("bob")))
        .await
        .unwrap_err();

    match err {
        Error::AuthorizationRequired {
            registration_id,
            principal,
        } => {
            assert_eq!(registration_id, "authserver");
            assert_eq!(principal, "bob");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn issuer_discovery_resolves_token_endpoint() {
    let auth_server = MockServer::start().await;
    let mcp_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/oauth-authorization-server"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": auth_server.uri(),
            "token_endpoint": format!("{}/connect/token", auth_server.uri()),
            "grant_types_supported": ["authorization_code", "client_credentials", "refresh_token"]
        })))
        .mount(&auth_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/connect/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-discovered",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&auth_server)
        .await;

    Mock::given(method("POST"))
        .and(header("authorization", "Bearer tok-discovered"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mcp_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        &dir,
        &format!(
            r#"
registrations:
  authserver:
    client_id: mcp-client
    authorization_grant_type: authorization_code
    issuer_uri: "{issuer}"
  authserver-client-credentials:
    client_id: mcp-client
    client_secret: secret
    authorization_grant_type: client_credentials
    issuer_uri: "{issuer}"
"#,
            issuer = auth_server.uri()
        ),
    );
    let client = pipeline(&config, Arc::new(AuthorizedClientStore::new())).await;

    client
        .execute(tools_list(&mcp_server, RequestOrigin::Background))
        .await
        .unwrap();
}

#[tokio::test]
async fn unreachable_issuer_is_a_configuration_error() {
    let auth_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&auth_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        &dir,
        &format!(
            r#"
registrations:
  authserver:
    client_id: mcp-client
    authorization_grant_type: authorization_code
    token_uri: "{issuer}/oauth2/token"
  authserver-client-credentials:
    client_id: mcp-client
    authorization_grant_type: client_credentials
    issuer_uri: "{issuer}"
"#,
            issuer = auth_server.uri()
        ),
    );

    let err = RequestAuthenticator::from_config(&config, Arc::new(AuthorizedClientStore::new()))
        .await
        .err()
        .unwrap();
    assert!(err.is_configuration(), "unexpected error: {err}");
    assert!(err.to_string().contains("authserver-client-credentials"));
}
