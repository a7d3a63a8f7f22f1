use super::*;

use crate::backend::store::MemorySessionStore;
use crate::config::ConsoleConfig;

fn backend() -> HttpAuthBackend {
    backend_with_store(Arc::new(MemorySessionStore::new()))
}

fn backend_with_store(store: Arc<dyn SessionStore>) -> HttpAuthBackend {
    let config = ConsoleConfig::new("https://proj.clika.dev", "anon-key", "https://console.clika.dev/cb");
    HttpAuthBackend::new(&config, store)
}

fn wire_user() -> WireUser {
    WireUser {
        id: Uuid::nil(),
        email: Some("ops@clika.io".into()),
        user_metadata: serde_json::Value::Null,
    }
}

// =============================================================================
// bytes_to_hex / generate_token
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
}

#[test]
fn bytes_to_hex_multi_byte() {
    assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
}

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_token_two_calls_differ() {
    assert_ne!(generate_token(), generate_token());
}

// =============================================================================
// pkce_challenge
// =============================================================================

#[test]
fn pkce_challenge_known_vector() {
    // sha256("test"), base64url without padding.
    assert_eq!(pkce_challenge("test"), "n4bQgYhMfWWaL-qgxVrQFaO_TxsrC4Is0V1sFbDwCgg");
}

#[test]
fn pkce_challenge_is_url_safe() {
    let challenge = pkce_challenge(&generate_token());
    assert_eq!(challenge.len(), 43);
    assert!(!challenge.contains('+'));
    assert!(!challenge.contains('/'));
    assert!(!challenge.contains('='));
}

// =============================================================================
// map_auth_failure
// =============================================================================

#[test]
fn failure_invalid_credentials_code() {
    let body = r#"{"error_code": "invalid_credentials", "msg": "Invalid login credentials"}"#;
    let err = map_auth_failure(reqwest::StatusCode::BAD_REQUEST, body);
    assert_eq!(err, AuthError::InvalidCredentials);
}

#[test]
fn failure_invalid_grant_code() {
    let body = r#"{"error_code": "invalid_grant", "msg": "refresh token already used"}"#;
    let err = map_auth_failure(reqwest::StatusCode::BAD_REQUEST, body);
    assert_eq!(err, AuthError::InvalidCredentials);
}

#[test]
fn failure_email_not_confirmed_is_distinct() {
    let body = r#"{"error_code": "email_not_confirmed", "msg": "Email not confirmed"}"#;
    let err = map_auth_failure(reqwest::StatusCode::BAD_REQUEST, body);
    assert_eq!(err, AuthError::EmailNotConfirmed);
}

#[test]
fn failure_unknown_code_is_transport_with_msg() {
    let body = r#"{"error_code": "over_request_rate_limit", "msg": "too many requests"}"#;
    let err = map_auth_failure(reqwest::StatusCode::TOO_MANY_REQUESTS, body);
    let AuthError::Transport(msg) = err else {
        panic!("expected transport error");
    };
    assert!(msg.contains("429"));
    assert!(msg.contains("too many requests"));
}

#[test]
fn failure_non_json_body_is_transport_with_body() {
    let err = map_auth_failure(reqwest::StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
    let AuthError::Transport(msg) = err else {
        panic!("expected transport error");
    };
    assert!(msg.contains("bad gateway"));
}

// =============================================================================
// session_from_response
// =============================================================================

#[test]
fn session_uses_explicit_expires_at() {
    let token = TokenResponse {
        access_token: "at".into(),
        refresh_token: "rt".into(),
        expires_in: Some(3600),
        expires_at: Some(1_700_000_000),
        user: wire_user(),
    };
    let session = session_from_response(token);
    assert_eq!(session.expires_at, 1_700_000_000);
    assert_eq!(session.identity.id, Uuid::nil());
}

#[test]
fn session_derives_expiry_from_expires_in() {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let token = TokenResponse {
        access_token: "at".into(),
        refresh_token: "rt".into(),
        expires_in: Some(120),
        expires_at: None,
        user: wire_user(),
    };
    let session = session_from_response(token);
    assert!(session.expires_at >= now + 119);
    assert!(session.expires_at <= now + 121);
}

#[test]
fn session_defaults_expiry_without_hints() {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let token = TokenResponse {
        access_token: "at".into(),
        refresh_token: "rt".into(),
        expires_in: None,
        expires_at: None,
        user: wire_user(),
    };
    let session = session_from_response(token);
    assert!(session.expires_at >= now + DEFAULT_EXPIRES_IN_SECS - 1);
}

#[test]
fn wire_user_maps_to_identity() {
    let mut user = wire_user();
    user.user_metadata = serde_json::json!({ "role": "editor" });
    let identity: Identity = user.into();
    assert_eq!(identity.email.as_deref(), Some("ops@clika.io"));
    assert_eq!(identity.metadata["role"], "editor");
}

// =============================================================================
// oauth begin/complete (no network up to the state check)
// =============================================================================

#[tokio::test]
async fn begin_oauth_builds_authorize_url() {
    let backend = backend();
    let url = backend.begin_oauth(OAuthProvider::Github).await.unwrap();
    assert!(url.starts_with("https://proj.clika.dev/auth/v1/authorize"));
    assert!(url.contains("provider=github"));
    assert!(url.contains("redirect_to=https://console.clika.dev/cb"));
    assert!(url.contains("state="));
    assert!(url.contains("code_challenge="));
    assert!(url.contains("code_challenge_method=s256"));
}

#[tokio::test]
async fn begin_oauth_states_are_unique_per_flow() {
    let backend = backend();
    let first = backend.begin_oauth(OAuthProvider::Google).await.unwrap();
    let second = backend.begin_oauth(OAuthProvider::Google).await.unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn complete_oauth_without_begin_errors() {
    let backend = backend();
    let err = backend.complete_oauth("code", "state").await.unwrap_err();
    assert_eq!(err, AuthError::OAuthNotStarted);
}

#[tokio::test]
async fn complete_oauth_rejects_mismatched_state() {
    let backend = backend();
    backend.begin_oauth(OAuthProvider::Github).await.unwrap();
    let err = backend.complete_oauth("code", "forged-state").await.unwrap_err();
    assert_eq!(err, AuthError::OAuthStateMismatch);
}

#[tokio::test]
async fn complete_oauth_consumes_the_pending_flow() {
    let backend = backend();
    backend.begin_oauth(OAuthProvider::Github).await.unwrap();
    let _ = backend.complete_oauth("code", "forged-state").await;
    let err = backend.complete_oauth("code", "forged-state").await.unwrap_err();
    assert_eq!(err, AuthError::OAuthNotStarted);
}

// =============================================================================
// persisted_session / sign_out without a bundle (no network)
// =============================================================================

#[tokio::test]
async fn restore_without_bundle_is_none_and_emits_initial_session() {
    let backend = backend();
    let mut rx = backend.events();

    let restored = backend.persisted_session().await.unwrap();
    assert!(restored.is_none());

    let event = rx.recv().await.unwrap();
    assert_eq!(event.kind, SessionEventKind::InitialSession);
    assert!(event.session.is_none());
}

#[tokio::test]
async fn sign_out_without_bundle_still_emits_signed_out() {
    let store = Arc::new(MemorySessionStore::new());
    let backend = backend_with_store(store.clone());
    let mut rx = backend.events();

    backend.sign_out().await.unwrap();
    assert!(store.load().is_none());

    let event = rx.recv().await.unwrap();
    assert_eq!(event.kind, SessionEventKind::SignedOut);
    assert!(event.session.is_none());
}

#[tokio::test]
async fn refresh_without_bundle_is_not_authenticated() {
    let backend = backend();
    let err = backend.refresh().await.unwrap_err();
    assert_eq!(err, AuthError::NotAuthenticated);
}

#[tokio::test]
async fn update_user_without_bundle_is_not_authenticated() {
    let backend = backend();
    let err = backend.update_user(&UserChanges::default()).await.unwrap_err();
    assert_eq!(err, AuthError::NotAuthenticated);
}

#[tokio::test]
async fn events_fan_out_to_every_subscriber() {
    let backend = backend();
    let mut first = backend.events();
    let mut second = backend.events();

    backend.persisted_session().await.unwrap();

    assert_eq!(first.recv().await.unwrap().kind, SessionEventKind::InitialSession);
    assert_eq!(second.recv().await.unwrap().kind, SessionEventKind::InitialSession);
}
