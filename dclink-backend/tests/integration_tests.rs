use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dclink_backend::config::Config;
use dclink_backend::{AppState, RateLimitConfig, create_app, helpers};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
// for `oneshot` method

const TEST_API_KEY: &str = "test-push-key";
const UUID_STEVE: &str = "069a79f4-44e9-4726-a5be-fca90e38aaf5";

/// Helper to create test database with in-memory SQLite
async fn setup_test_db() -> dclink_db::Database {
    dclink_db::Database::open_in_memory()
        .await
        .expect("Failed to create in-memory database")
}

/// Helper to build app state with the test push key configured
fn test_state(db: dclink_db::Database) -> Arc<AppState> {
    let mut config = Config::default();
    config.api_key = TEST_API_KEY.to_string();
    AppState::new(db, &config)
}

/// Helper to create app with default test configuration
fn create_test_app(state: Arc<AppState>) -> axum::Router {
    let config = Config::default();
    create_app(
        state,
        config.request_body_limit,
        config.request_timeout,
        RateLimitConfig::default(),
    )
}

/// Helper to send a request and get response
async fn send_request(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    auth_token: Option<&str>,
) -> (StatusCode, Value) {
    let mut request_builder = Request::builder()
        .uri(uri)
        .method(method)
        // SmartIpKeyExtractor needs a peer address; oneshot has none
        .header("x-forwarded-for", "127.0.0.1");

    // Add Authorization header if provided
    if let Some(token) = auth_token {
        request_builder = request_builder.header("Authorization", format!("Bearer {}", token));
    }

    // Build request with body
    let request = if let Some(json_body) = body {
        request_builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_vec(&json_body).unwrap()))
            .unwrap()
    } else {
        request_builder.body(Body::empty()).unwrap()
    };

    // Send request
    let response = app.oneshot(request).await.unwrap();

    // Extract status
    let status = response.status();

    // Extract body
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();

    // Try to parse as JSON, or return empty object
    let json = if body_bytes.is_empty() {
        json!({})
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(json!({}))
    };

    (status, json)
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Making a GET request to /health
    let (status, _body) = send_request(app, "GET", "/health", None, None).await;

    // THEN: Should return 200 OK
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_endpoint_with_post_method() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Making a POST request to /health (wrong method)
    let (status, _body) = send_request(app, "POST", "/health", None, None).await;

    // THEN: Should return 405 Method Not Allowed
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_health_degrades_when_a_loop_dies() {
    // GIVEN: An application whose health flag has been cleared
    let state = test_state(setup_test_db().await);
    state
        .healthy
        .store(false, std::sync::atomic::Ordering::SeqCst);
    let app = create_test_app(state);

    // WHEN: Making a GET request to /health
    let (status, _body) = send_request(app, "GET", "/health", None, None).await;

    // THEN: Should return 503 Service Unavailable
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

// =============================================================================
// JOIN / LEAVE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_join_adds_player_to_presence() {
    // GIVEN: A running application with no players online
    let state = test_state(setup_test_db().await);
    let app = create_test_app(Arc::clone(&state));

    // WHEN: Pushing a join event
    let (status, _body) = send_request(
        app,
        "POST",
        "/join",
        Some(json!({ "player": "Steve" })),
        Some(TEST_API_KEY),
    )
    .await;

    // THEN: Should return 200 OK and the player appears in presence
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.presence.current(), vec!["Steve".to_string()]);
}

#[tokio::test]
async fn test_join_is_idempotent() {
    // GIVEN: A player already online
    let state = test_state(setup_test_db().await);
    let app = create_test_app(Arc::clone(&state));
    let (first, _) = send_request(
        app.clone(),
        "POST",
        "/join",
        Some(json!({ "player": "Steve" })),
        Some(TEST_API_KEY),
    )
    .await;
    assert_eq!(first, StatusCode::OK);

    // WHEN: Pushing the same join again
    let (status, _body) = send_request(
        app,
        "POST",
        "/join",
        Some(json!({ "player": "Steve" })),
        Some(TEST_API_KEY),
    )
    .await;

    // THEN: Should return 200 OK and the player is listed once
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.presence.len(), 1);
}

#[tokio::test]
async fn test_leave_removes_player() {
    // GIVEN: Two players online
    let state = test_state(setup_test_db().await);
    let app = create_test_app(Arc::clone(&state));
    for name in ["Alice", "Bob"] {
        send_request(
            app.clone(),
            "POST",
            "/join",
            Some(json!({ "player": name })),
            Some(TEST_API_KEY),
        )
        .await;
    }

    // WHEN: One of them leaves
    let (status, _body) = send_request(
        app,
        "POST",
        "/leave",
        Some(json!({ "player": "Alice" })),
        Some(TEST_API_KEY),
    )
    .await;

    // THEN: Should return 200 OK and only the other remains
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.presence.current(), vec!["Bob".to_string()]);
}

#[tokio::test]
async fn test_leave_for_absent_player_is_a_noop() {
    // GIVEN: An empty presence set
    let state = test_state(setup_test_db().await);
    let app = create_test_app(Arc::clone(&state));

    // WHEN: Pushing a leave for a player who never joined
    let (status, _body) = send_request(
        app,
        "POST",
        "/leave",
        Some(json!({ "player": "Ghost" })),
        Some(TEST_API_KEY),
    )
    .await;

    // THEN: Should return 200 OK and presence stays empty
    assert_eq!(status, StatusCode::OK);
    assert!(state.presence.is_empty());
}

#[tokio::test]
async fn test_join_rejects_invalid_player_name() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Pushing a join with a name containing a space
    let (status, body) = send_request(
        app,
        "POST",
        "/join",
        Some(json!({ "player": "not a name" })),
        Some(TEST_API_KEY),
    )
    .await;

    // THEN: Should return 400 Bad Request with an error message
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("error").is_some());
}

#[tokio::test]
async fn test_join_rejects_overlong_player_name() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Pushing a join with a 17-character name
    let (status, _body) = send_request(
        app,
        "POST",
        "/join",
        Some(json!({ "player": "a".repeat(17) })),
        Some(TEST_API_KEY),
    )
    .await;

    // THEN: Should return 400 Bad Request
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// AUTHORIZATION TESTS
// =============================================================================

#[tokio::test]
async fn test_join_without_token_is_unauthorized() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(Arc::clone(&state));

    // WHEN: Pushing a join without an Authorization header
    let (status, _body) = send_request(
        app,
        "POST",
        "/join",
        Some(json!({ "player": "Steve" })),
        None,
    )
    .await;

    // THEN: Should be rejected and presence untouched
    assert_ne!(status, StatusCode::OK);
    assert!(state.presence.is_empty());
}

#[tokio::test]
async fn test_join_with_wrong_token_is_unauthorized() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(Arc::clone(&state));

    // WHEN: Pushing a join with the wrong bearer token
    let (status, _body) = send_request(
        app,
        "POST",
        "/join",
        Some(json!({ "player": "Steve" })),
        Some("wrong-key"),
    )
    .await;

    // THEN: Should return 401 Unauthorized and presence untouched
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(state.presence.is_empty());
}

#[tokio::test]
async fn test_push_rejected_when_no_key_configured() {
    // GIVEN: An application started without an API key
    let state = AppState::new(setup_test_db().await, &Config::default());
    let app = create_test_app(state);

    // WHEN: Pushing a join with any token at all
    let (status, _body) = send_request(
        app,
        "POST",
        "/join",
        Some(json!({ "player": "Steve" })),
        Some("anything"),
    )
    .await;

    // THEN: Should return 401 Unauthorized
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// WORLD STATUS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_world_status_push_shows_up_in_status() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Pushing a world status and reading /status back
    let (push_status, _body) = send_request(
        app.clone(),
        "POST",
        "/world-status",
        Some(json!({ "day": 120, "time": 6000 })),
        Some(TEST_API_KEY),
    )
    .await;
    let (read_status, body) = send_request(app, "GET", "/status", None, None).await;

    // THEN: The pushed values are reflected in the snapshot
    assert_eq!(push_status, StatusCode::OK);
    assert_eq!(read_status, StatusCode::OK);
    assert_eq!(body["world_day"], json!(120));
    assert_eq!(body["world_time_ticks"], json!(6000));
}

#[tokio::test]
async fn test_world_status_rejects_out_of_range_time() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Pushing a time of 24000 ticks (one past the valid range)
    let (status, _body) = send_request(
        app,
        "POST",
        "/world-status",
        Some(json!({ "day": 1, "time": 24000 })),
        Some(TEST_API_KEY),
    )
    .await;

    // THEN: Should return 400 Bad Request
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_world_status_rejects_negative_day() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Pushing a negative world day
    let (status, _body) = send_request(
        app,
        "POST",
        "/world-status",
        Some(json!({ "day": -1, "time": 0 })),
        Some(TEST_API_KEY),
    )
    .await;

    // THEN: Should return 400 Bad Request
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// STATUS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_status_requires_no_auth() {
    // GIVEN: A fresh application with nothing cached
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Reading /status without any token
    let (status, body) = send_request(app, "GET", "/status", None, None).await;

    // THEN: Should return 200 OK with the never-resolved defaults
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["online"], json!(0));
    assert_eq!(body["max"], json!(0));
    assert_eq!(body["ping_millis"], Value::Null);
    assert_eq!(body["world_day"], Value::Null);
    assert_eq!(body["players"], json!([]));
}

#[tokio::test]
async fn test_status_falls_back_to_presence_count() {
    // GIVEN: Two pushed joins and no probe ever recorded
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);
    for name in ["Alice", "Bob"] {
        send_request(
            app.clone(),
            "POST",
            "/join",
            Some(json!({ "player": name })),
            Some(TEST_API_KEY),
        )
        .await;
    }

    // WHEN: Reading /status
    let (status, body) = send_request(app, "GET", "/status", None, None).await;

    // THEN: The online count comes from presence and the list is sorted
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["online"], json!(2));
    assert_eq!(body["players"], json!(["Alice", "Bob"]));
}

// =============================================================================
// REGISTRATION CHECK ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_registration_check_for_linked_account() {
    // GIVEN: A linked account
    let db = setup_test_db().await;
    db.link_account(
        UUID_STEVE.to_string(),
        111,
        "Steve".to_string(),
        helpers::now(),
        20,
    )
    .await
    .expect("Failed to link account");
    let state = test_state(db);
    let app = create_test_app(state);

    // WHEN: The game server checks the account UUID
    let uri = format!("/registration/{UUID_STEVE}");
    let (status, body) = send_request(app, "GET", &uri, None, Some(TEST_API_KEY)).await;

    // THEN: Should report registered with the owning Discord id
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registered"], json!(true));
    assert_eq!(body["discord_id"], json!(111));
}

#[tokio::test]
async fn test_registration_check_for_unknown_uuid() {
    // GIVEN: An empty database
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: The game server checks an unlinked UUID
    let uri = format!("/registration/{UUID_STEVE}");
    let (status, body) = send_request(app, "GET", &uri, None, Some(TEST_API_KEY)).await;

    // THEN: Unregistered is a 200-level answer, not an error
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registered"], json!(false));
    assert_eq!(body.get("discord_id"), None);
}

#[tokio::test]
async fn test_registration_check_requires_auth() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Checking without a token
    let uri = format!("/registration/{UUID_STEVE}");
    let (status, _body) = send_request(app, "GET", &uri, None, None).await;

    // THEN: Should be rejected
    assert_ne!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_registration_check_rejects_undashed_uuid() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Checking a UUID without dashes
    let (status, _body) = send_request(
        app,
        "GET",
        "/registration/069a79f444e94726a5befca90e38aaf5",
        None,
        Some(TEST_API_KEY),
    )
    .await;

    // THEN: Should return 400 Bad Request
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// PROFILE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_profile_requires_auth() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Fetching a profile without a token
    let (status, _body) = send_request(app, "GET", "/profile/Steve", None, None).await;

    // THEN: Should be rejected
    assert_ne!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_profile_for_unlinked_player_is_not_found() {
    // GIVEN: An empty database
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Fetching a profile for an unknown name
    let (status, body) = send_request(app, "GET", "/profile/Steve", None, Some(TEST_API_KEY)).await;

    // THEN: Should return 404 Not Found with an error body
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.get("error").is_some());
}

#[tokio::test]
async fn test_profile_serves_durable_row_when_rcon_unconfigured() {
    // GIVEN: A linked account with a previously refreshed profile
    let db = setup_test_db().await;
    db.link_account(
        UUID_STEVE.to_string(),
        111,
        "Steve".to_string(),
        helpers::now(),
        20,
    )
    .await
    .expect("Failed to link account");
    db.upsert_profile(UUID_STEVE.to_string(), 30, 7200, 4, helpers::now())
        .await
        .expect("Failed to upsert profile");
    let state = test_state(db);
    let app = create_test_app(state);

    // WHEN: Fetching the profile (no rcon configured, so no live fetch)
    let (status, body) = send_request(app, "GET", "/profile/Steve", None, Some(TEST_API_KEY)).await;

    // THEN: The durable row is served and flagged as not live
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uuid"], json!(UUID_STEVE));
    assert_eq!(body["level"], json!(30));
    assert_eq!(body["playtime_seconds"], json!(7200));
    assert_eq!(body["deaths"], json!(4));
    assert_eq!(body["live"], json!(false));
}

#[tokio::test]
async fn test_profile_lookup_is_case_insensitive() {
    // GIVEN: A linked account stored with mixed case
    let db = setup_test_db().await;
    db.link_account(
        UUID_STEVE.to_string(),
        111,
        "Steve".to_string(),
        helpers::now(),
        20,
    )
    .await
    .expect("Failed to link account");
    db.upsert_profile(UUID_STEVE.to_string(), 30, 7200, 4, helpers::now())
        .await
        .expect("Failed to upsert profile");
    let state = test_state(db);
    let app = create_test_app(state);

    // WHEN: Fetching the profile with a lowercased name
    let (status, body) = send_request(app, "GET", "/profile/steve", None, Some(TEST_API_KEY)).await;

    // THEN: The same profile is found
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uuid"], json!(UUID_STEVE));
}

#[tokio::test]
async fn test_profile_rejects_invalid_name() {
    // GIVEN: A running application
    let state = test_state(setup_test_db().await);
    let app = create_test_app(state);

    // WHEN: Fetching a profile for a name with invalid characters
    let (status, _body) =
        send_request(app, "GET", "/profile/bad!name", None, Some(TEST_API_KEY)).await;

    // THEN: Should return 400 Bad Request
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
