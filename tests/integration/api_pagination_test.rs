//! Collection loaders against the backend list endpoints

use std::sync::Arc;

use serde_json::json;

use airsense_lib::transport::mock::MockHttpClient;
use airsense_lib::{
    AirsenseError, ApiClient, AuthenticatedTransport, Identity, Session, SessionStore,
};

use crate::test_harness::{wait_signed_in, TestEnvironment, BASE_URL, WAIT};

fn env_page(skip: usize, count: usize) -> String {
    format!("{}env?skip={}&count={}", BASE_URL, skip, count)
}

fn environment(id: i64) -> serde_json::Value {
    json!({"id": id, "name": format!("Site {}", id), "role": "owner"})
}

#[tokio::test]
async fn test_environment_loader_pages_until_short_page() {
    let env = TestEnvironment::new(201);
    env.http
        .mock_json(env_page(0, 2), 200, &json!({"data": [environment(1), environment(2)]}))
        .unwrap();
    env.http
        .mock_json(env_page(2, 2), 200, &json!({"data": [environment(3)]}))
        .unwrap();

    let loader = env.client.environments().unwrap();
    tokio::time::timeout(WAIT, loader.wait_idle()).await.unwrap();
    assert_eq!(loader.state().cursor, 2);
    assert!(loader.state().has_more);

    loader.load_more().await;
    let state = loader.state();
    let ids: Vec<i64> = state.items.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(state.cursor, 3);
    assert!(!state.has_more);

    loader.load_more().await;
    assert_eq!(env.http.get_requests().len(), 2);
}

#[tokio::test]
async fn test_requests_carry_current_session() {
    let env = TestEnvironment::new(201);
    env.http
        .mock_json(env_page(0, 2), 200, &json!({"data": []}))
        .unwrap();

    // Anonymous before sign-in
    env.client.api().environments(0, 2).await.unwrap();

    env.client.start().await;
    env.provider
        .switch_to(Identity::new("uid-1", "a@example.com"))
        .await;
    let state = wait_signed_in(env.store(), "uid-1").await;
    let bearer = state.session().unwrap().bearer();

    env.client.api().environments(0, 2).await.unwrap();

    let requests: Vec<_> = env
        .http
        .get_requests()
        .into_iter()
        .filter(|r| r.url == env_page(0, 2))
        .collect();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].header("Authorization"), None);
    assert_eq!(requests[1].header("Authorization"), Some(bearer.as_str()));
    assert_eq!(requests[1].header("Accept"), Some("application/json"));
}

#[tokio::test]
async fn test_room_loader_uses_environment_path() {
    let env = TestEnvironment::new(201);
    env.http
        .mock_json(
            format!("{}env/7/room?skip=0&count=2", BASE_URL),
            200,
            &json!({"data": [
                {
                    "id": 70,
                    "name": "Lab",
                    "parameters": [
                        {"name": "CO2", "value": 1200.0, "unit": "ppm", "min_value": 400.0, "max_value": 1000.0}
                    ],
                    "device_speed": 3
                }
            ]}),
        )
        .unwrap();

    let loader = env.client.rooms(7).unwrap();
    tokio::time::timeout(WAIT, loader.wait_idle()).await.unwrap();

    let rooms = loader.items();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].device_speed, Some(3));
    let parameters = rooms[0].parameters.as_ref().unwrap();
    assert!(!parameters[0].in_range());
    assert!(!loader.state().has_more);
}

fn api_with_session(http: &MockHttpClient) -> ApiClient {
    let store = SessionStore::with_session(
        Identity::new("uid-1", "a@example.com"),
        Session::new("session-token", "uid-1"),
    );
    ApiClient::new(AuthenticatedTransport::new(Arc::new(http.clone()), store, BASE_URL))
}

#[tokio::test]
async fn test_missing_data_is_empty_body() {
    let http = MockHttpClient::new();
    http.mock_response(env_page(0, 20), 200, "{}");
    http.mock_response(env_page(20, 20), 200, "");
    let api = api_with_session(&http);

    let missing = api.environments(0, 20).await;
    assert!(matches!(missing, Err(AirsenseError::EmptyBody { .. })));

    let blank = api.environments(20, 20).await;
    assert!(matches!(blank, Err(AirsenseError::EmptyBody { .. })));
}

#[tokio::test]
async fn test_error_status_is_transport_failure() {
    let http = MockHttpClient::new();
    http.mock_response(env_page(0, 20), 500, "boom");
    let api = api_with_session(&http);

    match api.environments(0, 20).await {
        Err(AirsenseError::Transport { status, .. }) => assert_eq!(status, Some(500)),
        other => panic!("expected transport failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_page_leaves_loader_usable() {
    let env = TestEnvironment::new(201);
    env.http
        .mock_json(env_page(0, 2), 200, &json!({"data": [environment(1), environment(2)]}))
        .unwrap();
    env.http.mock_failure(env_page(2, 2), "connection reset");

    let loader = env.client.environments().unwrap();
    tokio::time::timeout(WAIT, loader.wait_idle()).await.unwrap();

    loader.load_more().await;
    let state = loader.state();
    assert_eq!(state.items.len(), 2);
    assert!(state.is_idle());
    assert!(state.has_more);

    env.http
        .mock_json(env_page(2, 2), 200, &json!({"data": []}))
        .unwrap();
    loader.load_more().await;
    assert!(!loader.state().has_more);
}
