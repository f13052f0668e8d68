//! End-to-end tests for the relay over real HTTP
//!
//! A `wiremock` server stands in for the SWARFARM API; the relay talks to it
//! through `HttpTransport` exactly as it would in production.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use swarfarm_logger_core::logging;
use swarfarm_logger_core::{Credential, LiveConfig, LogKind, MemorySink, Relay, SwarfarmConfig};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "0123456789abcdef0123456789abcdef01234567";

fn live_config(server: &MockServer, profile_sync: bool) -> LiveConfig {
    LiveConfig::new(SwarfarmConfig {
        profile_sync,
        api_key: Credential::Single(KEY.to_string()),
        server_url: format!("{}/api/v2/", server.uri()),
        poll_interval_ms: 50,
        job_timeout_secs: 1,
        ..Default::default()
    })
}

async fn mount_commands(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v2/data_logs/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "HubUserLogin": {"request": ["wizard_id"], "response": ["wizard_info"]},
            "__version": "3"
        })))
        .mount(server)
        .await;
}

async fn start(server: &MockServer, profile_sync: bool) -> (Arc<MemorySink>, Relay) {
    logging::init_test();
    let sink = Arc::new(MemorySink::new());
    let relay = Relay::connect(live_config(server, profile_sync), sink.clone())
        .await
        .expect("valid config")
        .expect("relay enabled");
    (sink, relay)
}

fn login_request() -> Value {
    json!({"command": "HubUserLogin", "wizard_id": "w1"})
}

fn login_response() -> Value {
    json!({"wizard_id": "w1", "wizard_info": {"wizard_name": "tester"}, "unit_list": []})
}

async fn posts_to(server: &MockServer, endpoint: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == endpoint)
        .count()
}

// ============================================
// Log submission
// ============================================

#[tokio::test]
async fn test_accepted_event_is_posted_with_token_and_version() {
    let server = MockServer::start().await;
    mount_commands(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/data_logs/"))
        .and(header("authorization", format!("Token {}", KEY).as_str()))
        .and(body_json(json!({"data": {
            "request": login_request(),
            "response": login_response(),
            "__version": "3"
        }})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let (sink, relay) = start(&server, false).await;
    relay.handle_event(login_request(), login_response());
    relay.drain().await;
    relay.shutdown().await;

    assert!(sink.contains("HubUserLogin logged successfully"));
}

#[tokio::test]
async fn test_unaccepted_event_never_reaches_server() {
    let server = MockServer::start().await;
    mount_commands(&server).await;

    let (sink, relay) = start(&server, false).await;
    relay.handle_event(json!({"command": "SummonUnit", "wizard_id": "w1"}), json!({}));
    relay.drain().await;
    relay.shutdown().await;

    assert_eq!(posts_to(&server, "/api/v2/data_logs/").await, 0);
    assert_eq!(sink.count(LogKind::Error), 0);
}

#[tokio::test]
async fn test_auth_failure_and_server_error_are_reported_differently() {
    let server = MockServer::start().await;
    mount_commands(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/data_logs/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Invalid token."})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/data_logs/"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"detail": "boom"})))
        .mount(&server)
        .await;

    let (sink, relay) = start(&server, false).await;
    relay.handle_event(login_request(), login_response());
    relay.drain().await;
    relay.handle_event(login_request(), login_response());
    relay.drain().await;
    relay.shutdown().await;

    assert_eq!(
        sink.messages(LogKind::Error),
        vec![
            "SWARFARM Authentication failure: Invalid token.".to_string(),
            "Error 500: boom".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_stale_cache_signal_refetches_command_list() {
    let server = MockServer::start().await;
    mount_commands(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/data_logs/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reinit": true})))
        .mount(&server)
        .await;

    let (_sink, relay) = start(&server, false).await;
    relay.handle_event(login_request(), login_response());
    relay.drain().await;
    relay.shutdown().await;

    let gets = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count();
    assert_eq!(gets, 2);
}

#[tokio::test]
async fn test_unreachable_server_disables_logging_without_failing() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let sink = Arc::new(MemorySink::new());
    let config = LiveConfig::new(SwarfarmConfig {
        server_url: format!("http://{}/", addr),
        ..Default::default()
    });
    let relay = Relay::connect(config, sink.clone()).await.unwrap().unwrap();
    relay.handle_event(login_request(), login_response());
    relay.drain().await;
    relay.shutdown().await;

    assert!(!relay.cache().is_ready());
    assert!(sink.contains("SWARFARM logging is disabled"));
}

#[tokio::test]
async fn test_disabled_relay_is_not_created() {
    let sink = Arc::new(MemorySink::new());
    let config = LiveConfig::new(SwarfarmConfig {
        enabled: false,
        ..Default::default()
    });

    let relay = Relay::connect(config, sink.clone()).await.unwrap();

    assert!(relay.is_none());
    assert!(sink.entries().is_empty());
}

// ============================================
// Profile sync
// ============================================

#[tokio::test]
async fn test_profile_upload_is_followed_to_success() {
    let server = MockServer::start().await;
    mount_commands(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/data_logs/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/profiles/upload/"))
        .and(header("authorization", format!("Token {}", KEY).as_str()))
        .and(body_json(login_response()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": "abc123"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/profiles/upload/abc123/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "PENDING"})))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/profiles/upload/abc123/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "SUCCESS"})))
        .mount(&server)
        .await;

    let (sink, relay) = start(&server, true).await;
    relay.handle_event(login_request(), login_response());
    relay.drain().await;
    relay.shutdown().await;

    assert!(sink.contains("SWARFARM profile import complete!"));
    assert!(!sink.contains("Timed out"));
    let polls = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/api/v2/profiles/upload/abc123/")
        .count();
    assert_eq!(polls, 3);
}

#[tokio::test]
async fn test_profile_import_that_never_finishes_times_out() {
    let server = MockServer::start().await;
    mount_commands(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/data_logs/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/profiles/upload/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": 77})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/profiles/upload/77/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "STARTED"})))
        .mount(&server)
        .await;

    let (sink, relay) = start(&server, true).await;
    relay.handle_event(login_request(), login_response());
    tokio::time::timeout(Duration::from_secs(10), relay.drain())
        .await
        .expect("poller ends at the failsafe");
    relay.shutdown().await;

    assert_eq!(
        sink.messages(LogKind::Error),
        vec!["Timed out retrieving import status.".to_string()]
    );
    assert_eq!(sink.count(LogKind::Success), 2);
}

#[tokio::test]
async fn test_profile_conflict_requires_manual_upload() {
    let server = MockServer::start().await;
    mount_commands(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/data_logs/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/profiles/upload/"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({"detail": "mismatch"})))
        .mount(&server)
        .await;

    let (sink, relay) = start(&server, true).await;
    relay.handle_event(login_request(), login_response());
    relay.drain().await;
    relay.shutdown().await;

    assert_eq!(posts_to(&server, "/api/v2/profiles/upload/").await, 1);
    assert!(sink.contains("You must manually upload your profile on SWARFARM"));
}

// ============================================
// Error bodies that are not JSON
// ============================================

#[tokio::test]
async fn test_plain_text_server_error_is_reported_verbatim() {
    let server = MockServer::start().await;
    mount_commands(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/data_logs/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Server Error (500)"))
        .mount(&server)
        .await;

    let (sink, relay) = start(&server, false).await;
    relay.handle_event(login_request(), login_response());
    relay.drain().await;
    relay.shutdown().await;

    assert_eq!(
        sink.messages(LogKind::Error),
        vec!["Error 500: Server Error (500)".to_string()]
    );
}

#[tokio::test]
async fn test_plain_text_profile_validation_errors_are_reported_verbatim() {
    let server = MockServer::start().await;
    mount_commands(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/data_logs/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/profiles/upload/"))
        .respond_with(ResponseTemplate::new(400).set_body_string("unit_list: invalid monster"))
        .mount(&server)
        .await;

    let (sink, relay) = start(&server, true).await;
    relay.handle_event(login_request(), login_response());
    relay.drain().await;
    relay.shutdown().await;

    assert_eq!(
        sink.messages(LogKind::Error),
        vec![
            "There were errors importing your SWARFARM profile: unit_list: invalid monster"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn test_profile_validation_errors_keep_server_key_order() {
    let server = MockServer::start().await;
    mount_commands(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v2/data_logs/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/profiles/upload/"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"wizard_info": ["required"], "building_list": ["invalid"]}"#,
        ))
        .mount(&server)
        .await;

    let (sink, relay) = start(&server, true).await;
    relay.handle_event(login_request(), login_response());
    relay.drain().await;
    relay.shutdown().await;

    assert!(sink.contains(
        r#"There were errors importing your SWARFARM profile: {"wizard_info":["required"],"building_list":["invalid"]}"#
    ));
}
