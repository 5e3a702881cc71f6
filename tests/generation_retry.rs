// tests/generation_retry.rs
//
// Generation client against a local mock of the model endpoint.
// Budget semantics under test: `max_attempts` counts TOTAL requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use campus_connect::analyze::{GeminiClient, RetryPolicy, TextGenerator};
use campus_connect::config::AiConfig;
use campus_connect::telemetry::{MemoryTelemetry, TelemetryEvent};
use campus_connect::GenerationError;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT: &str = "/models/gemini-1.5-flash:generateContent";

fn ok_body(text: &str) -> serde_json::Value {
    json!({ "candidates": [ { "content": { "parts": [ { "text": text } ] } } ] })
}

fn client(server: &MockServer, sink: Arc<MemoryTelemetry>, base_delay_ms: u64) -> GeminiClient {
    let cfg = AiConfig {
        api_key: Some("test-key".to_string()),
        base_url: server.uri(),
        ..AiConfig::default()
    };
    GeminiClient::new(&cfg, sink)
        .expect("build client")
        .with_retry(RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(base_delay_ms),
        })
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

#[tokio::test]
async fn success_returns_trimmed_first_candidate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("  SAFE \n")))
        .mount(&server)
        .await;

    let sink = Arc::new(MemoryTelemetry::new());
    let c = client(&server, sink.clone(), 1);
    let out = c.generate("classify this").await.expect("generate ok");
    assert_eq!(out, "SAFE");

    assert_eq!(sink.names(), vec!["ai.request.start", "ai.request.success"]);
    match &sink.events()[1] {
        TelemetryEvent::RequestSuccess {
            response_chars,
            attempts,
            ..
        } => {
            assert_eq!(*response_chars, 4);
            assert_eq!(*attempts, 1);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn three_rate_limits_exhaust_a_budget_of_three() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    // Would succeed on a fourth attempt; must never be reached.
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("late")))
        .mount(&server)
        .await;

    let sink = Arc::new(MemoryTelemetry::new());
    let c = client(&server, sink.clone(), 1);
    let err = c.generate("p").await.unwrap_err();
    assert_eq!(err, GenerationError::RateLimited { attempts: 3 });
    assert_eq!(request_count(&server).await, 3);
    assert_eq!(sink.names(), vec!["ai.request.start", "ai.request.error"]);
}

#[tokio::test]
async fn success_on_the_last_attempt_of_the_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("third time")))
        .mount(&server)
        .await;

    let sink = Arc::new(MemoryTelemetry::new());
    let c = client(&server, sink.clone(), 1);
    assert_eq!(c.generate("p").await.unwrap(), "third time");
    assert_eq!(request_count(&server).await, 3);
    assert!(matches!(
        sink.events().last(),
        Some(TelemetryEvent::RequestSuccess { attempts: 3, .. })
    ));
}

#[tokio::test]
async fn explicit_budget_overrides_policy() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let c = client(&server, Arc::new(MemoryTelemetry::new()), 1);
    let err = c.generate_with_budget("p", 1).await.unwrap_err();
    assert_eq!(err, GenerationError::RateLimited { attempts: 1 });
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn backoff_doubles_between_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let c = client(&server, Arc::new(MemoryTelemetry::new()), 40);
    let started = Instant::now();
    let _ = c.generate("p").await;
    // 40ms after the first attempt + 80ms after the second; none after the last.
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let c = client(&server, Arc::new(MemoryTelemetry::new()), 1);
    assert_eq!(
        c.generate("p").await.unwrap_err(),
        GenerationError::Service { status: 500 }
    );
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn empty_candidates_are_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let c = client(&server, Arc::new(MemoryTelemetry::new()), 1);
    assert!(matches!(
        c.generate("p").await.unwrap_err(),
        GenerationError::MalformedResponse(_)
    ));
}

#[tokio::test]
async fn failing_telemetry_does_not_change_the_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("fine")))
        .mount(&server)
        .await;

    let sink = Arc::new(MemoryTelemetry::failing());
    let c = client(&server, sink.clone(), 1);
    assert_eq!(c.generate("p").await.unwrap(), "fine");
    assert_eq!(sink.events().len(), 2);
}

#[tokio::test]
async fn missing_credential_never_reaches_the_network() {
    let server = MockServer::start().await;
    let cfg = AiConfig {
        api_key: None,
        base_url: server.uri(),
        ..AiConfig::default()
    };
    let c = GeminiClient::new(&cfg, Arc::new(MemoryTelemetry::new())).unwrap();
    assert_eq!(c.generate("p").await.unwrap_err(), GenerationError::Configuration);
    assert_eq!(request_count(&server).await, 0);
}
