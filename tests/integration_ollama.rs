#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Ollama client tests against a mocked HTTP API

use serde_json::{Value, json};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use tourism_rag::config::OllamaConfig;
use tourism_rag::embeddings::{EmbeddingProvider, HashEmbedder, OllamaClient};
use tourism_rag::retrieval::{EngineOptions, EngineState, RetrievalEngine, SearchParams};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const TEST_MODEL: &str = "nomic-embed-text:latest";

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn client_for(server: &MockServer, batch_size: u32) -> OllamaClient {
    let address = server.address();
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: address.ip().to_string(),
        port: address.port(),
        model: TEST_MODEL.to_string(),
        batch_size,
        timeout_seconds: 5,
    };

    OllamaClient::new(&config)
        .expect("Failed to create Ollama client")
        .with_retry_attempts(3)
        .with_retry_delay(Duration::from_millis(5))
}

/// Answers embed requests with hash embeddings of each input
struct HashResponder {
    embedder: HashEmbedder,
}

impl Respond for HashResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|input| self.embedder.embed_text(input.as_str().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();

        ResponseTemplate::new(200).set_body_json(json!({
            "model": TEST_MODEL,
            "embeddings": embeddings
        }))
    }
}

#[tokio::test]
async fn embeds_in_configured_batches() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": TEST_MODEL, "input": ["castle", "reef"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0], [0.0, 1.0]]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"input": ["bazaar"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.5, 0.5]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 2);
    let vectors = tokio::task::spawn_blocking(move || {
        client.embed(&[
            "castle".to_string(),
            "reef".to_string(),
            "bazaar".to_string(),
        ])
    })
    .await
    .expect("task should not panic")
    .expect("embedding should succeed");

    assert_eq!(
        vectors,
        vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.5, 0.5]]
    );
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": "model not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let result = tokio::task::spawn_blocking(move || client.embed(&["castle".to_string()]))
        .await
        .expect("task should not panic");

    let error = result.expect_err("404 should fail");
    assert!(format!("{:#}", error).contains("HTTP 404"));
}

#[tokio::test]
async fn server_errors_are_retried() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let result = tokio::task::spawn_blocking(move || client.embed(&["castle".to_string()]))
        .await
        .expect("task should not panic");

    assert!(result.is_err());
}

#[tokio::test]
async fn response_count_mismatch_is_an_error() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0]]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let result = tokio::task::spawn_blocking(move || {
        client.embed(&["castle".to_string(), "reef".to_string()])
    })
    .await
    .expect("task should not panic");

    let error = result.expect_err("mismatched count should fail");
    assert!(format!("{:#}", error).contains("returned 1 embeddings for 2 inputs"));
}

#[tokio::test]
async fn health_check_validates_model() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                {"name": TEST_MODEL, "size": 274302450},
                {"name": "paraphrase-multilingual:latest"}
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let (health, models) = tokio::task::spawn_blocking(move || {
        (client.health_check(), client.list_models())
    })
    .await
    .expect("task should not panic");

    assert!(health.is_ok(), "health check failed: {:?}", health);
    let models = models.expect("should list models");
    assert_eq!(models.len(), 2);
    assert_eq!(models[0].size, Some(274_302_450));
}

#[tokio::test]
async fn ping_reports_server_version() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/version"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "0.6.2"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let version = tokio::task::spawn_blocking(move || client.ping())
        .await
        .expect("task should not panic")
        .expect("ping should succeed");

    assert_eq!(version, "0.6.2");
}

#[tokio::test]
async fn missing_model_fails_validation() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3:latest"}]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, 8);
    let result = tokio::task::spawn_blocking(move || client.validate_model())
        .await
        .expect("task should not panic");

    let error = result.expect_err("model should be missing");
    assert!(error.to_string().contains("is not installed"));
    assert!(error.to_string().contains("llama3:latest"));
}

#[tokio::test]
async fn engine_over_mocked_ollama() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(HashResponder {
            embedder: HashEmbedder::new(128, 42),
        })
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": TEST_MODEL}]
        })))
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("should create temp dir");
    let corpus_path = temp_dir.path().join("sites.json");
    fs::write(
        &corpus_path,
        r#"{"sites": [
            {"id": "a", "name": "Castle", "category": "Cultural", "search_text": "castle fortress medieval"},
            {"id": "b", "name": "Reef", "category": "Natural", "search_text": "coral reef marine"}
        ]}"#,
    )
    .expect("should write corpus");

    let client = client_for(&server, 1);
    let options = EngineOptions {
        corpus_path,
        collection_key: None,
        cache_dir: temp_dir.path().join("cache"),
        force_rebuild: false,
    };

    let ids = tokio::task::spawn_blocking(move || {
        let mut engine = RetrievalEngine::new(Box::new(client), options);
        engine.setup().expect("setup should succeed");
        assert_eq!(engine.state(), EngineState::Ready);
        assert_eq!(engine.stats().model, format!("ollama:{}", TEST_MODEL));

        let params = SearchParams::default().with_top_k(1).with_threshold(0.0);
        engine
            .search("medieval fortress", &params)
            .iter()
            .map(|result| result.record.id.clone())
            .collect::<Vec<_>>()
    })
    .await
    .expect("task should not panic");

    assert_eq!(ids, vec!["a"]);
}

#[tokio::test]
async fn unreachable_server_fails_setup() {
    init_test_tracing();
    let server = MockServer::start().await;
    let client = client_for(&server, 8).with_retry_attempts(1);
    drop(server);

    let temp_dir = TempDir::new().expect("should create temp dir");
    let corpus_path = temp_dir.path().join("sites.json");
    fs::write(&corpus_path, r#"{"sites": [{"name": "Castle"}]}"#).expect("should write corpus");

    let options = EngineOptions {
        corpus_path,
        collection_key: None,
        cache_dir: temp_dir.path().join("cache"),
        force_rebuild: false,
    };

    let state = tokio::task::spawn_blocking(move || {
        let mut engine = RetrievalEngine::new(Box::new(client), options);
        assert!(engine.setup().is_err());
        engine.state()
    })
    .await
    .expect("task should not panic");

    assert_eq!(state, EngineState::Failed);
}

#[tokio::test]
async fn model_missing_from_server_fails_setup_with_warm_cache() {
    init_test_tracing();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(HashResponder {
            embedder: HashEmbedder::new(32, 7),
        })
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": TEST_MODEL}]
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{"name": "llama3:latest"}]
        })))
        .with_priority(2)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("should create temp dir");
    let corpus_path = temp_dir.path().join("sites.json");
    fs::write(&corpus_path, r#"{"sites": [{"name": "Castle"}, {"name": "Reef"}]}"#)
        .expect("should write corpus");
    let options = EngineOptions {
        corpus_path,
        collection_key: None,
        cache_dir: temp_dir.path().join("cache"),
        force_rebuild: false,
    };

    let warm_client = client_for(&server, 8);
    let cold_client = client_for(&server, 8);
    let (warm_state, cold_state) = tokio::task::spawn_blocking(move || {
        let mut warm = RetrievalEngine::new(Box::new(warm_client), options.clone());
        warm.setup().expect("first setup should succeed");

        let mut cold = RetrievalEngine::new(Box::new(cold_client), options);
        let error = cold.setup().expect_err("model is gone");
        assert!(error.to_string().contains("unavailable"));
        (warm.state(), cold.state())
    })
    .await
    .expect("task should not panic");

    assert_eq!(warm_state, EngineState::Ready);
    assert_eq!(cold_state, EngineState::Failed);
}
