//! Guest requests served end to end over a temporary guest root.

use sandbox_bridge::bridge::{Bridge, BridgeContext, FsChannel, GuestChannel};
use sandbox_bridge::config::Config;
use sandbox_bridge::telemetry::UsageCollector;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Guest {
    root: tempfile::TempDir,
}

impl Guest {
    fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, guest_path: &str) -> std::path::PathBuf {
        self.root.path().join(guest_path.trim_start_matches('/'))
    }

    fn submit(&self, id: &str, request: &Value) {
        let requests = self.path("/tmp/bridge/requests");
        std::fs::write(requests.join(format!("{}.json", id)), request.to_string()).unwrap();
        std::fs::write(requests.join(format!("{}.ready", id)), "").unwrap();
    }

    async fn response(&self, id: &str) -> String {
        let responses = self.path("/tmp/bridge/responses");
        for _ in 0..500 {
            if responses.join(format!("{}.ready", id)).exists() {
                return std::fs::read_to_string(responses.join(format!("{}.json", id))).unwrap();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("guest never saw a response for {}", id);
    }
}

async fn running_bridge(root: &Path, usage: Arc<UsageCollector>) -> Bridge {
    let mut config = Config::default();
    config.bridge.poll_interval_ms = 10;
    config.bridge.chunk_size = 1024;

    let channel: Arc<dyn GuestChannel> = Arc::new(FsChannel::new(root));
    let ctx = BridgeContext::from_config(&config, channel, usage).unwrap();
    let bridge = Bridge::new(ctx, config.bridge.poll_interval());
    bridge.ensure_dirs().await.unwrap();
    bridge.clear_stop().await.unwrap();
    bridge.start();
    bridge
}

#[tokio::test]
async fn test_http_job_round_trip_with_usage() {
    let upstream = MockServer::start().await;
    let completion = json!({
        "model": "acme/chat-large",
        "choices": [{ "message": { "content": "hi" } }],
        "usage": { "cost": 0.0042, "prompt_tokens": 900, "completion_tokens": 120 }
    });
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string("{\"prompt\":\"hello\"}"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion.clone()))
        .expect(1)
        .mount(&upstream)
        .await;

    let guest = Guest::new();
    let usage = Arc::new(UsageCollector::new());
    let bridge = running_bridge(guest.root.path(), usage.clone()).await;

    std::fs::write(guest.path("/tmp/bridge/body-1.json"), "{\"prompt\":\"hello\"}").unwrap();
    guest.submit(
        "req-1",
        &json!({
            "type": "http",
            "method": "POST",
            "url": format!("{}/v1/chat/completions", upstream.uri()),
            "headers": { "Authorization": "Bearer sk-test" },
            "bodyFile": "/tmp/bridge/body-1.json",
            "timeout": 30
        }),
    );

    let body: Value = serde_json::from_str(&guest.response("req-1").await).unwrap();
    assert_eq!(body, completion);

    let totals = usage.snapshot();
    assert_eq!(totals.usage_reports, 1);
    assert_eq!(totals.prompt_tokens, 900);
    assert_eq!(totals.completion_tokens, 120);
    assert_eq!(totals.last_model.as_deref(), Some("acme/chat-large"));

    bridge.stop().await;
    assert!(guest.path("/tmp/bridge/stop").exists());
}

#[tokio::test]
async fn test_large_response_is_chunked_transparently() {
    let upstream = MockServer::start().await;
    let big: String = (0..20_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
    Mock::given(method("GET"))
        .and(path("/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_string(big.clone()))
        .mount(&upstream)
        .await;

    let guest = Guest::new();
    let bridge = running_bridge(guest.root.path(), Arc::new(UsageCollector::new())).await;

    guest.submit(
        "blob",
        &json!({ "type": "http", "url": format!("{}/blob", upstream.uri()) }),
    );

    assert_eq!(guest.response("blob").await, big);
    assert!(!guest.path("/tmp/bridge/_resp_blob.b64").exists());
    bridge.stop().await;
}

#[tokio::test]
async fn test_client_error_body_passes_through() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "error": { "message": "bad key" } })),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let guest = Guest::new();
    let bridge = running_bridge(guest.root.path(), Arc::new(UsageCollector::new())).await;
    guest.submit("auth", &json!({ "type": "http", "url": upstream.uri() }));

    let body: Value = serde_json::from_str(&guest.response("auth").await).unwrap();
    assert_eq!(body["error"]["message"], "bad key");
    bridge.stop().await;
}

#[tokio::test]
async fn test_cast_and_unknown_jobs_side_by_side() {
    let node = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "jsonrpc": "2.0", "id": 1, "result": "0x2a"
        })))
        .mount(&node)
        .await;

    let guest = Guest::new();
    let bridge = running_bridge(guest.root.path(), Arc::new(UsageCollector::new())).await;

    guest.submit(
        "cast-1",
        &json!({ "type": "cast", "args": ["block-number", "--rpc-url", node.uri()] }),
    );
    guest.submit("odd-1", &json!({ "type": "smtp" }));
    guest.submit("cast-2", &json!({ "type": "cast", "args": ["frobnicate"] }));

    assert_eq!(guest.response("cast-1").await, "42");
    assert_eq!(
        guest.response("cast-2").await,
        "Error: unrecognized cast subcommand: frobnicate"
    );
    let odd: Value = serde_json::from_str(&guest.response("odd-1").await).unwrap();
    assert_eq!(odd, json!({ "error": { "message": "unknown request type: smtp" } }));

    bridge.stop().await;
}
