//! Shared test utilities for mosaic-models integration tests

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::get;
use axum::Json;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// A request seen by a mock provider.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub struct SeenRequest {
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

impl SeenRequest {
    #[allow(dead_code)]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Requests received by a mock provider, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl Recorder {
    fn record(&self, uri: &Uri, headers: HeaderMap) {
        self.seen.lock().unwrap().push(SeenRequest {
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers,
        });
    }

    #[allow(dead_code)]
    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

/// A mock provider listening on localhost.
pub struct MockProvider {
    pub addr: SocketAddr,
    pub recorder: Recorder,
}

impl MockProvider {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// A route answering every request with `status` and `body`, recording it first.
fn canned(recorder: &Recorder, status: StatusCode, body: Value) -> axum::routing::MethodRouter {
    let recorder = recorder.clone();
    get(move |uri: Uri, headers: HeaderMap| {
        let recorder = recorder.clone();
        let body = body.clone();
        async move {
            recorder.record(&uri, headers);
            (status, Json(body))
        }
    })
}

/// Spawns `router` in a background task, returns bound address
async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    addr
}

/// OpenAI-compatible mock serving `/v1/models` and the Azure `/openai/models` shape.
#[allow(dead_code)]
pub async fn openai(models: &[&str]) -> MockProvider {
    let recorder = Recorder::default();
    let data: Vec<Value> = models
        .iter()
        .map(|id| json!({"id": id, "object": "model", "owned_by": "system"}))
        .collect();
    let body = json!({"object": "list", "data": data});

    let router = Router::new()
        .route("/v1/models", canned(&recorder, StatusCode::OK, body.clone()))
        .route("/openai/models", canned(&recorder, StatusCode::OK, body));

    MockProvider {
        addr: spawn(router).await,
        recorder,
    }
}

/// Ollama mock serving `/api/version` and `/api/tags`.
#[allow(dead_code)]
pub async fn ollama(models: &[&str]) -> MockProvider {
    let recorder = Recorder::default();
    let tags: Vec<Value> = models
        .iter()
        .map(|m| json!({"name": format!("{m}:latest"), "model": m, "size": 1024}))
        .collect();

    let router = Router::new()
        .route(
            "/api/version",
            canned(&recorder, StatusCode::OK, json!({"version": "0.5.7"})),
        )
        .route("/api/tags", canned(&recorder, StatusCode::OK, json!({"models": tags})));

    MockProvider {
        addr: spawn(router).await,
        recorder,
    }
}

/// Answers every path with `status` and a JSON error body.
#[allow(dead_code)]
pub async fn failing(status: StatusCode) -> MockProvider {
    let recorder = Recorder::default();
    let router = Router::new().fallback_service(canned(
        &recorder,
        status,
        json!({"error": {"message": "nope"}}),
    ));

    MockProvider {
        addr: spawn(router).await,
        recorder,
    }
}

/// Answers every path with 200 and a body that is not JSON.
#[allow(dead_code)]
pub async fn garbage() -> MockProvider {
    let router = Router::new().fallback(|| async { "<html>definitely not json</html>" });

    MockProvider {
        addr: spawn(router).await,
        recorder: Recorder::default(),
    }
}

/// Sleeps for `delay` before answering with an empty model list.
#[allow(dead_code)]
pub async fn slow(delay: Duration) -> MockProvider {
    let router = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        Json(json!({"data": [], "models": []}))
    });

    MockProvider {
        addr: spawn(router).await,
        recorder: Recorder::default(),
    }
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
