//! Mock optimization service for integration tests.
//!
//! Serves `/detect`, `/optimize`, `/predict` and `/health` on an ephemeral
//! loopback port. While marked down every route answers 503.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::oneshot;

#[derive(Default)]
struct ServiceState {
    up: AtomicBool,
    detect: AtomicUsize,
    optimize: AtomicUsize,
    predict: AtomicUsize,
    health: AtomicUsize,
}

impl ServiceState {
    fn respond(&self, counter: &AtomicUsize, body: Value) -> Response {
        counter.fetch_add(1, Ordering::SeqCst);
        if self.up.load(Ordering::SeqCst) {
            Json(body).into_response()
        } else {
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

/// A mock optimization service for testing.
pub struct MockService {
    addr: SocketAddr,
    state: Arc<ServiceState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockService {
    /// Start a healthy mock service on an available port.
    pub async fn start() -> Self {
        let state = Arc::new(ServiceState::default());
        state.up.store(true, Ordering::SeqCst);

        let router = Router::new()
            .route("/detect", post(detect))
            .route("/optimize", post(optimize))
            .route("/predict", post(predict))
            .route("/health", get(health))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Base URL for the gateway.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Probe endpoint for entities.
    pub fn health_url(&self) -> String {
        format!("http://{}/health", self.addr)
    }

    /// Make every route answer 503 (or recover).
    pub fn set_up(&self, up: bool) {
        self.state.up.store(up, Ordering::SeqCst);
    }

    pub fn detect_count(&self) -> usize {
        self.state.detect.load(Ordering::SeqCst)
    }

    pub fn optimize_count(&self) -> usize {
        self.state.optimize.load(Ordering::SeqCst)
    }

    pub fn predict_count(&self) -> usize {
        self.state.predict.load(Ordering::SeqCst)
    }

    pub fn health_count(&self) -> usize {
        self.state.health.load(Ordering::SeqCst)
    }

    /// Shutdown the service.
    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn detect(State(state): State<Arc<ServiceState>>, Json(_): Json<Value>) -> Response {
    state.respond(
        &state.detect,
        json!({
            "vehicle_count": 42,
            "avg_speed": 14.5,
            "congestion_level": 2,
            "confidence": 0.93
        }),
    )
}

async fn optimize(State(state): State<Arc<ServiceState>>, Json(_): Json<Value>) -> Response {
    state.respond(
        &state.optimize,
        json!({
            "green_time": 62,
            "yellow_time": 4,
            "red_time": 26,
            "confidence": 0.88,
            "reasoning": "queue model"
        }),
    )
}

async fn predict(State(state): State<Arc<ServiceState>>, Json(body): Json<Value>) -> Response {
    let horizon = body.get("horizon").and_then(Value::as_u64).unwrap_or(0);
    let predictions: Vec<Value> = (1..=horizon)
        .map(|h| {
            json!({
                "timestamp": format!("2030-01-01T{:02}:00:00Z", h % 24),
                "predicted_volume": 20 + h,
                "confidence": 0.75
            })
        })
        .collect();
    state.respond(&state.predict, json!({ "predictions": predictions }))
}

async fn health(State(state): State<Arc<ServiceState>>) -> Response {
    state.respond(&state.health, json!({ "status": "ok" }))
}
