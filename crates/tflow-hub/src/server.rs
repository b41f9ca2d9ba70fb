//! WebSocket subscriber transport using axum.
//!
//! - `GET /ws`           → WebSocket; client frames subscribe/unsubscribe
//! - `GET /api/snapshot` → latest message per topic
//! - `GET /metrics`      → Prometheus text exposition

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::StreamExt;
use futures_util::SinkExt;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use tflow_core::Topic;
use tflow_telemetry::render_metrics;

use crate::config::HubConfig;
use crate::error::HubResult;
use crate::hub::{BroadcastHub, ClientId};
use crate::message::{ClientFrame, HubMessage, SubscriptionAction};

/// Connection limiter to prevent too many concurrent WebSocket connections.
pub struct ConnectionLimiter {
    current: AtomicUsize,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            current: AtomicUsize::new(0),
            max,
        }
    }

    /// Take a slot; the slot is released when the guard drops.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        loop {
            let current = self.current.load(Ordering::Acquire);
            if current >= self.max {
                return None;
            }
            if self
                .current
                .compare_exchange(current, current + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Some(ConnectionGuard {
                    limiter: Arc::clone(self),
                });
            }
        }
    }

    pub fn current_count(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.limiter.current.fetch_sub(1, Ordering::Release);
    }
}

/// Shared application state for axum handlers.
#[derive(Clone)]
struct AppState {
    hub: Arc<BroadcastHub>,
    connection_limiter: Arc<ConnectionLimiter>,
    max_connections: usize,
}

#[derive(Serialize)]
struct SnapshotEntry {
    topic: Topic,
    message: HubMessage,
}

/// Create the axum router.
pub fn create_router(hub: Arc<BroadcastHub>, config: &HubConfig) -> Router {
    let state = AppState {
        hub,
        connection_limiter: Arc::new(ConnectionLimiter::new(config.max_connections)),
        max_connections: config.max_connections,
    };
    Router::new()
        .route("/api/snapshot", get(get_snapshot))
        .route("/metrics", get(get_metrics))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn get_snapshot(State(state): State<AppState>) -> Json<Vec<SnapshotEntry>> {
    let entries = state
        .hub
        .snapshot()
        .into_iter()
        .map(|(topic, message)| SnapshotEntry { topic, message })
        .collect();
    Json(entries)
}

async fn get_metrics() -> Response {
    match render_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let guard = match state.connection_limiter.try_acquire() {
        Some(guard) => guard,
        None => {
            warn!(
                current = state.connection_limiter.current_count(),
                max = state.max_connections,
                "WebSocket connection limit reached"
            );
            return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
        }
    };

    info!(
        connections = state.connection_limiter.current_count(),
        "New WebSocket connection"
    );

    ws.on_upgrade(move |socket| handle_ws_connection(socket, state.hub, guard))
}

/// Handle a WebSocket connection.
async fn handle_ws_connection(socket: WebSocket, hub: Arc<BroadcastHub>, _guard: ConnectionGuard) {
    let client_id = ClientId::new();
    let mut deliveries = hub.register_client(client_id);
    let (mut sender, mut receiver) = socket.split();

    // Incoming frames only change subscriptions.
    let incoming_hub = Arc::clone(&hub);
    let mut incoming_task = tokio::spawn(async move {
        while let Some(result) = receiver.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    apply_frame(&incoming_hub, client_id, text.as_str());
                }
                Ok(Message::Close(_)) => {
                    debug!(client_id = %client_id, "Client sent close frame");
                    break;
                }
                Err(e) => {
                    debug!(client_id = %client_id, error = %e, "WebSocket receive error");
                    break;
                }
                _ => {}
            }
        }
    });

    loop {
        tokio::select! {
            delivery = deliveries.recv() => {
                let Some(delivery) = delivery else {
                    debug!(client_id = %client_id, "Delivery stream closed");
                    break;
                };
                match serde_json::to_string(&delivery) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            debug!(client_id = %client_id, "Failed to send message, client disconnected");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to serialize delivery"),
                }
            }
            _ = &mut incoming_task => {
                debug!(client_id = %client_id, "Incoming task completed, closing connection");
                break;
            }
        }
    }

    incoming_task.abort();
    hub.remove_client(client_id);
    info!(client_id = %client_id, "WebSocket connection closed");
}

fn apply_frame(hub: &BroadcastHub, client_id: ClientId, text: &str) {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            debug!(client_id = %client_id, error = %e, "Ignoring malformed client frame");
            return;
        }
    };
    let result = match frame.action {
        SubscriptionAction::Subscribe => hub.subscribe(client_id, frame.topic),
        SubscriptionAction::Unsubscribe => hub.unsubscribe(client_id, frame.topic).map(|_| ()),
    };
    if let Err(e) = result {
        warn!(client_id = %client_id, error = %e, "Subscription change rejected");
    }
}

/// Serve on an already bound listener until `shutdown` flips to true.
pub async fn serve(
    listener: TcpListener,
    hub: Arc<BroadcastHub>,
    config: &HubConfig,
    mut shutdown: watch::Receiver<bool>,
) -> HubResult<()> {
    let app = create_router(hub, config);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
        })
        .await?;
    Ok(())
}

/// Bind the configured port and serve.
pub async fn run_server(
    hub: Arc<BroadcastHub>,
    config: HubConfig,
    shutdown: watch::Receiver<bool>,
) -> HubResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(port = config.port, "Starting hub server");

    let listener = TcpListener::bind(addr).await?;
    serve(listener, hub, &config, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use tflow_core::{CongestionLevel, EntityId, Provenance, Reading};
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    fn reading(vehicle_count: u32) -> HubMessage {
        HubMessage::ReadingUpdate {
            reading: Reading {
                entity_id: EntityId::new(7),
                vehicle_count,
                avg_speed: 30.0,
                congestion: CongestionLevel::from_vehicle_count(vehicle_count),
                confidence: 0.8,
                provenance: Provenance::Synthetic,
                weather: None,
                recorded_at: Utc::now(),
            },
        }
    }

    async fn start(hub: Arc<BroadcastHub>, config: HubConfig) -> (SocketAddr, watch::Sender<bool>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            serve(listener, hub, &config, rx).await.unwrap();
        });
        (addr, tx)
    }

    async fn wait_for_clients(hub: &BroadcastHub, expected: usize) {
        for _ in 0..100 {
            if hub.client_count() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {expected} clients, have {}", hub.client_count());
    }

    #[test]
    fn test_connection_limiter() {
        let limiter = Arc::new(ConnectionLimiter::new(2));
        let first = limiter.try_acquire().unwrap();
        let _second = limiter.try_acquire().unwrap();
        assert!(limiter.try_acquire().is_none());
        assert_eq!(limiter.current_count(), 2);

        drop(first);
        assert_eq!(limiter.current_count(), 1);
        assert!(limiter.try_acquire().is_some());
    }

    #[tokio::test]
    async fn test_ws_subscribe_receives_snapshot_and_updates() {
        let hub = Arc::new(BroadcastHub::new(16));
        hub.publish(Topic::Entity(EntityId::new(7)), reading(11));
        let (addr, _shutdown) = start(hub.clone(), HubConfig::default()).await;

        let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        wait_for_clients(&hub, 1).await;
        ws.send(WsMessage::Text(
            r#"{"action":"subscribe","topic":"entity-7"}"#.into(),
        ))
        .await
        .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(json["topic"], "entity-7");
        assert_eq!(json["snapshot"], true);
        assert_eq!(json["message"]["type"], "reading_update");
        assert_eq!(json["message"]["reading"]["vehicle_count"], 11);

        hub.publish(Topic::Entity(EntityId::new(7)), reading(12));
        let frame = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let json: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(json["snapshot"], false);
        assert_eq!(json["message"]["reading"]["vehicle_count"], 12);

        ws.close(None).await.unwrap();
        wait_for_clients(&hub, 0).await;
    }

    #[tokio::test]
    async fn test_ws_connection_limit() {
        let hub = Arc::new(BroadcastHub::new(16));
        let config = HubConfig {
            max_connections: 1,
            ..HubConfig::default()
        };
        let (addr, _shutdown) = start(hub.clone(), config).await;

        let (_first, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
        wait_for_clients(&hub, 1).await;
        assert!(connect_async(format!("ws://{addr}/ws")).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_endpoint() {
        let hub = Arc::new(BroadcastHub::new(16));
        hub.publish(Topic::Entity(EntityId::new(7)), reading(9));
        let (addr, _shutdown) = start(hub, HubConfig::default()).await;

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let body = http_get(stream, "/api/snapshot").await;
        assert!(body.contains("\"topic\":\"entity-7\""), "{body}");
        assert!(body.contains("reading_update"));
    }

    async fn http_get(mut stream: tokio::net::TcpStream, path: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }
}
