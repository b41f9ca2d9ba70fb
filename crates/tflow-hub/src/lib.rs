//! tflow-hub - Topic broadcast hub for refresh results.
//!
//! Subscribers register once, then join topics (`entity-<id>` or
//! `global`). Every publish goes to the topic's subscribers and to global
//! subscribers, each client receiving at most one copy.
//!
//! # Architecture
//!
//! ```text
//!  RefreshScheduler ──publish──▶ BroadcastHub ──try_send──▶ client mpsc (bounded)
//!                                     │                          │
//!                                latest per topic                ▼
//!                                     │                  axum WebSocket task
//!                         GET /api/snapshot               GET /ws
//! ```
//!
//! Publishing never waits on a subscriber: a full client buffer drops that
//! delivery and the drop is counted.

mod config;
mod error;
mod hub;
mod message;
mod server;

pub use config::HubConfig;
pub use error::{HubError, HubResult};
pub use hub::{BroadcastHub, ClientId, Delivery, PublishReport};
pub use message::{ClientFrame, EntitySummary, HubMessage, SubscriptionAction};
pub use server::{create_router, run_server, serve, ConnectionLimiter};
