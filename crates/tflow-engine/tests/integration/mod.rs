//! Integration tests for tflow-engine.
//!
//! These tests drive the wired application against a local mock of the
//! optimization service:
//! - Refresh cycles through the gateway and through fallback
//! - Health probes over HTTP
//! - Run loop start and shutdown

pub mod common;
