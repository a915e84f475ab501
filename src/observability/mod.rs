//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via `tracing`; pretty format for development, JSON
//!   for production
//! - Dispatch counters and latency through the `metrics` facade with a
//!   Prometheus exporter

pub mod logging;
pub mod metrics;
