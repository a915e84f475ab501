//! Component Server: request dispatch core for a component-based web
//! server.
//!
//! Handlers are registered on a hierarchical component tree, compiled into
//! a frozen, priority-ordered route table, filtered per request through
//! annotation-driven admission predicates, and executed sequentially with
//! short-circuit and fallback semantics.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                  COMPONENT SERVER                     │
//!                 │                                                       │
//!   Boot          │  ┌───────────┐   ┌───────────┐   ┌───────────────┐   │
//!   ──────────────┼─▶│ component │──▶│  handler  │──▶│    routing    │   │
//!                 │  │ tree+scan │   │ sets+meta │   │ table builder │   │
//!                 │  └───────────┘   └───────────┘   └───────┬───────┘   │
//!                 │                                          │ freeze    │
//!                 │                                          ▼           │
//!   Request       │  ┌──────┐   ┌─────────┐   ┌──────────────────────┐  │
//!   ──────────────┼─▶│ http │──▶│ routing │──▶│  security gate       │  │
//!                 │  │      │   │ cascade │   │  (admission)         │  │
//!                 │  └──────┘   └─────────┘   └──────────┬───────────┘  │
//!                 │                                       ▼              │
//!   Response      │  ┌─────────┐   ┌────────────────────────────────┐   │
//!   ◀─────────────┼──│ respond │◀──│ engine: scope view + injected  │   │
//!                 │  │         │   │ params, sequential candidates  │   │
//!                 │  └─────────┘   └────────────────────────────────┘   │
//!                 │                                                       │
//!                 │  Cross-cutting: config, sessions, observability       │
//!                 └──────────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod app;
pub mod component;
pub mod engine;
pub mod handler;
pub mod routing;
pub mod security;

// Surfaces and cross-cutting concerns
pub mod config;
pub mod http;
pub mod observability;

pub use app::{App, AppBuilder, BootError};
pub use config::ServerConfig;
pub use engine::executor::Completion;
pub use handler::{
    handler_fn, Dependency, Flow, HandlerError, HandlerMeta, HandlerSet, Visibility,
};
pub use http::HttpServer;
