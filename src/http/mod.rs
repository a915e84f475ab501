//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, middleware layers)
//!     → request.rs (extract context: method, path, body, session, transport)
//!     → engine (candidate dispatch)
//!     → engine::respond (finalize) or error-path dispatch
//!     → Send to client
//!
//! WebSocket upgrade
//!     → websocket.rs (verb-named events over one connection)
//!     → same engine, synthesized request/response pair
//! ```

pub mod request;
pub mod server;
pub mod session;
pub mod websocket;

pub use request::{RequestInfo, Transport};
pub use server::HttpServer;
pub use session::SessionStore;
