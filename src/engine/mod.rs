//! Execution engine.
//!
//! # Data Flow
//! ```text
//! Request
//!     → state.rs (fresh per-request router state)
//!     → executor.rs (candidate list, sequential invocation,
//!       short-circuit on done/redirect/error)
//!     → respond.rs (content-negotiated finalization)
//! ```
//!
//! # Design Decisions
//! - Candidates run strictly sequentially; the only suspension points are
//!   each candidate's await
//! - A thrown handler error ends the chain as a fallthrough; it is logged,
//!   never propagated to the connection task
//! - The error-path and socket variants reuse the same loop with a
//!   synthesized lookup path or request

pub mod executor;
pub mod respond;
pub mod state;

pub use executor::{dispatch, dispatch_error, dispatch_socket, run_chain, Completion};
pub use respond::{fallthrough_response, finalize};
pub use state::{RouterState, SharedDoc, Slot};
