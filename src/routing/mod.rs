//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Boot:
//!     Component tree + registered handler sets
//!     → table.rs (method paths, index-collapse, priority/tiebreak)
//!     → finalize: sort buckets, freeze
//!
//! Per request:
//!     Request path
//!     → cascade.rs (most-specific-first lookup keys)
//!     → router.rs (bucket walk, cascade gating, visibility, filter)
//!     → ordered candidate list
//! ```
//!
//! # Design Decisions
//! - The two cascade axes are independent: request-path lopping happens at
//!   lookup time, `/index` collapsing at registration time
//! - Buckets are sorted once before the first request and never mutated
//!   afterwards; lookups share the table without locks
//! - First match does not win: every surviving entry becomes a candidate,
//!   ordering decides who runs first

pub mod cascade;
pub mod router;
pub mod table;

pub use cascade::path_cascade;
pub use router::{get_methods, Candidate, CandidateFilter};
pub use table::{build_table, index_collapse, RouteEntry, RouteTable, ScopeMap};
