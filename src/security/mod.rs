//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Candidate handler:
//!     → gate.rs (annotation-driven predicates, all must pass)
//!     → schema.rs (named body schemas for the `schema` predicate)
//!     → admitted or silently excluded
//! ```
//!
//! # Design Decisions
//! - Open-world default-allow: an absent annotation imposes no constraint
//! - Rejection is exclusion, never an error response from the gate itself
//! - Predicates are pure functions of the request context; admitting the
//!   same handler twice with the same context yields the same answer

pub mod gate;
pub mod schema;

pub use gate::{GateContext, SecurityGate};
pub use schema::{FieldType, SchemaDef, SchemaRegistry};
