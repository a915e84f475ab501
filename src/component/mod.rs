//! Component subsystem.
//!
//! # Data Flow
//! ```text
//! Overlay roots (config)
//!     → scanner.rs (walk directories, ordered)
//!     → tree.rs (get-or-create, merge source paths)
//!     → handler registration attaches sets to components
//!     → route table builder reads the frozen tree
//! ```
//!
//! # Design Decisions
//! - Arena-backed tree: parent links are indices, never owning references
//! - A component is a singleton per (parent, name); re-encountering the
//!   name merges source paths instead of duplicating the node
//! - The tree only grows during boot and is frozen before serving

pub mod scanner;
pub mod tree;

pub use scanner::{scan_roots, ScanError};
pub use tree::{ComponentId, ComponentTree};
