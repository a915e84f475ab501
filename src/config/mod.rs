//! Configuration subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read, parse)
//!     → validation.rs (semantic checks, all errors collected)
//!     → frozen ServerConfig used for boot
//! ```
//!
//! # Design Decisions
//! - Serde handles syntax; validation.rs handles semantics
//! - Validation returns every violation, not just the first
//! - The config is immutable once the app is built

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::ServerConfig;
pub use validation::{validate_config, ValidationError};
