//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (overlay LOADTRACE_* environment variables)
//!     → validation.rs (semantic checks)
//!     → ExportSettings (validated, immutable)
//!     → handed to the exporter at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Missing collector parameters are fatal at startup
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env, load_config, ConfigError};
pub use schema::{ExporterConfig, LoadtraceConfig, ObservabilityConfig, PropagationConfig};
pub use validation::{validate_config, ExportSettings, ValidationError};
