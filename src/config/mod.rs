//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → CLI overrides (--bind)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → handed to the server and store at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, read_config, ConfigError, ConfigOverrides};
pub use schema::{
    AppConfig, AuthConfig, ListenerConfig, LogFormat, ObservabilityConfig, SecurityConfig,
    StoreBackend, StoreConfig, TimeoutConfig, TokenConfig, MAX_REQUEST_SECS,
};
pub use validation::{validate_config, ValidationError};
