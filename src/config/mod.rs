//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, or JSON by extension)
//!     → loader.rs (parse & deserialize, lower-case keywords)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → FilterConfig shared via Arc with every request pipeline
//! ```
//!
//! # Design Decisions
//! - Config is loaded once at startup and never mutated; there is no reload
//! - Host sections have defaults; the filter policy is mandatory
//! - Any configuration error is fatal to startup

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    ExhaustionPolicy, FilterConfig, GuardConfig, LimitsConfig, ListenerConfig,
    ObservabilityConfig, StoreConfig, UpstreamConfig,
};
