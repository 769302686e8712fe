//! Request guard: rate limiting and SQL keyword inspection for a reverse-proxy data path.

pub mod config;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod store;

pub use config::{FilterConfig, GuardConfig};
pub use filter::{FilterChain, Rejection};
pub use http::GuardServer;
pub use lifecycle::Shutdown;
pub use pipeline::{Action, Inspector, RequestPipeline};
pub use store::{MemoryStore, SharedStore};
