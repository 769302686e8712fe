//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline, filters, store access produce:
//!     → logging.rs (structured tracing events, request id in fields)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
