//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Rate limiter store write:
//!     → CasMismatch: retries.rs (attempt budget left?)
//!     → backoff.rs (jittered delay)
//!     → re-read, re-decide, re-write
//!     → budget exhausted: ExhaustionPolicy (allow or deny)
//! ```

pub mod backoff;
pub mod retries;

pub use retries::RetryPolicy;
