//! HTTP host subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, timeout + trace layers)
//!     → host.rs (header pairs with pseudo-headers, body accumulation)
//!     → pipeline (header phase, body phase)
//!     → server.rs (forward to upstream, or return the rejection)
//! ```

pub mod host;
pub mod server;

pub use host::BufferedRequest;
pub use server::GuardServer;
