//! Request inspection filters.
//!
//! # Data Flow
//! ```text
//! header phase:
//!     → rate_limit.rs (per-address fixed window, shared store)
//!     → sql.rs (`:path` keyword scan)
//! body phase (full body, once):
//!     → sql.rs (body keyword scan)
//! ```
//!
//! # Design Decisions
//! - Two independent capabilities; a filter implements one or both
//! - Capability is decided once, when the chain is built, never by inspecting types
//! - The first rejection wins; later filters do not run

pub mod headers;
pub mod rate_limit;
pub mod sql;

use std::sync::Arc;

use axum::http::StatusCode;

pub use headers::RequestHeaders;
pub use rate_limit::{Clock, RateLimiter, SystemClock};
pub use sql::SqlDetector;

/// A filter's refusal to let a request through.
///
/// The message becomes the body of the immediate response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct Rejection {
    pub status: StatusCode,
    pub message: String,
}

impl Rejection {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

/// Allow (`Ok`) or reject with a status and message.
pub type FilterOutcome = Result<(), Rejection>;

/// Inspects the folded request headers.
pub trait HeaderFilter: Send + Sync {
    /// Short name used in logs and metric labels.
    fn name(&self) -> &'static str;

    fn filter_headers(&self, headers: &RequestHeaders) -> FilterOutcome;
}

/// Inspects the complete request body.
pub trait BodyFilter: Send + Sync {
    /// Short name used in logs and metric labels.
    fn name(&self) -> &'static str;

    fn filter_body(&self, body: &[u8]) -> FilterOutcome;
}

/// Ordered header and body filter lists, built once and shared by every request.
#[derive(Clone, Default)]
pub struct FilterChain {
    header_filters: Vec<Arc<dyn HeaderFilter>>,
    body_filters: Vec<Arc<dyn BodyFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a header filter; filters run in the order they are added.
    pub fn with_header_filter(mut self, filter: Arc<dyn HeaderFilter>) -> Self {
        self.header_filters.push(filter);
        self
    }

    /// Append a body filter; filters run in the order they are added.
    pub fn with_body_filter(mut self, filter: Arc<dyn BodyFilter>) -> Self {
        self.body_filters.push(filter);
        self
    }

    /// The standard chain: rate limiter then SQL detector on headers, SQL detector on
    /// the body. The detector instance is shared by both lists.
    pub fn standard(rate_limiter: RateLimiter, sql: SqlDetector) -> Self {
        let sql = Arc::new(sql);
        Self::new()
            .with_header_filter(Arc::new(rate_limiter))
            .with_header_filter(sql.clone())
            .with_body_filter(sql)
    }

    /// Run header filters in order, stopping at the first rejection.
    pub fn run_header_filters(&self, headers: &RequestHeaders) -> Result<(), (&'static str, Rejection)> {
        for filter in &self.header_filters {
            filter
                .filter_headers(headers)
                .map_err(|rejection| (filter.name(), rejection))?;
        }
        Ok(())
    }

    /// Run body filters in order, stopping at the first rejection.
    pub fn run_body_filters(&self, body: &[u8]) -> Result<(), (&'static str, Rejection)> {
        for filter in &self.body_filters {
            filter
                .filter_body(body)
                .map_err(|rejection| (filter.name(), rejection))?;
        }
        Ok(())
    }

    pub fn header_filter_count(&self) -> usize {
        self.header_filters.len()
    }

    pub fn body_filter_count(&self) -> usize {
        self.body_filters.len()
    }
}
