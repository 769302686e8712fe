//! Request inspection pipeline.
//!
//! # Data Flow
//! ```text
//! host header event
//!     → context.rs (fold headers, run header filters)
//!     → Continue | immediate response
//! host body events
//!     → body.rs (Pause until end of stream)
//!     → context.rs (read full body once, run body filters)
//!     → Continue | immediate response
//! ```
//!
//! # Design Decisions
//! - The filter chain is built once per process and shared by `Arc`
//! - Each request gets its own `RequestPipeline`; nothing in it is shared
//! - No per-request error escapes: everything becomes a response or a fail-open continue

pub mod body;
pub mod context;
pub mod host;

use std::sync::Arc;

pub use body::BodyBuffer;
pub use context::{RequestPipeline, RequestState};
pub use host::{Action, HostError, HttpHost};

use crate::config::FilterConfig;
use crate::filter::{FilterChain, RateLimiter, SqlDetector};
use crate::resilience::RetryPolicy;
use crate::store::SharedStore;

/// Process-wide factory for request pipelines.
#[derive(Clone)]
pub struct Inspector {
    chain: Arc<FilterChain>,
}

impl Inspector {
    pub fn new(chain: FilterChain) -> Self {
        Self {
            chain: Arc::new(chain),
        }
    }

    /// Build the standard chain from the filter policy.
    pub fn from_config(
        config: &FilterConfig,
        store: Arc<dyn SharedStore>,
        retry: RetryPolicy,
    ) -> Self {
        let limiter = RateLimiter::from_config(config, store).with_retry_policy(retry);
        let sql = SqlDetector::new(&config.sql_keywords);
        let inspector = Self::new(FilterChain::standard(limiter, sql));
        tracing::debug!(
            header_filters = inspector.chain.header_filter_count(),
            body_filters = inspector.chain.body_filter_count(),
            "Filter chain built"
        );
        inspector
    }

    /// Fresh pipeline for one request.
    pub fn new_request(&self) -> RequestPipeline {
        RequestPipeline::new(self.chain.clone())
    }

    pub fn chain(&self) -> &Arc<FilterChain> {
        &self.chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::time::Duration;

    #[test]
    fn standard_chain_layout() {
        let config = FilterConfig {
            sql_keywords: vec!["union select".into()],
            rate_limit_requests: 5,
            rate_limit_interval: Duration::from_secs(1),
        };
        let inspector = Inspector::from_config(&config, Arc::new(MemoryStore::new()), RetryPolicy::default());
        assert_eq!(inspector.chain().header_filter_count(), 2);
        assert_eq!(inspector.chain().body_filter_count(), 1);

        let a = inspector.new_request();
        let b = inspector.new_request();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.state(), RequestState::AwaitingHeaders);
    }
}
