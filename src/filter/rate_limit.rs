//! Fixed-window rate limiting keyed by client address.
//!
//! Each client address owns one entry in the shared store, encoded as
//! `"<request_count>:<window_start_us>"`. Every evaluation reads the entry, decides in
//! memory and writes it back with the concurrency token from the read. A lost race
//! (token mismatch) re-runs the whole cycle, up to the retry policy's attempt budget.
//!
//! # Decision
//! ```text
//! count += 1
//! count > limit && delta < window  → 429, nothing written
//! delta >= window                  → count = 0, window_start = now
//! write back
//! ```
//!
//! The request that rolls a window over is not counted against the new window.
//!
//! Store access is synchronous and contended attempts back off with a thread sleep,
//! so callers on an async runtime run [`RateLimiter::check`] on the blocking pool.

use std::fmt;
use std::num::ParseIntError;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::{ExhaustionPolicy, FilterConfig};
use crate::filter::{FilterOutcome, HeaderFilter, Rejection, RequestHeaders};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::store::{CasToken, SharedStore, StoreError};

/// Header carrying the originating client address as its first value.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Source of wall-clock time in microseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_micros(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as i64)
            .unwrap_or_default()
    }
}

/// A stored entry that does not parse as two decimal integers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryParseError {
    #[error("corrupt rate limit entry for {address}")]
    Shape { address: String },
    #[error("failed to get count for {address}: {source}")]
    Count {
        address: String,
        source: ParseIntError,
    },
    #[error("failed to get time for {address}: {source}")]
    Timestamp {
        address: String,
        source: ParseIntError,
    },
    #[error("request count overflow for {address}")]
    CountOverflow { address: String },
}

/// One client's window state plus the token it was read with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub address: String,
    pub request_count: u64,
    /// Microseconds since the Unix epoch.
    pub window_start: i64,
    pub token: CasToken,
}

impl RateLimitEntry {
    /// Entry for an address with no stored state.
    pub fn first_seen(address: &str, now: i64) -> Self {
        Self {
            address: address.to_string(),
            request_count: 0,
            window_start: now,
            token: CasToken::ABSENT,
        }
    }

    /// Parse the stored `count:window_start` representation.
    pub fn parse(address: &str, data: &[u8], token: CasToken) -> Result<Self, EntryParseError> {
        let text = String::from_utf8_lossy(data);
        let (count, start) = text
            .split_once(':')
            .filter(|(_, start)| !start.contains(':'))
            .ok_or_else(|| EntryParseError::Shape {
                address: address.to_string(),
            })?;

        let request_count = count.parse().map_err(|source| EntryParseError::Count {
            address: address.to_string(),
            source,
        })?;
        let window_start = start.parse().map_err(|source| EntryParseError::Timestamp {
            address: address.to_string(),
            source,
        })?;

        Ok(Self {
            address: address.to_string(),
            request_count,
            window_start,
            token,
        })
    }

    /// Stored representation.
    pub fn encode(&self) -> String {
        format!("{}:{}", self.request_count, self.window_start)
    }

    /// Microseconds elapsed since the window started.
    ///
    /// Raw integer subtraction of microsecond timestamps.
    pub fn delta_micros(&self, now: i64) -> i64 {
        now.saturating_sub(self.window_start)
    }
}

impl fmt::Display for RateLimitEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.address, self.encode())
    }
}

/// Outcome of one read-decide-write attempt.
enum Attempt {
    Done(FilterOutcome),
    Conflict,
}

/// Per-address fixed-window request limiter.
pub struct RateLimiter {
    limit: u64,
    window: Duration,
    store: Arc<dyn SharedStore>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl RateLimiter {
    pub fn new(limit: u64, window: Duration, store: Arc<dyn SharedStore>) -> Self {
        tracing::info!(limit, window = ?window, "Creating rate limiter");
        Self {
            limit,
            window,
            store,
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::default(),
        }
    }

    /// Build from the filter policy.
    pub fn from_config(config: &FilterConfig, store: Arc<dyn SharedStore>) -> Self {
        Self::new(config.rate_limit_requests, config.rate_limit_interval, store)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn window_micros(&self) -> i64 {
        i64::try_from(self.window.as_micros()).unwrap_or(i64::MAX)
    }

    /// Evaluate one request from `address`, retrying lost races.
    pub fn check(&self, address: &str) -> FilterOutcome {
        let mut attempt = 1;
        loop {
            match self.attempt(address) {
                Attempt::Done(outcome) => return outcome,
                Attempt::Conflict => {
                    metrics::record_store_conflict();
                    if !self.retry.can_retry(attempt) {
                        break;
                    }
                    let delay = self.retry.delay_after(attempt);
                    tracing::debug!(address, attempt, delay = ?delay, "Rate limit entry changed concurrently, retrying");
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }

        metrics::record_retry_exhausted();
        match self.retry.on_exhausted {
            ExhaustionPolicy::Allow => {
                tracing::warn!(address, attempts = attempt, "Rate limit update contended, allowing request uncounted");
                Ok(())
            }
            ExhaustionPolicy::Deny => {
                tracing::warn!(address, attempts = attempt, "Rate limit update contended, rejecting request");
                Err(Rejection::too_many_requests(
                    "rate limit state contended, try again later",
                ))
            }
        }
    }

    fn attempt(&self, address: &str) -> Attempt {
        let now = self.clock.now_micros();

        let mut entry = match self.load(address, now) {
            Ok(entry) => entry,
            Err(LoadError::Corrupt(e)) => return Attempt::Done(Err(corrupt(address, e))),
            Err(LoadError::Store(e)) => {
                metrics::record_store_error("get");
                tracing::error!(address, error = %e, "Failed to read rate limit entry, skipping check");
                return Attempt::Done(Ok(()));
            }
        };

        entry.request_count = match entry.request_count.checked_add(1) {
            Some(count) => count,
            None => {
                let e = EntryParseError::CountOverflow {
                    address: address.to_string(),
                };
                return Attempt::Done(Err(corrupt(address, e)));
            }
        };
        let delta = entry.delta_micros(now);
        let window = self.window_micros();

        if entry.request_count > self.limit && delta < window {
            tracing::info!(address, count = entry.request_count, limit = self.limit, "Rate limit exceeded");
            return Attempt::Done(Err(Rejection::too_many_requests(
                "rate limit exceeded, try again later",
            )));
        }

        if delta >= window {
            entry.request_count = 0;
            entry.window_start = now;
        }

        match self.store.set(address, entry.encode().as_bytes(), entry.token) {
            Ok(()) => {
                tracing::trace!(entry = %entry, "Rate limit entry saved");
                Attempt::Done(Ok(()))
            }
            Err(StoreError::CasMismatch) => Attempt::Conflict,
            Err(e) => {
                metrics::record_store_error("set");
                tracing::error!(address, error = %e, "Failed to save rate limit entry");
                Attempt::Done(Ok(()))
            }
        }
    }

    fn load(&self, address: &str, now: i64) -> Result<RateLimitEntry, LoadError> {
        match self.store.get(address).map_err(LoadError::Store)? {
            (None, _) => Ok(RateLimitEntry::first_seen(address, now)),
            (Some(data), token) => {
                RateLimitEntry::parse(address, &data, token).map_err(LoadError::Corrupt)
            }
        }
    }
}

enum LoadError {
    Store(StoreError),
    Corrupt(EntryParseError),
}

fn corrupt(address: &str, e: EntryParseError) -> Rejection {
    tracing::error!(address, error = %e, "Corrupt rate limit entry");
    Rejection::internal(format!("failed to get entry: {}", e))
}

impl HeaderFilter for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn filter_headers(&self, headers: &RequestHeaders) -> FilterOutcome {
        let address = headers
            .first(FORWARDED_FOR_HEADER)
            .map(str::trim)
            .filter(|a| !a.is_empty());

        match address {
            Some(address) => self.check(address),
            None => {
                tracing::info!("request missing x-forwarded-for header, rate limit filter skipped");
                Ok(())
            }
        }
    }
}
