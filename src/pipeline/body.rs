//! Per-request body accumulator.
//!
//! # States
//! ```text
//! Buffering { received } → Ready(body)
//! ```
//! `Buffering` only tracks how much the host holds; the body is read once, in full,
//! when the stream ends.

use axum::body::Bytes;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyBuffer {
    Buffering { received: usize },
    Ready(Bytes),
}

impl Default for BodyBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl BodyBuffer {
    pub fn new() -> Self {
        Self::Buffering { received: 0 }
    }

    /// Note the host's buffered size so far. Ignored once ready.
    pub fn record(&mut self, size_so_far: usize) {
        if let Self::Buffering { received } = self {
            *received = (*received).max(size_so_far);
        }
    }

    /// Bytes the host reported holding.
    pub fn received(&self) -> usize {
        match self {
            Self::Buffering { received } => *received,
            Self::Ready(body) => body.len(),
        }
    }

    /// Move to `Ready` with the complete body.
    pub fn complete(self, body: Bytes) -> Self {
        Self::Ready(body)
    }

    /// The complete body, once the stream has ended.
    pub fn ready(&self) -> Option<&[u8]> {
        match self {
            Self::Ready(body) => Some(body),
            Self::Buffering { .. } => None,
        }
    }
}
