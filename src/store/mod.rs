//! Shared counter store.
//!
//! # Data Flow
//! ```text
//! rate limiter
//!     → get(key)                  → (bytes?, token)
//!     → decide in memory
//!     → set(key, bytes, token)    → Ok | CasMismatch | Unavailable
//! ```
//!
//! # Design Decisions
//! - The store is an explicit collaborator passed in as `Arc<dyn SharedStore>`,
//!   never a process global
//! - Every read hands out a concurrency token; a write only lands if the token
//!   still matches (optimistic concurrency)
//! - A missing key has its own token, so racing first writers cannot both win

pub mod memory;

pub use memory::MemoryStore;

/// Opaque concurrency token returned by [`SharedStore::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CasToken(u32);

impl CasToken {
    /// Token for a key that does not exist. A set with this token only succeeds if
    /// the key is still absent.
    pub const ABSENT: CasToken = CasToken(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

/// Errors from shared store access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Another writer updated the key since it was read.
    #[error("concurrency token mismatch")]
    CasMismatch,
    /// The store could not be reached or refused the operation.
    #[error("shared store unavailable: {0}")]
    Unavailable(String),
}

/// A keyed byte-string store with compare-and-set writes.
pub trait SharedStore: Send + Sync {
    /// Read a key. `None` means the key was not found; the token is then
    /// [`CasToken::ABSENT`].
    fn get(&self, key: &str) -> Result<(Option<Vec<u8>>, CasToken), StoreError>;

    /// Write a key if `token` still matches the stored version.
    fn set(&self, key: &str, value: &[u8], token: CasToken) -> Result<(), StoreError>;
}
