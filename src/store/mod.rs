//! Backing stores consumed by the pipeline.
//!
//! The pipeline only depends on the traits here and on
//! [`ResourceLookup`](crate::authz::ResourceLookup); the in-memory
//! implementations serve the binary and the tests.

pub mod counter;
pub mod directory;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::StoreError;
use crate::types::{EntityId, Principal};

pub use counter::MemoryCounterStore;
pub use directory::{
    AccountProfile, Classroom, Credentials, DirectoryError, MemoryDirectory, NewAccount, School,
    Student,
};

/// Resolves a token's user id to a live account
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_principal(&self, user_id: &EntityId) -> Result<Option<Principal>, StoreError>;
}

/// Current state of one fixed rate-limit window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: u64,
    pub resets_in: Duration,
}

/// Fixed-window counters keyed by caller and endpoint
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current count, or `None` when no window is open for `key`
    async fn get(&self, key: &str) -> Result<Option<WindowCount>, StoreError>;

    /// Count one request, opening a window of length `window` on first use
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, StoreError>;
}
