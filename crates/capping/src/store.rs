//! Keyed store backends.
//!
//! A [`KeyedStore`] is the only place engine state lives. It offers scalar
//! values with TTLs, an atomic increment and sorted sets with a lazily
//! evicting range query. Keys arrive fully rendered; namespacing is the
//! gateway's job.
//!
//! ## Backends
//!
//! - **redis** - production backend over a multiplexed connection
//! - **memory** - single-process map driven by a [`Clock`](crate::Clock), for
//!   tests and local development

mod memory;
mod redis;

pub use self::memory::MemoryKeyedStore;
pub use self::redis::RedisKeyedStore;

use anyhow::{Result, ensure};
use async_trait::async_trait;

use crate::score::Expiry;

/// Result of an atomic increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increment {
    /// Value after the increment.
    pub value: i64,
    /// True only for the call that brought the key into existence.
    pub created: bool,
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Seconds until the key expires.
    Expires(u64),
    /// Key exists without an expiry.
    Persistent,
    Missing,
}

/// A zero TTL means "expire now" to one backend and "never" to another, so
/// every backend refuses it.
fn check_ttl(key: &str, ttl_secs: Option<u64>) -> Result<()> {
    ensure!(ttl_secs != Some(0), "zero ttl for {key}");
    Ok(())
}

/// Backend operations shared by every namespace.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait KeyedStore: Send + Sync {
    /// Health check - verify the backend answers.
    async fn ping(&self) -> Result<()>;

    /// Raw scalar value, or `None` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite a scalar. `None` TTL keeps it until cleared; a zero TTL is
    /// an error.
    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()>;

    /// Atomically add `by` to the value at `key` (absent counts as 0).
    /// The TTL is applied only when this call creates the key.
    async fn increment(&self, key: &str, by: i64, ttl_secs: Option<u64>) -> Result<Increment>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl>;

    /// Insert a member or update its score.
    async fn sorted_set_add(&self, set: &str, member: &str, score: Expiry) -> Result<()>;

    /// Members with `min <= score <= max`, in no particular order. With
    /// `evict_out_of_range` every member outside the range is deleted by the
    /// same call.
    async fn sorted_set_range(
        &self,
        set: &str,
        min: i64,
        max: Expiry,
        evict_out_of_range: bool,
    ) -> Result<Vec<String>>;
}
