//! In-process implementation of KeyedStore.
//!
//! Expiry is checked against the injected clock on every access, the same
//! way Redis expires keys lazily on read. Keys nobody reads again are
//! dropped by a sweep that runs on writes at most once per
//! [`SWEEP_INTERVAL_SECS`]. One mutex guards the whole map, which makes every
//! operation atomic with respect to every other.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::{Increment, KeyTtl, KeyedStore, check_ttl};
use crate::clock::Clock;
use crate::score::{Expiry, after};

/// Minimum clock time between two sweeps of expired keys.
pub const SWEEP_INTERVAL_SECS: i64 = 60;

#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    Sorted(HashMap<String, Expiry>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<i64>,
}

/// In-memory implementation of KeyedStore.
pub struct MemoryKeyedStore {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn Clock>,
    last_sweep: AtomicI64,
}

impl MemoryKeyedStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            last_sweep: AtomicI64::new(now),
        }
    }

    /// Number of keys held, expired or not.
    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    /// Drop every expired key. Called with the map locked, so the interval
    /// check and the sweep are serialized with all other operations.
    fn sweep_expired(&self, entries: &mut HashMap<String, Entry>, now: i64) {
        if now - self.last_sweep.load(Ordering::Relaxed) < SWEEP_INTERVAL_SECS {
            return;
        }
        self.last_sweep.store(now, Ordering::Relaxed);

        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at.is_none_or(|at| at > now));
        let swept = before - entries.len();
        if swept > 0 {
            tracing::debug!(swept, remaining = entries.len(), "swept expired keys");
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }

    /// Live entry for `key`, dropping it first if it has expired.
    fn live<'a>(
        entries: &'a mut HashMap<String, Entry>,
        key: &str,
        now: i64,
    ) -> Option<&'a mut Entry> {
        let expired = entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .is_some_and(|at| at <= now);
        if expired {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

fn wrong_type(key: &str) -> anyhow::Error {
    anyhow!("WRONGTYPE operation against key {key} holding the wrong kind of value")
}

fn deadline(now: i64, ttl_secs: Option<u64>) -> Option<i64> {
    ttl_secs.map(|ttl| after(now, ttl).timestamp().unwrap_or(i64::MAX))
}

#[async_trait]
impl KeyedStore for MemoryKeyedStore {
    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = self.clock.now();
        let mut entries = self.lock()?;

        match Self::live(&mut entries, key, now) {
            None => Ok(None),
            Some(Entry {
                value: Value::Scalar(value),
                ..
            }) => Ok(Some(value.clone())),
            Some(_) => Err(wrong_type(key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<()> {
        check_ttl(key, ttl_secs)?;
        let now = self.clock.now();
        let mut entries = self.lock()?;
        self.sweep_expired(&mut entries, now);

        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(value.to_string()),
                expires_at: deadline(now, ttl_secs),
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str, by: i64, ttl_secs: Option<u64>) -> Result<Increment> {
        check_ttl(key, ttl_secs)?;
        let now = self.clock.now();
        let mut entries = self.lock()?;
        self.sweep_expired(&mut entries, now);

        let current = match Self::live(&mut entries, key, now) {
            None => None,
            Some(Entry {
                value: Value::Scalar(value),
                expires_at,
            }) => value.parse::<i64>().ok().map(|n| (n, *expires_at)),
            Some(_) => return Err(wrong_type(key)),
        };

        let (value, expires_at, created) = match current {
            Some((n, expires_at)) => {
                let value = n
                    .checked_add(by)
                    .ok_or_else(|| anyhow!("increment or decrement would overflow"))?;
                (value, expires_at, false)
            }
            None => (by, deadline(now, ttl_secs), true),
        };

        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(value.to_string()),
                expires_at,
            },
        );
        Ok(Increment { value, created })
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let now = self.clock.now();
        let mut entries = self.lock()?;

        Ok(match Self::live(&mut entries, key, now) {
            None => KeyTtl::Missing,
            Some(Entry {
                expires_at: None, ..
            }) => KeyTtl::Persistent,
            Some(Entry {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires((*at - now).max(0) as u64),
        })
    }

    async fn sorted_set_add(&self, set: &str, member: &str, score: Expiry) -> Result<()> {
        let now = self.clock.now();
        let mut entries = self.lock()?;
        self.sweep_expired(&mut entries, now);

        if Self::live(&mut entries, set, now).is_none() {
            entries.insert(
                set.to_string(),
                Entry {
                    value: Value::Sorted(HashMap::new()),
                    expires_at: None,
                },
            );
        }
        match entries.get_mut(set) {
            Some(Entry {
                value: Value::Sorted(members),
                ..
            }) => {
                members.insert(member.to_string(), score);
                Ok(())
            }
            _ => Err(wrong_type(set)),
        }
    }

    async fn sorted_set_range(
        &self,
        set: &str,
        min: i64,
        max: Expiry,
        evict_out_of_range: bool,
    ) -> Result<Vec<String>> {
        let now = self.clock.now();
        let mut entries = self.lock()?;

        let members = match Self::live(&mut entries, set, now) {
            None => return Ok(Vec::new()),
            Some(Entry {
                value: Value::Sorted(members),
                ..
            }) => members,
            Some(_) => return Err(wrong_type(set)),
        };

        let in_range = |score: &Expiry| Expiry::At(min) <= *score && *score <= max;
        let found = members
            .iter()
            .filter(|&(_, score)| in_range(score))
            .map(|(member, _)| member.clone())
            .collect();

        if evict_out_of_range {
            members.retain(|_, score| in_range(&*score));
            if members.is_empty() {
                entries.remove(set);
            }
        }
        Ok(found)
    }
}
