//! Namespaced, typed access to a [`KeyedStore`].

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;

use crate::keys::{CacheKey, Prefixes};
use crate::score::Expiry;
use crate::store::{Increment, KeyTtl, KeyedStore};

/// Renders [`CacheKey`]s under their namespace prefix and casts stored
/// strings back into typed values.
///
/// Values that fail to parse are reported as absent, so a corrupted entry
/// behaves like a missing one until the next write replaces it.
#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn KeyedStore>,
    prefixes: Prefixes,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn KeyedStore>, prefixes: Prefixes) -> Result<Self> {
        prefixes.validate()?;
        Ok(Self { store, prefixes })
    }

    fn render(&self, key: &CacheKey) -> String {
        key.render(&self.prefixes)
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    pub async fn get<T: FromStr>(&self, key: &CacheKey) -> Result<Option<T>> {
        let raw = self.store.get(&self.render(key)).await?;

        Ok(raw.and_then(|raw| match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::debug!(key = %key, raw = %raw, "discarding malformed cache value");
                None
            }
        }))
    }

    /// True when the key holds any value at all.
    pub async fn exists(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.store.get(&self.render(key)).await?.is_some())
    }

    pub async fn set(
        &self,
        key: &CacheKey,
        value: impl Display + Send,
        ttl_secs: Option<u64>,
    ) -> Result<()> {
        self.store
            .set(&self.render(key), &value.to_string(), ttl_secs)
            .await
    }

    pub async fn increment(
        &self,
        key: &CacheKey,
        by: i64,
        ttl_secs: Option<u64>,
    ) -> Result<Increment> {
        self.store.increment(&self.render(key), by, ttl_secs).await
    }

    pub async fn time_to_live(&self, key: &CacheKey) -> Result<KeyTtl> {
        self.store.ttl(&self.render(key)).await
    }

    pub async fn sorted_set_add(
        &self,
        set: &CacheKey,
        member: impl Display + Send,
        score: Expiry,
    ) -> Result<()> {
        self.store
            .sorted_set_add(&self.render(set), &member.to_string(), score)
            .await
    }

    /// Members scored within `[min, max]`, cast to `T`. Members that do not
    /// parse are skipped.
    pub async fn sorted_set_range<T: FromStr>(
        &self,
        set: &CacheKey,
        min: i64,
        max: Expiry,
        evict_out_of_range: bool,
    ) -> Result<Vec<T>> {
        let members = self
            .store
            .sorted_set_range(&self.render(set), min, max, evict_out_of_range)
            .await?;

        Ok(members
            .into_iter()
            .filter_map(|member| match member.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::debug!(set = %set, member = %member, "skipping malformed set member");
                    None
                }
            })
            .collect())
    }
}
