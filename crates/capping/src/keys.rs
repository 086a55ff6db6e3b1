//! Typed cache keys.
//!
//! Every entity the engine stores gets its own constructor here, so the key
//! format lives in one place and a key always carries the namespace it
//! belongs to.
//!
//! ```text
//! {counters}:campaign:{cid}:show_count              → global show count (TTL = day window)
//! {counters}:campaign:{cid}:show_count:timestamp    → window start, epoch seconds
//! {counters}:user:{uid}:campaign:{cid}:show_count   → per-user show count (TTL = hour window)
//! {counters}:user:{uid}:level_1:{l1}:show_count     → per-user level-1 show count
//! {counters}:user:{uid}:level_2:{l2}:watch_time     → per-user level-2 watch seconds
//! {exclude}:excluded_campaigns                      → sorted set, score = expiry
//! {exclude}:user:{uid}:excluded_campaigns           → sorted set, score = expiry
//! {no_ads}:user:{uid}:level_1:{l1}:no_ads           → flag (TTL = hour window)
//! {no_ads}:user:{uid}:level_2:{l2}:no_ads           → flag (TTL = hour window)
//! ```

use std::fmt;

use anyhow::{Result, ensure};

use crate::ids::{CampaignId, CategoryId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Counters,
    ExcludeLists,
    NoAds,
}

/// Key prefix per namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefixes {
    pub counters: String,
    pub exclude_lists: String,
    pub no_ads: String,
}

impl Prefixes {
    pub fn get(&self, namespace: Namespace) -> &str {
        match namespace {
            Namespace::Counters => &self.counters,
            Namespace::ExcludeLists => &self.exclude_lists,
            Namespace::NoAds => &self.no_ads,
        }
    }

    /// Rejects empty or shared prefixes, which would let namespaces collide.
    pub fn validate(&self) -> Result<()> {
        let all = [&self.counters, &self.exclude_lists, &self.no_ads];
        ensure!(
            all.iter().all(|p| !p.is_empty()),
            "cache key prefixes must not be empty"
        );
        ensure!(
            self.counters != self.exclude_lists
                && self.counters != self.no_ads
                && self.exclude_lists != self.no_ads,
            "cache key prefixes must be distinct: {all:?}"
        );
        Ok(())
    }
}

impl Default for Prefixes {
    fn default() -> Self {
        Self {
            counters: "capping:counters".into(),
            exclude_lists: "capping:exclude".into(),
            no_ads: "capping:no_ads".into(),
        }
    }
}

/// A store key relative to its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    path: String,
}

impl CacheKey {
    fn new(namespace: Namespace, path: String) -> Self {
        Self { namespace, path }
    }

    pub fn campaign_show_count(campaign_id: CampaignId) -> Self {
        Self::new(
            Namespace::Counters,
            format!("campaign:{campaign_id}:show_count"),
        )
    }

    pub fn campaign_show_count_timestamp(campaign_id: CampaignId) -> Self {
        Self::new(
            Namespace::Counters,
            format!("campaign:{campaign_id}:show_count:timestamp"),
        )
    }

    pub fn user_campaign_show_count(uid: &UserId, campaign_id: CampaignId) -> Self {
        Self::new(
            Namespace::Counters,
            format!("user:{uid}:campaign:{campaign_id}:show_count"),
        )
    }

    pub fn user_level_1_show_count(uid: &UserId, level_1_id: CategoryId) -> Self {
        Self::new(
            Namespace::Counters,
            format!("user:{uid}:level_1:{level_1_id}:show_count"),
        )
    }

    pub fn user_level_2_watch_time(uid: &UserId, level_2_id: CategoryId) -> Self {
        Self::new(
            Namespace::Counters,
            format!("user:{uid}:level_2:{level_2_id}:watch_time"),
        )
    }

    pub fn excluded_campaigns() -> Self {
        Self::new(Namespace::ExcludeLists, "excluded_campaigns".into())
    }

    pub fn user_excluded_campaigns(uid: &UserId) -> Self {
        Self::new(
            Namespace::ExcludeLists,
            format!("user:{uid}:excluded_campaigns"),
        )
    }

    pub fn user_level_1_no_ads(uid: &UserId, level_1_id: CategoryId) -> Self {
        Self::new(
            Namespace::NoAds,
            format!("user:{uid}:level_1:{level_1_id}:no_ads"),
        )
    }

    pub fn user_level_2_no_ads(uid: &UserId, level_2_id: CategoryId) -> Self {
        Self::new(
            Namespace::NoAds,
            format!("user:{uid}:level_2:{level_2_id}:no_ads"),
        )
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Full store key under the given prefixes.
    pub fn render(&self, prefixes: &Prefixes) -> String {
        format!("{}:{}", prefixes.get(self.namespace), self.path)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}
