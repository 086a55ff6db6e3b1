//! Per-user, per-category "no ads" flags.

use anyhow::Result;

use crate::gateway::CacheGateway;
use crate::ids::{CategoryId, UserId};
use crate::keys::CacheKey;
use crate::policy::window_hours_to_secs;

/// Stored flag value. Presence is what counts; the value is never read back.
const FLAG: i64 = 1;

/// Category level a flag is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    One,
    Two,
}

#[derive(Clone)]
pub struct NoAdsFlags {
    gateway: CacheGateway,
}

impl NoAdsFlags {
    pub fn new(gateway: CacheGateway) -> Self {
        Self { gateway }
    }

    fn key(level: Level, uid: &UserId, category: CategoryId) -> CacheKey {
        match level {
            Level::One => CacheKey::user_level_1_no_ads(uid, category),
            Level::Two => CacheKey::user_level_2_no_ads(uid, category),
        }
    }

    /// Whether ads are blocked for the user in this category. Anonymous
    /// callers are never blocked.
    pub async fn is_blocked(
        &self,
        level: Level,
        uid: Option<&UserId>,
        category: CategoryId,
    ) -> Result<bool> {
        match uid {
            Some(uid) => self.gateway.exists(&Self::key(level, uid, category)).await,
            None => Ok(false),
        }
    }

    /// Block ads for `hours` from now.
    pub async fn block(
        &self,
        level: Level,
        uid: Option<&UserId>,
        category: CategoryId,
        hours: u32,
    ) -> Result<()> {
        let ttl_secs = window_hours_to_secs(hours)?;
        let Some(uid) = uid else {
            return Ok(());
        };
        tracing::debug!(uid = %uid, category = %category, ?level, hours, "blocking ads");
        self.gateway
            .set(&Self::key(level, uid, category), FLAG, Some(ttl_secs))
            .await
    }

    pub async fn is_level_1_blocked(
        &self,
        uid: Option<&UserId>,
        level_1_id: CategoryId,
    ) -> Result<bool> {
        self.is_blocked(Level::One, uid, level_1_id).await
    }

    pub async fn is_level_2_blocked(
        &self,
        uid: Option<&UserId>,
        level_2_id: CategoryId,
    ) -> Result<bool> {
        self.is_blocked(Level::Two, uid, level_2_id).await
    }

    pub async fn block_level_1(
        &self,
        uid: Option<&UserId>,
        level_1_id: CategoryId,
        hours: u32,
    ) -> Result<()> {
        self.block(Level::One, uid, level_1_id, hours).await
    }

    pub async fn block_level_2(
        &self,
        uid: Option<&UserId>,
        level_2_id: CategoryId,
        hours: u32,
    ) -> Result<()> {
        self.block(Level::Two, uid, level_2_id, hours).await
    }
}
