//! Time-scored exclusion lists of campaign ids.
//!
//! Each list is a sorted set whose score is the moment the exclusion ends.
//! Reads query `[now, +inf]` and evict everything below `now` in the same
//! call, so an expired entry is never returned and there is no sweeper.

use std::sync::Arc;

use anyhow::Result;

use crate::clock::Clock;
use crate::gateway::CacheGateway;
use crate::ids::{CampaignId, UserId};
use crate::keys::CacheKey;
use crate::score::Expiry;

#[derive(Clone)]
pub struct ExclusionLists {
    gateway: CacheGateway,
    clock: Arc<dyn Clock>,
}

impl ExclusionLists {
    pub fn new(gateway: CacheGateway, clock: Arc<dyn Clock>) -> Self {
        Self { gateway, clock }
    }

    async fn active(&self, set: &CacheKey) -> Result<Vec<CampaignId>> {
        self.gateway
            .sorted_set_range(set, self.clock.now(), Expiry::Never, true)
            .await
    }

    /// Campaigns excluded for everyone.
    pub async fn list_global(&self) -> Result<Vec<CampaignId>> {
        self.active(&CacheKey::excluded_campaigns()).await
    }

    /// Campaigns excluded for one user. Anonymous callers have none.
    pub async fn list_for_user(&self, uid: Option<&UserId>) -> Result<Vec<CampaignId>> {
        match uid {
            Some(uid) => self.active(&CacheKey::user_excluded_campaigns(uid)).await,
            None => Ok(Vec::new()),
        }
    }

    /// Global and per-user exclusions together. May contain duplicates.
    ///
    /// Anonymous viewers get the global list rather than an empty one, so a
    /// campaign that hit its global cap is never served to them either.
    pub async fn list_combined(&self, uid: Option<&UserId>) -> Result<Vec<CampaignId>> {
        let mut excluded = self.list_global().await?;
        excluded.extend(self.list_for_user(uid).await?);
        Ok(excluded)
    }

    pub async fn exclude_globally(&self, campaign_id: CampaignId, until: Expiry) -> Result<()> {
        self.gateway
            .sorted_set_add(&CacheKey::excluded_campaigns(), campaign_id, until)
            .await
    }

    pub async fn exclude_for_user(
        &self,
        uid: Option<&UserId>,
        campaign_id: CampaignId,
        until: Expiry,
    ) -> Result<()> {
        let Some(uid) = uid else {
            return Ok(());
        };
        self.gateway
            .sorted_set_add(&CacheKey::user_excluded_campaigns(uid), campaign_id, until)
            .await
    }
}
