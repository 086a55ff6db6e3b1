//! Show and watch-time counters and the caps they enforce.
//!
//! Every rule is increment, compare, then act on overflow:
//!
//! | Counter | Window | On overflow |
//! |---|---|---|
//! | campaign show count | days | global exclusion until the counter resets |
//! | user × campaign show count | hours | user exclusion until the counter resets |
//! | user × level-1 show count | hours | level-1 no-ads flag for the window |
//! | user × level-2 watch seconds | hours | level-2 no-ads flag for the window |
//!
//! The counter write and the overflow write are separate store calls. If the
//! second one fails the counter stays over its limit, and the next show
//! re-triggers the overflow write, so no transaction is needed.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::clock::Clock;
use crate::exclusions::ExclusionLists;
use crate::gateway::CacheGateway;
use crate::ids::{CampaignId, CategoryId, UserId};
use crate::keys::CacheKey;
use crate::no_ads::NoAdsFlags;
use crate::policy::{
    CapOutcome, GlobalShowCap, ShowCap, WatchTimeCap, threshold_reached, window_end,
};
use crate::score::Expiry;
use crate::store::Increment;

#[derive(Clone)]
pub struct Counters {
    gateway: CacheGateway,
    exclusions: ExclusionLists,
    flags: NoAdsFlags,
    clock: Arc<dyn Clock>,
}

impl Counters {
    pub fn new(
        gateway: CacheGateway,
        exclusions: ExclusionLists,
        flags: NoAdsFlags,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            exclusions,
            flags,
            clock,
        }
    }

    /// When the window of the counter at `key` ends, read after an increment.
    async fn window_end(&self, key: &CacheKey) -> Result<Expiry> {
        let ttl = self.gateway.time_to_live(key).await?;
        Ok(window_end(self.clock.now(), ttl))
    }

    /// Count one show of a campaign across all users.
    pub async fn record_global_show(
        &self,
        campaign_id: CampaignId,
        cap: GlobalShowCap,
    ) -> Result<CapOutcome> {
        let window_secs = cap.window_secs()?;
        let key = CacheKey::campaign_show_count(campaign_id);
        let Increment { value, created } = self
            .gateway
            .increment(&key, 1, window_secs)
            .await?;

        if created {
            self.gateway
                .set(
                    &CacheKey::campaign_show_count_timestamp(campaign_id),
                    self.clock.now(),
                    None,
                )
                .await?;
        }

        let capped = threshold_reached(value, cap.max_allowed);
        if capped {
            let until = self.window_end(&key).await?;
            self.exclusions.exclude_globally(campaign_id, until).await?;
            tracing::info!(
                campaign_id = %campaign_id,
                count = value,
                until = ?until,
                "campaign excluded globally"
            );
        }

        Ok(CapOutcome::Counted {
            count: value,
            capped,
        })
    }

    /// Count one show of a campaign to one user.
    pub async fn record_user_show(
        &self,
        uid: Option<&UserId>,
        campaign_id: CampaignId,
        cap: ShowCap,
    ) -> Result<CapOutcome> {
        let window_secs = cap.window_secs()?;
        let Some(uid) = uid else {
            return Ok(CapOutcome::Skipped);
        };

        let key = CacheKey::user_campaign_show_count(uid, campaign_id);
        let Increment { value, .. } = self
            .gateway
            .increment(&key, 1, Some(window_secs))
            .await?;

        let capped = threshold_reached(value, cap.max_allowed);
        if capped {
            let until = self.window_end(&key).await?;
            self.exclusions
                .exclude_for_user(Some(uid), campaign_id, until)
                .await?;
            tracing::info!(
                uid = %uid,
                campaign_id = %campaign_id,
                count = value,
                until = ?until,
                "campaign excluded for user"
            );
        }

        Ok(CapOutcome::Counted {
            count: value,
            capped,
        })
    }

    /// Count one show in a level-1 category to one user.
    pub async fn record_user_level_1_show(
        &self,
        uid: Option<&UserId>,
        level_1_id: CategoryId,
        cap: ShowCap,
    ) -> Result<CapOutcome> {
        let window_secs = cap.window_secs()?;
        let Some(uid) = uid else {
            return Ok(CapOutcome::Skipped);
        };

        let Increment { value, .. } = self
            .gateway
            .increment(
                &CacheKey::user_level_1_show_count(uid, level_1_id),
                1,
                Some(window_secs),
            )
            .await?;

        let capped = threshold_reached(value, cap.max_allowed);
        if capped {
            self.flags
                .block_level_1(Some(uid), level_1_id, cap.window_hours)
                .await?;
        }

        Ok(CapOutcome::Counted {
            count: value,
            capped,
        })
    }

    /// Add watched seconds in a level-2 category for one user. Once the
    /// category is blocked the counter is left alone.
    pub async fn record_user_level_2_watch_time(
        &self,
        uid: Option<&UserId>,
        level_2_id: CategoryId,
        watch_time_secs: u64,
        cap: WatchTimeCap,
    ) -> Result<CapOutcome> {
        let window_secs = cap.window_secs()?;
        let Some(uid) = uid else {
            return Ok(CapOutcome::Skipped);
        };
        if self.flags.is_level_2_blocked(Some(uid), level_2_id).await? {
            return Ok(CapOutcome::Skipped);
        }

        let by = i64::try_from(watch_time_secs)
            .with_context(|| format!("watch time of {watch_time_secs}s is out of range"))?;
        let Increment { value, .. } = self
            .gateway
            .increment(
                &CacheKey::user_level_2_watch_time(uid, level_2_id),
                by,
                Some(window_secs),
            )
            .await?;

        let max_allowed = i64::try_from(cap.max_allowed_secs).unwrap_or(i64::MAX);
        let capped = threshold_reached(value, max_allowed);
        if capped {
            self.flags
                .block_level_2(Some(uid), level_2_id, cap.window_hours)
                .await?;
        }

        Ok(CapOutcome::Counted {
            count: value,
            capped,
        })
    }

    /// Epoch seconds at which the campaign's current global window started.
    pub async fn campaign_counter_timestamp(&self, campaign_id: CampaignId) -> Result<Option<i64>> {
        self.gateway
            .get(&CacheKey::campaign_show_count_timestamp(campaign_id))
            .await
    }

    pub async fn campaign_show_count(&self, campaign_id: CampaignId) -> Result<Option<i64>> {
        self.gateway
            .get(&CacheKey::campaign_show_count(campaign_id))
            .await
    }

    pub async fn user_campaign_show_count(
        &self,
        uid: Option<&UserId>,
        campaign_id: CampaignId,
    ) -> Result<Option<i64>> {
        match uid {
            Some(uid) => {
                self.gateway
                    .get(&CacheKey::user_campaign_show_count(uid, campaign_id))
                    .await
            }
            None => Ok(None),
        }
    }

    pub async fn user_level_1_show_count(
        &self,
        uid: Option<&UserId>,
        level_1_id: CategoryId,
    ) -> Result<Option<i64>> {
        match uid {
            Some(uid) => {
                self.gateway
                    .get(&CacheKey::user_level_1_show_count(uid, level_1_id))
                    .await
            }
            None => Ok(None),
        }
    }

    pub async fn user_level_2_watch_time(
        &self,
        uid: Option<&UserId>,
        level_2_id: CategoryId,
    ) -> Result<Option<i64>> {
        match uid {
            Some(uid) => {
                self.gateway
                    .get(&CacheKey::user_level_2_watch_time(uid, level_2_id))
                    .await
            }
            None => Ok(None),
        }
    }
}
