//! The capping engine: one value per process, shared by every request.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::counters::Counters;
use crate::exclusions::ExclusionLists;
use crate::gateway::CacheGateway;
use crate::ids::{CampaignId, CategoryId, UserId};
use crate::keys::Prefixes;
use crate::no_ads::NoAdsFlags;
use crate::policy::{CapOutcome, GlobalShowCap, ShowCap, WatchTimeCap};
use crate::store::KeyedStore;

/// What the ad selector needs to know before picking a campaign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    pub level_1_blocked: bool,
    pub level_2_blocked: bool,
    /// Empty when ads are blocked outright; the list is not read then.
    pub excluded_campaigns: Vec<CampaignId>,
}

impl Eligibility {
    pub fn no_ads(&self) -> bool {
        self.level_1_blocked || self.level_2_blocked
    }
}

/// Level-1 category show cap attached to a served campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level1Show {
    pub level_1_id: CategoryId,
    pub cap: ShowCap,
}

/// Level-2 category watch time attached to a served campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level2Watch {
    pub level_2_id: CategoryId,
    pub watch_time_secs: u64,
    pub cap: WatchTimeCap,
}

/// A campaign that was just served, with the caps that apply to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServedCampaign {
    pub campaign_id: CampaignId,
    pub global_cap: GlobalShowCap,
    pub user_cap: Option<ShowCap>,
    pub level_1: Option<Level1Show>,
    pub level_2: Option<Level2Watch>,
}

/// Result of each rule applied for one impression. `None` means the rule
/// did not apply to the campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpressionOutcome {
    pub global: CapOutcome,
    pub user: Option<CapOutcome>,
    pub level_1: Option<CapOutcome>,
    pub level_2: Option<CapOutcome>,
}

/// Frequency-capping engine.
///
/// Holds no state of its own; everything lives in the injected store, so
/// clones are cheap and any number of workers may share one.
#[derive(Clone)]
pub struct CappingEngine {
    gateway: CacheGateway,
    exclusions: ExclusionLists,
    flags: NoAdsFlags,
    counters: Counters,
}

impl CappingEngine {
    pub fn new(
        store: Arc<dyn KeyedStore>,
        prefixes: Prefixes,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let gateway = CacheGateway::new(store, prefixes)?;
        let exclusions = ExclusionLists::new(gateway.clone(), clock.clone());
        let flags = NoAdsFlags::new(gateway.clone());
        let counters = Counters::new(gateway.clone(), exclusions.clone(), flags.clone(), clock);

        Ok(Self {
            gateway,
            exclusions,
            flags,
            counters,
        })
    }

    /// Verify the backing store answers.
    pub async fn ping(&self) -> Result<()> {
        self.gateway.ping().await
    }

    pub fn exclusions(&self) -> &ExclusionLists {
        &self.exclusions
    }

    pub fn flags(&self) -> &NoAdsFlags {
        &self.flags
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub async fn list_combined_exclusions(&self, uid: Option<&UserId>) -> Result<Vec<CampaignId>> {
        self.exclusions.list_combined(uid).await
    }

    pub async fn is_level_1_blocked(
        &self,
        uid: Option<&UserId>,
        level_1_id: CategoryId,
    ) -> Result<bool> {
        self.flags.is_level_1_blocked(uid, level_1_id).await
    }

    pub async fn is_level_2_blocked(
        &self,
        uid: Option<&UserId>,
        level_2_id: CategoryId,
    ) -> Result<bool> {
        self.flags.is_level_2_blocked(uid, level_2_id).await
    }

    /// No-ads flags for the requested categories, then the exclusion list
    /// unless ads are blocked anyway.
    pub async fn eligibility(
        &self,
        uid: Option<&UserId>,
        level_1_id: Option<CategoryId>,
        level_2_id: Option<CategoryId>,
    ) -> Result<Eligibility> {
        let level_1_blocked = match level_1_id {
            Some(id) => self.is_level_1_blocked(uid, id).await?,
            None => false,
        };
        let level_2_blocked = match level_2_id {
            Some(id) => self.is_level_2_blocked(uid, id).await?,
            None => false,
        };

        let mut eligibility = Eligibility {
            level_1_blocked,
            level_2_blocked,
            excluded_campaigns: Vec::new(),
        };
        if !eligibility.no_ads() {
            eligibility.excluded_campaigns = self.list_combined_exclusions(uid).await?;
        }
        Ok(eligibility)
    }

    pub async fn record_global_show(
        &self,
        campaign_id: CampaignId,
        window_days: Option<u32>,
        max_allowed: i64,
    ) -> Result<CapOutcome> {
        self.counters
            .record_global_show(
                campaign_id,
                GlobalShowCap {
                    window_days,
                    max_allowed,
                },
            )
            .await
    }

    pub async fn record_user_show(
        &self,
        uid: Option<&UserId>,
        campaign_id: CampaignId,
        window_hours: u32,
        max_allowed: i64,
    ) -> Result<CapOutcome> {
        self.counters
            .record_user_show(
                uid,
                campaign_id,
                ShowCap {
                    window_hours,
                    max_allowed,
                },
            )
            .await
    }

    pub async fn record_user_level_1_show(
        &self,
        uid: Option<&UserId>,
        level_1_id: CategoryId,
        window_hours: u32,
        max_allowed: i64,
    ) -> Result<CapOutcome> {
        self.counters
            .record_user_level_1_show(
                uid,
                level_1_id,
                ShowCap {
                    window_hours,
                    max_allowed,
                },
            )
            .await
    }

    pub async fn record_user_level_2_watch_time(
        &self,
        uid: Option<&UserId>,
        level_2_id: CategoryId,
        watch_time_secs: u64,
        window_hours: u32,
        max_allowed_secs: u64,
    ) -> Result<CapOutcome> {
        self.counters
            .record_user_level_2_watch_time(
                uid,
                level_2_id,
                watch_time_secs,
                WatchTimeCap {
                    window_hours,
                    max_allowed_secs,
                },
            )
            .await
    }

    /// Apply every cap of a served campaign. Rules run in order and stop at
    /// the first store error; rules already applied stay applied.
    pub async fn record_impression(
        &self,
        uid: Option<&UserId>,
        served: &ServedCampaign,
    ) -> Result<ImpressionOutcome> {
        let global = self
            .counters
            .record_global_show(served.campaign_id, served.global_cap)
            .await?;

        let user = match served.user_cap {
            Some(cap) => Some(
                self.counters
                    .record_user_show(uid, served.campaign_id, cap)
                    .await?,
            ),
            None => None,
        };

        let level_1 = match served.level_1 {
            Some(Level1Show { level_1_id, cap }) => Some(
                self.counters
                    .record_user_level_1_show(uid, level_1_id, cap)
                    .await?,
            ),
            None => None,
        };

        let level_2 = match served.level_2 {
            Some(Level2Watch {
                level_2_id,
                watch_time_secs,
                cap,
            }) => Some(
                self.counters
                    .record_user_level_2_watch_time(uid, level_2_id, watch_time_secs, cap)
                    .await?,
            ),
            None => None,
        };

        Ok(ImpressionOutcome {
            global,
            user,
            level_1,
            level_2,
        })
    }

    pub async fn campaign_counter_timestamp(&self, campaign_id: CampaignId) -> Result<Option<i64>> {
        self.counters.campaign_counter_timestamp(campaign_id).await
    }
}
