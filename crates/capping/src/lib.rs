//! Frequency capping for ad serving.
//!
//! Answers "is this campaign, user or category currently capped?" and
//! records "this was just shown", using time-windowed counters, expiring
//! exclusion lists and no-ads flags kept in a shared keyed store.
//!
//! ## Layers
//!
//! - **store** - [`KeyedStore`] backends (Redis, in-memory)
//! - **gateway** - namespaced, typed access over one store
//! - **exclusions** / **no_ads** - what is capped right now
//! - **counters** + **policy** - counting rules and what happens on overflow
//! - **engine** - [`CappingEngine`], the surface callers use
//!
//! ## Usage
//!
//! ```ignore
//! let store = Arc::new(RedisKeyedStore::new(redis::Client::open(url)?));
//! let engine = CappingEngine::new(store, Prefixes::default(), Arc::new(SystemClock))?;
//!
//! let eligibility = engine.eligibility(uid.as_ref(), Some(level_1), Some(level_2)).await?;
//! engine.record_impression(uid.as_ref(), &served).await?;
//! ```

mod clock;
mod counters;
mod engine;
mod exclusions;
mod gateway;
mod ids;
mod keys;
mod no_ads;
mod policy;
pub mod score;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counters::Counters;
pub use engine::{
    CappingEngine, Eligibility, ImpressionOutcome, Level1Show, Level2Watch, ServedCampaign,
};
pub use exclusions::ExclusionLists;
pub use gateway::CacheGateway;
pub use ids::{CampaignId, CategoryId, UserId};
pub use keys::{CacheKey, Namespace, Prefixes};
pub use no_ads::{Level, NoAdsFlags};
pub use policy::{CapOutcome, GlobalShowCap, ShowCap, WatchTimeCap};
pub use score::Expiry;
pub use store::{Increment, KeyTtl, KeyedStore, MemoryKeyedStore, RedisKeyedStore};

#[cfg(any(test, feature = "mock"))]
pub use store::MockKeyedStore;
