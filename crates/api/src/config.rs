use capping::Prefixes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Redis holding counters and lists. Unset runs on an in-process store,
    /// which only caps within this one process.
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_counters_prefix")]
    pub counters_prefix: String,
    #[serde(default = "default_exclude_lists_prefix")]
    pub exclude_lists_prefix: String,
    #[serde(default = "default_no_ads_prefix")]
    pub no_ads_prefix: String,
    /// Answer given by /eligibility when the store cannot be read.
    #[serde(default)]
    pub read_failure_policy: ReadFailurePolicy,
    /// Set to "production" for JSON logging, anything else for human-readable.
    #[serde(default)]
    pub env: String,
    /// Sentry DSN for error tracking
    #[serde(default)]
    pub sentry_dsn: Option<String>,
}

/// What to tell the ad selector when caps cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadFailurePolicy {
    /// Serve no ads.
    #[default]
    Closed,
    /// Serve as if nothing were capped.
    Open,
}

fn default_counters_prefix() -> String {
    Prefixes::default().counters
}

fn default_exclude_lists_prefix() -> String {
    Prefixes::default().exclude_lists
}

fn default_no_ads_prefix() -> String {
    Prefixes::default().no_ads
}

impl Config {
    pub fn is_production(&self) -> bool {
        self.env == "production"
    }

    pub fn prefixes(&self) -> Prefixes {
        Prefixes {
            counters: self.counters_prefix.clone(),
            exclude_lists: self.exclude_lists_prefix.clone(),
            no_ads: self.no_ads_prefix.clone(),
        }
    }
}
