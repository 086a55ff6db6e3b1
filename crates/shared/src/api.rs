//! Request/response types for the capping sidecar, shared with its clients.

use garde::Validate;
use serde::{Deserialize, Serialize};

/// Longest accepted viewer identity.
pub const MAX_UID_LEN: usize = 256;

/// Query for the pre-selection eligibility check.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct EligibilityQuery {
    /// Viewer identity. Missing or empty means anonymous.
    #[garde(length(max = MAX_UID_LEN))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_1_id: Option<i64>,
    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_2_id: Option<i64>,
}

/// Everything the ad selector needs before picking a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResponse {
    /// Serve nothing at all.
    pub no_ads: bool,
    pub level_1_blocked: bool,
    pub level_2_blocked: bool,
    /// Campaign ids to leave out of the candidate list. May repeat.
    pub excluded_campaigns: Vec<i64>,
    /// The store could not be read and this answer comes from the
    /// configured read-failure policy.
    pub degraded: bool,
}

/// Show-count limit over a window of hours.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct ShowLimit {
    #[garde(range(min = 1))]
    pub window_hours: u32,
    #[garde(range(min = 1))]
    pub max_allowed: i64,
}

/// Accumulated watch-time limit, in seconds, over a window of hours.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Validate)]
pub struct WatchTimeLimit {
    #[garde(range(min = 1))]
    pub window_hours: u32,
    #[garde(range(min = 1))]
    pub max_allowed_seconds: u64,
}

/// Caps configured on a campaign.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CampaignLimits {
    /// Shows allowed across all viewers per window.
    #[garde(range(min = 1))]
    pub total_max_allowed: i64,
    /// Global window in days. Missing means the count never resets.
    #[garde(range(min = 1))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_window_days: Option<u32>,
    /// Per-viewer limit for this campaign.
    #[garde(dive)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ShowLimit>,
    /// Per-viewer limit for the level-1 category the campaign ran in.
    #[garde(dive)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_1: Option<ShowLimit>,
    /// Per-viewer watch-time limit for the level-2 category.
    #[garde(dive)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_2: Option<WatchTimeLimit>,
}

/// Record that a campaign was served to a viewer.
///
/// The level-1 rule runs only when both `level_1_id` and `limits.level_1`
/// are present; the level-2 rule needs `level_2_id`, `watch_time_seconds`
/// and `limits.level_2`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordImpressionPayload {
    #[garde(length(max = MAX_UID_LEN))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[garde(skip)]
    pub campaign_id: i64,
    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_1_id: Option<i64>,
    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_2_id: Option<i64>,
    #[garde(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_time_seconds: Option<u64>,
    #[garde(dive)]
    pub limits: CampaignLimits,
}

/// What one counting rule did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RuleResult {
    Skipped,
    Counted { count: i64, capped: bool },
}

/// Result of recording an impression. Rules that do not apply are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordImpressionResponse {
    pub campaign_id: i64,
    pub global: RuleResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<RuleResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_1: Option<RuleResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_2: Option<RuleResult>,
}

/// Start of a campaign's current global counting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterTimestampResponse {
    pub campaign_id: i64,
    /// Epoch seconds, or null when no window is open.
    pub timestamp: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> CampaignLimits {
        CampaignLimits {
            total_max_allowed: 1000,
            total_window_days: Some(1),
            user: Some(ShowLimit {
                window_hours: 1,
                max_allowed: 3,
            }),
            level_1: None,
            level_2: Some(WatchTimeLimit {
                window_hours: 2,
                max_allowed_seconds: 600,
            }),
        }
    }

    fn payload() -> RecordImpressionPayload {
        RecordImpressionPayload {
            uid: Some("viewer-1".into()),
            campaign_id: 5,
            level_1_id: None,
            level_2_id: Some(9),
            watch_time_seconds: Some(30),
            limits: limits(),
        }
    }

    mod impression_validation {
        use super::*;

        #[test]
        fn accepts_valid_payload() {
            assert!(payload().validate().is_ok());
        }

        #[test]
        fn accepts_anonymous_viewer() {
            let payload = RecordImpressionPayload {
                uid: None,
                ..payload()
            };

            assert!(payload.validate().is_ok());
        }

        #[test]
        fn rejects_zero_total_limit() {
            let mut payload = payload();
            payload.limits.total_max_allowed = 0;

            assert!(payload.validate().is_err());
        }

        #[test]
        fn rejects_zero_day_window() {
            let mut payload = payload();
            payload.limits.total_window_days = Some(0);

            assert!(payload.validate().is_err());
        }

        #[test]
        fn rejects_zero_hour_window_in_nested_limit() {
            let mut payload = payload();
            payload.limits.user = Some(ShowLimit {
                window_hours: 0,
                max_allowed: 3,
            });

            assert!(payload.validate().is_err());
        }

        #[test]
        fn rejects_zero_watch_time_limit() {
            let mut payload = payload();
            payload.limits.level_2 = Some(WatchTimeLimit {
                window_hours: 1,
                max_allowed_seconds: 0,
            });

            assert!(payload.validate().is_err());
        }

        #[test]
        fn rejects_oversized_uid() {
            let payload = RecordImpressionPayload {
                uid: Some("u".repeat(MAX_UID_LEN + 1)),
                ..payload()
            };

            assert!(payload.validate().is_err());
        }
    }

    mod wire_format {
        use super::*;

        #[test]
        fn impression_payload_defaults_optional_fields() {
            let json = r#"{"campaign_id": 3, "limits": {"total_max_allowed": 10}}"#;
            let payload: RecordImpressionPayload = serde_json::from_str(json).unwrap();

            assert_eq!(payload.uid, None);
            assert_eq!(payload.limits.total_window_days, None);
            assert!(payload.limits.user.is_none());
            assert!(payload.validate().is_ok());
        }

        #[test]
        fn rule_result_is_tagged() {
            let json = serde_json::to_value(RuleResult::Counted {
                count: 2,
                capped: false,
            })
            .unwrap();

            assert_eq!(json["result"], "counted");
            assert_eq!(json["count"], 2);
            assert_eq!(
                serde_json::to_value(RuleResult::Skipped).unwrap()["result"],
                "skipped"
            );
        }

        #[test]
        fn missing_timestamp_serializes_as_null() {
            let json = serde_json::to_value(CounterTimestampResponse {
                campaign_id: 1,
                timestamp: None,
            })
            .unwrap();

            assert!(json["timestamp"].is_null());
        }
    }
}
