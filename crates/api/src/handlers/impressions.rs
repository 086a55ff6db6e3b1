//! Impression recording.
//!
//! The ad server posts here once a campaign was actually shown. Each cap the
//! campaign carries is counted; a counter that reaches its limit excludes
//! the campaign (globally or for the viewer) or blocks the category, until
//! that counter's window ends.

use axum::{Json, Router, debug_handler, extract::State, response::IntoResponse, routing::post};
use capping::{
    CampaignId, CapOutcome, CategoryId, GlobalShowCap, Level1Show, Level2Watch, ServedCampaign,
    ShowCap, WatchTimeCap,
};
use garde::Validate;
use shared::api::{RecordImpressionPayload, RecordImpressionResponse, RuleResult};

use crate::{error::AppError, handlers::viewer, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(record_impression))
}

fn served_campaign(payload: &RecordImpressionPayload) -> ServedCampaign {
    let limits = &payload.limits;

    let level_1 = match (payload.level_1_id, limits.level_1) {
        (Some(id), Some(limit)) => Some(Level1Show {
            level_1_id: CategoryId(id),
            cap: ShowCap {
                window_hours: limit.window_hours,
                max_allowed: limit.max_allowed,
            },
        }),
        _ => None,
    };

    let level_2 = match (payload.level_2_id, payload.watch_time_seconds, limits.level_2) {
        (Some(id), Some(watched), Some(limit)) => Some(Level2Watch {
            level_2_id: CategoryId(id),
            watch_time_secs: watched,
            cap: WatchTimeCap {
                window_hours: limit.window_hours,
                max_allowed_secs: limit.max_allowed_seconds,
            },
        }),
        _ => None,
    };

    ServedCampaign {
        campaign_id: CampaignId(payload.campaign_id),
        global_cap: GlobalShowCap {
            window_days: limits.total_window_days,
            max_allowed: limits.total_max_allowed,
        },
        user_cap: limits.user.map(|limit| ShowCap {
            window_hours: limit.window_hours,
            max_allowed: limit.max_allowed,
        }),
        level_1,
        level_2,
    }
}

fn rule_result(outcome: CapOutcome) -> RuleResult {
    match outcome {
        CapOutcome::Skipped => RuleResult::Skipped,
        CapOutcome::Counted { count, capped } => RuleResult::Counted { count, capped },
    }
}

#[debug_handler]
async fn record_impression(
    State(state): State<AppState>,
    Json(payload): Json<RecordImpressionPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let served = served_campaign(&payload);
    let uid = viewer(payload.uid);

    let outcome = state
        .engine
        .record_impression(uid.as_ref(), &served)
        .await
        .map_err(AppError::store_unavailable)?;

    tracing::info!(
        campaign_id = %served.campaign_id,
        anonymous = uid.is_none(),
        global_capped = outcome.global.is_capped(),
        "impression recorded"
    );

    Ok(Json(RecordImpressionResponse {
        campaign_id: payload.campaign_id,
        global: rule_result(outcome.global),
        user: outcome.user.map(rule_result),
        level_1: outcome.level_1.map(rule_result),
        level_2: outcome.level_2.map(rule_result),
    }))
}
