//! Campaign counter metadata.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use capping::CampaignId;
use shared::api::CounterTimestampResponse;

use crate::{error::AppError, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/counter-timestamp", get(counter_timestamp))
}

/// When the campaign's latest global window opened. `null` only when the
/// campaign has never been shown; the stamp has no expiry and outlives the
/// window it marks.
async fn counter_timestamp(
    State(state): State<AppState>,
    Path(campaign_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let timestamp = state
        .engine
        .campaign_counter_timestamp(CampaignId(campaign_id))
        .await?;

    Ok(Json(CounterTimestampResponse {
        campaign_id,
        timestamp,
    }))
}
