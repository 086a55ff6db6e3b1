//! Pre-selection eligibility check.
//!
//! Called on every ad request before a campaign is picked. Tells the
//! selector whether to serve anything at all for the viewer's categories,
//! and which campaign ids to leave out if it does.
//!
//! ## Store failures
//!
//! An unreadable store is not the same as "nothing capped". The answer then
//! comes from `read_failure_policy` and is marked `degraded`:
//!
//! - **closed** (default) - `no_ads = true`
//! - **open** - nothing blocked, no exclusions

use axum::{
    Json, Router, debug_handler,
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
};
use capping::{CategoryId, Eligibility};
use garde::Validate;
use shared::api::{EligibilityQuery, EligibilityResponse};

use crate::{config::ReadFailurePolicy, error::AppError, handlers::viewer, state::AppState};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_eligibility))
}

fn from_engine(eligibility: Eligibility) -> EligibilityResponse {
    EligibilityResponse {
        no_ads: eligibility.no_ads(),
        level_1_blocked: eligibility.level_1_blocked,
        level_2_blocked: eligibility.level_2_blocked,
        excluded_campaigns: eligibility
            .excluded_campaigns
            .into_iter()
            .map(|id| id.0)
            .collect(),
        degraded: false,
    }
}

fn from_policy(policy: ReadFailurePolicy) -> EligibilityResponse {
    let no_ads = policy == ReadFailurePolicy::Closed;
    EligibilityResponse {
        no_ads,
        level_1_blocked: false,
        level_2_blocked: false,
        excluded_campaigns: Vec::new(),
        degraded: true,
    }
}

#[debug_handler]
async fn get_eligibility(
    State(state): State<AppState>,
    Query(query): Query<EligibilityQuery>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let uid = viewer(query.uid);
    let result = state
        .engine
        .eligibility(
            uid.as_ref(),
            query.level_1_id.map(CategoryId),
            query.level_2_id.map(CategoryId),
        )
        .await;

    let response = match result {
        Ok(eligibility) => from_engine(eligibility),
        Err(err) => {
            let policy = state.config.read_failure_policy;
            tracing::warn!(
                error = ?err,
                ?policy,
                "eligibility read failed, answering from policy"
            );
            from_policy(policy)
        }
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TEST_NOW, TestStateBuilder, failing_store, response_json};
    use axum::http::StatusCode;
    use capping::{CampaignId, Expiry, UserId};

    fn query(
        uid: Option<&str>,
        level_1_id: Option<i64>,
        level_2_id: Option<i64>,
    ) -> EligibilityQuery {
        EligibilityQuery {
            uid: uid.map(String::from),
            level_1_id,
            level_2_id,
        }
    }

    #[tokio::test]
    async fn fresh_viewer_is_eligible_for_everything() {
        let state = TestStateBuilder::new().build();

        let response = get_eligibility(State(state), Query(query(Some("u"), Some(1), Some(2))))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["no_ads"], false);
        assert_eq!(body["degraded"], false);
        assert_eq!(body["excluded_campaigns"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn lists_global_and_user_exclusions() {
        let state = TestStateBuilder::new().build();
        let uid = UserId::new("u");
        let exclusions = state.engine.exclusions();
        exclusions
            .exclude_globally(CampaignId(10), Expiry::At(TEST_NOW + 60))
            .await
            .unwrap();
        exclusions
            .exclude_for_user(Some(&uid), CampaignId(20), Expiry::At(TEST_NOW + 60))
            .await
            .unwrap();

        let response = get_eligibility(State(state), Query(query(Some("u"), None, None)))
            .await
            .into_response();

        let body = response_json(response).await;
        let mut excluded: Vec<i64> =
            serde_json::from_value(body["excluded_campaigns"].clone()).unwrap();
        excluded.sort();
        assert_eq!(excluded, vec![10, 20]);
    }

    #[tokio::test]
    async fn blocked_level_1_means_no_ads() {
        let state = TestStateBuilder::new().build();
        state
            .engine
            .flags()
            .block_level_1(Some(&UserId::new("u")), CategoryId(1), 1)
            .await
            .unwrap();

        let response = get_eligibility(State(state), Query(query(Some("u"), Some(1), Some(2))))
            .await
            .into_response();

        let body = response_json(response).await;
        assert_eq!(body["no_ads"], true);
        assert_eq!(body["level_1_blocked"], true);
        assert_eq!(body["level_2_blocked"], false);
    }

    #[tokio::test]
    async fn empty_uid_is_treated_as_anonymous() {
        let state = TestStateBuilder::new().build();
        state
            .engine
            .flags()
            .block_level_1(Some(&UserId::new("")), CategoryId(1), 1)
            .await
            .unwrap();

        let response = get_eligibility(State(state), Query(query(Some(""), Some(1), None)))
            .await
            .into_response();

        assert_eq!(response_json(response).await["no_ads"], false);
    }

    #[tokio::test]
    async fn store_failure_fails_closed_by_default() {
        let state = TestStateBuilder::new().with_store(failing_store()).build();

        let response = get_eligibility(State(state), Query(query(Some("u"), Some(1), None)))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response_json(response).await;
        assert_eq!(body["no_ads"], true);
        assert_eq!(body["degraded"], true);
    }

    #[tokio::test]
    async fn store_failure_fails_open_when_configured() {
        let state = TestStateBuilder::new()
            .with_store(failing_store())
            .with_read_failure_policy(ReadFailurePolicy::Open)
            .build();

        let response = get_eligibility(State(state), Query(query(Some("u"), Some(1), None)))
            .await
            .into_response();

        let body = response_json(response).await;
        assert_eq!(body["no_ads"], false);
        assert_eq!(body["degraded"], true);
        assert_eq!(body["excluded_campaigns"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn oversized_uid_is_rejected() {
        let state = TestStateBuilder::new().build();
        let uid = "u".repeat(shared::api::MAX_UID_LEN + 1);

        let result = get_eligibility(State(state), Query(query(Some(&uid), None, None))).await;

        let Err(err) = result else {
            panic!("Expected validation error");
        };
        assert!(matches!(err, AppError::Validation(_)));
    }
}
