//! Billing page handlers

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use splitfee_billing_core::{rate_table, BillingView, PlanChangeResult, RateRow};
use splitfee_types::{CheckoutSession, PlanId, Subscription};

use crate::error::{ApiError, ApiResult};
use crate::handlers::shared::{record_op_duration, user_id_from_headers};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChangePlanRequest {
    pub plan_id: String,
}

/// Outcome of a plan change, tagged by `status`
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChangePlanResponse {
    /// Applied immediately
    Confirmed { subscription: Subscription },
    /// Send the user to the processor's checkout page
    Redirect { checkout: CheckoutSession },
    /// Already on that plan
    Unchanged { subscription: Subscription },
}

impl From<PlanChangeResult> for ChangePlanResponse {
    fn from(result: PlanChangeResult) -> Self {
        match result {
            PlanChangeResult::Confirmed(subscription) => Self::Confirmed { subscription },
            PlanChangeResult::Redirect(checkout) => Self::Redirect { checkout },
            PlanChangeResult::Unchanged(subscription) => Self::Unchanged { subscription },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    /// Explicit end; omitted means end of the current period
    pub cancel_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/billing
pub async fn get_billing(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<BillingView>> {
    let start = Instant::now();
    let user_id = user_id_from_headers(&headers)?;

    let result = state.billing.get_billing_view(&user_id).await;
    record_op_duration("get_billing_view", start, result.is_ok());

    let view = result?;
    for section in &view.degraded {
        let section = format!("{section:?}").to_lowercase();
        metrics::counter!("billing_view_degraded_total", "section" => section).increment(1);
    }

    Ok(Json(view))
}

/// POST /api/v1/billing/plan
pub async fn change_plan(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ChangePlanRequest>,
) -> ApiResult<Json<ChangePlanResponse>> {
    let start = Instant::now();
    let user_id = user_id_from_headers(&headers)?;

    let plan_id = PlanId::parse(req.plan_id.trim())
        .map_err(|_| ApiError::BadRequest(format!("Invalid plan_id: {}", req.plan_id)))?;

    let result = state.billing.change_plan(&user_id, plan_id).await;
    record_op_duration("change_plan", start, result.is_ok());

    let response = ChangePlanResponse::from(result?);
    if matches!(response, ChangePlanResponse::Redirect { .. }) {
        metrics::counter!("billing_checkouts_created_total").increment(1);
    }

    tracing::info!(user_id = %user_id, plan_id = %plan_id, "Plan change handled");
    Ok(Json(response))
}

/// POST /api/v1/billing/cancel
pub async fn cancel_subscription(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Subscription>> {
    let start = Instant::now();
    let user_id = user_id_from_headers(&headers)?;
    let req = parse_cancel_request(&body)?;

    if req.cancel_at.is_some_and(|at| at <= Utc::now()) {
        return Err(ApiError::BadRequest("cancel_at must be in the future".to_string()));
    }

    let result = state
        .billing
        .subscriptions()
        .schedule_cancellation(&user_id, req.cancel_at)
        .await;
    record_op_duration("schedule_cancellation", start, result.is_ok());

    let subscription = result?;
    metrics::counter!("billing_subscriptions_canceled_total").increment(1);

    Ok(Json(subscription))
}

/// An empty body cancels at period end
fn parse_cancel_request(body: &[u8]) -> ApiResult<CancelRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(CancelRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid body: {e}")))
}

/// GET /api/v1/billing/rates
pub async fn get_rates() -> Json<Vec<RateRow>> {
    Json(rate_table())
}
