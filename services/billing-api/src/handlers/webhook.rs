//! Stripe webhook handler

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use std::time::Instant;

use splitfee_billing_core::BillingError;

use crate::error::ApiError;
use crate::handlers::shared::record_op_duration;
use crate::state::AppState;

/// POST /webhooks/stripe
///
/// Verifies the signature, then applies the event. Redeliveries, stale
/// events and event types the engine ignores are acknowledged so Stripe
/// stops retrying them; everything else maps through [`ApiError`] and is
/// retried by Stripe.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let start = Instant::now();

    let Some(sig_header) = headers.get("stripe-signature") else {
        tracing::warn!("Missing Stripe-Signature header");
        return Err(ApiError::BadRequest("Missing Stripe-Signature header".to_string()));
    };

    let Ok(signature) = sig_header.to_str() else {
        tracing::warn!("Invalid Stripe-Signature header encoding");
        return Err(ApiError::BadRequest("Invalid Stripe-Signature header".to_string()));
    };

    let event = match state.webhooks.verify_and_parse(&body, signature) {
        Ok(Some(event)) => event,
        Ok(None) => {
            count("ignored");
            return Ok(StatusCode::OK);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Webhook rejected");
            count("rejected");
            return Err(e.into());
        }
    };

    let result = state.billing.subscriptions().apply_event(&event).await;
    record_op_duration("process_webhook", start, result.is_ok());

    match result {
        Ok(outcome) => {
            tracing::info!(event_id = %event.id, outcome = outcome.as_str(), "Webhook processed");
            count(outcome.as_str());
            Ok(StatusCode::OK)
        }
        Err(BillingError::StaleEvent(event_id)) => {
            tracing::info!(event_id = %event_id, "Stale webhook acknowledged");
            count("stale");
            Ok(StatusCode::OK)
        }
        Err(e) => {
            tracing::error!(event_id = %event.id, error = %e, "Webhook processing failed");
            count("error");
            Err(e.into())
        }
    }
}

fn count(status: &'static str) {
    metrics::counter!("billing_webhooks_processed_total", "status" => status).increment(1);
}
