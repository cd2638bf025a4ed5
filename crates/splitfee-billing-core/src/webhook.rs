//! Stripe webhook handling
//!
//! Verifies the `Stripe-Signature` header and turns the events the engine
//! cares about into [`BillingEvent`]s.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, error, info, instrument, warn};

use splitfee_types::{CustomerId, PlanId, PriceId, SubscriptionStatus, UserId};

use crate::error::BillingError;
use crate::events::{BillingEvent, BillingEventKind, PlanRef};
use crate::stripe::{from_unix, StripeCheckoutSession, StripeSubscription};

/// Webhook event types we handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    /// Checkout session completed
    CheckoutSessionCompleted,
    /// Customer subscription created
    CustomerSubscriptionCreated,
    /// Customer subscription updated
    CustomerSubscriptionUpdated,
    /// Customer subscription deleted
    CustomerSubscriptionDeleted,
    /// Anything else
    Unknown(String),
}

impl From<&str> for WebhookEventType {
    fn from(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "customer.subscription.created" => Self::CustomerSubscriptionCreated,
            "customer.subscription.updated" => Self::CustomerSubscriptionUpdated,
            "customer.subscription.deleted" => Self::CustomerSubscriptionDeleted,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// Webhook handler for processing Stripe events
#[derive(Clone)]
pub struct WebhookHandler {
    webhook_secret: String,
    tolerance: Duration,
}

impl WebhookHandler {
    /// Create a new webhook handler
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            tolerance: Duration::from_secs(300),
        }
    }

    /// Set the accepted clock skew
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: Duration) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Verify and parse a webhook payload.
    ///
    /// Returns `None` for event types the engine does not act on.
    #[instrument(skip(self, payload, signature))]
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<Option<BillingEvent>, BillingError> {
        self.verify_signature(payload, signature)?;

        let raw_event: RawStripeEvent = serde_json::from_slice(payload)
            .map_err(|e| BillingError::WebhookError(e.to_string()))?;

        debug!(event_id = %raw_event.id, event_type = %raw_event.event_type, "Parsed webhook event");

        let event_type = WebhookEventType::from(raw_event.event_type.as_str());
        let Some(kind) = Self::parse_event_data(&event_type, raw_event.data.object)? else {
            info!(event_type = %raw_event.event_type, "Ignoring webhook event type");
            return Ok(None);
        };

        let occurred_at =
            from_unix(raw_event.created).map_err(|e| BillingError::WebhookError(e.to_string()))?;

        Ok(Some(BillingEvent {
            id: raw_event.id,
            occurred_at,
            kind,
        }))
    }

    /// Verify Stripe webhook signature
    fn verify_signature(&self, payload: &[u8], signature: &str) -> Result<(), BillingError> {
        // Parse signature header: t=timestamp,v1=signature[,v1=signature]
        let mut timestamp: Option<&str> = None;
        let mut candidates: Vec<&str> = Vec::new();

        for part in signature.split(',') {
            if let Some((key, value)) = part.trim().split_once('=') {
                match key {
                    "t" => timestamp = Some(value),
                    "v1" => candidates.push(value),
                    _ => {}
                }
            }
        }

        let timestamp = timestamp.ok_or_else(|| {
            warn!("Missing timestamp in webhook signature");
            BillingError::WebhookError("Missing timestamp".to_string())
        })?;

        if candidates.is_empty() {
            warn!("Missing v1 signature in webhook signature");
            return Err(BillingError::WebhookError("Missing signature".to_string()));
        }

        let expected = self.sign(timestamp, payload)?;

        // Secrets roll over with two v1 entries side by side
        if !candidates
            .iter()
            .any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes()))
        {
            error!("Webhook signature verification failed");
            return Err(BillingError::WebhookError(
                "Signature verification failed".to_string(),
            ));
        }

        let ts: i64 = timestamp
            .parse()
            .map_err(|_| BillingError::WebhookError("Invalid timestamp format".to_string()))?;
        let now = Utc::now().timestamp();
        let tolerance = i64::try_from(self.tolerance.as_secs()).unwrap_or(i64::MAX);
        if (now - ts).abs() > tolerance {
            warn!(timestamp = ts, now = now, "Webhook timestamp outside tolerance");
            return Err(BillingError::WebhookError("Timestamp too old".to_string()));
        }

        Ok(())
    }

    /// Hex HMAC-SHA256 of `timestamp.payload`
    fn sign(&self, timestamp: &str, payload: &[u8]) -> Result<String, BillingError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.webhook_secret.as_bytes())
            .map_err(|_| BillingError::Internal("HMAC error".to_string()))?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Build a `Stripe-Signature` header for a payload
    pub fn signature_header(&self, timestamp: i64, payload: &[u8]) -> Result<String, BillingError> {
        let sig = self.sign(&timestamp.to_string(), payload)?;
        Ok(format!("t={timestamp},v1={sig}"))
    }

    /// Parse event data based on type
    fn parse_event_data(
        event_type: &WebhookEventType,
        object: serde_json::Value,
    ) -> Result<Option<BillingEventKind>, BillingError> {
        match event_type {
            WebhookEventType::CheckoutSessionCompleted => {
                let session: StripeCheckoutSession = serde_json::from_value(object)
                    .map_err(|e| BillingError::WebhookError(e.to_string()))?;
                checkout_completed(session).map(Some)
            }
            WebhookEventType::CustomerSubscriptionCreated
            | WebhookEventType::CustomerSubscriptionUpdated
            | WebhookEventType::CustomerSubscriptionDeleted => {
                let sub: StripeSubscription = serde_json::from_value(object)
                    .map_err(|e| BillingError::WebhookError(e.to_string()))?;
                status_changed(sub).map(Some)
            }
            WebhookEventType::Unknown(_) => Ok(None),
        }
    }
}

fn checkout_completed(session: StripeCheckoutSession) -> Result<BillingEventKind, BillingError> {
    let user_id = session
        .client_reference_id
        .as_deref()
        .or_else(|| session.metadata.get("user_id").map(String::as_str))
        .ok_or_else(|| {
            BillingError::WebhookError(format!("checkout session {} has no user", session.id))
        })
        .and_then(|raw| {
            UserId::parse(raw)
                .map_err(|_| BillingError::WebhookError(format!("invalid user id: {raw}")))
        })?;

    let plan_id = session
        .metadata
        .get("plan_id")
        .ok_or_else(|| {
            BillingError::WebhookError(format!("checkout session {} has no plan", session.id))
        })
        .and_then(|raw| {
            PlanId::parse(raw)
                .map_err(|_| BillingError::WebhookError(format!("invalid plan id: {raw}")))
        })?;

    Ok(BillingEventKind::CheckoutCompleted {
        user_id,
        plan: PlanRef::Id(plan_id),
        stripe_subscription_id: session.subscription,
        stripe_customer_id: session.customer.map(CustomerId),
    })
}

fn status_changed(sub: StripeSubscription) -> Result<BillingEventKind, BillingError> {
    let status: SubscriptionStatus = sub
        .status
        .parse()
        .map_err(|e: splitfee_types::StatusParseError| BillingError::WebhookError(e.to_string()))?;

    let timestamp = |ts: Option<i64>| {
        ts.map(from_unix)
            .transpose()
            .map_err(|e| BillingError::WebhookError(e.to_string()))
    };

    let period_start = timestamp(sub.current_period_start)?;
    let period_end = timestamp(sub.current_period_end)?;
    let cancel_at = match timestamp(sub.cancel_at)? {
        Some(at) => Some(at),
        None if sub.cancel_at_period_end => period_end,
        None => None,
    };

    let user_id = match sub.metadata.get("user_id") {
        Some(raw) => Some(
            UserId::parse(raw)
                .map_err(|_| BillingError::WebhookError(format!("invalid user id: {raw}")))?,
        ),
        None => None,
    };

    let plan = sub
        .items
        .as_ref()
        .and_then(|items| items.data.first())
        .map(|item| PlanRef::Price(PriceId(item.price.id.clone())));

    Ok(BillingEventKind::StatusChanged {
        stripe_subscription_id: sub.id,
        stripe_customer_id: Some(CustomerId(sub.customer)),
        user_id,
        status,
        plan,
        period_start,
        period_end,
        cancel_at,
    })
}

/// Constant-time comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

// Raw Stripe event for parsing
#[derive(Debug, Deserialize)]
struct RawStripeEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
    created: i64,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}
