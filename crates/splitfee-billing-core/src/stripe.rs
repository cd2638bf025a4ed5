//! Stripe payment provider implementation

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use splitfee_types::{CustomerId, InvoiceStatus};

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::provider::{CheckoutRequest, PaymentProvider, SubscriptionPatch};
use crate::{CheckoutSession, Invoice};

/// Stripe payment provider
#[derive(Clone)]
pub struct StripeProvider {
    client: Client,
    config: BillingConfig,
}

impl StripeProvider {
    /// Create a new Stripe provider
    pub fn new(config: BillingConfig) -> Self {
        let client = Client::new();
        Self { client, config }
    }

    /// Make authenticated request to Stripe
    ///
    /// Parameters travel as a query string on GET and form-encoded otherwise.
    async fn stripe_request<T: for<'de> Deserialize<'de>>(
        &self,
        method: Method,
        endpoint: &str,
        params: Option<&[(&str, &str)]>,
    ) -> Result<T, BillingError> {
        let url = format!("{}{endpoint}", self.config.stripe_api_base);
        let is_get = method == Method::GET;

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.config.stripe_secret_key, Option::<&str>::None);

        if let Some(params) = params {
            request = if is_get {
                request.query(params)
            } else {
                request.form(params)
            };
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Stripe API request failed");
            BillingError::ProviderError(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Stripe API error");
            return Err(BillingError::ProviderError(format!(
                "Stripe API error: {status}"
            )));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Stripe response");
            BillingError::ProviderError(format!("unreadable Stripe response: {e}"))
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    #[instrument(skip(self, request), fields(user_id = %request.user_id, plan_id = %request.plan_id))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        debug!(price_id = %request.price_id, "Creating checkout session");

        let user_id = request.user_id.to_string();
        let plan_id = request.plan_id.to_string();

        let mut form: Vec<(&str, &str)> = vec![
            ("mode", "subscription"),
            ("success_url", request.success_url.as_str()),
            ("cancel_url", request.cancel_url.as_str()),
            ("line_items[0][price]", request.price_id.0.as_str()),
            ("line_items[0][quantity]", "1"),
            ("client_reference_id", user_id.as_str()),
            ("metadata[user_id]", user_id.as_str()),
            ("metadata[plan_id]", plan_id.as_str()),
            ("subscription_data[metadata][user_id]", user_id.as_str()),
            ("subscription_data[metadata][plan_id]", plan_id.as_str()),
        ];
        if let Some(customer_id) = &request.customer_id {
            form.push(("customer", customer_id.0.as_str()));
        }

        let session: StripeCheckoutSession = self
            .stripe_request(Method::POST, "/checkout/sessions", Some(&form))
            .await?;

        let url = session.url.ok_or_else(|| {
            BillingError::ProviderError(format!("checkout session {} has no URL", session.id))
        })?;

        Ok(CheckoutSession {
            session_id: session.id,
            url,
        })
    }

    #[instrument(skip(self, patch))]
    async fn update_subscription(
        &self,
        subscription_id: &str,
        patch: &SubscriptionPatch,
    ) -> Result<(), BillingError> {
        debug!(?patch, "Updating subscription");

        if patch.is_empty() {
            return Ok(());
        }

        let cancel_at_period_end = patch.cancel_at_period_end.map(|flag| flag.to_string());
        let cancel_at = patch.cancel_at.map(|at| at.timestamp().to_string());

        let mut form: Vec<(&str, &str)> = Vec::new();
        if let Some(flag) = &cancel_at_period_end {
            form.push(("cancel_at_period_end", flag.as_str()));
        }
        if let Some(at) = &cancel_at {
            form.push(("cancel_at", at.as_str()));
        }

        let _: StripeSubscription = self
            .stripe_request(
                Method::POST,
                &format!("/subscriptions/{subscription_id}"),
                Some(&form),
            )
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_invoices(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Invoice>, BillingError> {
        debug!("Listing invoices");

        let limit = limit.to_string();
        let query = [("customer", customer_id.0.as_str()), ("limit", limit.as_str())];

        let list: StripeList<StripeInvoice> = self
            .stripe_request(Method::GET, "/invoices", Some(&query))
            .await?;

        list.data.into_iter().map(Invoice::try_from).collect()
    }
}

/// Convert a Stripe Unix timestamp
pub(crate) fn from_unix(ts: i64) -> Result<DateTime<Utc>, BillingError> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .ok_or_else(|| BillingError::ProviderError(format!("timestamp out of range: {ts}")))
}

impl TryFrom<StripeInvoice> for Invoice {
    type Error = BillingError;

    fn try_from(inv: StripeInvoice) -> Result<Self, Self::Error> {
        Ok(Self {
            status: inv
                .status
                .as_deref()
                .map_or(InvoiceStatus::Draft, InvoiceStatus::from),
            period_start: from_unix(inv.period_start)?,
            period_end: from_unix(inv.period_end)?,
            id: inv.id,
            customer_id: CustomerId(inv.customer),
            amount_due_cents: inv.amount_due,
            amount_paid_cents: inv.amount_paid,
            currency: inv.currency,
            hosted_invoice_url: inv.hosted_invoice_url,
            invoice_pdf: inv.invoice_pdf,
        })
    }
}

// Stripe API response types

/// Stripe subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscription {
    /// Subscription ID
    pub id: String,
    /// Customer ID
    pub customer: String,
    /// Subscription status
    pub status: String,
    /// Current period start (Unix timestamp)
    pub current_period_start: Option<i64>,
    /// Current period end (Unix timestamp)
    pub current_period_end: Option<i64>,
    /// Whether subscription cancels at period end
    #[serde(default)]
    pub cancel_at_period_end: bool,
    /// Scheduled cancellation (Unix timestamp)
    pub cancel_at: Option<i64>,
    /// Metadata copied from the checkout session
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
    /// Subscription items
    pub items: Option<StripeList<StripeSubscriptionItem>>,
}

/// Stripe subscription item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscriptionItem {
    /// Item ID
    pub id: String,
    /// Price the item is billed at
    pub price: StripePrice,
}

/// Stripe price
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePrice {
    /// Price ID
    pub id: String,
}

/// Stripe checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCheckoutSession {
    /// Session ID
    pub id: String,
    /// Checkout URL
    pub url: Option<String>,
    /// Customer ID
    pub customer: Option<String>,
    /// Subscription ID (after completion)
    pub subscription: Option<String>,
    /// User the session was created for
    pub client_reference_id: Option<String>,
    /// Metadata set at creation
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, String>,
}

/// Stripe invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeInvoice {
    /// Invoice ID
    pub id: String,
    /// Customer ID
    pub customer: String,
    /// Invoice status
    pub status: Option<String>,
    /// Amount due in cents
    pub amount_due: i64,
    /// Amount paid in cents
    pub amount_paid: i64,
    /// Currency
    pub currency: String,
    /// Hosted invoice URL
    pub hosted_invoice_url: Option<String>,
    /// Invoice PDF URL
    pub invoice_pdf: Option<String>,
    /// Period start (Unix timestamp)
    pub period_start: i64,
    /// Period end (Unix timestamp)
    pub period_end: i64,
}

/// Stripe list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeList<T> {
    /// List data
    pub data: Vec<T>,
    /// Whether there are more items
    #[serde(default)]
    pub has_more: bool,
}
