//! Payment processor types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stripe customer ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(pub String);

impl CustomerId {
    /// Create a new customer ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stripe price ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceId(pub String);

impl PriceId {
    /// Create a new price ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for PriceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stripe product ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    /// Create a new product ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Invoice status as reported by the processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Invoice is a draft
    Draft,
    /// Invoice is open and awaiting payment
    Open,
    /// Invoice has been paid
    Paid,
    /// Invoice is void
    Void,
    /// Invoice is uncollectible
    Uncollectible,
    /// Status this build does not know
    #[serde(untagged)]
    Other(String),
}

impl From<&str> for InvoiceStatus {
    fn from(s: &str) -> Self {
        match s {
            "draft" => Self::Draft,
            "open" => Self::Open,
            "paid" => Self::Paid,
            "void" => Self::Void,
            "uncollectible" => Self::Uncollectible,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Read-only mirror of a processor invoice, for display only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Processor invoice ID
    pub id: String,
    /// Customer the invoice was issued to
    pub customer_id: CustomerId,
    /// Invoice status
    pub status: InvoiceStatus,
    /// Amount due in cents
    pub amount_due_cents: i64,
    /// Amount paid in cents
    pub amount_paid_cents: i64,
    /// Currency (e.g., "usd")
    pub currency: String,
    /// Hosted invoice URL
    pub hosted_invoice_url: Option<String>,
    /// PDF download URL
    pub invoice_pdf: Option<String>,
    /// Invoice period start
    pub period_start: DateTime<Utc>,
    /// Invoice period end
    pub period_end: DateTime<Utc>,
}

/// Checkout session handle returned by the processor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe checkout session ID
    pub session_id: String,
    /// Checkout URL to redirect user to
    pub url: String,
}
