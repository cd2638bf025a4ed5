//! Splitfee Billing Core - Billing and commission business logic
//!
//! Components, leaves first:
//!
//! - [`rates`]: the tier × role commission rate table
//! - [`catalog`]: validated, rank-ordered plan catalog
//! - [`subscription`]: subscription state machine driven by plan selection
//!   and payment processor events
//! - [`commission`]: commission resolution and hire-time snapshots
//! - [`payout`]: payout ledger and earnings aggregates
//! - [`orchestrator`]: the billing view and plan-change façade
//!
//! # Example
//!
//! ```rust,ignore
//! use splitfee_billing_core::{BillingConfig, BillingOrchestrator, StripeProvider, Stores};
//! use splitfee_db::Repositories;
//!
//! let config = BillingConfig::new("sk_test_...", "whsec_...");
//! let provider = Arc::new(StripeProvider::new(config.clone()));
//! let billing = BillingOrchestrator::new(Stores::from(repos), provider, config);
//!
//! // What the billing page renders
//! let view = billing.get_billing_view(&user_id).await?;
//!
//! // Free plans apply immediately, paid plans return a checkout redirect
//! let result = billing.change_plan(&user_id, plan_id).await?;
//! ```

pub mod catalog;
pub mod commission;
pub mod config;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod payout;
pub mod provider;
pub mod rates;
pub mod stores;
pub mod stripe;
pub mod subscription;
pub mod webhook;

pub use catalog::PlanCatalog;
pub use commission::{CommissionResolver, PendingSnapshot, ResolvedRate};
pub use config::BillingConfig;
pub use error::BillingError;
pub use events::{BillingEvent, BillingEventKind, EventOutcome, PlanRef};
pub use orchestrator::{BillingOrchestrator, BillingView, DegradedSection, PlanChangeResult, PollConfig};
pub use payout::{summarize, PayoutLedger};
pub use provider::{CheckoutRequest, PaymentProvider, SubscriptionPatch};
pub use rates::{rate_for, rate_for_slugs, rate_table, RateRow};
pub use stores::Stores;
pub use stripe::StripeProvider;
pub use subscription::{EffectiveSubscription, SubscriptionService};
pub use webhook::WebhookHandler;

// Re-export processor types from splitfee-types for convenience
pub use splitfee_types::{CheckoutSession, Invoice};
