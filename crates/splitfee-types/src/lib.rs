//! Splitfee Types - Shared domain types
//!
//! This crate contains domain types used across the billing engine:
//! - User and placement identity
//! - Plan tiers, commission roles and plan catalog entries
//! - Subscriptions and their lifecycle statuses
//! - Commission snapshots, payouts and billing aggregates
//! - Payment processor mirrors (invoices, checkout sessions)

pub mod billing;
pub mod commission;
pub mod error;
pub mod payout;
pub mod plan;
pub mod subscription;
pub mod tier;
pub mod user;

pub use billing::*;
pub use commission::*;
pub use error::*;
pub use payout::*;
pub use plan::*;
pub use subscription::*;
pub use tier::*;
pub use user::*;
