//! Billing view assembly tests

mod common;

use chrono::Utc;
use common::{MockPayoutRepository, TestBilling};
use splitfee_billing_core::{DegradedSection, Invoice};
use splitfee_types::{BillingStats, CustomerId, InvoiceStatus, Tier, UserId};

fn invoice(customer: &str, id: &str) -> Invoice {
    let now = Utc::now();
    Invoice {
        id: id.to_string(),
        customer_id: CustomerId::new(customer),
        status: InvoiceStatus::Paid,
        amount_due_cents: 4_900,
        amount_paid_cents: 4_900,
        currency: "usd".to_string(),
        hosted_invoice_url: None,
        invoice_pdf: None,
        period_start: now,
        period_end: now,
    }
}

#[tokio::test]
async fn test_view_for_new_user() {
    let t = TestBilling::new();
    let user = UserId::new();

    let view = t.billing.get_billing_view(&user).await.unwrap();

    assert!(view.subscription.is_virtual);
    assert_eq!(view.current_plan.id, t.free);
    let tiers: Vec<Tier> = view
        .plans
        .iter()
        .map(|p| p.tier.tier().unwrap())
        .collect();
    assert_eq!(tiers, vec![Tier::Free, Tier::Pro, Tier::Partner]);
    assert!(view.payouts.is_empty());
    assert!(view.invoices.is_empty());
    assert_eq!(view.stats, BillingStats::default());
    assert!(view.degraded.is_empty());
}

#[tokio::test]
async fn test_view_for_paying_user() {
    let t = TestBilling::new();
    let user = UserId::new();
    t.subscribe(user, t.pro, "sub_1").await;
    t.provider.set_invoices(vec![
        invoice("cus_sub_1", "in_1"),
        invoice("cus_other", "in_2"),
    ]);
    t.payouts
        .insert_payout(MockPayoutRepository::payout_row(user.0, "completed", 1_200, Utc::now()));

    let view = t.billing.get_billing_view(&user).await.unwrap();

    assert_eq!(view.current_plan.id, t.pro);
    assert_eq!(view.invoices.len(), 1);
    assert_eq!(view.invoices[0].id, "in_1");
    assert_eq!(view.payouts.len(), 1);
    assert_eq!(view.stats.lifetime_earnings_cents, 1_200);
    assert!(view.degraded.is_empty());
}

#[tokio::test]
async fn test_inactive_plans_are_hidden() {
    let t = TestBilling::new();
    t.plans.set_active(t.partner.0, false);

    let view = t.billing.get_billing_view(&UserId::new()).await.unwrap();

    assert_eq!(view.plans.len(), 2);
    assert!(view.plans.iter().all(|p| p.id != t.partner));
}

#[tokio::test]
async fn test_payout_outage_degrades_view() {
    let t = TestBilling::new();
    let user = UserId::new();
    t.payouts.set_unavailable(true);

    let view = t.billing.get_billing_view(&user).await.unwrap();

    assert_eq!(view.degraded, vec![DegradedSection::Payouts]);
    assert!(view.payouts.is_empty());
    assert_eq!(view.stats, BillingStats::default());
    assert_eq!(view.current_plan.id, t.free);
}

#[tokio::test]
async fn test_invoice_outage_degrades_view() {
    let t = TestBilling::new();
    let user = UserId::new();
    t.subscribe(user, t.partner, "sub_1").await;
    t.provider.set_fail_invoices(true);

    let view = t.billing.get_billing_view(&user).await.unwrap();

    assert_eq!(view.degraded, vec![DegradedSection::Invoices]);
    assert!(view.invoices.is_empty());
    assert_eq!(view.current_plan.id, t.partner);
}

#[tokio::test]
async fn test_view_serializes_degraded_sections() {
    let t = TestBilling::new();
    t.payouts.set_unavailable(true);

    let view = t.billing.get_billing_view(&UserId::new()).await.unwrap();
    let json = serde_json::to_value(&view).unwrap();

    assert_eq!(json["degraded"], serde_json::json!(["payouts"]));
    assert_eq!(json["current_plan"]["tier"], "free");
}
