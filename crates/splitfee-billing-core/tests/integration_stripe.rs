//! Integration tests for the Stripe provider
//!
//! These tests use wiremock to stand in for the Stripe REST API.

use chrono::{TimeZone, Utc};
use serde_json::json;
use splitfee_billing_core::{
    BillingConfig, BillingError, CheckoutRequest, PaymentProvider, StripeProvider,
    SubscriptionPatch,
};
use splitfee_types::{CustomerId, InvoiceStatus, PlanId, PriceId, UserId};
use wiremock::matchers::{body_string_contains, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn provider() -> (MockServer, StripeProvider) {
    let server = MockServer::start().await;
    let config = BillingConfig::new("sk_test_123", "whsec_test").with_api_base(server.uri());
    (server, StripeProvider::new(config))
}

fn checkout_request(customer: Option<&str>) -> CheckoutRequest {
    CheckoutRequest {
        user_id: UserId::new(),
        plan_id: PlanId::new(),
        price_id: PriceId::new("price_pro"),
        customer_id: customer.map(CustomerId::new),
        success_url: "https://app.example.com/ok".to_string(),
        cancel_url: "https://app.example.com/back".to_string(),
    }
}

#[tokio::test]
async fn test_checkout_session_is_created() {
    let (server, stripe) = provider().await;
    let request = checkout_request(None);

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .and(header_exists("authorization"))
        .and(body_string_contains("mode=subscription"))
        .and(body_string_contains("price_pro"))
        .and(body_string_contains(format!(
            "client_reference_id={}",
            request.user_id
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_1",
            "url": "https://checkout.stripe.com/c/pay/cs_test_1",
            "customer": null,
            "subscription": null,
            "client_reference_id": request.user_id.to_string(),
            "metadata": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = stripe.create_checkout_session(&request).await.unwrap();

    assert_eq!(session.session_id, "cs_test_1");
    assert_eq!(session.url, "https://checkout.stripe.com/c/pay/cs_test_1");
}

#[tokio::test]
async fn test_checkout_reuses_existing_customer() {
    let (server, stripe) = provider().await;

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .and(body_string_contains("customer=cus_42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_2",
            "url": "https://checkout.stripe.com/c/pay/cs_test_2",
            "metadata": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    stripe
        .create_checkout_session(&checkout_request(Some("cus_42")))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_checkout_without_url_is_an_error() {
    let (server, stripe) = provider().await;

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_3",
            "url": null,
            "metadata": {}
        })))
        .mount(&server)
        .await;

    let err = stripe
        .create_checkout_session(&checkout_request(None))
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::ProviderError(_)));
}

#[tokio::test]
async fn test_stripe_error_status_maps_to_provider_error() {
    let (server, stripe) = provider().await;

    Mock::given(method("POST"))
        .and(path("/checkout/sessions"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "boom" }
        })))
        .mount(&server)
        .await;

    let err = stripe
        .create_checkout_session(&checkout_request(None))
        .await
        .unwrap_err();

    assert!(err.is_provider_error());
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_cancel_at_period_end_is_sent() {
    let (server, stripe) = provider().await;

    Mock::given(method("POST"))
        .and(path("/subscriptions/sub_1"))
        .and(body_string_contains("cancel_at_period_end=true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "cancel_at_period_end": true,
            "metadata": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    stripe
        .update_subscription("sub_1", &SubscriptionPatch::cancel_at_period_end())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_explicit_cancel_date_is_sent_as_unix_time() {
    let (server, stripe) = provider().await;
    let at = Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap();

    Mock::given(method("POST"))
        .and(path("/subscriptions/sub_1"))
        .and(body_string_contains(format!("cancel_at={}", at.timestamp())))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "active",
            "cancel_at": at.timestamp(),
            "metadata": {}
        })))
        .expect(1)
        .mount(&server)
        .await;

    stripe
        .update_subscription("sub_1", &SubscriptionPatch::cancel_at(at))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_empty_patch_sends_nothing() {
    let (server, stripe) = provider().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    stripe
        .update_subscription("sub_1", &SubscriptionPatch::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_invoices_are_listed() {
    let (server, stripe) = provider().await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .and(query_param("customer", "cus_1"))
        .and(query_param("limit", "12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {
                    "id": "in_2",
                    "customer": "cus_1",
                    "status": "open",
                    "amount_due": 4900,
                    "amount_paid": 0,
                    "currency": "usd",
                    "hosted_invoice_url": "https://invoice.stripe.com/i/in_2",
                    "invoice_pdf": null,
                    "period_start": 1_764_547_200,
                    "period_end": 1_767_225_600
                },
                {
                    "id": "in_1",
                    "customer": "cus_1",
                    "status": null,
                    "amount_due": 4900,
                    "amount_paid": 4900,
                    "currency": "usd",
                    "hosted_invoice_url": null,
                    "invoice_pdf": null,
                    "period_start": 1_761_955_200,
                    "period_end": 1_764_547_200
                }
            ],
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let invoices = stripe
        .list_invoices(&CustomerId::new("cus_1"), 12)
        .await
        .unwrap();

    assert_eq!(invoices.len(), 2);
    assert_eq!(invoices[0].id, "in_2");
    assert_eq!(invoices[0].status, InvoiceStatus::Open);
    assert_eq!(invoices[0].amount_due_cents, 4_900);
    assert_eq!(invoices[0].period_start.timestamp(), 1_764_547_200);
    assert_eq!(invoices[1].status, InvoiceStatus::Draft);
}

#[tokio::test]
async fn test_unreadable_response_is_provider_error() {
    let (server, stripe) = provider().await;

    Mock::given(method("GET"))
        .and(path("/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = stripe
        .list_invoices(&CustomerId::new("cus_1"), 5)
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::ProviderError(_)));
}
