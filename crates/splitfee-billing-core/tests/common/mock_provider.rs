//! Scriptable payment provider for testing

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use splitfee_billing_core::{
    BillingError, CheckoutRequest, CheckoutSession, Invoice, PaymentProvider, SubscriptionPatch,
};
use splitfee_types::CustomerId;

/// Records every call and fails or stalls on demand
#[derive(Default, Clone)]
pub struct MockPaymentProvider {
    checkouts: Arc<Mutex<Vec<CheckoutRequest>>>,
    patches: Arc<Mutex<Vec<(String, SubscriptionPatch)>>>,
    invoices: Arc<Mutex<Vec<Invoice>>>,
    checkout_delay: Arc<Mutex<Option<Duration>>>,
    fail_checkout: Arc<AtomicBool>,
    fail_updates: Arc<AtomicBool>,
    fail_invoices: Arc<AtomicBool>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(dead_code)]
    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.checkouts.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn patches(&self) -> Vec<(String, SubscriptionPatch)> {
        self.patches.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn set_invoices(&self, invoices: Vec<Invoice>) {
        *self.invoices.lock().unwrap() = invoices;
    }

    #[allow(dead_code)]
    pub fn set_checkout_delay(&self, delay: Duration) {
        *self.checkout_delay.lock().unwrap() = Some(delay);
    }

    #[allow(dead_code)]
    pub fn set_fail_checkout(&self, fail: bool) {
        self.fail_checkout.store(fail, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    #[allow(dead_code)]
    pub fn set_fail_invoices(&self, fail: bool) {
        self.fail_invoices.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        let delay = *self.checkout_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(BillingError::ProviderError("checkout down".to_string()));
        }

        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(request.clone());
        let n = checkouts.len();
        Ok(CheckoutSession {
            session_id: format!("cs_test_{n}"),
            url: format!("https://checkout.example.com/pay/cs_test_{n}"),
        })
    }

    async fn update_subscription(
        &self,
        subscription_id: &str,
        patch: &SubscriptionPatch,
    ) -> Result<(), BillingError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(BillingError::ProviderError("update refused".to_string()));
        }
        self.patches
            .lock()
            .unwrap()
            .push((subscription_id.to_string(), patch.clone()));
        Ok(())
    }

    async fn list_invoices(
        &self,
        customer_id: &CustomerId,
        limit: u32,
    ) -> Result<Vec<Invoice>, BillingError> {
        if self.fail_invoices.load(Ordering::SeqCst) {
            return Err(BillingError::ProviderError("invoices down".to_string()));
        }
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .iter()
            .filter(|invoice| &invoice.customer_id == customer_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
