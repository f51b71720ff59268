use farm_order_engine::{
    db_types::PaymentStatus,
    traits::{ChargeRequest, ChargeResult, PaymentProvider, ProviderError, RefundRequest, RefundResult, RefundStatus},
};
use mockall::mock;

mock! {
    pub Provider {}
    impl PaymentProvider for Provider {
        async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult, ProviderError>;
        async fn refund(&self, request: RefundRequest) -> Result<RefundResult, ProviderError>;
    }
}

/// The provider reference the mocks hand out for a charge
pub fn provider_ref(payment_ref: &str) -> String {
    format!("mock-{payment_ref}")
}

/// Settles every charge immediately
pub fn approving_provider() -> MockProvider {
    let mut provider = MockProvider::new();
    provider
        .expect_charge()
        .returning(|req| Ok(ChargeResult::new(PaymentStatus::Completed, provider_ref(&req.payment_ref))));
    provider.expect_refund().returning(|_| Ok(RefundResult { status: RefundStatus::Completed }));
    provider
}

/// Accepts every charge, but only confirms it later, via the webhook
pub fn deferring_provider() -> MockProvider {
    let mut provider = MockProvider::new();
    provider
        .expect_charge()
        .returning(|req| Ok(ChargeResult::new(PaymentStatus::Pending, provider_ref(&req.payment_ref))));
    provider
}

/// Declines every charge
pub fn declining_provider() -> MockProvider {
    let mut provider = MockProvider::new();
    provider.expect_charge().returning(|_| Err(ProviderError::Rejected("card declined".into())));
    provider
}

/// Fails the test if the handler tries to move any money
pub fn idle_provider() -> MockProvider {
    let mut provider = MockProvider::new();
    provider.expect_charge().never();
    provider.expect_refund().never();
    provider
}
