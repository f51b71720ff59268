use farm_order_engine::{
    db_types::PaymentStatus,
    traits::{ChargeRequest, ChargeResult, PaymentProvider, ProviderError, RefundRequest, RefundResult, RefundStatus},
};
use log::*;
use rand::{thread_rng, RngCore};

/// A payment provider whose outcomes only ever arrive by webhook.
///
/// Every charge is accepted as `pending` with a fresh provider reference. The hosted checkout then reports the real
/// outcome to `/webhooks/payment`, which settles the payment against that reference. Refunds are likewise queued and
/// confirmed out of band.
#[derive(Debug, Clone, Default)]
pub struct DeferredPaymentProvider;

impl DeferredPaymentProvider {
    fn new_reference(prefix: &str) -> String {
        format!("{prefix}-{:016x}", thread_rng().next_u64())
    }
}

impl PaymentProvider for DeferredPaymentProvider {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult, ProviderError> {
        let provider_ref = Self::new_reference("ch");
        info!(
            "💰️ {} charge of {} for order {} handed to the hosted checkout as {provider_ref}",
            request.payment_type, request.amount, request.order_number
        );
        Ok(ChargeResult::new(PaymentStatus::Pending, provider_ref))
    }

    async fn refund(&self, request: RefundRequest) -> Result<RefundResult, ProviderError> {
        let refund_ref = Self::new_reference("rf");
        info!(
            "💰️ Refund of {} against {} queued as {refund_ref}. Reason: {}",
            request.amount, request.provider_ref, request.reason
        );
        Ok(RefundResult { status: RefundStatus::Pending })
    }
}
