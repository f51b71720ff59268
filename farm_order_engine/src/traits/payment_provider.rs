use farm_common::MinorUnits;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::{OrderNumber, PaymentStatus, PaymentType};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub order_number: OrderNumber,
    /// The engine's reference for this charge. Providers should treat it as an idempotency key.
    pub payment_ref: String,
    pub amount: MinorUnits,
    pub payment_type: PaymentType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeResult {
    pub status: PaymentStatus,
    pub provider_ref: Option<String>,
}

impl ChargeResult {
    pub fn new<S: Into<String>>(status: PaymentStatus, provider_ref: S) -> Self {
        Self { status, provider_ref: Some(provider_ref.into()) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequest {
    pub provider_ref: String,
    pub amount: MinorUnits,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Completed,
    Pending,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundResult {
    pub status: RefundStatus,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider could not be reached, or gave no definitive answer. The outcome of the charge is unknown.
    #[error("Payment provider unavailable: {0}")]
    Unavailable(String),
    /// The provider refused the request outright. No money moved.
    #[error("Payment provider rejected the request: {0}")]
    Rejected(String),
}

/// The external payment provider. Protocol details live in the implementation; the engine only cares about the
/// outcome of each call.
///
/// Webhooks from the provider are fed back in through `OrderFlowApi::apply_payment_update`.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult, ProviderError>;

    async fn refund(&self, request: RefundRequest) -> Result<RefundResult, ProviderError>;
}
