use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, Payment, PaymentStatus};

/// A payment outcome reported by the provider, either synchronously from a charge call or later via a webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdate {
    /// The provider's reference. Webhooks are matched on this first.
    pub provider_ref: Option<String>,
    /// The engine's own reference, used when the provider reference is not yet known to the ledger (e.g. because the
    /// charge call timed out).
    pub payment_ref: Option<String>,
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl PaymentUpdate {
    pub fn for_payment_ref<S: Into<String>>(payment_ref: S, status: PaymentStatus) -> Self {
        Self { provider_ref: None, payment_ref: Some(payment_ref.into()), status, paid_at: None }
    }

    pub fn for_provider_ref<S: Into<String>>(provider_ref: S, status: PaymentStatus) -> Self {
        Self { provider_ref: Some(provider_ref.into()), payment_ref: None, status, paid_at: None }
    }

    pub fn with_provider_ref<S: Into<String>>(mut self, provider_ref: S) -> Self {
        self.provider_ref = Some(provider_ref.into());
        self
    }

    pub fn with_paid_at(mut self, paid_at: DateTime<Utc>) -> Self {
        self.paid_at = Some(paid_at);
        self
    }

    /// A human-readable reference for log messages
    pub fn reference(&self) -> String {
        self.provider_ref.clone().or_else(|| self.payment_ref.clone()).unwrap_or_else(|| "<no reference>".into())
    }
}

/// The result of applying a [`PaymentUpdate`] to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettlement {
    pub payment: Payment,
    pub old_order: Order,
    pub order: Order,
    /// False if the update was a replay of an outcome the ledger already held
    pub changed: bool,
    /// True if this update completed a second deposit for an order that already had one
    pub duplicate_deposit: bool,
    /// True if the order's reservation was released as a consequence (failed deposit)
    pub released: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrityIssueKind {
    DuplicateDeposit,
    TotalMismatch,
    AllocationOutOfBounds,
    AllocationDrift,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub kind: IntegrityIssueKind,
    /// Order number or inventory unit code
    pub subject: String,
    pub detail: String,
}

impl IntegrityIssue {
    pub fn new<S: Into<String>, D: Into<String>>(kind: IntegrityIssueKind, subject: S, detail: D) -> Self {
        Self { kind, subject: subject.into(), detail: detail.into() }
    }
}
