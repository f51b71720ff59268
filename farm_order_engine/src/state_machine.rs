//! # Order status
//!
//! Order status is stored, but every write path sets it through [`recompute_status`], which derives it from the
//! payment ledger. Admin-driven and terminal statuses live in `manual_status` and are never overridden.
//!
//! ```text
//! draft --> deposit_paid --> fully_paid --> ready_for_pickup --> completed
//!                 |  ^            |
//!                 |  +------------+  (amendment raised the remainder)
//!                 +--> forfeited
//! any non-terminal --> cancelled
//! ```
use farm_common::MinorUnits;

use crate::{
    db_types::{Order, OrderStatusType, Payment, PaymentStatus, PaymentType},
    traits::LifecycleError,
};

/// Completed money per payment type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub completed_deposits: usize,
    pub deposit_paid: MinorUnits,
    pub remainder_paid: MinorUnits,
}

impl LedgerSummary {
    pub fn from_payments(payments: &[Payment]) -> Self {
        payments.iter().filter(|p| p.status == PaymentStatus::Completed).fold(Self::default(), |mut acc, p| {
            match p.payment_type {
                PaymentType::Deposit => {
                    acc.completed_deposits += 1;
                    acc.deposit_paid += p.amount;
                },
                PaymentType::Remainder => acc.remainder_paid += p.amount,
            }
            acc
        })
    }

    /// How much of `remainder_amount` has not been collected yet.
    pub fn outstanding_remainder(&self, remainder_amount: MinorUnits) -> MinorUnits {
        (remainder_amount - self.remainder_paid).floor_zero()
    }
}

/// The single source of truth for automatic status changes.
pub fn recompute_status(
    manual_status: Option<OrderStatusType>,
    remainder_amount: MinorUnits,
    payments: &[Payment],
) -> OrderStatusType {
    if let Some(status) = manual_status {
        return status;
    }
    let ledger = LedgerSummary::from_payments(payments);
    if ledger.completed_deposits == 0 {
        OrderStatusType::Draft
    } else if ledger.remainder_paid >= remainder_amount {
        OrderStatusType::FullyPaid
    } else {
        OrderStatusType::DepositPaid
    }
}

pub fn order_status(order: &Order, payments: &[Payment]) -> OrderStatusType {
    recompute_status(order.manual_status, order.remainder_amount, payments)
}

/// Things that can be done to an order, each guarded by [`check_action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    Amend,
    PayRemainder,
    Lock,
    Unlock,
    MarkReady,
    MarkCompleted,
    Cancel,
    Forfeit,
}

impl OrderAction {
    fn blocked_by_lock(&self) -> bool {
        matches!(self, OrderAction::Amend | OrderAction::Cancel | OrderAction::Forfeit)
    }

    fn allowed_from(&self, status: OrderStatusType) -> bool {
        use OrderStatusType::*;
        match self {
            OrderAction::Amend => matches!(status, Draft | DepositPaid | FullyPaid),
            OrderAction::PayRemainder => status == DepositPaid,
            OrderAction::Lock | OrderAction::Unlock => !status.is_terminal(),
            OrderAction::MarkReady => status == FullyPaid,
            OrderAction::MarkCompleted => matches!(status, FullyPaid | ReadyForPickup),
            OrderAction::Cancel => !status.is_terminal(),
            OrderAction::Forfeit => status == DepositPaid,
        }
    }
}

impl std::fmt::Display for OrderAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderAction::Amend => "amend",
            OrderAction::PayRemainder => "pay the remainder of",
            OrderAction::Lock => "lock",
            OrderAction::Unlock => "unlock",
            OrderAction::MarkReady => "mark as ready for pickup",
            OrderAction::MarkCompleted => "mark as completed",
            OrderAction::Cancel => "cancel",
            OrderAction::Forfeit => "forfeit",
        };
        f.write_str(s)
    }
}

/// Checks that `action` is permitted on `order` in its current state. The fulfillment lock is checked before the
/// status, so a locked order reports [`LifecycleError::OrderLocked`] regardless of its status.
pub fn check_action(order: &Order, action: OrderAction) -> Result<(), LifecycleError> {
    if order.is_locked() && action.blocked_by_lock() {
        return Err(LifecycleError::OrderLocked(order.order_number.clone()));
    }
    if !action.allowed_from(order.status) {
        return Err(LifecycleError::InvalidStateTransition(format!(
            "Cannot {action} order {} while it is {}",
            order.order_number, order.status
        )));
    }
    Ok(())
}
