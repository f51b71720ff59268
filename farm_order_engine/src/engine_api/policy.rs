use std::{collections::HashMap, fmt::Display, str::FromStr, time::Duration};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db_types::{ConversionError, OrderStatusType, ProductLine};

/// Whether customers may reduce quantities on an order through the amendment path. Reductions that are not allowed
/// here must go through the explicit refund path instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecreasePolicy {
    Allow,
    /// No reductions once the order is fully paid
    BlockWhenFullyPaid,
    /// No reductions within the given number of days before fulfillment
    BlockWithin(i64),
}

impl DecreasePolicy {
    /// Returns the reason a decrease is refused, if it is.
    pub fn refusal(&self, status: OrderStatusType, days_to_fulfillment: i64) -> Option<String> {
        match self {
            DecreasePolicy::Allow => None,
            DecreasePolicy::BlockWhenFullyPaid => {
                matches!(status, OrderStatusType::FullyPaid | OrderStatusType::ReadyForPickup)
                    .then(|| "The order is fully paid. Please request a refund instead.".to_string())
            },
            DecreasePolicy::BlockWithin(days) => (days_to_fulfillment < *days).then(|| {
                format!("Reductions are closed {days} days before fulfillment. Please request a refund instead.")
            }),
        }
    }
}

impl Display for DecreasePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecreasePolicy::Allow => f.write_str("allow"),
            DecreasePolicy::BlockWhenFullyPaid => f.write_str("block_when_fully_paid"),
            DecreasePolicy::BlockWithin(days) => write!(f, "block_within:{days}"),
        }
    }
}

impl FromStr for DecreasePolicy {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "allow" => Ok(Self::Allow),
            "block_when_fully_paid" => Ok(Self::BlockWhenFullyPaid),
            other => other
                .strip_prefix("block_within:")
                .and_then(|d| d.trim().parse::<i64>().ok())
                .filter(|d| *d >= 0)
                .map(Self::BlockWithin)
                .ok_or_else(|| ConversionError::new(format!("{s} is not a valid decrease policy"))),
        }
    }
}

/// The business rules that drive the lifecycle. All day counts are whole calendar days.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePolicy {
    /// Orders placed fewer than this many days before fulfillment are paid in full at checkout
    pub full_payment_cutoff_days: i64,
    /// The remainder is due this many days before fulfillment
    pub remainder_due_days: i64,
    /// Days before the remainder due date at which a reminder is sent
    pub reminder_offsets: Vec<i64>,
    /// Additions made this many days (or fewer) before fulfillment are late additions
    pub late_addition_window_days: i64,
    /// Price multiplier for late additions, in percent
    pub late_addition_multiplier_pct: i64,
    pub decrease_policies: HashMap<ProductLine, DecreasePolicy>,
    /// Upper bound on a single payment provider call
    pub provider_timeout: Duration,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        let decrease_policies = HashMap::from([
            (ProductLine::PigBox, DecreasePolicy::BlockWithin(7)),
            (ProductLine::HatchingEggs, DecreasePolicy::BlockWhenFullyPaid),
            (ProductLine::LiveChickens, DecreasePolicy::Allow),
        ]);
        Self {
            full_payment_cutoff_days: 14,
            remainder_due_days: 5,
            reminder_offsets: vec![11, 9, 7, 6],
            late_addition_window_days: 1,
            late_addition_multiplier_pct: 80,
            decrease_policies,
            provider_timeout: Duration::from_secs(10),
        }
    }
}

impl LifecyclePolicy {
    pub fn decrease_policy(&self, line: ProductLine) -> DecreasePolicy {
        self.decrease_policies.get(&line).copied().unwrap_or(DecreasePolicy::Allow)
    }

    /// Reminder offsets, largest first, without duplicates or negative values.
    pub fn sorted_reminder_offsets(&self) -> Vec<i64> {
        let mut offsets: Vec<i64> = self.reminder_offsets.iter().copied().filter(|d| *d >= 0).collect();
        offsets.sort_unstable_by(|a, b| b.cmp(a));
        offsets.dedup();
        offsets
    }

    /// The reminder milestone that is due when `days_remaining` days are left before the remainder due date.
    ///
    /// This is the smallest offset that is still at least `days_remaining`, so a sweep that missed a day catches up
    /// with the most recent milestone rather than sending every missed one.
    pub fn due_reminder_offset(&self, days_remaining: i64) -> Option<i64> {
        self.sorted_reminder_offsets().into_iter().filter(|o| *o >= days_remaining).min()
    }

    pub fn is_late_addition(&self, days_to_fulfillment: i64) -> bool {
        (0..=self.late_addition_window_days).contains(&days_to_fulfillment)
    }

    /// When the remainder falls due for an order fulfilled on `fulfillment_date`. Never earlier than `today`, so a
    /// remainder that only appears close to fulfillment is due immediately rather than already overdue.
    pub fn remainder_due_date(&self, fulfillment_date: NaiveDate, today: NaiveDate) -> NaiveDate {
        (fulfillment_date - chrono::Duration::days(self.remainder_due_days)).max(today)
    }
}
