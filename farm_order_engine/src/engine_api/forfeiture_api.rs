use std::fmt::Debug;

use chrono::NaiveDate;
use log::*;

use crate::{
    db_types::{Order, ReminderMilestone},
    engine_api::{
        order_objects::{ReminderSent, SweepReport, SweepStage},
        policy::LifecyclePolicy,
    },
    events::{EventProducers, OrderAnnulledEvent},
    state_machine::LedgerSummary,
    traits::{LifecycleDatabase, LifecycleError, Notification, NotificationSender, NotificationTemplate},
};

/// The periodic sweep that sends remainder reminders, forfeits orders whose remainder is overdue, and sends the
/// pre-fulfillment reminder.
///
/// Every order is processed on its own. A failure for one order is logged and recorded in the [`SweepReport`], and
/// the sweep carries on with the next one. Reminders are claimed before they are sent, and the claim is handed back
/// if sending fails, so running the sweep again (or concurrently) never sends the same reminder twice. Forfeiture
/// has no claim: an order that failed to forfeit is simply picked up again by the next sweep.
pub struct ForfeitureApi<B, N> {
    db: B,
    notifier: N,
    policy: LifecyclePolicy,
    producers: EventProducers,
}

impl<B, N> Debug for ForfeitureApi<B, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ForfeitureApi")
    }
}

impl<B, N> ForfeitureApi<B, N> {
    pub fn new(db: B, notifier: N, policy: LifecyclePolicy, producers: EventProducers) -> Self {
        Self { db, notifier, policy, producers }
    }
}

impl<B, N> ForfeitureApi<B, N>
where
    B: LifecycleDatabase,
    N: NotificationSender,
{
    pub async fn sweep(&self, today: NaiveDate) -> SweepReport {
        info!("🕰️ Starting lifecycle sweep for {today}");
        let mut report = SweepReport::default();
        self.forfeit_overdue(today, &mut report).await;
        self.send_remainder_reminders(today, &mut report).await;
        self.send_pre_fulfillment_reminders(today, &mut report).await;
        info!(
            "🕰️ Sweep for {today} complete. {} reminders, {} forfeitures, {} pre-fulfillment reminders, {} failures",
            report.reminders.len(),
            report.forfeited.len(),
            report.pre_fulfillment.len(),
            report.failures.len()
        );
        report
    }

    async fn forfeit_overdue(&self, today: NaiveDate, report: &mut SweepReport) {
        let overdue = match self.db.fetch_overdue_orders(today).await {
            Ok(orders) => orders,
            Err(e) => {
                error!("🕰️ Could not fetch overdue orders. {e}");
                report.fail(None, SweepStage::Forfeiture, e);
                return;
            },
        };
        debug!("🕰️ {} orders have an overdue remainder", overdue.len());
        for order in overdue {
            let reason = match order.remainder_due_date {
                Some(due) => format!("remainder was due on {due} and was not paid"),
                None => "remainder was not paid".to_string(),
            };
            let forfeited = match self.db.forfeit_order(order.id, today, &reason).await {
                Ok(Some(forfeited)) => forfeited,
                Ok(None) => {
                    debug!("🕰️ Order {} no longer qualifies for forfeiture", order.order_number);
                    continue;
                },
                Err(e) => {
                    error!("🕰️ Could not forfeit order {}. {e}", order.order_number);
                    report.fail(Some(&order.order_number), SweepStage::Forfeiture, e);
                    continue;
                },
            };
            info!("🕰️ Order {} forfeited: {reason}", forfeited.order_number);
            report.forfeited.push(forfeited.order_number.clone());
            self.producers.publish_order_annulled(OrderAnnulledEvent::new(forfeited.clone())).await;
            let notification = Notification::new(&forfeited.customer_ref, NotificationTemplate::OrderForfeited)
                .with_var("order_number", &forfeited.order_number)
                .with_var("reason", &reason);
            if let Err(e) = self.notifier.send(notification).await {
                warn!("🕰️ Order {} was forfeited, but the customer could not be told. {e}", forfeited.order_number);
                report.fail(Some(&forfeited.order_number), SweepStage::Forfeiture, e);
            }
        }
    }

    async fn send_remainder_reminders(&self, today: NaiveDate, report: &mut SweepReport) {
        let Some(horizon) = self.policy.sorted_reminder_offsets().first().copied() else {
            return;
        };
        let candidates = match self.db.fetch_reminder_candidates(today, horizon).await {
            Ok(orders) => orders,
            Err(e) => {
                error!("🕰️ Could not fetch reminder candidates. {e}");
                report.fail(None, SweepStage::Reminder, e);
                return;
            },
        };
        for order in candidates {
            let Some(due) = order.remainder_due_date else { continue };
            let days_remaining = (due - today).num_days();
            let Some(offset) = self.policy.due_reminder_offset(days_remaining) else { continue };
            let milestone = ReminderMilestone::RemainderDue(offset);
            match self.remind(&order, milestone, due, days_remaining).await {
                Ok(true) => report.reminders.push(ReminderSent { order_number: order.order_number.clone(), milestone }),
                Ok(false) => trace!("🕰️ Reminder {milestone} for order {} was already sent", order.order_number),
                Err(e) => {
                    warn!("🕰️ Could not send reminder {milestone} for order {}. {e}", order.order_number);
                    report.fail(Some(&order.order_number), SweepStage::Reminder, e);
                },
            }
        }
    }

    async fn remind(
        &self,
        order: &Order,
        milestone: ReminderMilestone,
        due: NaiveDate,
        days_remaining: i64,
    ) -> Result<bool, LifecycleError> {
        let payments = self.db.fetch_payments(order.id).await?;
        let outstanding = LedgerSummary::from_payments(&payments).outstanding_remainder(order.remainder_amount);
        if !outstanding.is_positive() {
            return Ok(false);
        }
        if !self.db.claim_reminder(order.id, milestone).await? {
            return Ok(false);
        }
        let notification = Notification::new(&order.customer_ref, NotificationTemplate::RemainderReminder)
            .with_var("order_number", &order.order_number)
            .with_var("outstanding", outstanding)
            .with_var("due_date", due)
            .with_var("days_remaining", days_remaining);
        self.send_claimed(order, milestone, notification).await?;
        debug!("🕰️ Sent reminder {milestone} to order {}", order.order_number);
        Ok(true)
    }

    async fn send_pre_fulfillment_reminders(&self, today: NaiveDate, report: &mut SweepReport) {
        let candidates = match self.db.fetch_pre_fulfillment_candidates(today).await {
            Ok(orders) => orders,
            Err(e) => {
                error!("🕰️ Could not fetch pre-fulfillment candidates. {e}");
                report.fail(None, SweepStage::PreFulfillment, e);
                return;
            },
        };
        for order in candidates {
            let milestone = ReminderMilestone::PreFulfillment;
            let result = self.pre_fulfillment_reminder(&order, milestone).await;
            match result {
                Ok(true) => report.pre_fulfillment.push(order.order_number.clone()),
                Ok(false) => trace!("🕰️ Pre-fulfillment reminder for order {} was already sent", order.order_number),
                Err(e) => {
                    warn!("🕰️ Could not send pre-fulfillment reminder for order {}. {e}", order.order_number);
                    report.fail(Some(&order.order_number), SweepStage::PreFulfillment, e);
                },
            }
        }
    }

    async fn pre_fulfillment_reminder(&self, order: &Order, milestone: ReminderMilestone) -> Result<bool, LifecycleError> {
        if !self.db.claim_reminder(order.id, milestone).await? {
            return Ok(false);
        }
        let notification = Notification::new(&order.customer_ref, NotificationTemplate::PreFulfillmentReminder)
            .with_var("order_number", &order.order_number)
            .with_var("fulfillment_date", order.fulfillment_date)
            .with_var("delivery_method", &order.delivery_method);
        self.send_claimed(order, milestone, notification).await?;
        Ok(true)
    }

    /// Sends a notification for a milestone that has already been claimed. If sending fails, the claim is handed
    /// back so that the next sweep tries again.
    async fn send_claimed(
        &self,
        order: &Order,
        milestone: ReminderMilestone,
        notification: Notification,
    ) -> Result<(), LifecycleError> {
        if let Err(e) = self.notifier.send(notification).await {
            if let Err(unclaim) = self.db.unclaim_reminder(order.id, milestone).await {
                error!(
                    "🕰️ Could not hand back reminder {milestone} for order {}. It will not be retried. {unclaim}",
                    order.order_number
                );
            }
            return Err(LifecycleError::NotificationFailed(e.to_string()));
        }
        Ok(())
    }
}
