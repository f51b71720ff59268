//! `SqliteDatabase` is a concrete implementation of a farm order engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the storage traits defined in the [`crate::traits`]
//! module.
//!
//! SQLite only allows one writer at a time. Every write transaction in here issues a write as its first statement,
//! so that the write lock is taken (and waited for) up front, rather than upgraded from a read lock halfway through.
use std::fmt::Debug;

use chrono::{Duration, NaiveDate};
use farm_common::MinorUnits;
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{amendments, db_url, discounts, integrity, inventory, new_pool, orders, payments, reminders};
use crate::{
    amendment_plan::AmendmentPlan,
    db_types::{
        Amendment,
        DiscountCode,
        InventoryUnit,
        NewDiscountCode,
        NewInventoryUnit,
        NewOrder,
        NewPayment,
        Order,
        OrderItem,
        OrderNumber,
        OrderStatusType,
        Payment,
        PaymentStatus,
        PaymentType,
        ReminderMilestone,
    },
    state_machine::{order_status, LedgerSummary},
    traits::{
        DiscountCodeStore,
        IntegrityChecks,
        IntegrityIssue,
        InventoryManagement,
        LifecycleDatabase,
        LifecycleError,
        PaymentSettlement,
        PaymentUpdate,
    },
};

pub const DEPOSIT_FAILED_REASON: &str = "deposit payment failed";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `FARM_DATABASE_URL` or the default location.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn find_payment(&self, update: &PaymentUpdate) -> Result<Payment, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        if let Some(provider_ref) = update.provider_ref.as_deref() {
            if let Some(p) = payments::fetch_by_provider_ref(provider_ref, &mut conn).await? {
                return Ok(p);
            }
        }
        if let Some(payment_ref) = update.payment_ref.as_deref() {
            if let Some(p) = payments::fetch_by_ref(payment_ref, &mut conn).await? {
                return Ok(p);
            }
        }
        Err(LifecycleError::PaymentNotFound(update.reference()))
    }

    async fn unchanged_settlement(&self, payment: Payment) -> Result<PaymentSettlement, LifecycleError> {
        let order = self
            .fetch_order_by_id(payment.order_id)
            .await?
            .ok_or_else(|| LifecycleError::OrderNotFound(format!("#{}", payment.order_id)))?;
        Ok(PaymentSettlement {
            payment,
            old_order: order.clone(),
            order,
            changed: false,
            duplicate_deposit: false,
            released: false,
        })
    }
}

impl LifecycleDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order_with_reservations(&self, order: NewOrder) -> Result<Order, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        for (unit, quantity) in order.reservations() {
            inventory::reserve(unit, quantity, &mut tx).await?;
        }
        let saved = orders::insert_order(&order, &mut tx).await?;
        for item in &order.items {
            orders::insert_item(saved.id, item, &mut tx).await?;
        }
        if let Some(code) = order.discount.code() {
            discounts::record_usage(code, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Order {} saved with id {} and {} line items", saved.order_number, saved.id, order.items.len());
        Ok(saved)
    }

    async fn fetch_order(&self, order_number: &OrderNumber) -> Result<Option<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_number(order_number, &mut conn).await?)
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_order_by_id(id, &mut conn).await?)
    }

    async fn fetch_order_items(&self, order_id: i64) -> Result<Vec<OrderItem>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_items(order_id, &mut conn).await?)
    }

    async fn fetch_amendments(&self, order_id: i64) -> Result<Vec<Amendment>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(amendments::fetch_for_order(order_id, &mut conn).await?)
    }

    async fn fetch_payments(&self, order_id: i64) -> Result<Vec<Payment>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_for_order(order_id, &mut conn).await?)
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::insert_payment(payment, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn fetch_payment_by_ref(&self, payment_ref: &str) -> Result<Option<Payment>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(payments::fetch_by_ref(payment_ref, &mut conn).await?)
    }

    async fn settle_payment(&self, update: PaymentUpdate) -> Result<PaymentSettlement, LifecycleError> {
        let existing = self.find_payment(&update).await?;
        let reference = update.reference();
        match (existing.status, update.status) {
            (PaymentStatus::Completed, new_status) => {
                if new_status != PaymentStatus::Completed {
                    warn!(
                        "💰️ Payment {reference} is already completed and cannot become {new_status}. If the money \
                         really was returned, record it through the refund path."
                    );
                } else {
                    debug!("💰️ Payment {reference} is already completed. Nothing to do.");
                }
                return self.unchanged_settlement(existing).await;
            },
            (PaymentStatus::Failed, PaymentStatus::Pending) => {
                debug!("💰️ Payment {reference} has already failed. Ignoring the pending notification.");
                return self.unchanged_settlement(existing).await;
            },
            (old, new) if old == new && (update.provider_ref.is_none() || update.provider_ref == existing.provider_ref) => {
                debug!("💰️ Payment {reference} is already {old}. Nothing to do.");
                return self.unchanged_settlement(existing).await;
            },
            _ => {},
        }

        let mut tx = self.pool.begin().await?;
        let paid_at = match update.status {
            PaymentStatus::Completed => Some(update.paid_at.unwrap_or_else(chrono::Utc::now)),
            _ => None,
        };
        let payment =
            match payments::update_outcome(existing.id, update.status, update.provider_ref.as_deref(), paid_at, &mut tx)
                .await?
            {
                Some(p) => p,
                None => {
                    // completed by a concurrent update since we looked
                    tx.commit().await?;
                    let current = self.find_payment(&update).await?;
                    return self.unchanged_settlement(current).await;
                },
            };
        let old_order = orders::fetch_order_by_id(payment.order_id, &mut tx)
            .await?
            .ok_or_else(|| LifecycleError::OrderNotFound(format!("#{}", payment.order_id)))?;
        let ledger = payments::fetch_for_order(payment.order_id, &mut tx).await?;
        let summary = LedgerSummary::from_payments(&ledger);
        let is_deposit = payment.payment_type == PaymentType::Deposit;
        let duplicate_deposit = is_deposit && payment.status == PaymentStatus::Completed && summary.completed_deposits > 1;
        if duplicate_deposit {
            error!(
                "💰️ Order {} now has {} completed deposits. The payment has been recorded, but needs manual attention.",
                old_order.order_number, summary.completed_deposits
            );
        }
        let mut order = old_order.clone();
        let mut released = false;
        if is_deposit &&
            payment.status == PaymentStatus::Failed &&
            summary.completed_deposits == 0 &&
            order.manual_status.is_none()
        {
            orders::release_order_inventory(order.id, &mut tx).await?;
            order = orders::set_manual_status(order.id, OrderStatusType::Cancelled, DEPOSIT_FAILED_REASON, &mut tx).await?;
            released = true;
            info!("💰️ Deposit for order {} failed. The order is cancelled and its inventory released.", order.order_number);
        }
        let status = order_status(&order, &ledger);
        if status != order.status {
            order = orders::update_status(order.id, status, &mut tx).await?;
            debug!("💰️ Order {} moved from {} to {status}", order.order_number, old_order.status);
        }
        tx.commit().await?;
        Ok(PaymentSettlement { payment, old_order, order, changed: true, duplicate_deposit, released })
    }

    async fn apply_amendment_plan(
        &self,
        order_id: i64,
        expected_version: i64,
        plan: AmendmentPlan,
        remainder_due_date: NaiveDate,
    ) -> Result<Order, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let claimed = orders::claim_version(order_id, expected_version, &mut tx).await?;
        for (unit, delta) in &plan.inventory_deltas {
            inventory::adjust(*unit, *delta, &mut tx).await?;
        }
        amendments::replace_for_order(order_id, &plan.rows, &mut tx).await?;
        let mut order = orders::update_totals(order_id, plan.amendments_total, remainder_due_date, &mut tx).await?;
        let ledger = payments::fetch_for_order(order_id, &mut tx).await?;
        let status = order_status(&order, &ledger);
        if status != order.status {
            order = orders::update_status(order_id, status, &mut tx).await?;
        }
        tx.commit().await?;
        debug!(
            "🗃️ Order {} amended to version {}. Total {} -> {}, remainder {} -> {}",
            order.order_number,
            order.version,
            claimed.total_amount,
            order.total_amount,
            claimed.remainder_amount,
            order.remainder_amount
        );
        Ok(order)
    }

    async fn apply_delivery_change(
        &self,
        order_id: i64,
        expected_version: i64,
        delivery_method: &str,
        delivery_fee: MinorUnits,
        remainder_due_date: NaiveDate,
    ) -> Result<Order, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let claimed = orders::claim_version(order_id, expected_version, &mut tx).await?;
        let mut order =
            orders::update_delivery(order_id, delivery_method, delivery_fee, remainder_due_date, &mut tx).await?;
        let ledger = payments::fetch_for_order(order_id, &mut tx).await?;
        let status = order_status(&order, &ledger);
        if status != order.status {
            order = orders::update_status(order_id, status, &mut tx).await?;
        }
        tx.commit().await?;
        debug!(
            "🗃️ Order {} switched from {} to {} delivery. Total {} -> {}",
            order.order_number, claimed.delivery_method, order.delivery_method, claimed.total_amount, order.total_amount
        );
        Ok(order)
    }

    async fn set_locked(&self, order_id: i64, expected_version: i64, locked: bool) -> Result<Order, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        orders::claim_version(order_id, expected_version, &mut tx).await?;
        let order = orders::set_locked(order_id, locked, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn set_manual_status(
        &self,
        order_id: i64,
        expected_version: i64,
        status: OrderStatusType,
        reason: &str,
        release_inventory: bool,
    ) -> Result<Order, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        orders::claim_version(order_id, expected_version, &mut tx).await?;
        if release_inventory {
            orders::release_order_inventory(order_id, &mut tx).await?;
        }
        let order = orders::set_manual_status(order_id, status, reason, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_overdue_orders(&self, today: NaiveDate) -> Result<Vec<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(orders::fetch_overdue(today, &mut conn).await?)
    }

    async fn forfeit_order(
        &self,
        order_id: i64,
        today: NaiveDate,
        reason: &str,
    ) -> Result<Option<Order>, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let forfeited = orders::forfeit_if_overdue(order_id, today, reason, &mut tx).await?;
        if forfeited.is_some() {
            orders::release_order_inventory(order_id, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(forfeited)
    }

    async fn fetch_reminder_candidates(
        &self,
        today: NaiveDate,
        horizon_days: i64,
    ) -> Result<Vec<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        let horizon = today + Duration::days(horizon_days);
        Ok(orders::fetch_due_within(today, horizon, &mut conn).await?)
    }

    async fn fetch_pre_fulfillment_candidates(&self, today: NaiveDate) -> Result<Vec<Order>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        let tomorrow = today + Duration::days(1);
        Ok(orders::fetch_fulfilled_between(today, tomorrow, &mut conn).await?)
    }

    async fn claim_reminder(&self, order_id: i64, milestone: ReminderMilestone) -> Result<bool, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let claimed = reminders::claim(order_id, milestone, &mut tx).await?;
        tx.commit().await?;
        Ok(claimed)
    }

    async fn unclaim_reminder(&self, order_id: i64, milestone: ReminderMilestone) -> Result<(), LifecycleError> {
        let mut tx = self.pool.begin().await?;
        reminders::unclaim(order_id, milestone, &mut tx).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn fetch_sent_reminders(&self, order_id: i64) -> Result<Vec<ReminderMilestone>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(reminders::fetch_for_order(order_id, &mut conn).await?)
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn create_unit(&self, unit: NewInventoryUnit) -> Result<InventoryUnit, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let unit = inventory::insert_unit(unit, &mut tx).await?;
        tx.commit().await?;
        Ok(unit)
    }

    async fn fetch_unit(&self, id: i64) -> Result<Option<InventoryUnit>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(inventory::fetch_unit(id, &mut conn).await?)
    }

    async fn fetch_unit_by_code(&self, code: &str) -> Result<Option<InventoryUnit>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(inventory::fetch_unit_by_code(code, &mut conn).await?)
    }

    async fn fetch_units(&self) -> Result<Vec<InventoryUnit>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(inventory::fetch_units(&mut conn).await?)
    }

    async fn reserve(&self, unit_id: i64, quantity: i64) -> Result<InventoryUnit, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let unit = inventory::reserve(unit_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(unit)
    }

    async fn release(&self, unit_id: i64, quantity: i64) -> Result<InventoryUnit, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let unit = inventory::release(unit_id, quantity, &mut tx).await?;
        tx.commit().await?;
        Ok(unit)
    }

    async fn adjust(&self, unit_id: i64, delta: i64) -> Result<InventoryUnit, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let unit = inventory::adjust(unit_id, delta, &mut tx).await?;
        tx.commit().await?;
        Ok(unit)
    }

    async fn set_capacity(&self, unit_id: i64, capacity: i64) -> Result<InventoryUnit, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let unit = inventory::set_capacity(unit_id, capacity, &mut tx).await?;
        tx.commit().await?;
        Ok(unit)
    }
}

impl DiscountCodeStore for SqliteDatabase {
    async fn lookup_code(&self, code: &str) -> Result<Option<DiscountCode>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(discounts::lookup_active(code, &mut conn).await?)
    }

    async fn create_code(&self, code: NewDiscountCode) -> Result<DiscountCode, LifecycleError> {
        let mut tx = self.pool.begin().await?;
        let code = discounts::insert_code(code, &mut tx).await?;
        tx.commit().await?;
        Ok(code)
    }

    async fn fetch_codes(&self) -> Result<Vec<DiscountCode>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(discounts::fetch_codes(&mut conn).await?)
    }
}

impl IntegrityChecks for SqliteDatabase {
    async fn find_duplicate_deposits(&self) -> Result<Vec<IntegrityIssue>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(integrity::duplicate_deposits(&mut conn).await?)
    }

    async fn find_total_mismatches(&self) -> Result<Vec<IntegrityIssue>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(integrity::total_mismatches(&mut conn).await?)
    }

    async fn find_allocation_out_of_bounds(&self) -> Result<Vec<IntegrityIssue>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(integrity::allocation_out_of_bounds(&mut conn).await?)
    }

    async fn find_allocation_drift(&self) -> Result<Vec<IntegrityIssue>, LifecycleError> {
        let mut conn = self.pool.acquire().await?;
        Ok(integrity::allocation_drift(&mut conn).await?)
    }
}
