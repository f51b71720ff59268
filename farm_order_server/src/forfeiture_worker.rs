use std::time::Duration;

use farm_order_engine::{
    events::EventProducers,
    order_objects::SweepReport,
    ForfeitureApi,
    LifecyclePolicy,
    SqliteDatabase,
};
use log::*;
use tokio::task::JoinHandle;

use crate::{helpers::today, integrations::LogNotifier};

/// Starts the forfeiture worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each tick runs one full sweep: forfeit overdue remainders, then send remainder reminders, then pre-fulfillment
/// reminders. Sweeps are idempotent, so a tick that overlaps a manual sweep is harmless.
pub fn start_forfeiture_worker(
    db: SqliteDatabase,
    notifier: LogNotifier,
    policy: LifecyclePolicy,
    producers: EventProducers,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = ForfeitureApi::new(db, notifier, policy, producers);
        info!("🕰️ Forfeiture worker started. Sweeping every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            info!("🕰️ Running forfeiture and reminder sweep");
            let report = api.sweep(today()).await;
            log_report(&report);
        }
    })
}

fn log_report(report: &SweepReport) {
    info!(
        "🕰️ Sweep complete. {} forfeited, {} reminders, {} pre-fulfillment notices, {} failures",
        report.forfeited.len(),
        report.reminders.len(),
        report.pre_fulfillment.len(),
        report.failures.len()
    );
    debug!("🕰️ Forfeited orders: {}", order_list(&report.forfeited));
    for failure in &report.failures {
        let order = failure.order_number.as_ref().map(|o| o.to_string()).unwrap_or_else(|| "-".into());
        warn!("🕰️ {:?} failed for order {order}: {}", failure.stage, failure.error);
    }
}

fn order_list<T: ToString>(orders: &[T]) -> String {
    orders.iter().map(|o| o.to_string()).collect::<Vec<String>>().join(", ")
}
