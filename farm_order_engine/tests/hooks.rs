use std::{
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
    time::Duration,
};

use farm_order_engine::{
    amendment_plan::RequestedAmendment,
    db_types::{InventoryKind, OrderStatusType, ProductLine},
    events::{EventHandlers, EventHooks},
    order_objects::{CheckoutItem, CheckoutRequest},
};
use log::*;
use support::{days_from_today, today, ProviderBehaviour, TestSystem};

mod support;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::Relaxed)
    }
}

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

fn counter(hook: &HookCalled) -> impl Fn(String) -> BoxedFuture {
    let hook = hook.clone();
    move |what: String| -> BoxedFuture {
        info!("🪝️ {what}");
        hook.called();
        Box::pin(async {})
    }
}

struct Counters {
    created: HookCalled,
    paid: HookCalled,
    modified: HookCalled,
    annulled: HookCalled,
}

async fn setup() -> (TestSystem, Counters) {
    let counters = Counters {
        created: HookCalled::default(),
        paid: HookCalled::default(),
        modified: HookCalled::default(),
        annulled: HookCalled::default(),
    };
    let mut hooks = EventHooks::default();
    let created = counter(&counters.created);
    let paid = counter(&counters.paid);
    let modified = counter(&counters.modified);
    let annulled = counter(&counters.annulled);
    hooks
        .on_order_created(move |ev| created(format!("created {}", ev.order.order_number)))
        .on_order_paid(move |ev| paid(format!("paid {}", ev.order.order_number)))
        .on_order_modified(move |ev| modified(format!("modified {}", ev.new_order.order_number)))
        .on_order_annulled(move |ev| annulled(format!("annulled {} ({})", ev.order.order_number, ev.status)));
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    (TestSystem::with_producers(producers).await, counters)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

fn order_request(unit_id: i64, fulfillment_in_days: i64) -> CheckoutRequest {
    CheckoutRequest::new("alice@example.com", ProductLine::PigBox, days_from_today(fulfillment_in_days))
        .with_item(CheckoutItem::new("pig_box_10kg", Some(unit_id), 1))
}

#[tokio::test]
async fn order_lifecycle_fires_hooks() {
    let (sys, counters) = setup().await;
    let unit = sys.unit("pig-box-spring", InventoryKind::BoxPreset, 10, None).await;
    let order = sys.flow.checkout(order_request(unit.id, 30), today()).await.unwrap().order;
    settle().await;
    assert_eq!(counters.created.count(), 1);
    assert_eq!(counters.paid.count(), 0);

    let extras = vec![RequestedAmendment::new("sausages", None, 1)];
    sys.amendments.amend(&order.order_number, None, extras, today()).await.unwrap();
    let paid = sys.flow.pay_remainder(&order.order_number).await.unwrap();
    assert_eq!(paid.order.status, OrderStatusType::FullyPaid);
    settle().await;
    assert_eq!(counters.modified.count(), 1);
    assert_eq!(counters.paid.count(), 1);
    assert_eq!(counters.annulled.count(), 0);
    sys.tear_down().await;
}

#[tokio::test]
async fn short_notice_order_is_paid_at_checkout() {
    let (sys, counters) = setup().await;
    let unit = sys.unit("pig-box-spring", InventoryKind::BoxPreset, 10, None).await;
    sys.flow.checkout(order_request(unit.id, 5), today()).await.unwrap();
    settle().await;
    assert_eq!(counters.created.count(), 1);
    assert_eq!(counters.paid.count(), 1);
    sys.tear_down().await;
}

#[tokio::test]
async fn cancellations_forfeitures_and_failed_deposits_annul() {
    let (sys, counters) = setup().await;
    let unit = sys.unit("pig-box-spring", InventoryKind::BoxPreset, 10, None).await;
    let cancelled = sys.flow.checkout(order_request(unit.id, 30), today()).await.unwrap().order;
    sys.flow.cancel_order(&cancelled.order_number, "customer request").await.unwrap();
    let _overdue = sys.flow.checkout(order_request(unit.id, 30), today()).await.unwrap().order;
    let report = sys.sweeper.sweep(days_from_today(26)).await;
    assert_eq!(report.forfeited.len(), 1);
    sys.provider.set_behaviour(ProviderBehaviour::Decline);
    assert!(sys.flow.checkout(order_request(unit.id, 30), today()).await.is_err());
    settle().await;
    assert_eq!(counters.created.count(), 3);
    assert_eq!(counters.annulled.count(), 3);
    assert_eq!(counters.paid.count(), 0);
    assert_eq!(sys.allocated(unit.id).await, 0);
    sys.tear_down().await;
}
