use cucumber::{then, when};
use farm_common::MinorUnits;
use farm_order_engine::{
    amendment_plan::RequestedAmendment,
    db_types::{OrderStatusType, ProductLine},
    order_objects::{CheckoutItem, CheckoutRequest},
    traits::{InventoryManagement, LifecycleDatabase},
    LifecycleError,
};

use crate::{
    cucumber::FarmWorld,
    support::{days_from_today, today},
};

async fn checkout(world: &mut FarmWorld, customer: String, request: CheckoutRequest) {
    let result = world.system().flow.checkout(request, today()).await;
    match result {
        Ok(result) => {
            world.orders.insert(customer, result.order.order_number);
            world.last_error = None;
        },
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "{word} orders a pig box from {string} for fulfillment in {int} days")]
async fn order_pig_box(world: &mut FarmWorld, customer: String, unit: String, days: i64) {
    let request = CheckoutRequest::new(format!("{customer}@example.com"), ProductLine::PigBox, days_from_today(days))
        .with_item(CheckoutItem::new("pig_box_10kg", Some(world.unit_id(&unit)), 1));
    checkout(world, customer, request).await;
}

#[when(expr = "{word} orders a pig box from {string} with code {string} for fulfillment in {int} days")]
async fn order_pig_box_with_code(world: &mut FarmWorld, customer: String, unit: String, code: String, days: i64) {
    let request = CheckoutRequest::new(format!("{customer}@example.com"), ProductLine::PigBox, days_from_today(days))
        .with_item(CheckoutItem::new("pig_box_10kg", Some(world.unit_id(&unit)), 1))
        .with_discount_code(code);
    checkout(world, customer, request).await;
}

#[when(expr = "{word} orders {int} eggs from {string} for fulfillment in {int} days")]
async fn order_eggs(world: &mut FarmWorld, customer: String, quantity: i64, unit: String, days: i64) {
    let request =
        CheckoutRequest::new(format!("{customer}@example.com"), ProductLine::HatchingEggs, days_from_today(days))
            .with_item(CheckoutItem::new("egg_marans", Some(world.unit_id(&unit)), quantity));
    checkout(world, customer, request).await;
}

async fn amend(world: &mut FarmWorld, customer: &str, requested: Vec<RequestedAmendment>) {
    let order_number = world.order_number(customer);
    let result = world.system().amendments.amend(&order_number, None, requested, today()).await;
    match result {
        Ok(_) => world.last_error = None,
        Err(e) => world.last_error = Some(e),
    }
}

#[when(expr = "{word} changes the extras to {int} x {word}")]
async fn change_extras(world: &mut FarmWorld, customer: String, quantity: i64, product: String) {
    amend(world, &customer, vec![RequestedAmendment::new(product, None, quantity)]).await;
}

#[when(expr = "{word} changes the extra eggs to {int} from {string}")]
async fn change_extra_eggs(world: &mut FarmWorld, customer: String, quantity: i64, unit: String) {
    let unit_id = world.unit_id(&unit);
    amend(world, &customer, vec![RequestedAmendment::new("egg_marans", Some(unit_id), quantity)]).await;
}

#[when(expr = "{word} removes all extras")]
async fn remove_extras(world: &mut FarmWorld, customer: String) {
    amend(world, &customer, vec![]).await;
}

#[when(expr = "{word} pays the remainder")]
async fn pay_remainder(world: &mut FarmWorld, customer: String) {
    let order_number = world.order_number(&customer);
    world.system().flow.pay_remainder(&order_number).await.expect("Error paying remainder");
}

#[when(expr = "the scheduler runs {int} days from now")]
async fn run_scheduler(world: &mut FarmWorld, days: i64) {
    let report = world.system().sweeper.sweep(days_from_today(days)).await;
    world.last_report = Some(report);
}

#[then(expr = "{word}'s order has deposit {int}, remainder {int} and total {int}")]
async fn check_totals(world: &mut FarmWorld, customer: String, deposit: i64, remainder: i64, total: i64) {
    let order_number = world.order_number(&customer);
    let order = world.system().db.fetch_order(&order_number).await.unwrap().expect("Order does not exist");
    assert_eq!(order.deposit_amount, MinorUnits::from(deposit), "Deposit is incorrect");
    assert_eq!(order.remainder_amount, MinorUnits::from(remainder), "Remainder is incorrect");
    assert_eq!(order.total_amount, MinorUnits::from(total), "Total is incorrect");
    assert!(order.is_balanced());
}

#[then(expr = "{word}'s order is {word}")]
async fn check_status(world: &mut FarmWorld, customer: String, status: String) {
    let expected: OrderStatusType = status.parse().expect("Not a valid order status");
    let order_number = world.order_number(&customer);
    let order = world.system().db.fetch_order(&order_number).await.unwrap().expect("Order does not exist");
    assert_eq!(order.status, expected);
}

#[then(expr = "{string} has {int} remaining")]
async fn check_remaining(world: &mut FarmWorld, unit: String, remaining: i64) {
    let unit_id = world.unit_id(&unit);
    let unit = world.system().db.fetch_unit(unit_id).await.unwrap().expect("Unit does not exist");
    assert_eq!(unit.remaining(), remaining);
}

#[then("the request is rejected for insufficient inventory")]
async fn check_insufficient(world: &mut FarmWorld) {
    assert!(
        matches!(world.last_error, Some(LifecycleError::InsufficientInventory { .. })),
        "Expected insufficient inventory, got {:?}",
        world.last_error
    );
}

#[then("the request is rejected because decreases are closed")]
async fn check_decrease_refused(world: &mut FarmWorld) {
    assert!(
        matches!(world.last_error, Some(LifecycleError::DecreaseNotAllowed(_))),
        "Expected a refused decrease, got {:?}",
        world.last_error
    );
}

#[then(expr = "{int} order(s) was/were forfeited")]
async fn check_forfeited(world: &mut FarmWorld, count: usize) {
    let report = world.last_report.as_ref().expect("The scheduler has not run");
    assert_eq!(report.forfeited.len(), count);
}

#[then(expr = "{int} reminder(s) was/were sent")]
async fn check_reminders(world: &mut FarmWorld, count: usize) {
    let report = world.last_report.as_ref().expect("The scheduler has not run");
    assert_eq!(report.reminders.len(), count);
}
