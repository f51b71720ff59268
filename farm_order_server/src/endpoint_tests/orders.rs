use actix_web::{http::StatusCode, test::TestRequest};
use farm_common::MinorUnits;
use farm_order_engine::{
    db_types::{InventoryUnit, Order, OrderStatusType, PaymentStatus, PaymentType},
    order_objects::{OrderDetails, OrderPaymentResult},
};
use serde_json::json;

use super::{
    helpers::{pig_box_checkout, TestEnv},
    mocks::{approving_provider, declining_provider, idle_provider},
};

async fn place_order(env: &TestEnv, unit_id: i64, fulfillment_in_days: i64) -> OrderPaymentResult {
    let req = TestRequest::post().uri("/orders").set_json(pig_box_checkout(unit_id, fulfillment_in_days));
    let (status, body) = env.send(approving_provider(), req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    serde_json::from_str(&body).expect("Not an order payment result")
}

#[actix_web::test]
async fn health_check() {
    let env = TestEnv::new().await;
    let (status, body) = env.send(idle_provider(), TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
    env.tear_down().await;
}

#[actix_web::test]
async fn checkout_collects_the_deposit() {
    let env = TestEnv::new().await;
    let unit = env.pig_box_unit(2).await;
    let result = place_order(&env, unit.id, 30).await;
    assert_eq!(result.order.status, OrderStatusType::DepositPaid);
    assert_eq!(result.order.deposit_amount, MinorUnits::from(5_000));
    assert_eq!(result.order.remainder_amount, MinorUnits::from(5_000));
    assert_eq!(result.payment.payment_type, PaymentType::Deposit);
    assert_eq!(result.payment.status, PaymentStatus::Completed);

    let req = TestRequest::get().uri(&format!("/inventory/{}", unit.id));
    let (status, body) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::OK);
    let unit: InventoryUnit = serde_json::from_str(&body).unwrap();
    assert_eq!(unit.remaining(), 1);
    env.tear_down().await;
}

#[actix_web::test]
async fn checkout_beyond_capacity_is_a_conflict() {
    let env = TestEnv::new().await;
    let unit = env.pig_box_unit(1).await;
    place_order(&env, unit.id, 30).await;
    let req = TestRequest::post().uri("/orders").set_json(pig_box_checkout(unit.id, 30));
    let (status, body) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        json["error"],
        "Not enough inventory remaining in pig-box-spring: 1 requested, but only 0 left"
    );
    env.tear_down().await;
}

#[actix_web::test]
async fn declined_deposit_is_reported_and_releases_inventory() {
    let env = TestEnv::new().await;
    let unit = env.pig_box_unit(1).await;
    let req = TestRequest::post().uri("/orders").set_json(pig_box_checkout(unit.id, 30));
    let (status, body) = env.send(declining_provider(), req).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY, "{body}");
    // the unit is free again
    place_order(&env, unit.id, 30).await;
    env.tear_down().await;
}

#[actix_web::test]
async fn unknown_and_malformed_order_numbers() {
    let env = TestEnv::new().await;
    let (status, _) = env.send(idle_provider(), TestRequest::get().uri("/orders/FB-ABCDEF")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = env.send(idle_provider(), TestRequest::get().uri("/orders/order-1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("not a valid order number"), "{body}");
    env.tear_down().await;
}

#[actix_web::test]
async fn amend_then_pay_remainder() {
    let env = TestEnv::new().await;
    let unit = env.pig_box_unit(2).await;
    let placed = place_order(&env, unit.id, 30).await;
    let number = placed.order.order_number.to_string();

    let amendment = json!({
        "expected_version": placed.order.version,
        "items": [{ "product_code": "sausages", "inventory_unit_id": null, "quantity": 1 }]
    });
    let req = TestRequest::post().uri(&format!("/orders/{number}/amendments")).set_json(amendment.clone());
    let (status, body) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let amended: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(amended.remainder_amount, MinorUnits::from(7_000));
    assert_eq!(amended.total_amount, MinorUnits::from(12_000));

    // The same edit against the old version is stale
    let req = TestRequest::post().uri(&format!("/orders/{number}/amendments")).set_json(amendment);
    let (status, _) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = TestRequest::post().uri(&format!("/orders/{number}/remainder"));
    let (status, body) = env.send(approving_provider(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let paid: OrderPaymentResult = serde_json::from_str(&body).unwrap();
    assert_eq!(paid.payment.amount, MinorUnits::from(7_000));
    assert_eq!(paid.order.status, OrderStatusType::FullyPaid);

    let (status, body) = env.send(idle_provider(), TestRequest::get().uri(&format!("/orders/{number}"))).await;
    assert_eq!(status, StatusCode::OK);
    let details: OrderDetails = serde_json::from_str(&body).unwrap();
    assert_eq!(details.payments.len(), 2);
    assert_eq!(details.amendments.len(), 1);
    assert!(details.outstanding_remainder.is_zero());
    env.tear_down().await;
}

#[actix_web::test]
async fn locked_orders_cannot_be_amended() {
    let env = TestEnv::new().await;
    let unit = env.pig_box_unit(2).await;
    let placed = place_order(&env, unit.id, 30).await;
    let number = placed.order.order_number.to_string();

    let (status, body) = env.send(idle_provider(), TestRequest::post().uri(&format!("/orders/{number}/lock"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let amendment = json!({ "items": [{ "product_code": "bacon", "quantity": 2 }] });
    let req = TestRequest::post().uri(&format!("/orders/{number}/amendments")).set_json(amendment.clone());
    let (status, _) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::LOCKED);

    let (status, _) = env.send(idle_provider(), TestRequest::post().uri(&format!("/orders/{number}/unlock"))).await;
    assert_eq!(status, StatusCode::OK);
    let req = TestRequest::post().uri(&format!("/orders/{number}/amendments")).set_json(amendment);
    let (status, _) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::OK);
    env.tear_down().await;
}

#[actix_web::test]
async fn delivery_method_can_be_changed() {
    let env = TestEnv::new().await;
    let unit = env.pig_box_unit(2).await;
    let placed = place_order(&env, unit.id, 30).await;
    let number = placed.order.order_number.to_string();

    let change = json!({ "expected_version": placed.order.version, "delivery_method": "courier" });
    let req = TestRequest::post().uri(&format!("/orders/{number}/delivery")).set_json(change.clone());
    let (status, body) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.delivery_method, "courier");
    assert_eq!(order.delivery_fee, MinorUnits::from(800));
    assert_eq!(order.remainder_amount, MinorUnits::from(5_800));

    let req = TestRequest::post().uri(&format!("/orders/{number}/delivery")).set_json(change);
    let (status, _) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let req = TestRequest::post()
        .uri(&format!("/orders/{number}/delivery"))
        .set_json(json!({ "delivery_method": "carrier-pigeon" }));
    let (status, _) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    env.tear_down().await;
}

#[actix_web::test]
async fn admin_transitions() {
    let env = TestEnv::new().await;
    let unit = env.pig_box_unit(2).await;
    // Paid in full at checkout
    let short_notice = place_order(&env, unit.id, 10).await;
    let number = short_notice.order.order_number.to_string();
    assert_eq!(short_notice.order.status, OrderStatusType::FullyPaid);

    let (status, body) = env.send(idle_provider(), TestRequest::post().uri(&format!("/orders/{number}/ready"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::ReadyForPickup);
    let req = TestRequest::post().uri(&format!("/orders/{number}/complete"));
    let (status, body) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Completed);

    // A deposit-paid order cannot be handed over yet, but it can be cancelled
    let pending = place_order(&env, unit.id, 30).await;
    let number = pending.order.order_number.to_string();
    let (status, _) = env.send(idle_provider(), TestRequest::post().uri(&format!("/orders/{number}/ready"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let req = TestRequest::post()
        .uri(&format!("/orders/{number}/cancel"))
        .set_json(json!({ "reason": "customer moved away" }));
    let (status, body) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let order: Order = serde_json::from_str(&body).unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert_eq!(order.status_reason.as_deref(), Some("customer moved away"));

    let (_, body) = env.send(idle_provider(), TestRequest::get().uri(&format!("/inventory/{}", unit.id))).await;
    let unit: InventoryUnit = serde_json::from_str(&body).unwrap();
    // the completed order keeps its box, the cancelled one gives it back
    assert_eq!(unit.allocated, 1);
    env.tear_down().await;
}
