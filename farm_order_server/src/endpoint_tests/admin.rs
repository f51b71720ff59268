use actix_web::{http::StatusCode, test::TestRequest};
use farm_common::MinorUnits;
use farm_order_engine::{
    db_types::{DiscountCode, DiscountKind, InventoryKind, InventoryUnit, NewDiscountCode, NewInventoryUnit, OrderStatusType},
    order_objects::{IntegrityReport, OrderPaymentResult, RefundOrderPayment, SweepReport},
    traits::{RefundResult, RefundStatus},
};
use serde_json::json;

use super::{
    helpers::{days_from_today, pig_box_checkout, TestEnv},
    mocks::{approving_provider, idle_provider},
};

async fn place_order(env: &TestEnv, unit_id: i64) -> OrderPaymentResult {
    let req = TestRequest::post().uri("/orders").set_json(pig_box_checkout(unit_id, 30));
    let (status, body) = env.send(approving_provider(), req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    serde_json::from_str(&body).unwrap()
}

#[actix_web::test]
async fn create_and_resize_inventory() {
    let env = TestEnv::new().await;
    let mut batch = NewInventoryUnit::new("marans-w14", InventoryKind::EggBatch, 24);
    batch.delivery_week = Some("2026-W14".into());
    let req = TestRequest::post().uri("/inventory").set_json(&batch);
    let (status, body) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let unit: InventoryUnit = serde_json::from_str(&body).unwrap();
    assert_eq!(unit.code, "marans-w14");
    assert_eq!(unit.capacity, 24);
    assert_eq!(unit.allocated, 0);
    assert_eq!(unit.delivery_week.as_deref(), Some("2026-W14"));

    let req = TestRequest::put().uri(&format!("/inventory/{}/capacity", unit.id)).set_json(json!({"capacity": 36}));
    let (status, body) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let resized: InventoryUnit = serde_json::from_str(&body).unwrap();
    assert_eq!(resized.capacity, 36);

    let (status, body) = env.send(idle_provider(), TestRequest::get().uri("/inventory")).await;
    assert_eq!(status, StatusCode::OK);
    let units: Vec<InventoryUnit> = serde_json::from_str(&body).unwrap();
    assert_eq!(units.len(), 1);

    let (status, _) = env.send(idle_provider(), TestRequest::get().uri("/inventory/9999")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    env.tear_down().await;
}

#[actix_web::test]
async fn capacity_cannot_drop_below_reservations() {
    let env = TestEnv::new().await;
    let unit = env.pig_box_unit(3).await;
    place_order(&env, unit.id).await;
    place_order(&env, unit.id).await;

    let req = TestRequest::put().uri(&format!("/inventory/{}/capacity", unit.id)).set_json(json!({"capacity": 1}));
    let (status, body) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (_, body) = env.send(idle_provider(), TestRequest::get().uri(&format!("/inventory/{}", unit.id))).await;
    let unit: InventoryUnit = serde_json::from_str(&body).unwrap();
    assert_eq!(unit.capacity, 3);
    assert_eq!(unit.allocated, 2);
    env.tear_down().await;
}

#[actix_web::test]
async fn create_and_list_discount_codes() {
    let env = TestEnv::new().await;
    let code = NewDiscountCode {
        code: "FRIEND-BOB".into(),
        kind: DiscountKind::Referral,
        discount_amount: MinorUnits::from(1000),
        owner_ref: Some("bob@example.com".into()),
    };
    let (status, body) = env.send(idle_provider(), TestRequest::post().uri("/discount_codes").set_json(&code)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let created: DiscountCode = serde_json::from_str(&body).unwrap();
    assert!(created.active);
    assert_eq!(created.usage_count, 0);

    let (status, body) = env.send(idle_provider(), TestRequest::get().uri("/discount_codes")).await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<DiscountCode> = serde_json::from_str(&body).unwrap();
    assert_eq!(codes.len(), 1);
    assert_eq!(codes[0].code, "FRIEND-BOB");
    assert_eq!(codes[0].discount_amount, MinorUnits::from(1000));
    env.tear_down().await;
}

#[actix_web::test]
async fn manual_sweep_forfeits_overdue_orders() {
    let env = TestEnv::new().await;
    let unit = env.pig_box_unit(2).await;
    let placed = place_order(&env, unit.id).await;
    assert_eq!(placed.order.status, OrderStatusType::DepositPaid);

    let uri = format!("/scheduler/sweep?date={}", days_from_today(26));
    let (status, body) = env.send(idle_provider(), TestRequest::post().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let report: SweepReport = serde_json::from_str(&body).unwrap();
    assert_eq!(report.forfeited, vec![placed.order.order_number.clone()]);
    assert!(report.failures.is_empty());

    let (_, body) = env.send(idle_provider(), TestRequest::get().uri(&format!("/inventory/{}", unit.id))).await;
    let unit: InventoryUnit = serde_json::from_str(&body).unwrap();
    assert_eq!(unit.allocated, 0);

    let (status, body) = env.send(idle_provider(), TestRequest::post().uri(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    let report: SweepReport = serde_json::from_str(&body).unwrap();
    assert!(report.is_empty());

    let (status, body) = env.send(idle_provider(), TestRequest::get().uri("/integrity")).await;
    assert_eq!(status, StatusCode::OK);
    let report: IntegrityReport = serde_json::from_str(&body).unwrap();
    assert!(report.is_healthy(), "{:?}", report.issues);
    env.tear_down().await;
}

#[actix_web::test]
async fn refunds_go_through_the_provider_and_keep_the_reservation() {
    let env = TestEnv::new().await;
    let unit = env.pig_box_unit(2).await;
    let placed = place_order(&env, unit.id).await;

    let refund = RefundOrderPayment {
        payment_ref: placed.payment.payment_ref.clone(),
        amount: MinorUnits::from(1500),
        reason: "damaged box".into(),
    };
    let req = TestRequest::post().uri("/payments/refund").set_json(&refund);
    let (status, body) = env.send(approving_provider(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: RefundResult = serde_json::from_str(&body).unwrap();
    assert_eq!(result.status, RefundStatus::Completed);

    let too_much = RefundOrderPayment { amount: MinorUnits::from(999_999), ..refund };
    let req = TestRequest::post().uri("/payments/refund").set_json(&too_much);
    let (status, _) = env.send(idle_provider(), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = env.send(idle_provider(), TestRequest::get().uri(&format!("/inventory/{}", unit.id))).await;
    let unit: InventoryUnit = serde_json::from_str(&body).unwrap();
    assert_eq!(unit.allocated, 1);
    env.tear_down().await;
}
