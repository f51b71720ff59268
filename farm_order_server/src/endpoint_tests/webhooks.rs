use actix_web::{
    http::{header::ContentType, StatusCode},
    test::TestRequest,
};
use farm_order_engine::{
    db_types::{OrderStatusType, PaymentStatus},
    order_objects::{OrderDetails, OrderPaymentResult},
    traits::PaymentUpdate,
};

use super::{
    helpers::{pig_box_checkout, TestEnv, WEBHOOK_SECRET},
    mocks::{deferring_provider, idle_provider, provider_ref},
};
use crate::{config::WEBHOOK_HMAC_HEADER, data_objects::JsonResponse, helpers::calculate_hmac};

async fn pending_checkout(env: &TestEnv) -> OrderPaymentResult {
    let unit = env.pig_box_unit(2).await;
    let req = TestRequest::post().uri("/orders").set_json(pig_box_checkout(unit.id, 30));
    let (status, body) = env.send(deferring_provider(), req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    serde_json::from_str(&body).unwrap()
}

fn webhook(update: &PaymentUpdate, signature: Option<String>) -> TestRequest {
    let body = serde_json::to_string(update).unwrap();
    let mut req = TestRequest::post().uri("/webhooks/payment").insert_header(ContentType::json());
    if let Some(signature) = signature {
        req = req.insert_header((WEBHOOK_HMAC_HEADER, signature));
    }
    req.set_payload(body)
}

fn signed(update: &PaymentUpdate) -> TestRequest {
    let body = serde_json::to_string(update).unwrap();
    webhook(update, Some(calculate_hmac(WEBHOOK_SECRET, body.as_bytes())))
}

async fn order_status(env: &TestEnv, order_number: &str) -> OrderStatusType {
    let (_, body) = env.send(idle_provider(), TestRequest::get().uri(&format!("/orders/{order_number}"))).await;
    let details: OrderDetails = serde_json::from_str(&body).unwrap();
    details.order.status
}

#[actix_web::test]
async fn signed_webhook_completes_a_pending_deposit() {
    let env = TestEnv::new().await;
    let placed = pending_checkout(&env).await;
    assert_eq!(placed.order.status, OrderStatusType::Draft);
    assert_eq!(placed.payment.status, PaymentStatus::Pending);
    let number = placed.order.order_number.to_string();

    let update = PaymentUpdate::for_provider_ref(provider_ref(&placed.payment.payment_ref), PaymentStatus::Completed);
    let (status, body) = env.send(idle_provider(), signed(&update)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let response: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(response.success);
    assert!(response.message.ends_with("is now completed"), "{}", response.message);
    assert_eq!(order_status(&env, &number).await, OrderStatusType::DepositPaid);

    // At-least-once delivery: the replay changes nothing
    let (status, body) = env.send(idle_provider(), signed(&update)).await;
    assert_eq!(status, StatusCode::OK);
    let response: JsonResponse = serde_json::from_str(&body).unwrap();
    assert!(response.message.ends_with("was already completed"), "{}", response.message);
    assert_eq!(order_status(&env, &number).await, OrderStatusType::DepositPaid);
    env.tear_down().await;
}

#[actix_web::test]
async fn unsigned_or_forged_webhooks_are_refused() {
    let env = TestEnv::new().await;
    let placed = pending_checkout(&env).await;
    let number = placed.order.order_number.to_string();
    let update = PaymentUpdate::for_provider_ref(provider_ref(&placed.payment.payment_ref), PaymentStatus::Completed);

    let (status, _) = env.send(idle_provider(), webhook(&update, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let forged = calculate_hmac("guessed-secret", serde_json::to_string(&update).unwrap().as_bytes());
    let (status, _) = env.send(idle_provider(), webhook(&update, Some(forged))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    assert_eq!(order_status(&env, &number).await, OrderStatusType::Draft);
    env.tear_down().await;
}

#[actix_web::test]
async fn failed_deposit_webhook_cancels_the_order() {
    let env = TestEnv::new().await;
    let placed = pending_checkout(&env).await;
    let number = placed.order.order_number.to_string();

    let update = PaymentUpdate::for_payment_ref(&placed.payment.payment_ref, PaymentStatus::Failed);
    let (status, body) = env.send(idle_provider(), signed(&update)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(order_status(&env, &number).await, OrderStatusType::Cancelled);

    // A late success for the same charge cannot resurrect it
    let update = PaymentUpdate::for_payment_ref(&placed.payment.payment_ref, PaymentStatus::Completed);
    let (status, _) = env.send(idle_provider(), signed(&update)).await;
    assert!(status.is_success() || status == StatusCode::CONFLICT, "unexpected status {status}");
    assert_eq!(order_status(&env, &number).await, OrderStatusType::Cancelled);
    env.tear_down().await;
}

#[actix_web::test]
async fn webhook_for_unknown_payment_is_not_found() {
    let env = TestEnv::new().await;
    let update = PaymentUpdate::for_provider_ref("mock-nobody", PaymentStatus::Completed);
    let (status, _) = env.send(idle_provider(), signed(&update)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    env.tear_down().await;
}
