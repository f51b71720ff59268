use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use chrono::{Duration, NaiveDate};
use farm_common::Secret;
use farm_order_engine::{
    db_types::{InventoryKind, InventoryUnit, ProductLine},
    events::EventProducers,
    order_objects::{CheckoutItem, CheckoutRequest},
    pricing::PricingConfig,
    test_utils::{
        prepare_env::{prepare_test_env, random_db_path},
        seed::{seed_unit, test_pricing_config},
    },
    AmendmentApi,
    ForfeitureApi,
    IntegrityApi,
    InventoryApi,
    LifecyclePolicy,
    OrderFlowApi,
    SqliteDatabase,
};
use log::debug;

use crate::{
    config::WebhookConfig,
    endpoint_tests::mocks::MockProvider,
    helpers::today,
    integrations::LogNotifier,
    server::configure_routes,
};

pub const WEBHOOK_SECRET: &str = "farm-webhook-test-secret";

pub struct TestEnv {
    pub url: String,
    pub db: SqliteDatabase,
}

impl TestEnv {
    pub async fn new() -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        Self { url, db }
    }

    pub async fn pig_box_unit(&self, capacity: i64) -> InventoryUnit {
        seed_unit(&self.db, "pig-box-spring", InventoryKind::BoxPreset, capacity, None).await
    }

    /// Sends a single request through the full route table, with `provider` behind the order flow
    pub async fn send(&self, provider: MockProvider, req: TestRequest) -> (StatusCode, String) {
        let db = self.db.clone();
        let app = App::new().configure(move |cfg| configure(cfg, db, provider));
        let service = test::init_service(app).await;
        debug!("Making request");
        match test::try_call_service(&service, req.to_request()).await {
            Ok(res) => {
                let status = res.status();
                let body = test::read_body(res).await;
                (status, String::from_utf8_lossy(&body).into_owned())
            },
            Err(e) => (e.as_response_error().status_code(), e.to_string()),
        }
    }

    pub async fn tear_down(self) {
        self.db.pool().close().await;
        let _ = std::fs::remove_file(self.url.trim_start_matches("sqlite://"));
    }
}

pub fn days_from_today(days: i64) -> NaiveDate {
    today() + Duration::days(days)
}

pub fn pig_box_checkout(unit_id: i64, fulfillment_in_days: i64) -> CheckoutRequest {
    CheckoutRequest::new("alice@example.com", ProductLine::PigBox, days_from_today(fulfillment_in_days))
        .with_item(CheckoutItem::new("pig_box_10kg", Some(unit_id), 1))
}

pub fn webhook_config() -> WebhookConfig {
    WebhookConfig { hmac_secret: Secret::new(WEBHOOK_SECRET.to_string()), hmac_checks: true }
}

fn configure(cfg: &mut ServiceConfig, db: SqliteDatabase, provider: MockProvider) {
    let policy = LifecyclePolicy { provider_timeout: std::time::Duration::from_millis(200), ..Default::default() };
    let pricing = test_pricing_config();
    let producers = EventProducers::default();
    let orders_api = OrderFlowApi::new(db.clone(), provider, pricing.clone(), policy.clone(), producers.clone());
    let amendments_api = AmendmentApi::new(db.clone(), pricing, policy.clone(), producers.clone());
    let sweep_api = ForfeitureApi::new(db.clone(), LogNotifier, policy, producers);
    cfg.app_data(web::Data::new(orders_api))
        .app_data(web::Data::new(amendments_api))
        .app_data(web::Data::new(sweep_api))
        .app_data(web::Data::new(InventoryApi::new(db.clone())))
        .app_data(web::Data::new(IntegrityApi::new(db)));
    configure_routes::<SqliteDatabase, MockProvider, PricingConfig, LogNotifier>(cfg, &webhook_config());
}
