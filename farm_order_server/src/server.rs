use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use farm_order_engine::{
    events::EventProducers,
    traits::{IntegrityChecks, NotificationSender, PaymentProvider},
    AmendmentApi,
    ForfeitureApi,
    IntegrityApi,
    InventoryApi,
    OrderFlowApi,
    PricingConfigSource,
    SqliteDatabase,
};
use log::*;

use crate::{
    config::{ServerConfig, WebhookConfig, WEBHOOK_HMAC_HEADER},
    errors::ServerError,
    forfeiture_worker::start_forfeiture_worker,
    integrations::{create_audit_event_handlers, DeferredPaymentProvider, FilePricingConfig, LogNotifier},
    middleware::WebhookSignature,
    routes::{
        health,
        AmendOrderRoute,
        CancelOrderRoute,
        ChangeDeliveryRoute,
        CheckoutRoute,
        CreateDiscountCodeRoute,
        CreateInventoryUnitRoute,
        DiscountCodesRoute,
        IntegrityReportRoute,
        InventoryUnitRoute,
        InventoryUnitsRoute,
        LockOrderRoute,
        MarkCompletedRoute,
        MarkReadyRoute,
        OrderDetailsRoute,
        OrderStore,
        PayRemainderRoute,
        PaymentWebhookRoute,
        RefundPaymentRoute,
        RunSweepRoute,
        UnlockOrderRoute,
        UpdateCapacityRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Could not run migrations. {e}")))?;
    let handlers = create_audit_event_handlers();
    let producers = handlers.producers();
    tokio::spawn(handlers.start_handlers());
    let _worker = start_forfeiture_worker(
        db.clone(),
        LogNotifier,
        config.policy.clone(),
        producers.clone(),
        config.sweep_interval,
    );
    let srv = create_server_instance(config, db, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        let pricing = FilePricingConfig::new(config.pricing_config_path.clone());
        let policy = config.policy.clone();
        let orders_api =
            OrderFlowApi::new(db.clone(), DeferredPaymentProvider, pricing.clone(), policy.clone(), producers.clone());
        let amendments_api = AmendmentApi::new(db.clone(), pricing, policy.clone(), producers.clone());
        let sweep_api = ForfeitureApi::new(db.clone(), LogNotifier, policy, producers.clone());
        let inventory_api = InventoryApi::new(db.clone());
        let integrity_api = IntegrityApi::new(db.clone());
        let webhook = config.webhook.clone();
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("farm::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(amendments_api))
            .app_data(web::Data::new(sweep_api))
            .app_data(web::Data::new(inventory_api))
            .app_data(web::Data::new(integrity_api))
            .configure(|cfg| {
                configure_routes::<SqliteDatabase, DeferredPaymentProvider, FilePricingConfig, LogNotifier>(
                    cfg, &webhook,
                )
            })
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers every route. The API objects themselves must be registered as app data by the caller.
pub fn configure_routes<B, P, C, N>(cfg: &mut web::ServiceConfig, webhook: &WebhookConfig)
where
    B: OrderStore + IntegrityChecks + 'static,
    P: PaymentProvider + 'static,
    C: PricingConfigSource + 'static,
    N: NotificationSender + 'static,
{
    trace!("💻️ Registering routes");
    let webhook_scope = web::scope("/webhooks")
        .wrap(WebhookSignature::new(WEBHOOK_HMAC_HEADER, webhook.hmac_secret.clone(), webhook.hmac_checks))
        .service(PaymentWebhookRoute::<B, P, C>::new());
    cfg.service(health)
        .service(CheckoutRoute::<B, P, C>::new())
        .service(OrderDetailsRoute::<B, P, C>::new())
        .service(PayRemainderRoute::<B, P, C>::new())
        .service(AmendOrderRoute::<B, C>::new())
        .service(ChangeDeliveryRoute::<B, C>::new())
        .service(LockOrderRoute::<B, P, C>::new())
        .service(UnlockOrderRoute::<B, P, C>::new())
        .service(MarkReadyRoute::<B, P, C>::new())
        .service(MarkCompletedRoute::<B, P, C>::new())
        .service(CancelOrderRoute::<B, P, C>::new())
        .service(RefundPaymentRoute::<B, P, C>::new())
        .service(InventoryUnitsRoute::<B>::new())
        .service(CreateInventoryUnitRoute::<B>::new())
        .service(InventoryUnitRoute::<B>::new())
        .service(UpdateCapacityRoute::<B>::new())
        .service(DiscountCodesRoute::<B>::new())
        .service(CreateDiscountCodeRoute::<B>::new())
        .service(RunSweepRoute::<B, N>::new())
        .service(IntegrityReportRoute::<B>::new())
        .service(webhook_scope);
}
