//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every engine call is async, so handlers must only ever `.await`
//! them and never block.
use actix_web::{get, web, HttpResponse, Responder};
use farm_order_engine::{
    db_types::{NewDiscountCode, NewInventoryUnit, OrderNumber},
    order_objects::{CheckoutRequest, RefundOrderPayment},
    traits::{
        DiscountCodeStore,
        IntegrityChecks,
        InventoryManagement,
        LifecycleDatabase,
        NotificationSender,
        PaymentProvider,
        PaymentUpdate,
    },
    AmendmentApi,
    ForfeitureApi,
    IntegrityApi,
    InventoryApi,
    OrderFlowApi,
    PricingConfigSource,
};
use log::*;

use crate::{
    data_objects::{
        AmendOrderParams,
        CancelOrderParams,
        CapacityUpdate,
        ChangeDeliveryParams,
        JsonResponse,
        SweepParams,
    },
    errors::ServerError,
    helpers::today,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

/// Everything the order flow needs from its backend
pub trait OrderStore: LifecycleDatabase + InventoryManagement + DiscountCodeStore {}
impl<T> OrderStore for T where T: LifecycleDatabase + InventoryManagement + DiscountCodeStore {}

/// Everything amendment reconciliation needs from its backend
pub trait AmendmentStore: LifecycleDatabase + InventoryManagement {}
impl<T> AmendmentStore for T where T: LifecycleDatabase + InventoryManagement {}

/// Everything inventory administration needs from its backend
pub trait InventoryStore: InventoryManagement + DiscountCodeStore {}
impl<T> InventoryStore for T where T: InventoryManagement + DiscountCodeStore {}

fn parse_order_number(path: web::Path<String>) -> Result<OrderNumber, ServerError> {
    path.into_inner().parse::<OrderNumber>().map_err(|e| ServerError::InvalidRequestPath(e.to_string()))
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(checkout => Post "/orders" impl OrderStore, PaymentProvider, PricingConfigSource);
/// Places an order and charges its deposit.
///
/// The response is `201 Created` with the order and the deposit payment. If the provider did not answer in time, the
/// payment is `pending` and the order stays in `draft` until the provider's webhook arrives.
pub async fn checkout<B, P, C>(
    body: web::Json<CheckoutRequest>,
    api: web::Data<OrderFlowApi<B, P, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    P: PaymentProvider,
    C: PricingConfigSource,
{
    let request = body.into_inner();
    debug!("💻️ Checkout request from {} for {} items", request.customer_ref, request.items.len());
    let result = api.checkout(request, today()).await?;
    Ok(HttpResponse::Created().json(result))
}

route!(order_details => Get "/orders/{order_number}" impl OrderStore, PaymentProvider, PricingConfigSource);
pub async fn order_details<B, P, C>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, P, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    P: PaymentProvider,
    C: PricingConfigSource,
{
    let order_number = parse_order_number(path)?;
    trace!("💻️ Fetching order {order_number}");
    let details = api.fetch_order_details(&order_number).await?;
    Ok(HttpResponse::Ok().json(details))
}

route!(pay_remainder => Post "/orders/{order_number}/remainder" impl OrderStore, PaymentProvider, PricingConfigSource);
pub async fn pay_remainder<B, P, C>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, P, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    P: PaymentProvider,
    C: PricingConfigSource,
{
    let order_number = parse_order_number(path)?;
    debug!("💻️ Remainder payment requested for {order_number}");
    let result = api.pay_remainder(&order_number).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(amend_order => Post "/orders/{order_number}/amendments" impl AmendmentStore, PricingConfigSource);
/// Replaces the extras and additions on an order. An empty `items` list removes them all.
pub async fn amend_order<B, C>(
    path: web::Path<String>,
    body: web::Json<AmendOrderParams>,
    api: web::Data<AmendmentApi<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: AmendmentStore,
    C: PricingConfigSource,
{
    let order_number = parse_order_number(path)?;
    let AmendOrderParams { expected_version, items } = body.into_inner();
    debug!("💻️ Amendment of {order_number} requested with {} lines", items.len());
    let order = api.amend(&order_number, expected_version, items, today()).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(change_delivery => Post "/orders/{order_number}/delivery" impl AmendmentStore, PricingConfigSource);
/// Moves the order to another delivery method. The fee difference is settled through the remainder.
pub async fn change_delivery<B, C>(
    path: web::Path<String>,
    body: web::Json<ChangeDeliveryParams>,
    api: web::Data<AmendmentApi<B, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: AmendmentStore,
    C: PricingConfigSource,
{
    let order_number = parse_order_number(path)?;
    let ChangeDeliveryParams { expected_version, delivery_method } = body.into_inner();
    debug!("💻️ Delivery change to {delivery_method} requested for {order_number}");
    let order = api.change_delivery_method(&order_number, expected_version, &delivery_method, today()).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Admin transitions  -------------------------------------------
route!(lock_order => Post "/orders/{order_number}/lock" impl OrderStore, PaymentProvider, PricingConfigSource);
pub async fn lock_order<B, P, C>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, P, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    P: PaymentProvider,
    C: PricingConfigSource,
{
    let order_number = parse_order_number(path)?;
    let order = api.lock_order(&order_number).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(unlock_order => Post "/orders/{order_number}/unlock" impl OrderStore, PaymentProvider, PricingConfigSource);
pub async fn unlock_order<B, P, C>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, P, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    P: PaymentProvider,
    C: PricingConfigSource,
{
    let order_number = parse_order_number(path)?;
    let order = api.unlock_order(&order_number).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(mark_ready => Post "/orders/{order_number}/ready" impl OrderStore, PaymentProvider, PricingConfigSource);
pub async fn mark_ready<B, P, C>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, P, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    P: PaymentProvider,
    C: PricingConfigSource,
{
    let order_number = parse_order_number(path)?;
    let order = api.mark_ready_for_pickup(&order_number).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(mark_completed => Post "/orders/{order_number}/complete" impl OrderStore, PaymentProvider, PricingConfigSource);
pub async fn mark_completed<B, P, C>(
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B, P, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    P: PaymentProvider,
    C: PricingConfigSource,
{
    let order_number = parse_order_number(path)?;
    let order = api.mark_completed(&order_number).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(cancel_order => Post "/orders/{order_number}/cancel" impl OrderStore, PaymentProvider, PricingConfigSource);
/// Cancels the order and releases its inventory. Money already collected is refunded separately, through
/// `/payments/refund`.
pub async fn cancel_order<B, P, C>(
    path: web::Path<String>,
    body: web::Json<CancelOrderParams>,
    api: web::Data<OrderFlowApi<B, P, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    P: PaymentProvider,
    C: PricingConfigSource,
{
    let order_number = parse_order_number(path)?;
    let params = body.into_inner();
    info!("💻️ Cancelling order {order_number}. Reason: {}", params.reason);
    let order = api.cancel_order(&order_number, &params.reason).await?;
    Ok(HttpResponse::Ok().json(order))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(refund_payment => Post "/payments/refund" impl OrderStore, PaymentProvider, PricingConfigSource);
pub async fn refund_payment<B, P, C>(
    body: web::Json<RefundOrderPayment>,
    api: web::Data<OrderFlowApi<B, P, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    P: PaymentProvider,
    C: PricingConfigSource,
{
    let refund = body.into_inner();
    info!("💻️ Refund of {} requested against {}", refund.amount, refund.payment_ref);
    let result = api.refund_payment(refund).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(payment_webhook => Post "/payment" impl OrderStore, PaymentProvider, PricingConfigSource);
/// Payment outcomes from the provider. Deliveries are at-least-once, and replays are harmless.
pub async fn payment_webhook<B, P, C>(
    body: web::Json<PaymentUpdate>,
    api: web::Data<OrderFlowApi<B, P, C>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderStore,
    P: PaymentProvider,
    C: PricingConfigSource,
{
    let update = body.into_inner();
    debug!("💻️ Payment webhook for {}: {}", update.reference(), update.status);
    let settlement = api.apply_payment_update(update).await?;
    let message = if settlement.changed {
        format!("Payment {} is now {}", settlement.payment.payment_ref, settlement.payment.status)
    } else {
        format!("Payment {} was already {}", settlement.payment.payment_ref, settlement.payment.status)
    };
    Ok(HttpResponse::Ok().json(JsonResponse::success(message)))
}

//----------------------------------------------   Inventory  ---------------------------------------------------
route!(inventory_units => Get "/inventory" impl InventoryStore);
pub async fn inventory_units<B: InventoryStore>(api: web::Data<InventoryApi<B>>) -> Result<HttpResponse, ServerError> {
    let units = api.units().await?;
    Ok(HttpResponse::Ok().json(units))
}

route!(create_inventory_unit => Post "/inventory" impl InventoryStore);
pub async fn create_inventory_unit<B: InventoryStore>(
    body: web::Json<NewInventoryUnit>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let unit = api.create_unit(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(unit))
}

route!(inventory_unit => Get "/inventory/{id}" impl InventoryStore);
pub async fn inventory_unit<B: InventoryStore>(
    path: web::Path<i64>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let unit = api.unit(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(unit))
}

route!(update_capacity => Put "/inventory/{id}/capacity" impl InventoryStore);
pub async fn update_capacity<B: InventoryStore>(
    path: web::Path<i64>,
    body: web::Json<CapacityUpdate>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let unit = api.set_capacity(path.into_inner(), body.capacity).await?;
    Ok(HttpResponse::Ok().json(unit))
}

route!(discount_codes => Get "/discount_codes" impl InventoryStore);
pub async fn discount_codes<B: InventoryStore>(api: web::Data<InventoryApi<B>>) -> Result<HttpResponse, ServerError> {
    let codes = api.discount_codes().await?;
    Ok(HttpResponse::Ok().json(codes))
}

route!(create_discount_code => Post "/discount_codes" impl InventoryStore);
pub async fn create_discount_code<B: InventoryStore>(
    body: web::Json<NewDiscountCode>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let code = api.create_discount_code(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(code))
}

//----------------------------------------------   Scheduler & health checks  -----------------------------------
route!(run_sweep => Post "/scheduler/sweep" impl LifecycleDatabase, NotificationSender);
/// Runs a sweep right now, outside the regular schedule. `?date=YYYY-MM-DD` sweeps as of another day.
pub async fn run_sweep<B, N>(
    query: web::Query<SweepParams>,
    api: web::Data<ForfeitureApi<B, N>>,
) -> Result<HttpResponse, ServerError>
where
    B: LifecycleDatabase,
    N: NotificationSender,
{
    let date = query.date.unwrap_or_else(today);
    info!("💻️ Manual sweep requested for {date}");
    let report = api.sweep(date).await;
    Ok(HttpResponse::Ok().json(report))
}

route!(integrity_report => Get "/integrity" impl IntegrityChecks);
pub async fn integrity_report<B: IntegrityChecks>(api: web::Data<IntegrityApi<B>>) -> Result<HttpResponse, ServerError> {
    let report = api.check().await?;
    Ok(HttpResponse::Ok().json(report))
}
