#![allow(dead_code)]
//! Shared fixtures for the engine integration tests: a throw-away database, a scriptable payment provider and a
//! notifier that records what it was asked to send.
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::NaiveDate;
use farm_common::MinorUnits;
use farm_order_engine::{
    db_types::{DiscountKind, InventoryKind, InventoryUnit, NewDiscountCode, NewInventoryUnit, PaymentStatus, ProductLine},
    events::EventProducers,
    pricing::PricingConfig,
    traits::{
        ChargeRequest,
        ChargeResult,
        DiscountCodeStore,
        InventoryManagement,
        Notification,
        NotificationError,
        NotificationSender,
        PaymentProvider,
        ProviderError,
        RefundRequest,
        RefundResult,
        RefundStatus,
    },
    AmendmentApi,
    ForfeitureApi,
    IntegrityApi,
    InventoryApi,
    LifecyclePolicy,
    OrderFlowApi,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    debug!("🚀️ Logging initialised");
    if Sqlite::database_exists(url).await.unwrap_or(false) {
        Sqlite::drop_database(url).await.expect("Error dropping database");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.migrate().await.expect("Error running DB migrations");
    info!("🚀️ Created test database {url}");
    db
}

pub fn random_db_path() -> String {
    let path = std::env::temp_dir().join(format!("farm_engine_test_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

/// The "current" date for every test. Fulfillment dates are expressed relative to it.
pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
}

pub fn days_from_today(days: i64) -> NaiveDate {
    today() + chrono::Duration::days(days)
}

pub fn test_policy() -> LifecyclePolicy {
    LifecyclePolicy { provider_timeout: Duration::from_millis(100), ..LifecyclePolicy::default() }
}

/// * 10 kg pig box at 100.00, 50 % deposit
/// * Marans eggs at 3.00 each, 30 % deposit
/// * point-of-lay hens at 25.00, 20 % deposit
/// * sausages (20.00) and bacon (12.00) as extras
/// * free pickup, courier at 8.00
pub fn test_pricing() -> PricingConfig {
    let mut config = PricingConfig::default();
    config.base_prices.insert("pig_box_10kg".into(), MinorUnits::from(10_000));
    config.base_prices.insert("egg_marans".into(), MinorUnits::from(300));
    config.base_prices.insert("hen_pol".into(), MinorUnits::from(2_500));
    config.extra_prices.insert("sausages".into(), MinorUnits::from(2_000));
    config.extra_prices.insert("bacon".into(), MinorUnits::from(1_200));
    config.deposit_percentages.insert(ProductLine::PigBox, 50);
    config.deposit_percentages.insert(ProductLine::HatchingEggs, 30);
    config.deposit_percentages.insert(ProductLine::LiveChickens, 20);
    config.delivery_fees.insert("pickup".into(), MinorUnits::zero());
    config.delivery_fees.insert("courier".into(), MinorUnits::from(800));
    config
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderBehaviour {
    Approve,
    Decline,
    /// Accepts the charge, but only reports the outcome later via webhook
    Defer,
    Unavailable,
    /// Never answers within the engine's timeout
    Hang,
}

#[derive(Clone)]
pub struct ScriptedProvider {
    behaviour: Arc<Mutex<ProviderBehaviour>>,
    charges: Arc<Mutex<Vec<ChargeRequest>>>,
    refunds: Arc<Mutex<Vec<RefundRequest>>>,
}

impl ScriptedProvider {
    pub fn new(behaviour: ProviderBehaviour) -> Self {
        Self {
            behaviour: Arc::new(Mutex::new(behaviour)),
            charges: Arc::new(Mutex::new(Vec::new())),
            refunds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_behaviour(&self, behaviour: ProviderBehaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    pub fn charges(&self) -> Vec<ChargeRequest> {
        self.charges.lock().unwrap().clone()
    }

    pub fn refunds(&self) -> Vec<RefundRequest> {
        self.refunds.lock().unwrap().clone()
    }

    /// The provider reference this provider hands out for the given engine payment reference
    pub fn provider_ref(payment_ref: &str) -> String {
        format!("prov-{payment_ref}")
    }
}

impl PaymentProvider for ScriptedProvider {
    async fn charge(&self, request: ChargeRequest) -> Result<ChargeResult, ProviderError> {
        let behaviour = *self.behaviour.lock().unwrap();
        let provider_ref = Self::provider_ref(&request.payment_ref);
        self.charges.lock().unwrap().push(request);
        match behaviour {
            ProviderBehaviour::Approve => Ok(ChargeResult::new(PaymentStatus::Completed, provider_ref)),
            ProviderBehaviour::Decline => Err(ProviderError::Rejected("card declined".into())),
            ProviderBehaviour::Defer => Ok(ChargeResult::new(PaymentStatus::Pending, provider_ref)),
            ProviderBehaviour::Unavailable => Err(ProviderError::Unavailable("503 Service Unavailable".into())),
            ProviderBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(ChargeResult::new(PaymentStatus::Completed, provider_ref))
            },
        }
    }

    async fn refund(&self, request: RefundRequest) -> Result<RefundResult, ProviderError> {
        let behaviour = *self.behaviour.lock().unwrap();
        self.refunds.lock().unwrap().push(request);
        match behaviour {
            ProviderBehaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(RefundResult { status: RefundStatus::Completed })
            },
            ProviderBehaviour::Unavailable => Err(ProviderError::Unavailable("503 Service Unavailable".into())),
            _ => Ok(RefundResult { status: RefundStatus::Completed }),
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
    unreachable: Arc<Mutex<HashSet<String>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fail_for(&self, recipient: &str) {
        self.unreachable.lock().unwrap().insert(recipient.to_string());
    }

    pub fn recover(&self, recipient: &str) {
        self.unreachable.lock().unwrap().remove(recipient);
    }
}

impl NotificationSender for RecordingNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        if self.unreachable.lock().unwrap().contains(&notification.recipient) {
            return Err(NotificationError::DeliveryFailed(format!("{} bounced", notification.recipient)));
        }
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

pub struct TestSystem {
    pub url: String,
    pub db: SqliteDatabase,
    pub provider: ScriptedProvider,
    pub notifier: RecordingNotifier,
    pub flow: OrderFlowApi<SqliteDatabase, ScriptedProvider, PricingConfig>,
    pub amendments: AmendmentApi<SqliteDatabase, PricingConfig>,
    pub sweeper: ForfeitureApi<SqliteDatabase, RecordingNotifier>,
    pub inventory: InventoryApi<SqliteDatabase>,
    pub integrity: IntegrityApi<SqliteDatabase>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_producers(EventProducers::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let provider = ScriptedProvider::new(ProviderBehaviour::Approve);
        let notifier = RecordingNotifier::default();
        let policy = test_policy();
        let flow = OrderFlowApi::new(db.clone(), provider.clone(), test_pricing(), policy.clone(), producers.clone());
        let amendments = AmendmentApi::new(db.clone(), test_pricing(), policy.clone(), producers.clone());
        let sweeper = ForfeitureApi::new(db.clone(), notifier.clone(), policy, producers);
        let inventory = InventoryApi::new(db.clone());
        let integrity = IntegrityApi::new(db.clone());
        Self { url, db, provider, notifier, flow, amendments, sweeper, inventory, integrity }
    }

    pub async fn unit(&self, code: &str, kind: InventoryKind, capacity: i64, week: Option<&str>) -> InventoryUnit {
        let mut unit = NewInventoryUnit::new(code, kind, capacity);
        if let Some(week) = week {
            unit = unit.with_delivery_week(week);
        }
        self.db.create_unit(unit).await.expect("Error creating inventory unit")
    }

    pub async fn discount_code(&self, code: &str, kind: DiscountKind, amount: i64) {
        let code =
            NewDiscountCode { code: code.to_string(), kind, discount_amount: MinorUnits::from(amount), owner_ref: None };
        self.db.create_code(code).await.expect("Error creating discount code");
    }

    pub async fn allocated(&self, unit_id: i64) -> i64 {
        self.db.fetch_unit(unit_id).await.expect("Error fetching unit").expect("Unit does not exist").allocated
    }

    pub async fn tear_down(self) {
        self.db.pool().close().await;
        if let Err(e) = Sqlite::drop_database(&self.url).await {
            warn!("🚀️ Could not remove test database {}: {e}", self.url);
        }
    }
}
