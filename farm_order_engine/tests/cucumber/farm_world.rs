use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use farm_order_engine::{db_types::OrderNumber, order_objects::SweepReport, LifecycleError};

use crate::support::TestSystem;

#[derive(Default, World)]
pub struct FarmWorld {
    pub system: Option<TestSystem>,
    /// Inventory unit ids by code
    pub units: HashMap<String, i64>,
    /// The most recent order of each customer
    pub orders: HashMap<String, OrderNumber>,
    pub last_error: Option<LifecycleError>,
    pub last_report: Option<SweepReport>,
}

impl Debug for FarmWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FarmWorld")
            .field("db", &self.system.as_ref().map(|s| s.url.as_str()))
            .field("units", &self.units)
            .field("orders", &self.orders)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl FarmWorld {
    pub fn system(&self) -> &TestSystem {
        self.system.as_ref().expect("System not initialised. Did you forget 'Given a fresh install'?")
    }

    pub fn unit_id(&self, code: &str) -> i64 {
        *self.units.get(code).unwrap_or_else(|| panic!("Unknown inventory unit {code}"))
    }

    pub fn order_number(&self, customer: &str) -> OrderNumber {
        self.orders.get(customer).cloned().unwrap_or_else(|| panic!("{customer} has not placed an order"))
    }
}
