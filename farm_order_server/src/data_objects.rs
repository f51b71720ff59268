use std::fmt::Display;

use chrono::NaiveDate;
use farm_order_engine::amendment_plan::RequestedAmendment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }
}

/// The full set of extras and additions the customer wants on the order. Anything not listed is removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmendOrderParams {
    /// The order version the customer was looking at. If the order has changed since, the edit is refused.
    #[serde(default)]
    pub expected_version: Option<i64>,
    #[serde(default)]
    pub items: Vec<RequestedAmendment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeDeliveryParams {
    #[serde(default)]
    pub expected_version: Option<i64>,
    pub delivery_method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderParams {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityUpdate {
    pub capacity: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepParams {
    /// Sweep as if it were this date. Defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
}
