use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    RemainderReminder,
    OrderForfeited,
    PreFulfillmentReminder,
}

impl Display for NotificationTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationTemplate::RemainderReminder => f.write_str("remainder_reminder"),
            NotificationTemplate::OrderForfeited => f.write_str("order_forfeited"),
            NotificationTemplate::PreFulfillmentReminder => f.write_str("pre_fulfillment_reminder"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: String,
    pub template: NotificationTemplate,
    pub variables: BTreeMap<String, String>,
}

impl Notification {
    pub fn new<S: Into<String>>(recipient: S, template: NotificationTemplate) -> Self {
        Self { recipient: recipient.into(), template, variables: BTreeMap::new() }
    }

    pub fn with_var<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.variables.insert(key.into(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("Could not deliver notification: {0}")]
    DeliveryFailed(String),
}

/// Sends customer notifications. A failure is logged by the caller and never blocks a state transition.
#[allow(async_fn_in_trait)]
pub trait NotificationSender {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError>;
}
