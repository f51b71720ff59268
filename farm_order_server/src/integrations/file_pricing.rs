use std::path::PathBuf;

use farm_order_engine::{
    pricing::{PricingConfig, PricingError},
    PricingConfigSource,
};
use log::*;

/// Reads the pricing configuration from a JSON file on every call, so that price changes made by the shop take effect
/// on the very next checkout or amendment.
#[derive(Debug, Clone)]
pub struct FilePricingConfig {
    path: PathBuf,
}

impl FilePricingConfig {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl PricingConfigSource for FilePricingConfig {
    async fn pricing_config(&self) -> Result<PricingConfig, PricingError> {
        let json = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            error!("🪛️ Could not read pricing configuration from {}. {e}", self.path.display());
            PricingError::ConfigUnavailable(format!("{}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            error!("🪛️ Pricing configuration in {} is invalid. {e}", self.path.display());
            PricingError::ConfigUnavailable(format!("{}: {e}", self.path.display()))
        })
    }
}
