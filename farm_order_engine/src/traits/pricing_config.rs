use crate::pricing::{PricingConfig, PricingError};

/// Read-only source of pricing configuration. The value may change between calls, so callers fetch it every time they
/// price something rather than holding on to it.
#[allow(async_fn_in_trait)]
pub trait PricingConfigSource {
    async fn pricing_config(&self) -> Result<PricingConfig, PricingError>;
}

/// A fixed configuration is its own source.
impl PricingConfigSource for PricingConfig {
    async fn pricing_config(&self) -> Result<PricingConfig, PricingError> {
        Ok(self.clone())
    }
}
