use crate::{
    db_types::{DiscountCode, NewDiscountCode},
    traits::LifecycleError,
};

/// Referral and rebate codes. Checkout only ever reads a code; its usage counter is incremented as part of the order
/// insert transaction.
#[allow(async_fn_in_trait)]
pub trait DiscountCodeStore {
    /// Returns the active code matching `code` (case-insensitive), if any.
    async fn lookup_code(&self, code: &str) -> Result<Option<DiscountCode>, LifecycleError>;

    async fn create_code(&self, code: NewDiscountCode) -> Result<DiscountCode, LifecycleError>;

    async fn fetch_codes(&self) -> Result<Vec<DiscountCode>, LifecycleError>;
}
