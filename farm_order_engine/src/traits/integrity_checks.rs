use crate::traits::{data_objects::IntegrityIssue, LifecycleError};

/// Read-only health checks over the stored state. Findings are reported, never corrected automatically.
#[allow(async_fn_in_trait)]
pub trait IntegrityChecks {
    /// Orders with more than one completed deposit payment.
    async fn find_duplicate_deposits(&self) -> Result<Vec<IntegrityIssue>, LifecycleError>;

    /// Orders where `total_amount != deposit_amount + remainder_amount`, or where the total does not match the base
    /// total plus amendments.
    async fn find_total_mismatches(&self) -> Result<Vec<IntegrityIssue>, LifecycleError>;

    /// Inventory units where `allocated` is negative or exceeds `capacity`.
    async fn find_allocation_out_of_bounds(&self) -> Result<Vec<IntegrityIssue>, LifecycleError>;

    /// Inventory units whose `allocated` differs from the sum of reservations held by active orders.
    async fn find_allocation_drift(&self) -> Result<Vec<IntegrityIssue>, LifecycleError>;
}
