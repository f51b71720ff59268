use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    engine_api::order_objects::IntegrityReport,
    traits::{IntegrityChecks, LifecycleError},
};

/// Post-hoc health checks over orders, payments and inventory. Every finding is reported for manual follow-up and
/// nothing is ever corrected automatically.
pub struct IntegrityApi<B> {
    db: B,
}

impl<B> Debug for IntegrityApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IntegrityApi")
    }
}

impl<B> IntegrityApi<B>
where B: IntegrityChecks
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn check(&self) -> Result<IntegrityReport, LifecycleError> {
        let mut issues = self.db.find_duplicate_deposits().await?;
        issues.extend(self.db.find_total_mismatches().await?);
        issues.extend(self.db.find_allocation_out_of_bounds().await?);
        issues.extend(self.db.find_allocation_drift().await?);
        if issues.is_empty() {
            info!("🩺️ Integrity check found no issues");
        } else {
            warn!("🩺️ Integrity check found {} issues", issues.len());
        }
        for issue in &issues {
            warn!("🩺️ {:?} on {}: {}", issue.kind, issue.subject, issue.detail);
        }
        Ok(IntegrityReport { checked_at: Utc::now(), issues })
    }
}
