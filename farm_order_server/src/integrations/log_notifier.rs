use farm_order_engine::traits::{Notification, NotificationError, NotificationSender};
use log::*;

/// Writes every customer notification to the log instead of sending it. Template rendering and delivery are handled
/// by the mail service that tails these lines.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl NotificationSender for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<(), NotificationError> {
        if notification.recipient.trim().is_empty() {
            return Err(NotificationError::DeliveryFailed(format!("{} has no recipient", notification.template)));
        }
        let variables = serde_json::to_string(&notification.variables)
            .map_err(|e| NotificationError::DeliveryFailed(e.to_string()))?;
        info!("📬️ [{}] to {}: {variables}", notification.template, notification.recipient);
        Ok(())
    }
}
