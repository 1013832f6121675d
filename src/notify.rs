use crate::schemas::DeletionRequest;

/// Receives account lifecycle events. Delivery is best effort, nothing here
/// can fail the request that triggered it.
pub trait Notifier: Send + Sync {
    fn deletion_requested(&self, request: &DeletionRequest);
    fn account_recovered(&self, request: &DeletionRequest);
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deletion_requested(&self, request: &DeletionRequest) {
        log::info!(
            "Notify {}: account scheduled for deletion on {}",
            request.user_id,
            request.scheduled_deletion_at
        );
    }

    fn account_recovered(&self, request: &DeletionRequest) {
        log::info!("Notify {}: account recovered", request.user_id);
    }
}
