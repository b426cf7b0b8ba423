use crate::domain::jobs::JobRecord;

/// Push-based completion notification, complementary to polling.
pub trait JobEventPublisher: Send + Sync {
    /// Announce that a job reached its terminal record. Nobody listening is fine.
    fn publish_terminal(&self, record: &JobRecord);
}
