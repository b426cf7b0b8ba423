use super::JobEvent;
use crate::domain::jobs::JobRecord;
use crate::ports::events::JobEventPublisher;
use tokio::sync::broadcast;

#[derive(Debug)]
pub struct EventHub {
    sender: broadcast::Sender<JobEvent>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        // Subscribers only wait for one event each, lagging is rare
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, event: JobEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl JobEventPublisher for EventHub {
    fn publish_terminal(&self, record: &JobRecord) {
        self.publish(JobEvent::Terminal {
            record: record.clone(),
        });
    }
}
