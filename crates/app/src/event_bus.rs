//! Hub-wide event fan-out.
//!
//! Events go to whoever is subscribed at publish time. A subscriber that
//! falls more than `capacity` events behind sees `RecvError::Lagged` and
//! resumes from the oldest retained event.

use tokio::sync::broadcast;

use enohub_domain::error::HubError;
use enohub_domain::event::Event;

use crate::ports::EventPublisher;

#[derive(Clone)]
pub struct InProcessEventBus {
    fanout: broadcast::Sender<Event>,
}

impl InProcessEventBus {
    /// # Panics
    ///
    /// When `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            fanout: broadcast::Sender::new(capacity),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.fanout.subscribe()
    }

    #[must_use]
    pub fn listeners(&self) -> usize {
        self.fanout.receiver_count()
    }
}

impl EventPublisher for InProcessEventBus {
    async fn publish(&self, event: Event) -> Result<(), HubError> {
        let event_type = event.event_type;
        match self.fanout.send(event) {
            Ok(reached) => tracing::trace!(%event_type, reached, "event published"),
            Err(_) => tracing::trace!(%event_type, "event published with no listener"),
        }
        Ok(())
    }
}
