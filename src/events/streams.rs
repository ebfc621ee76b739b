use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Broadcast stream of events to any number of subscribers.
///
/// Identity providers publish [`crate::auth::IdentityEvent`]s through one of these.
pub struct EventStream<T: Clone + Send + Sync + 'static> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone + Send + Sync + 'static> EventStream<T> {
    /// `capacity` is how far a subscriber may fall behind before it lags
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "Creating new event stream");
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> Subscriber<T> {
        debug!("New subscriber registered to event stream");
        Subscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish an event to all subscribers, returning how many received it
    pub async fn publish(&self, event: T) -> usize {
        match self.sender.send(event) {
            Ok(delivered) => {
                trace!(receivers = delivered, "Event published");
                delivered
            }
            Err(_) => {
                trace!("No receivers for event, dropped");
                0
            }
        }
    }
}

/// Receiving end of an [`EventStream`]
pub struct Subscriber<T: Clone + Send + Sync + 'static> {
    receiver: broadcast::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> Subscriber<T> {
    /// Next live event; lagging behind the channel capacity yields `Lagged`
    pub async fn recv(&mut self) -> Result<T, broadcast::error::RecvError> {
        self.receiver.recv().await
    }
}

impl<T: Clone + Send + Sync + 'static> Clone for EventStream<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}
