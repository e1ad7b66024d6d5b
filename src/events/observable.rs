use tokio::sync::{broadcast, watch};

/// Single-owner value exposed to any number of readers
///
/// Readers get two views of the same stream of publications:
/// - [`Observable::watch`] replays the latest value to late subscribers
/// - [`Observable::subscribe`] yields every published value in order
///
/// Only the owning component holds the `Observable` itself; readers only ever
/// receive receivers and cannot publish.
#[derive(Debug)]
pub struct Observable<T> {
    latest: watch::Sender<T>,
    emissions: broadcast::Sender<T>,
}

impl<T> Observable<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an observable holding `initial`, buffering `capacity` emissions
    /// for slow stream readers
    pub fn new(initial: T, capacity: usize) -> Self {
        let (latest, _) = watch::channel(initial);
        let (emissions, _) = broadcast::channel(capacity.max(1));
        Self { latest, emissions }
    }

    /// Publish a new value, replacing the current one
    pub fn publish(&self, value: T) {
        self.latest.send_replace(value.clone());
        // No stream subscribers is fine; the watch side still holds the value
        let _ = self.emissions.send(value);
    }

    /// Snapshot of the current value
    pub fn current(&self) -> T {
        self.latest.borrow().clone()
    }

    /// Receiver that always sees the most recent value
    pub fn watch(&self) -> watch::Receiver<T> {
        self.latest.subscribe()
    }

    /// Receiver for every value published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.emissions.subscribe()
    }

    /// Number of active stream subscribers
    pub fn subscriber_count(&self) -> usize {
        self.emissions.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_late_watchers_see_latest_value() {
        let observable = Observable::new(0u32, 8);
        observable.publish(1);
        observable.publish(2);

        let watcher = observable.watch();
        assert_eq!(*watcher.borrow(), 2);
        assert_eq!(observable.current(), 2);
    }

    #[tokio::test]
    async fn test_stream_subscribers_see_every_emission() {
        let observable = Observable::new("loading", 8);
        let mut stream = observable.subscribe();

        observable.publish("loading");
        observable.publish("inactive");

        assert_eq!(stream.recv().await.unwrap(), "loading");
        assert_eq!(stream.recv().await.unwrap(), "inactive");
        assert_eq!(observable.subscriber_count(), 1);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let observable = Observable::new(false, 1);
        observable.publish(true);
        assert!(observable.current());
    }
}
