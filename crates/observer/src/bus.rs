use nextwatch_core::ObserverEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// Events buffered per subscriber before the slowest one starts lagging.
pub const EVENT_BUFFER: usize = 64;

/// Broadcast bus owned by one observer.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ObserverEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EVENT_BUFFER)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish to current subscribers, returning how many will see it.
    pub fn publish(&self, event: ObserverEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription { receiver: self.sender.subscribe() }
    }
}

/// One subscriber's view of the bus.
pub struct EventSubscription {
    receiver: broadcast::Receiver<ObserverEvent>,
}

impl EventSubscription {
    /// Next event, or `None` once the observer and every handle are gone.
    pub async fn recv(&mut self) -> Option<ObserverEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "nextwatch", skipped, "event subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next event published under `name`, skipping all others.
    pub async fn recv_named(&mut self, name: &str) -> Option<ObserverEvent> {
        while let Some(event) = self.recv().await {
            if event.name() == name {
                return Some(event);
            }
        }
        None
    }

    /// Next already-published event, without waiting.
    pub fn try_recv(&mut self) -> Option<ObserverEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Everything published so far and not yet received.
    pub fn drain(&mut self) -> Vec<ObserverEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nextwatch_core::{ObservationState, ReadyEvent, RouteChangeEvent};

    fn before_change(to: &str) -> ObserverEvent {
        ObserverEvent::RouteBeforeChange(RouteChangeEvent {
            from: "/".into(),
            to: to.into(),
            timestamp: Utc::now(),
        })
    }

    #[test]
    fn publish_without_subscribers_is_dropped() {
        let bus = EventBus::default();
        assert_eq!(bus.publish(before_change("/a")), 0);
    }

    #[tokio::test]
    async fn recv_named_skips_other_events() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();

        bus.publish(before_change("/a"));
        bus.publish(ObserverEvent::Ready(ReadyEvent {
            state: ObservationState::new("/a"),
            timestamp: Utc::now(),
            timing_ms: 0.0,
        }));
        bus.publish(before_change("/b"));
        drop(bus);

        let ready = sub.recv_named(ObserverEvent::READY).await;
        assert!(matches!(ready, Some(ObserverEvent::Ready(_))));
        assert!(sub.recv_named(ObserverEvent::READY).await.is_none());
    }

    #[test]
    fn drain_returns_events_in_order() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        bus.publish(before_change("/a"));
        bus.publish(before_change("/b"));

        let routes: Vec<_> = sub
            .drain()
            .into_iter()
            .map(|event| match event {
                ObserverEvent::RouteBeforeChange(change) => change.to,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(routes, vec!["/a", "/b"]);
        assert!(sub.try_recv().is_none());
    }
}
