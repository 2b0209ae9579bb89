//! Sample fan-out to subscribers
//!
//! Streams publish into a [`SampleBus`]; observers register per
//! [`MetricKind`] either as a channel or as a callback. Delivery happens on
//! the publishing stream's task, so samples of one kind reach every
//! subscriber in production order.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::error;

use crate::metric::{MetricKind, Sample};

/// Receiving half of a channel subscription
pub type SampleReceiver = mpsc::UnboundedReceiver<Sample>;

/// Callback invoked once per published sample of the subscribed kind
pub trait SampleHandler: Send + Sync {
    fn handle_sample(&self, sample: &Sample);
}

impl<F> SampleHandler for F
where
    F: Fn(&Sample) + Send + Sync,
{
    fn handle_sample(&self, sample: &Sample) {
        self(sample)
    }
}

/// A registered callback; retired after its first panic
struct HandlerSlot {
    handler: Box<dyn SampleHandler>,
    panicked: AtomicBool,
}

#[derive(Clone)]
enum Subscriber {
    Channel(mpsc::UnboundedSender<Sample>),
    Handler(Arc<HandlerSlot>),
}

impl Subscriber {
    /// Deliver one sample; returns false once the subscriber is gone
    fn deliver(&self, sample: &Sample) -> bool {
        match self {
            Subscriber::Channel(tx) => tx.send(sample.clone()).is_ok(),
            Subscriber::Handler(slot) => {
                if slot.panicked.load(Ordering::Acquire) {
                    return false;
                }
                // A panicking callback must not take the stream task down with it.
                let outcome =
                    panic::catch_unwind(AssertUnwindSafe(|| slot.handler.handle_sample(sample)));
                if outcome.is_err() {
                    error!("Subscriber for {} panicked, removing it", sample.kind);
                    slot.panicked.store(true, Ordering::Release);
                    return false;
                }
                true
            }
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            Subscriber::Channel(tx) => tx.is_closed(),
            Subscriber::Handler(slot) => slot.panicked.load(Ordering::Acquire),
        }
    }
}

/// Per-kind subscriber registry
#[derive(Default)]
pub struct SampleBus {
    subscribers: Mutex<HashMap<MetricKind, Vec<Subscriber>>>,
}

impl SampleBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel that receives every later sample of `kind`
    pub fn subscribe(&self, kind: MetricKind) -> SampleReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.register(kind, Subscriber::Channel(tx));
        rx
    }

    /// Register a callback for every later sample of `kind`
    pub fn subscribe_with<H: SampleHandler + 'static>(&self, kind: MetricKind, handler: H) {
        let slot = HandlerSlot {
            handler: Box::new(handler),
            panicked: AtomicBool::new(false),
        };
        self.register(kind, Subscriber::Handler(Arc::new(slot)));
    }

    /// Deliver `sample` to every subscriber of its kind.
    ///
    /// Returns the number of subscribers that accepted it. Channels whose
    /// receiver has been dropped and callbacks that panicked are pruned.
    pub fn publish(&self, sample: &Sample) -> usize {
        // Deliver outside the lock so a callback may subscribe or publish.
        let targets = match self.lock().get(&sample.kind) {
            Some(subscribers) => subscribers.clone(),
            None => return 0,
        };

        let delivered = targets.iter().filter(|subscriber| subscriber.deliver(sample)).count();
        if delivered < targets.len() {
            if let Some(subscribers) = self.lock().get_mut(&sample.kind) {
                subscribers.retain(|subscriber| !subscriber.is_closed());
            }
        }
        delivered
    }

    /// Number of live subscribers for `kind`
    pub fn subscriber_count(&self, kind: MetricKind) -> usize {
        self.lock().get(&kind).map_or(0, |subscribers| {
            subscribers.iter().filter(|subscriber| !subscriber.is_closed()).count()
        })
    }

    /// Drop every subscriber; channel receivers drain and then end
    pub fn close(&self) {
        self.lock().clear();
    }

    fn register(&self, kind: MetricKind, subscriber: Subscriber) {
        self.lock().entry(kind).or_default().push(subscriber);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<MetricKind, Vec<Subscriber>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_channel_subscribers_receive_in_order() {
        let bus = SampleBus::new();
        let mut rx = bus.subscribe(MetricKind::MemoryPercent);

        for value in [10.0, 20.0, 30.0] {
            assert_eq!(bus.publish(&Sample::new(MetricKind::MemoryPercent, value)), 1);
        }

        let received: Vec<f64> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|s| s.value)
            .collect();
        assert_eq!(received, vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn test_subscribers_only_see_their_kind() {
        let bus = SampleBus::new();
        let mut memory = bus.subscribe(MetricKind::MemoryPercent);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        bus.subscribe_with(MetricKind::CpuTemperature, move |_: &Sample| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&Sample::new(MetricKind::CpuTemperature, 55.0));
        bus.publish(&Sample::new(MetricKind::NetUploadRate, 1.0));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(memory.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let bus = SampleBus::new();
        let rx = bus.subscribe(MetricKind::NetDownloadRate);
        let _kept = bus.subscribe(MetricKind::NetDownloadRate);
        drop(rx);

        assert_eq!(bus.publish(&Sample::new(MetricKind::NetDownloadRate, 0.0)), 1);
        assert_eq!(bus.subscriber_count(MetricKind::NetDownloadRate), 1);
    }

    #[test]
    fn test_panicking_handler_is_removed() {
        let bus = SampleBus::new();
        bus.subscribe_with(MetricKind::MemoryPercent, |_: &Sample| {
            panic!("handler bug");
        });
        let mut rx = bus.subscribe(MetricKind::MemoryPercent);

        assert_eq!(bus.publish(&Sample::new(MetricKind::MemoryPercent, 1.0)), 1);
        assert_eq!(bus.subscriber_count(MetricKind::MemoryPercent), 1);
        assert_eq!(bus.publish(&Sample::new(MetricKind::MemoryPercent, 2.0)), 1);

        assert_eq!(rx.try_recv().unwrap().value, 1.0);
        assert_eq!(rx.try_recv().unwrap().value, 2.0);
    }

    #[test]
    fn test_close_ends_channels() {
        let bus = SampleBus::new();
        let mut rx = bus.subscribe(MetricKind::MemoryPercent);
        bus.publish(&Sample::new(MetricKind::MemoryPercent, 1.0));
        bus.close();

        assert_eq!(rx.try_recv().unwrap().value, 1.0);
        assert!(matches!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected)));
        assert_eq!(bus.publish(&Sample::new(MetricKind::MemoryPercent, 2.0)), 0);
    }
}
