//! In-process change bus.
//!
//! Subscribers register a callback on one [`StreamKey`]; publishing a
//! notification delivers it synchronously, in registration order, to every
//! live subscriber of the matching stream.

use std::cell::Cell;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures_util::Stream;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use tokio::sync::mpsc;
use tracing::debug;

use crate::notification::{ChangeNotification, StreamKey};

/// Subscriber callback.
pub type NotificationCallback = Arc<dyn Fn(&ChangeNotification) + Send + Sync>;

thread_local! {
    // Number of callbacks currently running on this thread.
    static DELIVERY_DEPTH: Cell<usize> = const { Cell::new(0) };
}

struct DeliveryGuard;

impl DeliveryGuard {
    fn enter() -> Self {
        DELIVERY_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }

    fn is_delivering() -> bool {
        DELIVERY_DEPTH.with(Cell::get) > 0
    }
}

impl Drop for DeliveryGuard {
    fn drop(&mut self) {
        DELIVERY_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

struct Subscriber {
    id: u64,
    active: AtomicBool,
    callback: Mutex<Option<NotificationCallback>>,
    // Held for the whole delivery so a disposing thread can wait out an
    // in-progress callback.
    delivering: ReentrantMutex<()>,
}

impl Subscriber {
    fn deliver(&self, notification: &ChangeNotification) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        let _delivering = self.delivering.lock();
        let Some(callback) = self.callback.lock().clone() else {
            return false;
        };
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        let _guard = DeliveryGuard::enter();
        callback(notification);
        true
    }

    /// Marks the subscriber inactive, then waits for an in-progress callback
    /// unless the caller is itself inside a callback. Two callbacks disposing
    /// each other from different threads therefore cannot wait on each other.
    fn disable(&self) -> bool {
        if !self.active.swap(false, Ordering::AcqRel) {
            return false;
        }
        if !DeliveryGuard::is_delivering() {
            drop(self.delivering.lock());
        }
        self.callback.lock().take();
        true
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

type SubscriberList = RwLock<Vec<Arc<Subscriber>>>;

/// Routes change notifications to subscribers by stream key.
#[derive(Default)]
pub struct ChangeBus {
    streams: DashMap<StreamKey, Arc<SubscriberList>>,
    next_id: AtomicU64,
}

impl ChangeBus {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers `callback` on `key`.
    pub fn subscribe(self: &Arc<Self>, key: StreamKey, callback: NotificationCallback) -> Subscription {
        let subscriber = Arc::new(Subscriber {
            id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
            active: AtomicBool::new(true),
            callback: Mutex::new(Some(callback)),
            delivering: ReentrantMutex::new(()),
        });
        self.streams
            .entry(key.clone())
            .or_default()
            .write()
            .push(Arc::clone(&subscriber));
        debug!(subscriber = subscriber.id, stream = ?key, "subscribed");

        Subscription {
            bus: Arc::downgrade(self),
            key,
            subscriber,
        }
    }

    /// Delivers `notification` to the subscribers of its stream and returns
    /// how many received it.
    pub fn publish(&self, notification: &ChangeNotification) -> usize {
        let key = notification.stream_key();
        // Snapshot so callbacks run without any bus lock held.
        let Some(subscribers) = self.streams.get(&key).map(|list| list.read().clone()) else {
            return 0;
        };
        subscribers
            .iter()
            .filter(|subscriber| subscriber.deliver(notification))
            .count()
    }

    /// Number of live subscribers on `key`.
    #[must_use]
    pub fn subscriber_count(&self, key: &StreamKey) -> usize {
        self.streams
            .get(key)
            .map_or(0, |list| list.read().iter().filter(|s| s.is_active()).count())
    }

    /// Disposes every subscription on every stream.
    pub fn clear(&self) {
        let lists: Vec<Arc<SubscriberList>> =
            self.streams.iter().map(|entry| Arc::clone(entry.value())).collect();
        self.streams.clear();
        for list in lists {
            for subscriber in list.write().drain(..) {
                subscriber.disable();
            }
        }
    }

    fn unsubscribe(&self, key: &StreamKey, id: u64) {
        if let Some(list) = self.streams.get(key) {
            list.write().retain(|subscriber| subscriber.id != id);
        }
        self.streams.remove_if(key, |_, list| list.read().is_empty());
    }
}

/// Handle to one registered callback.
///
/// Dropping a subscription does not dispose it; call [`Subscription::dispose`].
pub struct Subscription {
    bus: Weak<ChangeBus>,
    key: StreamKey,
    subscriber: Arc<Subscriber>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> u64 {
        self.subscriber.id
    }

    #[must_use]
    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    /// Stops delivery to this subscription. The callback will not be invoked
    /// again, and once this returns it is not running on another thread.
    /// Called from inside a callback, it does not wait for the other thread,
    /// so one last in-progress delivery may still be finishing. Calling it
    /// more than once is a no-op.
    pub fn dispose(&self) {
        if !self.subscriber.disable() {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(&self.key, self.subscriber.id);
        }
        debug!(subscriber = self.subscriber.id, stream = ?self.key, "subscription disposed");
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.subscriber.is_active()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.subscriber.id)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// A filtered view of the bus that can be subscribed to.
#[derive(Clone)]
pub struct ObservableStream {
    bus: Arc<ChangeBus>,
    key: StreamKey,
}

impl ObservableStream {
    pub(crate) fn new(bus: Arc<ChangeBus>, key: StreamKey) -> Self {
        Self { bus, key }
    }

    #[must_use]
    pub fn key(&self) -> &StreamKey {
        &self.key
    }

    /// Registers a callback invoked synchronously for each notification.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&ChangeNotification) + Send + Sync + 'static,
    {
        self.bus.subscribe(self.key.clone(), Arc::new(callback))
    }

    /// Subscribes through an unbounded channel for async consumers. The
    /// returned stream ends once the subscription is disposed.
    pub fn subscribe_channel(&self) -> (Subscription, NotificationStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |notification| {
            let _ = tx.send(notification.clone());
        });
        (subscription, NotificationStream { rx })
    }
}

impl std::fmt::Debug for ObservableStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableStream").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Async view of a channel subscription.
#[derive(Debug)]
pub struct NotificationStream {
    rx: mpsc::UnboundedReceiver<ChangeNotification>,
}

impl NotificationStream {
    /// Next notification, or `None` once the subscription is gone.
    pub async fn recv(&mut self) -> Option<ChangeNotification> {
        self.rx.recv().await
    }

    /// Next already-buffered notification, without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeNotification> {
        self.rx.try_recv().ok()
    }
}

impl Stream for NotificationStream {
    type Item = ChangeNotification;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
