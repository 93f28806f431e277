// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! An in-process subscription.
//!
//! [MemorySubscription] behaves like a Pub/Sub subscription shared by several
//! listeners: each message goes to one subscriber at a time, messages that are
//! nacked (or never settled) return to the queue, and acknowledged messages are
//! gone. It is used in tests and demos, where starting the real service is not
//! practical.

use crate::model::Message;
use crate::subscriber::handler::{AckResult, AtLeastOnce, Handler};
use crate::subscriber::{DispatchHandle, MessageCallback, Subscription, Termination};
use crate::{Error, Result};
use gax::error::rpc::{Code, Status};
use gax::signal::OneShot;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// The default number of callbacks that may run at the same time, per
/// subscriber.
pub const DEFAULT_MAX_CONCURRENCY: u32 = 4;

/// The default delay before a nacked message is delivered again.
pub const DEFAULT_REDELIVERY_DELAY: Duration = Duration::from_millis(100);

/// A shared, in-process subscription.
///
/// Clones share the same queue. Each call to [subscribe][Subscription::subscribe]
/// creates a competing subscriber.
///
/// # Example
/// ```
/// # use cloud_samples_pubsub::memory::MemorySubscription;
/// # use cloud_samples_pubsub::model::Message;
/// # use cloud_samples_pubsub::subscriber::{Subscription, SubscriptionHandle};
/// # use cloud_samples_pubsub::subscriber::handler::Handler;
/// # use std::sync::Arc;
/// # tokio_test::block_on(async {
/// let subscription = MemorySubscription::new("projects/p/subscriptions/s");
/// let id = subscription.publish(Message::new().set_data("hello"));
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// let handle = subscription
///     .subscribe(Arc::new(move |m: Message, h: Handler| {
///         let _ = tx.send(m);
///         h.ack();
///     }))
///     .await?;
/// let got = rx.recv().await.map(|m| m.message_id);
/// assert_eq!(got, Some(id.clone()));
/// handle.unsubscribe().await;
/// assert_eq!(subscription.acked_ids(), vec![id]);
/// # Ok::<(), cloud_samples_pubsub::Error>(())
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct MemorySubscription {
    shared: Arc<Shared>,
    max_concurrency: u32,
    redelivery_delay: Duration,
}

#[derive(Debug)]
struct Shared {
    name: String,
    state: Mutex<State>,
    available: Notify,
    deleted: CancellationToken,
}

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<Message>,
    next_message: u64,
    next_ack: u64,
    acked: Vec<String>,
    nacks: usize,
    deliveries: usize,
    active: usize,
    subscribe_failures: VecDeque<Error>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, message: Message) {
        self.state().queue.push_back(message);
        self.available.notify_waiters();
    }

    fn deleted_status(&self) -> Status {
        Status::default()
            .set_code(Code::NotFound)
            .set_message(format!("subscription {} was deleted", self.name))
    }
}

impl MemorySubscription {
    /// Creates an empty subscription.
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                state: Mutex::new(State::default()),
                available: Notify::new(),
                deleted: CancellationToken::new(),
            }),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            redelivery_delay: DEFAULT_REDELIVERY_DELAY,
        }
    }

    /// Limits the number of callbacks that run at the same time for each
    /// subscriber created from this value.
    ///
    /// Values below 1 are treated as 1.
    pub fn with_max_concurrency(mut self, v: u32) -> Self {
        self.max_concurrency = v.max(1);
        self
    }

    /// Delays the redelivery of nacked messages.
    ///
    /// With a zero delay a message that every subscriber rejects is
    /// redelivered in a tight loop.
    pub fn with_redelivery_delay(mut self, v: Duration) -> Self {
        self.redelivery_delay = v;
        self
    }

    /// The subscription name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Adds a message to the subscription.
    ///
    /// Assigns a message id and a publish time if the message has none.
    /// Returns the message id.
    pub fn publish(&self, message: Message) -> String {
        let mut message = message;
        {
            let mut state = self.shared.state();
            if message.message_id.is_empty() {
                state.next_message += 1;
                message.message_id = format!("{}", state.next_message);
            }
        }
        if message.publish_time.is_none() {
            message.publish_time = Some(SystemTime::now());
        }
        let id = message.message_id.clone();
        tracing::debug!(subscription = %self.shared.name, message_id = %id, "publishing message");
        self.shared.push(message);
        id
    }

    /// The next call to `subscribe()` fails with `error`.
    ///
    /// Calling this several times queues several failures.
    pub fn fail_next_subscribe(&self, error: Error) {
        self.shared.state().subscribe_failures.push_back(error);
    }

    /// Deletes the subscription.
    ///
    /// All subscribers stop with a `NOT_FOUND` error, and new subscribe calls
    /// fail.
    pub fn delete(&self) {
        self.shared.deleted.cancel();
    }

    /// The ids of the acknowledged messages, in the order they were
    /// acknowledged.
    pub fn acked_ids(&self) -> Vec<String> {
        self.shared.state().acked.clone()
    }

    /// The number of nacked deliveries.
    pub fn nack_count(&self) -> usize {
        self.shared.state().nacks
    }

    /// The number of deliveries, including redeliveries.
    pub fn delivery_count(&self) -> usize {
        self.shared.state().deliveries
    }

    /// The number of subscribers that have not stopped.
    pub fn active_subscribers(&self) -> usize {
        self.shared.state().active
    }

    /// The number of messages waiting for a subscriber.
    pub fn pending(&self) -> usize {
        self.shared.state().queue.len()
    }
}

#[async_trait::async_trait]
impl Subscription for MemorySubscription {
    type Handle = DispatchHandle;

    async fn subscribe(&self, callback: MessageCallback) -> Result<DispatchHandle> {
        if self.shared.deleted.is_cancelled() {
            return Err(Error::service(self.shared.deleted_status()));
        }
        {
            let mut state = self.shared.state();
            if let Some(e) = state.subscribe_failures.pop_front() {
                return Err(e);
            }
            state.active += 1;
        }
        let shutdown = CancellationToken::new();
        let closed = OneShot::new();
        let (ack_tx, ack_rx) = unbounded_channel();
        let subscriber = Subscriber {
            shared: self.shared.clone(),
            callback,
            permits: Arc::new(Semaphore::new(self.max_concurrency as usize)),
            max_concurrency: self.max_concurrency,
            redelivery_delay: self.redelivery_delay,
            shutdown: shutdown.clone(),
            ack_tx,
            ack_rx,
            outstanding: HashMap::new(),
        };
        tracing::debug!(subscription = %self.shared.name, "subscribing");
        let task = tokio::spawn(subscriber.run(closed.clone()));
        Ok(DispatchHandle::new(shutdown, closed, task))
    }
}

enum Event {
    Stop(Termination),
    Settle(AckResult),
    Deliver(Message, OwnedSemaphorePermit),
}

/// The dispatch loop for one subscriber.
struct Subscriber {
    shared: Arc<Shared>,
    callback: MessageCallback,
    permits: Arc<Semaphore>,
    max_concurrency: u32,
    redelivery_delay: Duration,
    shutdown: CancellationToken,
    ack_tx: UnboundedSender<AckResult>,
    ack_rx: UnboundedReceiver<AckResult>,
    // Delivered messages waiting for an ack or nack, by ack id.
    outstanding: HashMap<String, Message>,
}

impl Subscriber {
    async fn run(mut self, closed: OneShot<Termination>) {
        let termination = loop {
            match self.next_event().await {
                Event::Stop(t) => break t,
                Event::Settle(r) => self.settle(r),
                Event::Deliver(m, permit) => self.deliver(m, permit),
            }
        };
        // Wait for the running callbacks, then settle what they reported.
        let _ = self.permits.acquire_many(self.max_concurrency).await;
        while let Ok(r) = self.ack_rx.try_recv() {
            self.settle(r);
        }
        let leftovers = self.outstanding.len();
        for (_, m) in self.outstanding.drain() {
            self.shared.push(m);
        }
        self.shared.state().active -= 1;
        tracing::debug!(
            subscription = %self.shared.name,
            leftovers,
            "subscriber stopped: {termination:?}"
        );
        closed.signal(termination);
    }

    async fn next_event(&mut self) -> Event {
        loop {
            if self.shutdown.is_cancelled() {
                return Event::Stop(Termination::Unsubscribed);
            }
            if self.shared.deleted.is_cancelled() {
                return Event::Stop(Termination::Service(self.shared.deleted_status()));
            }
            let notified = self.shared.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Ok(r) = self.ack_rx.try_recv() {
                return Event::Settle(r);
            }
            let has_messages = !self.shared.state().queue.is_empty();
            if has_messages {
                if let Ok(permit) = self.permits.clone().try_acquire_owned() {
                    if let Some(m) = self.shared.state().queue.pop_front() {
                        return Event::Deliver(m, permit);
                    }
                    continue;
                }
            }
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {}
                _ = self.shared.deleted.cancelled() => {}
                r = self.ack_rx.recv() => {
                    if let Some(r) = r {
                        return Event::Settle(r);
                    }
                }
                // All the workers are busy, wait until one finishes.
                _ = self.permits.acquire(), if has_messages => {}
                _ = &mut notified => {}
            }
        }
    }

    fn deliver(&mut self, message: Message, permit: OwnedSemaphorePermit) {
        let ack_id = {
            let mut state = self.shared.state();
            state.next_ack += 1;
            state.deliveries += 1;
            format!("{}/ack-{}", self.shared.name, state.next_ack)
        };
        tracing::debug!(message_id = %message.message_id, ack_id = %ack_id, "delivering message");
        self.outstanding.insert(ack_id.clone(), message.clone());
        let handler = Handler::from(AtLeastOnce::new(ack_id, self.ack_tx.clone()));
        let callback = self.callback.clone();
        tokio::spawn(async move {
            let _permit = permit;
            callback(message, handler);
        });
    }

    fn settle(&mut self, result: AckResult) {
        let Some(message) = self.outstanding.remove(result.ack_id()) else {
            return;
        };
        match result {
            AckResult::Ack(_) => {
                self.shared.state().acked.push(message.message_id);
            }
            AckResult::Nack(_) => {
                self.shared.state().nacks += 1;
                self.redeliver(message);
            }
        }
    }

    fn redeliver(&self, message: Message) {
        if self.redelivery_delay.is_zero() {
            self.shared.push(message);
            return;
        }
        let shared = self.shared.clone();
        let delay = self.redelivery_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.push(message);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriber::SubscriptionHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    fn collect(ack: bool) -> (MessageCallback, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        let callback: MessageCallback = Arc::new(move |m: Message, h: Handler| {
            let _ = tx.send(m.message_id);
            if ack { h.ack() } else { h.nack() }
        });
        (callback, rx)
    }

    #[tokio::test]
    async fn publish_assigns_ids() {
        let subscription = MemorySubscription::new("projects/p/subscriptions/s");
        assert_eq!(subscription.name(), "projects/p/subscriptions/s");
        let a = subscription.publish(Message::new());
        let b = subscription.publish(Message::new().set_message_id("custom"));
        let c = subscription.publish(Message::new());
        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("1", "custom", "2"));
        assert_eq!(subscription.pending(), 3);
    }

    #[tokio::test]
    async fn ack_removes_messages() -> anyhow::Result<()> {
        let subscription = MemorySubscription::new("s");
        let (callback, mut rx) = collect(true);
        let handle = subscription.subscribe(callback).await?;
        assert_eq!(subscription.active_subscribers(), 1);
        let id = subscription.publish(Message::new());
        assert_eq!(rx.recv().await, Some(id.clone()));
        handle.unsubscribe().await;
        assert_eq!(subscription.acked_ids(), vec![id]);
        assert_eq!(subscription.pending(), 0);
        assert_eq!(subscription.active_subscribers(), 0);
        assert!(!handle.is_subscribed());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn nack_redelivers_after_delay() -> anyhow::Result<()> {
        let subscription =
            MemorySubscription::new("s").with_redelivery_delay(Duration::from_secs(1));
        let (callback, mut rx) = collect(false);
        let handle = subscription.subscribe(callback).await?;
        let start = Instant::now();
        let id = subscription.publish(Message::new());
        assert_eq!(rx.recv().await, Some(id.clone()));
        assert_eq!(rx.recv().await, Some(id.clone()));
        assert_eq!(start.elapsed(), Duration::from_secs(1));
        handle.unsubscribe().await;
        assert!(subscription.nack_count() >= 2, "{subscription:?}");
        assert!(subscription.acked_ids().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unsettled_messages_return_to_the_queue() -> anyhow::Result<()> {
        let subscription = MemorySubscription::new("s");
        let (tx, mut rx) = unbounded_channel();
        let callback: MessageCallback = Arc::new(move |m: Message, h: Handler| {
            let _ = tx.send(m.message_id);
            // Never settle the message.
            drop(h);
        });
        let handle = subscription.subscribe(callback).await?;
        let id = subscription.publish(Message::new());
        assert_eq!(rx.recv().await, Some(id));
        assert_eq!(subscription.pending(), 0);
        handle.unsubscribe().await;
        assert_eq!(subscription.pending(), 1);
        assert_eq!(subscription.delivery_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn subscribe_failures() -> anyhow::Result<()> {
        let subscription = MemorySubscription::new("s");
        subscription.fail_next_subscribe(Error::io("connection refused"));
        let (callback, _rx) = collect(true);
        let got = subscription.subscribe(callback.clone()).await;
        assert!(matches!(got, Err(ref e) if e.is_io()), "{got:?}");
        assert_eq!(subscription.active_subscribers(), 0);

        let handle = subscription.subscribe(callback).await?;
        assert_eq!(subscription.active_subscribers(), 1);
        handle.unsubscribe().await;
        Ok(())
    }

    #[tokio::test]
    async fn delete_stops_subscribers() -> anyhow::Result<()> {
        let subscription = MemorySubscription::new("projects/p/subscriptions/s");
        let (callback, _rx) = collect(true);
        let handle = subscription.subscribe(callback.clone()).await?;
        subscription.delete();
        let got = handle.closed().await;
        assert!(
            matches!(got, Err(ref e) if e.status().map(|s| s.code) == Some(Code::NotFound)),
            "{got:?}"
        );
        assert!(!handle.is_subscribed());
        assert_eq!(subscription.active_subscribers(), 0);

        let got = subscription.subscribe(callback).await;
        assert!(matches!(got, Err(ref e) if e.status().is_some()), "{got:?}");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn competing_subscribers() -> anyhow::Result<()> {
        let subscription = MemorySubscription::new("s").with_max_concurrency(2);
        let seen = Arc::new(AtomicUsize::new(0));
        let (done_tx, mut done_rx) = unbounded_channel();
        let callback: MessageCallback = {
            let seen = seen.clone();
            Arc::new(move |m: Message, h: Handler| {
                seen.fetch_add(1, Ordering::SeqCst);
                h.ack();
                let _ = done_tx.send(m.message_id);
            })
        };
        let a = subscription.subscribe(callback.clone()).await?;
        let b = subscription.subscribe(callback).await?;
        for _ in 0..64 {
            subscription.publish(Message::new());
        }
        for _ in 0..64 {
            assert!(done_rx.recv().await.is_some());
        }
        a.unsubscribe().await;
        b.unsubscribe().await;
        // Every message is delivered once, to exactly one subscriber.
        assert_eq!(seen.load(Ordering::SeqCst), 64);
        let mut acked = subscription.acked_ids();
        acked.sort();
        acked.dedup();
        assert_eq!(acked.len(), 64);
        assert_eq!(subscription.pending(), 0);
        Ok(())
    }
}
