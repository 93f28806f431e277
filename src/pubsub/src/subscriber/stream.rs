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

use super::handler::Handler;
use super::{DispatchHandle, MessageCallback, Subscription, Termination};
use crate::Result;
use crate::model::Message;
use gax::signal::OneShot;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// The default number of callbacks that may run at the same time.
pub const DEFAULT_MAX_CONCURRENCY: u32 = 4;

/// A pull-style source of messages.
///
/// Implemented for any [futures::Stream] of messages and their handlers.
#[async_trait::async_trait]
pub trait MessageStream: Send {
    /// Returns the next message, an error if the stream failed, or `None` if
    /// the stream ended.
    async fn next_message(&mut self) -> Option<Result<(Message, Handler)>>;
}

#[async_trait::async_trait]
impl<T> MessageStream for T
where
    T: futures::Stream<Item = Result<(Message, Handler)>> + Send + Unpin,
{
    async fn next_message(&mut self) -> Option<Result<(Message, Handler)>> {
        futures::StreamExt::next(self).await
    }
}

/// Adapts a [MessageStream] into a callback-based [Subscription].
///
/// Each call to [subscribe][Subscription::subscribe] opens a new stream and
/// spawns a task that reads messages from it. The callbacks run in their own
/// tasks, at most [with_max_concurrency][StreamingSubscription::with_max_concurrency]
/// at a time.
///
/// # Example
/// ```
/// # use cloud_samples_pubsub::subscriber::stream::StreamingSubscription;
/// # use cloud_samples_pubsub::subscriber::handler::{AtLeastOnce, Handler};
/// # use cloud_samples_pubsub::model::Message;
/// # use cloud_samples_pubsub::await_notification;
/// # tokio_test::block_on(async {
/// use futures::StreamExt;
/// use std::time::Duration;
/// let subscription = StreamingSubscription::new(|| async {
///     // ... open a streaming pull from the service ...
///     let (ack_tx, _ack_rx) = tokio::sync::mpsc::unbounded_channel();
///     let message = Message::new()
///         .set_message_id("m-1")
///         .set_attributes([("DlpJobName", "projects/p/dlpJobs/i-123")]);
///     let handler = Handler::from(AtLeastOnce::new("ack-1", ack_tx));
///     let items: Vec<cloud_samples_pubsub::Result<_>> = vec![Ok((message, handler))];
///     Ok::<_, cloud_samples_pubsub::Error>(
///         futures::stream::iter(items).chain(futures::stream::pending()),
///     )
/// });
/// let message = await_notification(
///     &subscription,
///     "projects/p/dlpJobs/i-123",
///     Duration::from_secs(10),
/// )
/// .await?;
/// assert_eq!(message.message_id, "m-1");
/// # Ok::<(), cloud_samples_pubsub::Error>(())
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct StreamingSubscription<C> {
    open: C,
    max_concurrency: u32,
}

impl<C> StreamingSubscription<C> {
    /// Creates a subscription that calls `open` to start each stream.
    pub fn new(open: C) -> Self {
        Self {
            open,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Limits the number of callbacks that run at the same time.
    ///
    /// Values below 1 are treated as 1.
    pub fn with_max_concurrency(mut self, v: u32) -> Self {
        self.max_concurrency = v.max(1);
        self
    }
}

#[async_trait::async_trait]
impl<C, F, S> Subscription for StreamingSubscription<C>
where
    C: Fn() -> F + Send + Sync,
    F: Future<Output = Result<S>> + Send,
    S: MessageStream + 'static,
{
    type Handle = DispatchHandle;

    async fn subscribe(&self, callback: MessageCallback) -> Result<DispatchHandle> {
        let stream = (self.open)().await?;
        let shutdown = CancellationToken::new();
        let closed = OneShot::new();
        let task = tokio::spawn(dispatch(
            stream,
            callback,
            self.max_concurrency,
            shutdown.clone(),
            closed.clone(),
        ));
        Ok(DispatchHandle::new(shutdown, closed, task))
    }
}

async fn dispatch<S>(
    mut stream: S,
    callback: MessageCallback,
    max_concurrency: u32,
    shutdown: CancellationToken,
    closed: OneShot<Termination>,
) where
    S: MessageStream,
{
    let permits = Arc::new(Semaphore::new(max_concurrency as usize));
    let termination = loop {
        let next = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break Termination::Unsubscribed,
            n = stream.next_message() => n,
        };
        let (message, handler) = match next {
            None => break Termination::Ended,
            Some(Err(e)) => {
                tracing::warn!("message stream failed: {e}");
                break Termination::from_error(&e);
            }
            Some(Ok(item)) => item,
        };
        let permit = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                handler.nack();
                break Termination::Unsubscribed;
            }
            p = permits.clone().acquire_owned() => p,
        };
        let Ok(permit) = permit else {
            // The semaphore is never closed.
            break Termination::Unsubscribed;
        };
        tracing::debug!(message_id = %message.message_id, "delivering message");
        let callback = callback.clone();
        tokio::spawn(async move {
            let _permit = permit;
            callback(message, handler);
        });
    };
    // Wait for the running callbacks before reporting the subscription as
    // closed.
    let _ = permits.acquire_many(max_concurrency).await;
    closed.signal(termination);
}

#[cfg(test)]
mod tests {
    use super::super::SubscriptionHandle;
    use super::super::handler::{AckResult, AtLeastOnce};
    use super::*;
    use crate::Error;
    use gax::error::rpc::{Code, Status};
    use std::sync::Mutex;
    use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

    type Item = Result<(Message, Handler)>;

    /// A stream fed through a channel, so tests control when messages arrive.
    struct Feed {
        items: UnboundedSender<Item>,
        acks: UnboundedSender<AckResult>,
    }

    impl Feed {
        fn send(&self, id: &str) {
            let message = Message::new().set_message_id(id);
            let handler = Handler::from(AtLeastOnce::new(format!("ack-{id}"), self.acks.clone()));
            let _ = self.items.send(Ok((message, handler)));
        }
    }

    struct Receiver(UnboundedReceiver<Item>);

    #[async_trait::async_trait]
    impl MessageStream for Receiver {
        async fn next_message(&mut self) -> Option<Item> {
            self.0.recv().await
        }
    }

    fn feed() -> (Feed, Receiver, UnboundedReceiver<AckResult>) {
        let (items, rx) = unbounded_channel();
        let (acks, ack_rx) = unbounded_channel();
        (Feed { items, acks }, Receiver(rx), ack_rx)
    }

    fn single_use(rx: Receiver) -> impl Fn() -> std::future::Ready<Result<Receiver>> {
        let rx = Mutex::new(Some(rx));
        move || {
            let rx = rx.lock().expect("mutex is never poisoned in tests").take();
            std::future::ready(rx.ok_or_else(|| Error::io("stream already opened")))
        }
    }

    fn ack_all() -> (MessageCallback, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let callback: MessageCallback = Arc::new(move |m: Message, h: Handler| {
            captured.lock().expect("mutex is never poisoned in tests").push(m.message_id);
            h.ack();
        });
        (callback, seen)
    }

    #[tokio::test]
    async fn delivers_until_unsubscribed() -> anyhow::Result<()> {
        let (feed, rx, mut acks) = feed();
        let subscription = StreamingSubscription::new(single_use(rx));
        let (callback, seen) = ack_all();
        let handle = subscription.subscribe(callback).await?;
        assert!(handle.is_subscribed());

        feed.send("m-1");
        feed.send("m-2");
        assert_eq!(acks.recv().await, Some(AckResult::Ack("ack-m-1".to_string())));
        assert_eq!(acks.recv().await, Some(AckResult::Ack("ack-m-2".to_string())));

        handle.unsubscribe().await;
        assert!(!handle.is_subscribed());
        handle.closed().await?;
        let mut got = seen.lock().expect("mutex is never poisoned in tests").clone();
        got.sort();
        assert_eq!(got, vec!["m-1", "m-2"]);

        // Messages after the unsubscribe are not delivered.
        feed.send("m-3");
        tokio::task::yield_now().await;
        assert_eq!(seen.lock().expect("mutex is never poisoned in tests").len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn stream_error_closes() -> anyhow::Result<()> {
        let (feed, rx, _acks) = feed();
        let subscription = StreamingSubscription::new(single_use(rx));
        let (callback, _seen) = ack_all();
        let handle = subscription.subscribe(callback).await?;

        let status = Status::default()
            .set_code(Code::NotFound)
            .set_message("subscription deleted");
        let _ = feed.items.send(Err(Error::service(status.clone())));
        let got = handle.closed().await;
        assert!(matches!(got, Err(ref e) if e.status() == Some(&status)), "{got:?}");
        assert!(!handle.is_subscribed());
        Ok(())
    }

    #[tokio::test]
    async fn stream_end_closes() -> anyhow::Result<()> {
        let (feed, rx, _acks) = feed();
        let subscription = StreamingSubscription::new(single_use(rx));
        let (callback, _seen) = ack_all();
        let handle = subscription.subscribe(callback).await?;
        drop(feed);
        handle.closed().await?;
        assert!(!handle.is_subscribed());
        Ok(())
    }

    #[tokio::test]
    async fn open_error() {
        let subscription =
            StreamingSubscription::new(|| async { Err::<Receiver, _>(Error::io("connection refused")) });
        let (callback, _seen) = ack_all();
        let got = subscription.subscribe(callback).await;
        assert!(matches!(got, Err(ref e) if e.is_io()), "{got:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn bounded_concurrency() -> anyhow::Result<()> {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let (feed, rx, mut acks) = feed();
        let subscription = StreamingSubscription::new(single_use(rx)).with_max_concurrency(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let callback: MessageCallback = {
            let running = running.clone();
            let peak = peak.clone();
            Arc::new(move |_m: Message, h: Handler| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
                h.ack();
            })
        };
        let handle = subscription.subscribe(callback).await?;
        for i in 0..16 {
            feed.send(&format!("m-{i}"));
        }
        for _ in 0..16 {
            assert!(matches!(acks.recv().await, Some(AckResult::Ack(_))));
        }
        handle.unsubscribe().await;
        assert!(peak.load(Ordering::SeqCst) <= 2, "{peak:?}");
        Ok(())
    }

    #[tokio::test]
    async fn futures_stream() -> anyhow::Result<()> {
        let (ack_tx, mut acks) = unbounded_channel();
        let items: Vec<Item> = vec![Ok((
            Message::new().set_message_id("m-1"),
            Handler::from(AtLeastOnce::new("ack-1", ack_tx)),
        ))];
        let mut stream = futures::stream::iter(items);
        let (m, h) = stream
            .next_message()
            .await
            .transpose()?
            .ok_or_else(|| anyhow::anyhow!("missing message"))?;
        assert_eq!(m.message_id, "m-1");
        h.nack();
        assert_eq!(acks.recv().await, Some(AckResult::Nack("ack-1".to_string())));
        assert!(stream.next_message().await.is_none());
        Ok(())
    }
}
