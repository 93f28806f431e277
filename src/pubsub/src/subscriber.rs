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

//! Subscriptions deliver messages to a callback.
//!
//! The notification listener is written against the [Subscription] and
//! [SubscriptionHandle] traits, so any transport that can deliver messages to
//! a callback works with it. This module includes an adapter for pull-style
//! streams, see [stream::StreamingSubscription].

/// Handlers for acknowledging or rejecting messages.
pub mod handler;

/// Adapts a stream of messages into a [Subscription].
pub mod stream;

use crate::model::Message;
use crate::{Error, Result};
use gax::error::rpc::Status;
use gax::signal::OneShot;
use handler::Handler;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The per-message callback.
///
/// Transports may invoke the callback concurrently from several tasks. The
/// callback must be short and must not block.
pub type MessageCallback = Arc<dyn Fn(Message, Handler) + Send + Sync>;

/// A source of messages that can be delivered to a callback.
#[async_trait::async_trait]
pub trait Subscription: Send + Sync {
    /// The handle returned by [subscribe][Subscription::subscribe].
    type Handle: SubscriptionHandle;

    /// Starts delivering messages to `callback`.
    ///
    /// Delivery continues until the handle is unsubscribed, or until the
    /// subscription terminates on its own.
    async fn subscribe(&self, callback: MessageCallback) -> Result<Self::Handle>;
}

#[async_trait::async_trait]
impl<T> Subscription for &T
where
    T: Subscription,
{
    type Handle = T::Handle;

    async fn subscribe(&self, callback: MessageCallback) -> Result<Self::Handle> {
        (**self).subscribe(callback).await
    }
}

#[async_trait::async_trait]
impl<T> Subscription for Arc<T>
where
    T: Subscription,
{
    type Handle = T::Handle;

    async fn subscribe(&self, callback: MessageCallback) -> Result<Self::Handle> {
        self.as_ref().subscribe(callback).await
    }
}

/// Controls an active subscription.
#[async_trait::async_trait]
pub trait SubscriptionHandle: Send + Sync {
    /// Stops delivering messages.
    ///
    /// Returns once no callback is running. Calling this more than once is
    /// not an error.
    async fn unsubscribe(&self);

    /// Returns true until the subscription is unsubscribed or terminates.
    fn is_subscribed(&self) -> bool;

    /// Resolves when the subscription stops delivering messages.
    ///
    /// Returns an error if the subscription failed. Returns `Ok(())` if it was
    /// unsubscribed or the transport finished normally.
    async fn closed(&self) -> Result<()>;
}

#[async_trait::async_trait]
impl<T> SubscriptionHandle for Arc<T>
where
    T: SubscriptionHandle,
{
    async fn unsubscribe(&self) {
        self.as_ref().unsubscribe().await
    }

    fn is_subscribed(&self) -> bool {
        self.as_ref().is_subscribed()
    }

    async fn closed(&self) -> Result<()> {
        self.as_ref().closed().await
    }
}

/// Why a dispatch task stopped.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Termination {
    Unsubscribed,
    Ended,
    Service(Status),
    Transport(String),
}

impl Termination {
    pub(crate) fn from_error(e: &Error) -> Self {
        match e.status() {
            Some(status) => Self::Service(status.clone()),
            None => Self::Transport(e.to_string()),
        }
    }

    fn into_result(self) -> Result<()> {
        match self {
            Self::Unsubscribed | Self::Ended => Ok(()),
            Self::Service(status) => Err(Error::service(status)),
            Self::Transport(msg) => Err(Error::io(msg)),
        }
    }
}

/// The handle for subscriptions backed by a dispatch task.
///
/// Dropping the handle stops the dispatch task, but does not wait for
/// running callbacks.
#[derive(Debug)]
pub struct DispatchHandle {
    shutdown: CancellationToken,
    closed: OneShot<Termination>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DispatchHandle {
    pub(crate) fn new(
        shutdown: CancellationToken,
        closed: OneShot<Termination>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            shutdown,
            closed,
            task: Mutex::new(Some(task)),
        }
    }
}

#[async_trait::async_trait]
impl SubscriptionHandle for DispatchHandle {
    async fn unsubscribe(&self) {
        self.shutdown.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::warn!("dispatch task did not stop cleanly: {e}");
            }
        }
        // A task that panicked never signals, resolve `closed()` anyway.
        self.closed.signal(Termination::Unsubscribed);
    }

    fn is_subscribed(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.closed.is_signaled()
    }

    async fn closed(&self) -> Result<()> {
        self.closed.wait().await.and_then(Termination::into_result)
    }
}

impl Drop for DispatchHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gax::error::rpc::Code;

    #[test]
    fn termination_results() {
        assert!(Termination::Unsubscribed.into_result().is_ok());
        assert!(Termination::Ended.into_result().is_ok());

        let status = Status::default()
            .set_code(Code::NotFound)
            .set_message("subscription not found");
        let got = Termination::Service(status.clone()).into_result();
        assert!(matches!(got, Err(ref e) if e.status() == Some(&status)), "{got:?}");

        let got = Termination::Transport("connection reset".to_string()).into_result();
        assert!(matches!(got, Err(ref e) if e.is_io()), "{got:?}");
    }

    #[test]
    fn termination_from_error() {
        let status = Status::default().set_code(Code::PermissionDenied);
        let got = Termination::from_error(&Error::service(status.clone()));
        assert_eq!(got, Termination::Service(status));

        let got = Termination::from_error(&Error::io("broken pipe"));
        assert!(matches!(got, Termination::Transport(ref m) if m.contains("broken pipe")), "{got:?}");
    }

    #[tokio::test]
    async fn dispatch_handle() -> anyhow::Result<()> {
        let shutdown = CancellationToken::new();
        let closed = OneShot::new();
        let task = {
            let shutdown = shutdown.clone();
            let closed = closed.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                closed.signal(Termination::Unsubscribed);
            })
        };
        let handle = DispatchHandle::new(shutdown, closed, task);
        assert!(handle.is_subscribed());
        handle.unsubscribe().await;
        assert!(!handle.is_subscribed());
        handle.closed().await?;
        // Unsubscribing twice is not an error.
        handle.unsubscribe().await;
        Ok(())
    }

    #[tokio::test]
    async fn dispatch_handle_failure() {
        let shutdown = CancellationToken::new();
        let closed = OneShot::new();
        closed.signal(Termination::Transport("stream reset".to_string()));
        let handle = DispatchHandle::new(shutdown.clone(), closed, tokio::spawn(async {}));
        assert!(!handle.is_subscribed());
        let got = handle.closed().await;
        assert!(matches!(got, Err(ref e) if e.is_io()), "{got:?}");
        drop(handle);
        assert!(shutdown.is_cancelled());
    }
}
