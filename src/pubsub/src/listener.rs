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

//! Wait for the notification that reports a job finished.

use crate::error::ListenError;
use crate::model::Message;
use crate::subscriber::handler::Handler;
use crate::subscriber::{MessageCallback, Subscription, SubscriptionHandle};
use crate::{Error, Result};
use gax::options::PollingOptions;
use gax::polling_backoff_policy::PollingBackoffPolicyArg;
use gax::polling_error_policy::PollingErrorPolicyArg;
use gax::polling_state::PollingState;
use gax::signal::OneShot;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The attribute DLP sets on job notifications.
pub const DEFAULT_CORRELATION_ATTRIBUTE: &str = "DlpJobName";

/// Selects the message attribute that carries the job identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Correlation {
    attribute: String,
}

impl Default for Correlation {
    fn default() -> Self {
        Self::attribute(DEFAULT_CORRELATION_ATTRIBUTE)
    }
}

impl Correlation {
    /// Match messages using the attribute called `name`.
    pub fn attribute<T: Into<String>>(name: T) -> Self {
        Self {
            attribute: name.into(),
        }
    }

    /// The name of the attribute.
    pub fn name(&self) -> &str {
        &self.attribute
    }

    /// Returns true if `message` is the notification for `job_id`.
    pub fn matches(&self, message: &Message, job_id: &str) -> bool {
        message.attribute(&self.attribute) == Some(job_id)
    }
}

/// Waits for the notification for a single job.
///
/// The listener subscribes, acknowledges the notification whose
/// [correlation attribute][Correlation] matches the job, and rejects (nacks)
/// any other message so the service redelivers it to the listener waiting for
/// it. The listener always unsubscribes before [wait_for] returns.
///
/// # Example
/// ```
/// # use cloud_samples_pubsub::{NotificationListener, memory::MemorySubscription, model::Message};
/// # tokio_test::block_on(async {
/// use std::time::Duration;
/// let subscription = MemorySubscription::new("projects/p/subscriptions/dlp-jobs");
/// subscription.publish(Message::new().set_attributes([("DlpJobName", "projects/p/dlpJobs/i-1")]));
/// let listener = NotificationListener::new(subscription.clone())
///     .with_timeout(Duration::from_secs(30));
/// let message = listener.wait_for("projects/p/dlpJobs/i-1").await?;
/// assert_eq!(message.attribute("DlpJobName"), Some("projects/p/dlpJobs/i-1"));
/// # Ok::<(), cloud_samples_pubsub::Error>(())
/// # });
/// ```
///
/// [wait_for]: NotificationListener::wait_for
#[derive(Clone, Debug)]
pub struct NotificationListener<S> {
    subscription: S,
    correlation: Correlation,
    options: PollingOptions,
}

impl<S> NotificationListener<S>
where
    S: Subscription,
{
    /// Creates a listener for `subscription`.
    ///
    /// The listener has no deadline until [with_timeout] is called.
    ///
    /// [with_timeout]: NotificationListener::with_timeout
    pub fn new(subscription: S) -> Self {
        Self {
            subscription,
            correlation: Correlation::default(),
            options: PollingOptions::default(),
        }
    }

    /// Changes the attribute used to match notifications.
    pub fn with_correlation(mut self, v: Correlation) -> Self {
        self.correlation = v;
        self
    }

    /// Gives up waiting after `v`.
    ///
    /// The budget covers subscribing, including any retries, and waiting for
    /// the notification.
    pub fn with_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.options = self.options.with_timeout(v);
        self
    }

    /// Stops waiting when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.options = self.options.with_cancellation(token);
        self
    }

    /// Decides which subscribe errors are retried.
    pub fn with_subscribe_error_policy<V: Into<PollingErrorPolicyArg>>(mut self, v: V) -> Self {
        self.options = self.options.with_error_policy(v);
        self
    }

    /// Decides how long to wait between subscribe attempts.
    pub fn with_subscribe_backoff_policy<V: Into<PollingBackoffPolicyArg>>(mut self, v: V) -> Self {
        self.options = self.options.with_backoff_policy(v);
        self
    }

    /// The attribute used to match notifications.
    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    /// Waits for the notification for `job_id`.
    ///
    /// Returns the matching message, or:
    /// * a timeout error, with [ListenError::Timeout] as its source, if no
    ///   matching message arrived before the deadline,
    /// * a cancelled error if the cancellation token fired,
    /// * the subscribe error if subscribing failed and the error policy
    ///   stopped retrying,
    /// * the transport error if the subscription closed while waiting.
    pub async fn wait_for<T: Into<String>>(&self, job_id: T) -> Result<Message> {
        let job_id = job_id.into();
        let start = Instant::now();
        let deadline = self.options.deadline_from(start);
        let mut signal = OneShot::new();
        if let Some(d) = deadline {
            signal = signal.with_deadline(d);
        }
        if let Some(token) = self.options.cancellation() {
            signal = signal.with_cancellation(token.clone());
        }
        let callback = matcher(self.correlation.clone(), job_id.clone(), signal.clone());
        let handle = self.subscribe(callback, start, deadline, &job_id).await?;
        tracing::debug!(
            job_id = %job_id,
            correlation = self.correlation.name(),
            "waiting for notification"
        );

        let result = tokio::select! {
            biased;
            v = signal.wait() => v,
            closed = handle.closed() => {
                closed.and_then(|_| Err(Error::io(ListenError::Closed(job_id.clone()))))
            }
        };
        handle.unsubscribe().await;
        match (result, signal.peek()) {
            (Ok(m), _) => Ok(m),
            // The notification arrived while the subscription shut down.
            (Err(_), Some(m)) => Ok(m),
            (Err(e), None) if e.is_timeout() => {
                tracing::debug!(job_id = %job_id, "no notification before the deadline");
                Err(Error::timeout(ListenError::Timeout(job_id)))
            }
            (Err(e), None) => Err(e),
        }
    }

    async fn subscribe(
        &self,
        callback: MessageCallback,
        start: Instant,
        deadline: Option<Instant>,
        job_id: &str,
    ) -> Result<S::Handle> {
        let error_policy = self.options.error_policy();
        let backoff_policy = self.options.backoff_policy();
        let cancel = self.options.cancellation();
        let mut state = PollingState::default().set_start(start);
        loop {
            if cancel.is_some_and(|t| t.is_cancelled()) {
                return Err(cancelled(job_id));
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(Error::timeout(ListenError::Timeout(job_id.to_string())));
            }
            state.next_attempt();
            let attempt = self.subscription.subscribe(callback.clone());
            let result = tokio::select! {
                biased;
                _ = cancellation(cancel) => return Err(cancelled(job_id)),
                r = attempt => r,
                _ = expiration(deadline) => {
                    return Err(Error::timeout(ListenError::Timeout(job_id.to_string())));
                }
            };
            let error = match result {
                Ok(handle) => return Ok(handle),
                Err(e) => e,
            };
            state.record_error();
            tracing::warn!(
                job_id = %job_id,
                attempt = state.attempt_count,
                "cannot subscribe to notifications: {error}"
            );
            let decision = error_policy.on_error(&state, error);
            if !decision.is_continue() {
                return Err(decision.into_error());
            }
            let wait = backoff_policy.wait_period(&state);
            let until = Instant::now()
                .checked_add(wait)
                .map(|t| deadline.map_or(t, |d| t.min(d)))
                .or(deadline);
            tokio::select! {
                biased;
                _ = cancellation(cancel) => {}
                _ = expiration(until) => {}
            }
        }
    }
}

/// Waits until a notification for `job_id` arrives on `subscription`.
///
/// Uses the [default correlation attribute][DEFAULT_CORRELATION_ATTRIBUTE],
/// and gives up after `timeout`. See [NotificationListener::wait_for] for the
/// possible errors.
///
/// # Example
/// ```
/// # use cloud_samples_pubsub::{await_notification, memory::MemorySubscription, model::Message};
/// # tokio_test::block_on(async {
/// use std::time::Duration;
/// let subscription = MemorySubscription::new("projects/p/subscriptions/dlp-jobs");
/// let got = await_notification(&subscription, "projects/p/dlpJobs/i-1", Duration::from_millis(10)).await;
/// assert!(matches!(got, Err(ref e) if e.is_timeout()), "{got:?}");
/// # });
/// ```
pub async fn await_notification<S, T>(subscription: S, job_id: T, timeout: Duration) -> Result<Message>
where
    S: Subscription,
    T: Into<String>,
{
    NotificationListener::new(subscription)
        .with_timeout(timeout)
        .wait_for(job_id)
        .await
}

/// Creates the callback that matches notifications for `job_id`.
fn matcher(correlation: Correlation, job_id: String, signal: OneShot<Message>) -> MessageCallback {
    Arc::new(move |message: Message, handler: Handler| {
        if !correlation.matches(&message, &job_id) {
            tracing::debug!(
                job_id = %job_id,
                message_id = %message.message_id,
                "declining notification for another job"
            );
            handler.nack();
            return;
        }
        handler.ack();
        if signal.signal(message) {
            tracing::debug!(job_id = %job_id, "received notification");
        } else {
            tracing::debug!(job_id = %job_id, "ignoring duplicate notification");
        }
    })
}

fn cancelled(job_id: &str) -> Error {
    Error::cancelled(format!(
        "the wait for the notification for job {job_id} was cancelled"
    ))
}

async fn cancellation(token: Option<&CancellationToken>) {
    match token {
        Some(t) => t.cancelled().await,
        None => std::future::pending::<()>().await,
    }
}

async fn expiration(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending::<()>().await,
    }
}
