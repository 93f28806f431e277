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

//! A one-shot signal with a deadline.
//!
//! Waiting for remote work often reduces to "wait until some callback reports
//! the result, or give up at a deadline". The callback may run on any thread,
//! may run concurrently with other callbacks, and may run more than once.
//! [OneShot] captures that pattern: the first [signal][OneShot::signal] wins,
//! later calls are ignored, and [wait][OneShot::wait] returns the first value
//! or a timeout.
//!
//! # Example
//! ```
//! # use cloud_samples_gax::signal::OneShot;
//! # tokio_test::block_on(async {
//! use std::time::Duration;
//! use tokio::time::Instant;
//! let signal = OneShot::arm(Instant::now() + Duration::from_secs(10));
//! let writer = signal.clone();
//! tokio::spawn(async move {
//!     writer.signal("first");
//!     writer.signal("second");
//! });
//! assert_eq!(signal.wait().await?, "first");
//! # Ok::<(), cloud_samples_gax::error::Error>(())
//! # });
//! ```

use crate::Result;
use crate::error::Error;
use std::sync::{Arc, OnceLock};
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// A value that can be set at most once, and awaited with a deadline.
///
/// Clones share the same value. The deadline and the cancellation token are
/// per handle: the writer side of a signal usually has neither.
#[derive(Debug)]
pub struct OneShot<T> {
    shared: Arc<Shared<T>>,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

#[derive(Debug)]
struct Shared<T> {
    value: OnceLock<T>,
    notify: Notify,
}

impl<T> Clone for OneShot<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            deadline: self.deadline,
            cancel: self.cancel.clone(),
        }
    }
}

impl<T> Default for OneShot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OneShot<T> {
    /// Creates a signal without a deadline.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                value: OnceLock::new(),
                notify: Notify::new(),
            }),
            deadline: None,
            cancel: None,
        }
    }

    /// Creates a signal where [wait][OneShot::wait] gives up at `deadline`.
    pub fn arm(deadline: Instant) -> Self {
        Self::new().with_deadline(deadline)
    }

    /// Changes the deadline for this handle.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Also stop waiting when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The deadline for this handle, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Sets the value, unless some other call set it first.
    ///
    /// Returns `true` if this call set the value. Safe to call concurrently
    /// from any number of threads. Never blocks.
    pub fn signal(&self, value: T) -> bool {
        if self.shared.value.set(value).is_err() {
            return false;
        }
        self.shared.notify.notify_waiters();
        true
    }

    /// Returns `true` if the value is set.
    pub fn is_signaled(&self) -> bool {
        self.shared.value.get().is_some()
    }
}

impl<T: Clone> OneShot<T> {
    /// The current value, without waiting.
    pub fn peek(&self) -> Option<T> {
        self.shared.value.get().cloned()
    }

    /// Waits until the value is set, the deadline passes, or the wait is
    /// cancelled.
    ///
    /// If the value is set when the deadline expires the value wins.
    pub async fn wait(&self) -> Result<T> {
        let expired = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancelled = async {
            match &self.cancel {
                Some(t) => t.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            v = self.signaled() => Ok(v),
            _ = cancelled => Err(Error::cancelled("the wait for a one-shot signal was cancelled")),
            _ = expired => Err(Error::timeout("the one-shot signal was not set before the deadline")),
        }
    }

    async fn signaled(&self) -> T {
        loop {
            // Register interest before checking, a `signal()` between the check
            // and the await would be lost otherwise.
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(v) = self.shared.value.get() {
                return v.clone();
            }
            notified.await;
        }
    }
}
