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

//! Defines the trait for polling backoff policies and common implementations.
//!
//! Polling loops sleep between status reads to avoid overloading the service.
//! Polling backoff policies decide how long to sleep. They should not use
//! jitter: the sleeps are not coordinated with other clients, and predictable
//! read times make the loops easier to reason about.
//!
//! Two implementations are provided:
//! * [FixedDelay] sleeps the same interval between reads. Use it when the
//!   caller knows how often the status should be checked.
//! * [ExponentialBackoff][crate::exponential_backoff::ExponentialBackoff]
//!   grows the interval until some limit is reached. This works well when the
//!   expected execution time is not known in advance.
//!
//! Regardless of the policy, the polling loop never sleeps past the caller's
//! deadline.
//!
//! # Example
//! ```
//! # use cloud_samples_gax::polling_backoff_policy::*;
//! # use cloud_samples_gax::polling_state::PollingState;
//! use std::time::Duration;
//! let policy = FixedDelay::new(Duration::from_millis(100));
//! assert_eq!(policy.wait_period(&PollingState::default()), Duration::from_millis(100));
//! ```

use crate::polling_state::PollingState;
use std::sync::Arc;
use std::time::Duration;

/// Defines the trait implemented by all polling backoff strategies.
pub trait PollingBackoffPolicy: Send + Sync + std::fmt::Debug {
    /// Returns the delay before the next status read.
    ///
    /// # Parameters
    /// * `state` - when the loop started, and the number of status reads. This
    ///   method is always called after the first attempt.
    fn wait_period(&self, state: &PollingState) -> Duration;
}

/// A helper type to use [PollingBackoffPolicy] in options.
#[derive(Clone, Debug)]
pub struct PollingBackoffPolicyArg(pub(crate) Arc<dyn PollingBackoffPolicy>);

impl<T: PollingBackoffPolicy + 'static> std::convert::From<T> for PollingBackoffPolicyArg {
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn PollingBackoffPolicy>> for PollingBackoffPolicyArg {
    fn from(value: Arc<dyn PollingBackoffPolicy>) -> Self {
        Self(value)
    }
}

impl From<PollingBackoffPolicyArg> for Arc<dyn PollingBackoffPolicy> {
    fn from(value: PollingBackoffPolicyArg) -> Self {
        value.0
    }
}

/// Sleeps for the same interval between status reads.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedDelay {
    interval: Duration,
}

impl FixedDelay {
    /// Creates a policy that waits `interval` between reads.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl PollingBackoffPolicy for FixedDelay {
    fn wait_period(&self, _state: &PollingState) -> Duration {
        self.interval
    }
}
