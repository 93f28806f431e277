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

//! Options to configure polling loops.
//!
//! The defaults for the error and backoff policies are intended to work for
//! most applications. There is no default timeout: how long to wait for remote
//! work is an application decision, and each wait receives it explicitly.

use crate::exponential_backoff::ExponentialBackoff;
use crate::polling_backoff_policy::{PollingBackoffPolicy, PollingBackoffPolicyArg};
use crate::polling_error_policy::{
    Aip194Strict, PollingErrorPolicy, PollingErrorPolicyArg, PollingErrorPolicyExt,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The number of transient errors tolerated by the default error policy.
pub const DEFAULT_TRANSIENT_ATTEMPTS: u32 = 5;

/// A set of options configuring a polling loop.
///
/// # Example
/// ```
/// # use cloud_samples_gax::options::PollingOptions;
/// # use cloud_samples_gax::polling_backoff_policy::FixedDelay;
/// # use cloud_samples_gax::polling_error_policy::{AlwaysContinue, PollingErrorPolicyExt};
/// use std::time::Duration;
/// let options = PollingOptions::default()
///     .with_timeout(Duration::from_secs(600))
///     .with_backoff_policy(FixedDelay::new(Duration::from_secs(5)))
///     .with_error_policy(AlwaysContinue.with_attempt_limit(3));
/// assert_eq!(options.timeout(), Some(Duration::from_secs(600)));
/// ```
#[derive(Clone, Debug, Default)]
pub struct PollingOptions {
    error_policy: Option<Arc<dyn PollingErrorPolicy>>,
    backoff_policy: Option<Arc<dyn PollingBackoffPolicy>>,
    timeout: Option<Duration>,
    cancellation: Option<CancellationToken>,
}

impl PollingOptions {
    /// Sets the policy to handle errors while polling.
    pub fn with_error_policy<V: Into<PollingErrorPolicyArg>>(mut self, v: V) -> Self {
        self.error_policy = Some(v.into().into());
        self
    }

    /// Sets the policy to compute the delay between status reads.
    pub fn with_backoff_policy<V: Into<PollingBackoffPolicyArg>>(mut self, v: V) -> Self {
        self.backoff_policy = Some(v.into().into());
        self
    }

    /// Sets the overall budget for the wait.
    ///
    /// The budget includes the time spent reading the status and the time
    /// spent sleeping between reads.
    pub fn with_timeout<V: Into<Duration>>(mut self, v: V) -> Self {
        self.timeout = Some(v.into());
        self
    }

    /// Sets a token to cancel the wait before its deadline.
    pub fn with_cancellation(mut self, v: CancellationToken) -> Self {
        self.cancellation = Some(v);
        self
    }

    /// The configured error policy, or a policy that tolerates
    /// [DEFAULT_TRANSIENT_ATTEMPTS] consecutive transient errors.
    pub fn error_policy(&self) -> Arc<dyn PollingErrorPolicy> {
        self.error_policy.clone().unwrap_or_else(|| {
            Arc::new(Aip194Strict.with_error_limit(DEFAULT_TRANSIENT_ATTEMPTS))
        })
    }

    /// The configured backoff policy, or exponential backoff from 1s to 60s.
    pub fn backoff_policy(&self) -> Arc<dyn PollingBackoffPolicy> {
        self.backoff_policy
            .clone()
            .unwrap_or_else(|| Arc::new(ExponentialBackoff::default()))
    }

    /// The configured budget, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The configured cancellation token, if any.
    pub fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// The deadline for a wait starting at `start`.
    ///
    /// Budgets too large to represent are treated as no deadline.
    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        self.timeout.and_then(|t| start.checked_add(t))
    }
}
