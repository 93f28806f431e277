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

//! Truncated exponential backoff for polling loops.
//!
//! The delay before the n-th status read is `initial_delay * scaling^(n-1)`,
//! capped at `maximum_delay`. There is no jitter.

use crate::polling_backoff_policy::PollingBackoffPolicy;
use crate::polling_state::PollingState;
use std::time::Duration;

/// The error type for exponential backoff creation.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("the scaling value ({0}) should be >= 1.0")]
    InvalidScalingFactor(f64),
    #[error("the initial delay ({0:?}) should be greater than zero")]
    InvalidInitialDelay(Duration),
    #[error(
        "the maximum delay ({maximum:?}) should be greater than or equal to the initial delay ({initial:?})"
    )]
    EmptyRange { maximum: Duration, initial: Duration },
}

/// Builds a [ExponentialBackoff] policy.
///
/// # Example
/// ```
/// # use cloud_samples_gax::exponential_backoff::{Error, ExponentialBackoffBuilder};
/// # use cloud_samples_gax::polling_backoff_policy::PollingBackoffPolicy;
/// # use cloud_samples_gax::polling_state::PollingState;
/// use std::time::Duration;
/// let backoff = ExponentialBackoffBuilder::new()
///     .with_initial_delay(Duration::from_secs(5))
///     .with_maximum_delay(Duration::from_secs(50))
///     .with_scaling(2.0)
///     .build()?;
/// let state = PollingState::default().set_attempt_count(2_u32);
/// assert_eq!(backoff.wait_period(&state), Duration::from_secs(10));
/// # Ok::<(), Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct ExponentialBackoffBuilder {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
}

impl ExponentialBackoffBuilder {
    /// Creates a builder with the default parameters: 1s initial delay, 60s
    /// maximum delay, and a scaling factor of 2.
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            maximum_delay: Duration::from_secs(60),
            scaling: 2.0,
        }
    }

    /// Change the initial delay.
    pub fn with_initial_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.initial_delay = v.into();
        self
    }

    /// Change the maximum delay.
    pub fn with_maximum_delay<V: Into<Duration>>(mut self, v: V) -> Self {
        self.maximum_delay = v.into();
        self
    }

    /// Change the scaling factor.
    pub fn with_scaling<V: Into<f64>>(mut self, v: V) -> Self {
        self.scaling = v.into();
        self
    }

    /// Creates the policy, rejecting invalid parameters.
    pub fn build(self) -> Result<ExponentialBackoff, Error> {
        if self.scaling < 1.0 {
            return Err(Error::InvalidScalingFactor(self.scaling));
        }
        if self.initial_delay.is_zero() {
            return Err(Error::InvalidInitialDelay(self.initial_delay));
        }
        if self.maximum_delay < self.initial_delay {
            return Err(Error::EmptyRange {
                maximum: self.maximum_delay,
                initial: self.initial_delay,
            });
        }
        Ok(ExponentialBackoff {
            initial_delay: self.initial_delay,
            maximum_delay: self.maximum_delay,
            scaling: self.scaling,
        })
    }

    /// Creates the policy, clamping the parameters towards usable values.
    ///
    /// The maximum delay is clamped to `[1ms, 1 day]`, then the initial delay
    /// to `[1ms, maximum delay]`, and the scaling factor to `[1.0, 32.0]`.
    pub fn clamp(self) -> ExponentialBackoff {
        let maximum_delay = self
            .maximum_delay
            .clamp(Duration::from_millis(1), Duration::from_secs(24 * 60 * 60));
        let initial_delay = self
            .initial_delay
            .clamp(Duration::from_millis(1), maximum_delay);
        ExponentialBackoff {
            initial_delay,
            maximum_delay,
            scaling: self.scaling.clamp(1.0, 32.0),
        }
    }
}

impl Default for ExponentialBackoffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Implements truncated exponential backoff without jitter.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    maximum_delay: Duration,
    scaling: f64,
}

impl ExponentialBackoff {
    fn delay(&self, attempt_count: u32) -> Duration {
        let exp = attempt_count.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.scaling.powi(exp);
        // Compare before multiplying, `mul_f64()` panics on overflow.
        if factor >= self.maximum_delay.div_duration_f64(self.initial_delay) {
            return self.maximum_delay;
        }
        self.initial_delay.mul_f64(factor)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        ExponentialBackoffBuilder::new().clamp()
    }
}

impl PollingBackoffPolicy for ExponentialBackoff {
    fn wait_period(&self, state: &PollingState) -> Duration {
        self.delay(state.attempt_count)
    }
}
