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

//! Defines types to query polling policies.

use tokio::time::Instant;

/// The input into a polling policy query.
///
/// Each time a polling loop reads the status of an operation, or fails to
/// subscribe to a notification channel, it queries its policies with an
/// instance of this type.
///
/// The start time uses the [tokio clock][tokio::time::Instant], so tests that
/// pause time observe consistent elapsed times.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct PollingState {
    /// The start time for this polling loop.
    pub start: Instant,

    /// The number of times the loop has made an attempt.
    pub attempt_count: u32,

    /// The number of consecutive attempts that failed with an error.
    ///
    /// Reset to zero by any successful status read.
    pub error_count: u32,
}

impl PollingState {
    /// Create a new instance starting now.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the start time, useful in mocks.
    pub fn set_start<T: Into<Instant>>(mut self, v: T) -> Self {
        self.start = v.into();
        self
    }

    /// Update the attempt count, useful in mocks.
    pub fn set_attempt_count<T: Into<u32>>(mut self, v: T) -> Self {
        self.attempt_count = v.into();
        self
    }

    /// Update the error count, useful in mocks.
    pub fn set_error_count<T: Into<u32>>(mut self, v: T) -> Self {
        self.error_count = v.into();
        self
    }

    /// Records one more attempt.
    pub fn next_attempt(&mut self) {
        self.attempt_count = self.attempt_count.saturating_add(1);
    }

    /// Records that the last attempt failed.
    pub fn record_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
    }

    /// Records that the last attempt succeeded.
    pub fn record_success(&mut self) {
        self.error_count = 0;
    }

    /// The time since the loop started.
    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl std::default::Default for PollingState {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            attempt_count: 0,
            error_count: 0,
        }
    }
}
