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

//! Custom errors for the notification listener.
//!
//! These are returned as the `source()` of an [Error][crate::Error].

/// Represents the reasons a listener stops without a notification.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum ListenError {
    /// No matching notification arrived before the deadline.
    #[error("no notification for job {0} arrived before the deadline")]
    Timeout(String),

    /// The subscription stopped delivering messages before a matching
    /// notification arrived.
    #[error("the subscription closed before a notification for job {0} arrived")]
    Closed(String),
}

impl ListenError {
    /// The job the listener was waiting for.
    pub fn job_id(&self) -> &str {
        match self {
            ListenError::Timeout(j) | ListenError::Closed(j) => j,
        }
    }
}
