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

//! Wait for job notifications delivered through Pub/Sub.
//!
//! Some services report the completion of a job by publishing a message to a
//! Pub/Sub topic, rather than through a long-running operation. The message
//! carries the job identifier in one of its attributes. This crate contains a
//! [NotificationListener] that subscribes, waits for the message for one job,
//! and unsubscribes.
//!
//! The listener consumes any [Subscription][subscriber::Subscription], a small
//! trait for transports that deliver messages to a callback. The crate includes
//! an adapter for pull-style streams and an in-process subscription.
//!
//! # Example
//! ```
//! # use cloud_samples_pubsub::{await_notification, memory::MemorySubscription, model::Message};
//! # tokio_test::block_on(async {
//! use std::time::Duration;
//! let subscription = MemorySubscription::new("projects/my-project/subscriptions/dlp-jobs");
//! // ... start a job, the service publishes a message when it completes ...
//! subscription.publish(
//!     Message::new().set_attributes([("DlpJobName", "projects/my-project/dlpJobs/i-123")]),
//! );
//! let message = await_notification(
//!     &subscription,
//!     "projects/my-project/dlpJobs/i-123",
//!     Duration::from_secs(60),
//! )
//! .await?;
//! println!("job completed: {message:?}");
//! # Ok::<(), cloud_samples_pubsub::Error>(())
//! # });
//! ```

pub use gax::Result;
pub use gax::error::Error;

pub mod error;
pub mod memory;
pub mod model;
pub mod subscriber;

mod listener;
pub use listener::{
    Correlation, DEFAULT_CORRELATION_ATTRIBUTE, NotificationListener, await_notification,
};
