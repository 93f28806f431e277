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

//! Types and functions to wait for long-running operations.
//!
//! Some services execute mutating requests asynchronously. The request returns
//! an operation reference, and the application reads the operation status
//! until it reaches a terminal state. This crate implements that polling loop.
//!
//! The loop is driven by three inputs:
//! * an [OperationReader], which fetches a snapshot of the operation,
//! * a [PollingBackoffPolicy], which decides how long to sleep between reads,
//! * a [PollingErrorPolicy], which decides which read errors are transient.
//!
//! The caller also supplies the overall budget. No status read starts at or
//! after the deadline, and the wait returns a timeout error once it passes.
//!
//! # Example
//! ```
//! # use cloud_samples_lro::{Operation, await_operation};
//! # tokio_test::block_on(async {
//! use std::time::Duration;
//! let reader = |name: String| async move {
//!     // ... read the operation status from the service ...
//!     let op: Operation<String> = Operation::succeeded(name, "instance ready".to_string());
//!     Ok(op)
//! };
//! let result = await_operation(
//!     reader,
//!     "operations/create-instance-123",
//!     Duration::from_millis(100),
//!     Duration::from_secs(60),
//! )
//! .await?;
//! assert_eq!(result, "instance ready");
//! # Ok::<(), gax::error::Error>(())
//! # });
//! ```

use std::time::Duration;

pub use gax::Result;
pub use gax::error::Error;
pub use gax::options::PollingOptions;
pub use gax::polling_backoff_policy::{FixedDelay, PollingBackoffPolicy};
pub use gax::polling_error_policy::PollingErrorPolicy;

mod details;
mod operation;
mod poller;
mod reader;

pub use details::DeadlineExceeded;
pub use operation::{Operation, OperationState};
pub use reader::OperationReader;

/// The result of polling a long-running operation.
///
/// # Parameters
/// * `R` - the result type, that is, the type included when the operation
///   completes successfully.
/// * `M` - the metadata type, that is, the type returned by the service while
///   the operation is in progress.
#[derive(Debug)]
pub enum PollingResult<R, M> {
    /// The operation is still in progress.
    InProgress(Option<M>),

    /// The operation completed. This includes the result (if successful) or
    /// the error (if not). Completed includes timeouts and exhausted policies.
    Completed(Result<R>),

    /// An error trying to poll the operation.
    ///
    /// The error policy decided the error is transient. The polling loop
    /// continues.
    PollingError(Error),
}

/// The trait implemented by operation pollers.
///
/// Use [until_done][Poller::until_done] for the common case of waiting until
/// the operation completes. Use [poll][Poller::poll] to observe each status
/// read, for example to report progress.
///
/// # Parameters
/// * `R` - the result type of the operation.
/// * `M` - the metadata type of the operation.
pub trait Poller<R, M>: Send + sealed::Poller {
    /// Make one attempt to read the status of the operation.
    ///
    /// Returns `None` once the poller has returned
    /// [Completed][PollingResult::Completed].
    fn poll(&mut self) -> impl Future<Output = Option<PollingResult<R, M>>> + Send;

    /// Poll the operation until it reaches a terminal state, the deadline
    /// passes, or the error policy stops the loop.
    fn until_done(self) -> impl Future<Output = Result<R>> + Send;

    /// Convert a poller to a [futures::Stream].
    #[cfg(feature = "unstable-stream")]
    fn into_stream(self) -> impl futures::Stream<Item = PollingResult<R, M>> + Unpin;
}

/// Creates a poller that starts the operation and then polls it.
///
/// `start` issues the mutating request and returns the initial snapshot of
/// the operation. The poller then uses `reader` to poll the operation by name.
/// The deadline, if any, covers both the start and the polling.
pub fn new_poller<R, M, S, SF, Q>(options: PollingOptions, start: S, reader: Q) -> impl Poller<R, M>
where
    R: Send + 'static,
    M: Send + 'static,
    S: FnOnce() -> SF + Send + Sync,
    SF: Future<Output = Result<Operation<R, M>>> + Send + 'static,
    Q: OperationReader<R, M>,
{
    poller::PollerImpl::new(&options, Some(start), None, reader)
}

/// Creates a poller for an operation that is already running.
///
/// The first status read happens without delay.
pub fn resume_poller<R, M, Q, T>(options: PollingOptions, name: T, reader: Q) -> impl Poller<R, M>
where
    R: Send + 'static,
    M: Send + 'static,
    Q: OperationReader<R, M>,
    T: Into<String>,
{
    poller::PollerImpl::<poller::NoStart<R, M>, Q>::new(&options, None, Some(name.into()), reader)
}

/// Waits until the operation called `name` reaches a terminal state.
///
/// Reads the status immediately and then every `poll_interval`, for at most
/// `timeout`. Returns:
/// * the operation result if the operation succeeded,
/// * an error with the service [Status][gax::error::rpc::Status] if the
///   operation failed, see [Error::status],
/// * a timeout error if the operation is still in progress at the deadline,
///   see [Error::is_timeout],
/// * the transport error if reading the status fails persistently, see
///   [Error::is_transport].
///
/// Transient read errors are retried a few times, see
/// [PollingOptions::error_policy]. Use [resume_poller] to change that policy.
pub async fn await_operation<R, M, Q, T>(
    reader: Q,
    name: T,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<R>
where
    R: Send + 'static,
    M: Send + 'static,
    Q: OperationReader<R, M>,
    T: Into<String>,
{
    let options = PollingOptions::default()
        .with_backoff_policy(FixedDelay::new(poll_interval))
        .with_timeout(timeout);
    resume_poller(options, name, reader).until_done().await
}

mod sealed {
    pub trait Poller {}
}
