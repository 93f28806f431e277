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

//! Simplifies the implementation of `PollerImpl`

use crate::{Error, Operation, PollingResult, Result};
use gax::polling_error_policy::PollingErrorPolicy;
use gax::polling_state::PollingState;
use gax::retry_result::RetryResult;

/// The polling loop reached its deadline before the operation completed.
///
/// Returned as the [source][std::error::Error::source] of timeout errors
/// created by the poller.
#[derive(Debug, thiserror::Error)]
#[error("operation {operation} did not reach a terminal state before the deadline")]
pub struct DeadlineExceeded {
    operation: String,
}

impl DeadlineExceeded {
    /// The name of the operation, empty if the operation never started.
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

pub(crate) fn deadline_exceeded<T: Into<String>>(operation: T) -> Error {
    Error::timeout(DeadlineExceeded {
        operation: operation.into(),
    })
}

pub(crate) fn cancelled<T: Into<String>>(operation: T) -> Error {
    let operation = operation.into();
    Error::cancelled(format!("polling for operation {operation} was cancelled"))
}

pub(crate) fn handle_start<R, M>(
    result: Result<Operation<R, M>>,
) -> (Option<String>, PollingResult<R, M>) {
    match result {
        Err(e) => (None, PollingResult::Completed(Err(e))),
        Ok(op) => handle_common(op),
    }
}

pub(crate) fn handle_poll<R, M>(
    error_policy: &dyn PollingErrorPolicy,
    state: &PollingState,
    operation_name: String,
    result: Result<Operation<R, M>>,
) -> (Option<String>, PollingResult<R, M>) {
    match result {
        Err(e) => {
            let decision = error_policy.on_error(state, e);
            handle_polling_error(decision, operation_name)
        }
        Ok(op) => {
            let (name, result) = handle_common(op);
            if !matches!(result, PollingResult::InProgress(_)) {
                return (name, result);
            }
            match error_policy.on_in_progress(state, &operation_name) {
                Ok(()) => (name, result),
                Err(e) => (None, PollingResult::Completed(Err(e))),
            }
        }
    }
}

fn handle_polling_error<R, M>(
    decision: RetryResult,
    operation_name: String,
) -> (Option<String>, PollingResult<R, M>) {
    match decision {
        RetryResult::Continue(e) => (Some(operation_name), PollingResult::PollingError(e)),
        RetryResult::Exhausted(e) | RetryResult::Permanent(e) => {
            (None, PollingResult::Completed(Err(e)))
        }
    }
}

fn handle_common<R, M>(op: Operation<R, M>) -> (Option<String>, PollingResult<R, M>) {
    let (name, metadata, outcome) = op.into_parts();
    match outcome {
        Some(Ok(r)) => (None, PollingResult::Completed(Ok(r))),
        Some(Err(status)) => (None, PollingResult::Completed(Err(Error::service(status)))),
        None if name.is_empty() => (
            None,
            PollingResult::Completed(Err(Error::deser(
                "the service returned an in-progress operation without a name",
            ))),
        ),
        None => (Some(name), PollingResult::InProgress(metadata)),
    }
}
