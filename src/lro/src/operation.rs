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

use gax::error::rpc::Status;

/// The lifecycle states of a long-running operation.
///
/// Operations move from `Pending` to `Running` and then to one of the terminal
/// states. Once an operation is terminal it never changes again.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationState {
    /// The service accepted the request but has not started the work.
    Pending,
    /// The service is executing the work.
    Running,
    /// The work completed, the operation carries its result.
    Succeeded,
    /// The work failed, the operation carries the service error.
    Failed,
}

impl OperationState {
    /// Returns `true` for [Succeeded][Self::Succeeded] and [Failed][Self::Failed].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A snapshot of a long-running operation, as returned by a status read.
///
/// The local process never mutates an operation, it only holds the most
/// recently fetched snapshot. The result is present only when the operation
/// succeeded, and the error only when it failed. The constructors make any
/// other combination unrepresentable.
///
/// # Parameters
/// * `R` - the type of the result payload.
/// * `M` - the type of the (optional) progress metadata.
///
/// # Example
/// ```
/// # use cloud_samples_lro::{Operation, OperationState};
/// let op: Operation<String> = Operation::running("operations/123");
/// assert_eq!(op.state(), OperationState::Running);
/// assert!(!op.done());
///
/// let op: Operation<String> = Operation::succeeded("operations/123", "the-result".to_string());
/// assert_eq!(op.result(), Some(&"the-result".to_string()));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Operation<R, M = ()> {
    name: String,
    metadata: Option<M>,
    outcome: Outcome<R>,
}

#[derive(Clone, Debug, PartialEq)]
enum Outcome<R> {
    Pending,
    Running,
    Succeeded(R),
    Failed(Status),
}

impl<R, M> Operation<R, M> {
    /// An operation accepted by the service, but not yet started.
    pub fn pending<T: Into<String>>(name: T) -> Self {
        Self::with_outcome(name, Outcome::Pending)
    }

    /// An operation that is still executing.
    pub fn running<T: Into<String>>(name: T) -> Self {
        Self::with_outcome(name, Outcome::Running)
    }

    /// An operation that completed successfully.
    pub fn succeeded<T: Into<String>>(name: T, result: R) -> Self {
        Self::with_outcome(name, Outcome::Succeeded(result))
    }

    /// An operation that failed.
    pub fn failed<T: Into<String>>(name: T, error: Status) -> Self {
        Self::with_outcome(name, Outcome::Failed(error))
    }

    fn with_outcome<T: Into<String>>(name: T, outcome: Outcome<R>) -> Self {
        Self {
            name: name.into(),
            metadata: None,
            outcome,
        }
    }

    /// Sets the progress metadata.
    pub fn set_metadata<T: Into<M>>(mut self, v: T) -> Self {
        self.metadata = Some(v.into());
        self
    }

    /// The server-assigned, opaque name of the operation.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> OperationState {
        match &self.outcome {
            Outcome::Pending => OperationState::Pending,
            Outcome::Running => OperationState::Running,
            Outcome::Succeeded(_) => OperationState::Succeeded,
            Outcome::Failed(_) => OperationState::Failed,
        }
    }

    /// Returns `true` if the operation reached a terminal state.
    pub fn done(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn metadata(&self) -> Option<&M> {
        self.metadata.as_ref()
    }

    /// The result, present only if the operation succeeded.
    pub fn result(&self) -> Option<&R> {
        match &self.outcome {
            Outcome::Succeeded(r) => Some(r),
            _ => None,
        }
    }

    /// The error, present only if the operation failed.
    pub fn error(&self) -> Option<&Status> {
        match &self.outcome {
            Outcome::Failed(s) => Some(s),
            _ => None,
        }
    }

    /// Splits the snapshot into its name, metadata, and terminal outcome.
    ///
    /// The outcome is `None` while the operation is in progress.
    pub(crate) fn into_parts(self) -> (String, Option<M>, Option<Result<R, Status>>) {
        let outcome = match self.outcome {
            Outcome::Pending | Outcome::Running => None,
            Outcome::Succeeded(r) => Some(Ok(r)),
            Outcome::Failed(s) => Some(Err(s)),
        };
        (self.name, self.metadata, outcome)
    }
}
