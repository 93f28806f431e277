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

use crate::{Operation, Result};

/// Reads the current state of a long-running operation.
///
/// This is the only collaborator the poller needs. Implement it on top of any
/// transport (HTTP polling, gRPC, an in-memory fake) without touching the wait
/// logic.
///
/// Closures returning a future implement this trait, which is convenient in
/// tests and for one-off readers:
///
/// ```
/// # use cloud_samples_lro::{Operation, OperationReader};
/// # tokio_test::block_on(async {
/// let reader = |name: String| async move {
///     let op: Operation<u64> = Operation::succeeded(name, 42);
///     Ok(op)
/// };
/// let op = reader.read("operations/123".to_string()).await?;
/// assert_eq!(op.result(), Some(&42));
/// # Ok::<(), gax::error::Error>(())
/// # });
/// ```
#[async_trait::async_trait]
pub trait OperationReader<R, M>: Send + Sync {
    /// Fetch a snapshot of the operation called `name`.
    async fn read(&self, name: String) -> Result<Operation<R, M>>;
}

#[async_trait::async_trait]
impl<R, M, F, Fut> OperationReader<R, M> for F
where
    R: Send + 'static,
    M: Send + 'static,
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Operation<R, M>>> + Send + 'static,
{
    async fn read(&self, name: String) -> Result<Operation<R, M>> {
        (self)(name).await
    }
}
