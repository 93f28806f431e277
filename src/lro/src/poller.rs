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

use crate::details;
use crate::{
    Operation, OperationReader, PollingBackoffPolicy, PollingErrorPolicy, PollingOptions,
    PollingResult, Result,
};
use gax::polling_state::PollingState;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// The type of `start` for pollers that resume an existing operation.
pub(crate) type NoStart<R, M> = fn() -> std::future::Ready<Result<Operation<R, M>>>;

pub(crate) struct PollerImpl<S, Q> {
    error_policy: Arc<dyn PollingErrorPolicy>,
    backoff_policy: Arc<dyn PollingBackoffPolicy>,
    start: Option<S>,
    reader: Q,
    operation: Option<String>,
    state: PollingState,
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl<S, Q> PollerImpl<S, Q> {
    pub(crate) fn new(
        options: &PollingOptions,
        start: Option<S>,
        operation: Option<String>,
        reader: Q,
    ) -> Self {
        let state = PollingState::default();
        let deadline = options.deadline_from(state.start);
        Self {
            error_policy: options.error_policy(),
            backoff_policy: options.backoff_policy(),
            start,
            reader,
            operation,
            state,
            deadline,
            cancel: options.cancellation().cloned(),
        }
    }

    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Sleeps before the next status read, never past the deadline.
    async fn backoff(&self) {
        let wait = self.backoff_policy.wait_period(&self.state);
        let now = Instant::now();
        let until = match (now.checked_add(wait), self.deadline) {
            (Some(t), Some(d)) => t.min(d),
            (Some(t), None) => t,
            (None, Some(d)) => d,
            (None, None) => return std::future::pending().await,
        };
        tracing::debug!(
            attempt = self.state.attempt_count,
            "waiting {:?} before the next status read",
            until - now
        );
        let _ = bounded(None, self.cancel.as_ref(), tokio::time::sleep_until(until)).await;
    }
}

impl<S, Q> crate::sealed::Poller for PollerImpl<S, Q> {}

impl<R, M, S, SF, Q> crate::Poller<R, M> for PollerImpl<S, Q>
where
    R: Send + 'static,
    M: Send + 'static,
    S: FnOnce() -> SF + Send + Sync,
    SF: Future<Output = Result<Operation<R, M>>> + Send + 'static,
    Q: OperationReader<R, M>,
{
    async fn poll(&mut self) -> Option<PollingResult<R, M>> {
        if let Some(start) = self.start.take() {
            tracing::debug!("starting long-running operation");
            let result = match bounded(self.deadline, self.cancel.as_ref(), start()).await {
                Bounded::Done(r) => r,
                Bounded::Expired => Err(details::deadline_exceeded("")),
                Bounded::Cancelled => Err(details::cancelled("")),
            };
            let (op, poll) = details::handle_start(result);
            self.operation = op;
            return Some(poll);
        }
        let name = self.operation.take()?;
        if self.cancelled() {
            return Some(PollingResult::Completed(Err(details::cancelled(name))));
        }
        if self.expired() {
            tracing::debug!(
                operation = %name,
                attempts = self.state.attempt_count,
                "deadline reached before the operation completed"
            );
            return Some(PollingResult::Completed(Err(details::deadline_exceeded(
                name,
            ))));
        }
        self.state.next_attempt();
        tracing::debug!(
            operation = %name,
            attempt = self.state.attempt_count,
            "reading operation status"
        );
        let read = self.reader.read(name.clone());
        let result = match bounded(self.deadline, self.cancel.as_ref(), read).await {
            Bounded::Done(r) => r,
            Bounded::Expired => {
                return Some(PollingResult::Completed(Err(details::deadline_exceeded(
                    name,
                ))));
            }
            Bounded::Cancelled => {
                return Some(PollingResult::Completed(Err(details::cancelled(name))));
            }
        };
        match &result {
            Ok(op) => {
                self.state.record_success();
                tracing::debug!(operation = %name, state = %op.state(), "operation status");
            }
            Err(e) => {
                self.state.record_error();
                tracing::warn!(
                    operation = %name,
                    attempt = self.state.attempt_count,
                    errors = self.state.error_count,
                    "error reading operation status: {e}"
                );
            }
        }
        let (op, poll) =
            details::handle_poll(self.error_policy.as_ref(), &self.state, name, result);
        self.operation = op;
        Some(poll)
    }

    async fn until_done(mut self) -> Result<R> {
        while let Some(p) = self.poll().await {
            match p {
                // Return, the operation completed, the deadline passed, or the
                // error policy stopped the loop.
                PollingResult::Completed(r) => return r,
                // Continue, the operation is still in progress.
                PollingResult::InProgress(_) => (),
                // Continue, the error policy decided the error is recoverable.
                PollingResult::PollingError(_) => (),
            }
            self.backoff().await;
        }
        // We can only get here if `poll()` returns `None`, but it only returns
        // `None` after it returned `PollingResult::Completed`.
        unreachable!("loop should exit via the `Completed` branch vs. this line");
    }

    #[cfg(feature = "unstable-stream")]
    fn into_stream(self) -> impl futures::Stream<Item = PollingResult<R, M>> + Unpin {
        use futures::stream::unfold;
        Box::pin(unfold(Some((self, false)), move |state| async move {
            let (mut poller, wait) = state?;
            if wait {
                poller.backoff().await;
            }
            let pr = poller.poll().await?;
            let done = matches!(pr, PollingResult::Completed(_));
            Some((pr, (!done).then_some((poller, true))))
        }))
    }
}

enum Bounded<T> {
    Done(T),
    Expired,
    Cancelled,
}

/// Runs `fut` until it completes, the deadline passes, or `cancel` fires.
async fn bounded<F>(
    deadline: Option<Instant>,
    cancel: Option<&CancellationToken>,
    fut: F,
) -> Bounded<F::Output>
where
    F: Future,
{
    let expired = async move {
        match deadline {
            Some(d) => tokio::time::sleep_until(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    let cancelled = async move {
        match cancel {
            Some(t) => t.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        biased;
        _ = cancelled => Bounded::Cancelled,
        v = fut => Bounded::Done(v),
        _ = expired => Bounded::Expired,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Poller, new_poller, resume_poller};
    use gax::error::Error;
    use gax::polling_backoff_policy::FixedDelay;
    use gax::polling_error_policy::{AlwaysContinue, PollingErrorPolicyExt};
    use std::sync::Mutex;
    use std::time::Duration;

    type TestOperation = Operation<i32, String>;

    fn options() -> PollingOptions {
        PollingOptions::default()
            .with_backoff_policy(FixedDelay::new(Duration::from_millis(100)))
            .with_timeout(Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn start_then_poll() -> anyhow::Result<()> {
        let start = || async move { Ok(TestOperation::pending("op-1")) };
        let reader = |name: String| async move {
            assert_eq!(name, "op-1");
            Ok(TestOperation::succeeded(name, 42))
        };
        let got = new_poller(options(), start, reader).until_done().await?;
        assert_eq!(got, 42);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn start_error() {
        let start = || async move { Err::<TestOperation, _>(Error::io("reset")) };
        let reader = |name: String| async move { Ok(TestOperation::succeeded(name, 42)) };
        let got = new_poller(options(), start, reader).until_done().await;
        assert!(matches!(got, Err(ref e) if e.is_io()), "{got:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn start_exceeds_deadline() {
        let start = || async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(TestOperation::pending("op-1"))
        };
        let reader = |name: String| async move { Ok(TestOperation::succeeded(name, 42)) };
        let begin = Instant::now();
        let got = new_poller(options(), start, reader).until_done().await;
        assert!(matches!(got, Err(ref e) if e.is_timeout()), "{got:?}");
        assert_eq!(begin.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_read_exceeds_deadline() {
        let reader = |name: String| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(TestOperation::succeeded(name, 42))
        };
        let begin = Instant::now();
        let got = resume_poller(options(), "op-1", reader).until_done().await;
        assert!(matches!(got, Err(ref e) if e.is_timeout()), "{got:?}");
        assert_eq!(begin.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_while_sleeping() {
        let token = CancellationToken::new();
        let options = PollingOptions::default()
            .with_backoff_policy(FixedDelay::new(Duration::from_secs(10)))
            .with_timeout(Duration::from_secs(60))
            .with_cancellation(token.clone());
        let reader = |name: String| async move { Ok(TestOperation::running(name)) };
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            token.cancel();
        });
        let begin = Instant::now();
        let got = resume_poller(options, "op-1", reader).until_done().await;
        assert!(matches!(got, Err(ref e) if e.is_cancelled()), "{got:?}");
        assert_eq!(begin.elapsed(), Duration::from_secs(1));
        let _ = canceller.await;
    }

    #[tokio::test(start_paused = true)]
    async fn poll_reports_each_read() {
        let reads = Arc::new(Mutex::new(0));
        let counter = reads.clone();
        let reader = move |name: String| {
            let count = {
                let mut guard = counter.lock().expect("mutex is never poisoned in tests");
                *guard += 1;
                *guard
            };
            async move {
                match count {
                    1 => Ok(TestOperation::running(name).set_metadata("25%")),
                    2 => Err(Error::io("reset")),
                    _ => Ok(TestOperation::succeeded(name, 7)),
                }
            }
        };
        let options = options().with_error_policy(AlwaysContinue.with_error_limit(3));
        let mut poller = resume_poller(options, "op-1", reader);
        let p = poller.poll().await;
        assert!(
            matches!(p, Some(PollingResult::InProgress(Some(ref m))) if m == "25%"),
            "{p:?}"
        );
        let p = poller.poll().await;
        assert!(matches!(p, Some(PollingResult::PollingError(_))), "{p:?}");
        let p = poller.poll().await;
        assert!(matches!(p, Some(PollingResult::Completed(Ok(7)))), "{p:?}");
        let p = poller.poll().await;
        assert!(p.is_none(), "{p:?}");
        assert_eq!(*reads.lock().expect("mutex is never poisoned in tests"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn no_deadline() -> anyhow::Result<()> {
        let reads = Arc::new(Mutex::new(0));
        let counter = reads.clone();
        let reader = move |name: String| {
            let count = {
                let mut guard = counter.lock().expect("mutex is never poisoned in tests");
                *guard += 1;
                *guard
            };
            async move {
                if count < 50 {
                    Ok(TestOperation::running(name))
                } else {
                    Ok(TestOperation::succeeded(name, count))
                }
            }
        };
        let options = PollingOptions::default()
            .with_backoff_policy(FixedDelay::new(Duration::from_secs(60)));
        let got = resume_poller(options, "op-1", reader).until_done().await?;
        assert_eq!(got, 50);
        Ok(())
    }
}
