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

//! Defines the types for polling error policies.
//!
//! # Example
//! ```
//! # use cloud_samples_gax::polling_error_policy::*;
//! use std::time::Duration;
//! // Poll for at most 15 minutes or at most 50 attempts: whichever limit is
//! // reached first stops the polling loop.
//! let policy = Aip194Strict
//!     .with_time_limit(Duration::from_secs(15 * 60))
//!     .with_attempt_limit(50);
//! ```
//!
//! Polling loops need to (1) distinguish between transient and permanent
//! errors, and (2) bound the number of transient errors they tolerate. The
//! overall deadline of a wait is not a policy: it is always supplied by the
//! caller and enforced by the loop itself.
//!
//! Applications may implement [PollingErrorPolicy] to customize the loop, the
//! implementations in this module should meet most needs.

use crate::Result;
use crate::error::Error;
use crate::error::rpc::Code;
use crate::polling_state::PollingState;
use crate::retry_result::RetryResult;
use std::sync::Arc;

/// Determines how errors are handled in the polling loop.
///
/// Implementations of this trait determine if polling errors may resolve in
/// future attempts, and for how long the polling loop may continue.
pub trait PollingErrorPolicy: Send + Sync + std::fmt::Debug {
    /// Query the polling policy after an error.
    ///
    /// # Parameters
    /// * `state` - when the loop started, and how many attempts it made. The
    ///   attempt count includes the attempt that failed.
    /// * `error` - the last error when attempting the request.
    fn on_error(&self, state: &PollingState, error: Error) -> RetryResult;

    /// Called when the operation is successfully read, but still in progress.
    ///
    /// Returning an error stops the loop.
    fn on_in_progress(&self, _state: &PollingState, _operation_name: &str) -> Result<()> {
        Ok(())
    }
}

/// A helper type to use [PollingErrorPolicy] in options.
#[derive(Clone, Debug)]
pub struct PollingErrorPolicyArg(pub(crate) Arc<dyn PollingErrorPolicy>);

impl<T> std::convert::From<T> for PollingErrorPolicyArg
where
    T: PollingErrorPolicy + 'static,
{
    fn from(value: T) -> Self {
        Self(Arc::new(value))
    }
}

impl std::convert::From<Arc<dyn PollingErrorPolicy>> for PollingErrorPolicyArg {
    fn from(value: Arc<dyn PollingErrorPolicy>) -> Self {
        Self(value)
    }
}

impl From<PollingErrorPolicyArg> for Arc<dyn PollingErrorPolicy> {
    fn from(value: PollingErrorPolicyArg) -> Self {
        value.0
    }
}

/// Extension trait for [PollingErrorPolicy]
pub trait PollingErrorPolicyExt: PollingErrorPolicy + Sized {
    /// Decorate a [PollingErrorPolicy] to limit the total elapsed time in the
    /// polling loop.
    ///
    /// While the time spent in the polling loop (including time in backoff) is
    /// less than the prescribed duration the `on_error()` method returns the
    /// results of the inner policy. After that time it returns
    /// [Exhausted][RetryResult::Exhausted] if the inner policy returns
    /// [Continue][RetryResult::Continue].
    ///
    /// # Example
    /// ```
    /// # use cloud_samples_gax::*;
    /// use polling_error_policy::*;
    /// use polling_state::PollingState;
    /// use std::time::Duration;
    /// let policy = Aip194Strict.with_time_limit(Duration::from_secs(10)).with_attempt_limit(3);
    /// let state = PollingState::default().set_attempt_count(4_u32);
    /// assert!(policy.on_error(&state, transient_error()).is_exhausted());
    ///
    /// use cloud_samples_gax::error::{Error, rpc::Code, rpc::Status};
    /// fn transient_error() -> Error { Error::service(Status::default().set_code(Code::Unavailable)) }
    /// ```
    fn with_time_limit(self, maximum_duration: std::time::Duration) -> LimitedElapsedTime<Self> {
        LimitedElapsedTime::custom(self, maximum_duration)
    }

    /// Decorate a [PollingErrorPolicy] to limit the number of attempts.
    ///
    /// The policy passes through the results from the inner policy as long as
    /// `attempt_count < maximum_attempts`. Once the maximum number of attempts
    /// is reached, the policy returns [Exhausted][RetryResult::Exhausted] if
    /// the inner policy returns [Continue][RetryResult::Continue], and passes
    /// the inner policy result otherwise.
    ///
    /// # Example
    /// ```
    /// # use cloud_samples_gax::*;
    /// use polling_error_policy::*;
    /// use polling_state::PollingState;
    /// let policy = Aip194Strict.with_attempt_limit(3);
    /// let state = |n: u32| PollingState::default().set_attempt_count(n);
    /// assert!(policy.on_error(&state(1), transient_error()).is_continue());
    /// assert!(policy.on_error(&state(2), transient_error()).is_continue());
    /// assert!(policy.on_error(&state(3), transient_error()).is_exhausted());
    ///
    /// use cloud_samples_gax::error::{Error, rpc::Code, rpc::Status};
    /// fn transient_error() -> Error { Error::service(Status::default().set_code(Code::Unavailable)) }
    /// ```
    fn with_attempt_limit(self, maximum_attempts: u32) -> LimitedAttemptCount<Self> {
        LimitedAttemptCount::custom(self, maximum_attempts)
    }

    /// Decorate a [PollingErrorPolicy] to limit consecutive errors.
    ///
    /// Unlike [with_attempt_limit][PollingErrorPolicyExt::with_attempt_limit]
    /// this only counts failed attempts, and a successful status read resets
    /// the count. Operations may stay in progress for as long as the caller's
    /// deadline allows, while a persistent transport problem surfaces quickly.
    ///
    /// # Example
    /// ```
    /// # use cloud_samples_gax::*;
    /// use polling_error_policy::*;
    /// use polling_state::PollingState;
    /// let policy = Aip194Strict.with_error_limit(2);
    /// let state = |n: u32| PollingState::default().set_attempt_count(100_u32).set_error_count(n);
    /// assert!(policy.on_error(&state(1), transient_error()).is_continue());
    /// assert!(policy.on_error(&state(2), transient_error()).is_exhausted());
    /// assert!(policy.on_in_progress(&state(0), "op").is_ok());
    ///
    /// use cloud_samples_gax::error::{Error, rpc::Code, rpc::Status};
    /// fn transient_error() -> Error { Error::service(Status::default().set_code(Code::Unavailable)) }
    /// ```
    fn with_error_limit(self, maximum_errors: u32) -> LimitedErrorCount<Self> {
        LimitedErrorCount::custom(self, maximum_errors)
    }
}

impl<T: PollingErrorPolicy> PollingErrorPolicyExt for T {}

/// A polling policy that strictly follows [AIP-194].
///
/// This policy must be decorated to limit the number of polling attempts or the
/// duration of the polling loop.
///
/// The policy continues on `UNAVAILABLE`, on I/O errors, and on authentication
/// errors. Any other error stops the loop.
///
/// [AIP-194]: https://google.aip.dev/194
#[derive(Clone, Debug)]
pub struct Aip194Strict;

impl PollingErrorPolicy for Aip194Strict {
    fn on_error(&self, _state: &PollingState, error: Error) -> RetryResult {
        if error.is_transport() {
            return RetryResult::Continue(error);
        }
        match error.status() {
            Some(status) if status.code == Code::Unavailable => RetryResult::Continue(error),
            _ => RetryResult::Permanent(error),
        }
    }
}

/// A polling policy that continues on any error.
///
/// This policy must be decorated to limit the number of polling attempts or the
/// duration of the polling loop.
///
/// # Example
/// ```
/// # use cloud_samples_gax::*;
/// # use cloud_samples_gax::polling_error_policy::*;
/// # use cloud_samples_gax::polling_state::PollingState;
/// let policy = AlwaysContinue;
/// assert!(policy.on_error(&PollingState::default(), permanent_error()).is_continue());
///
/// use cloud_samples_gax::error::{Error, rpc::Code, rpc::Status};
/// fn permanent_error() -> Error { Error::service(Status::default().set_code(Code::Aborted)) }
/// ```
#[derive(Clone, Debug)]
pub struct AlwaysContinue;

impl PollingErrorPolicy for AlwaysContinue {
    fn on_error(&self, _state: &PollingState, error: Error) -> RetryResult {
        RetryResult::Continue(error)
    }
}

/// A polling policy decorator that limits the total time in the polling loop.
///
/// While the time spent in the polling loop (including time in backoff) is less
/// than the prescribed duration the `on_error()` method returns the results of
/// the inner policy. After that time it returns
/// [Exhausted][RetryResult::Exhausted] if the inner policy returns
/// [Continue][RetryResult::Continue].
///
/// If the operation is still in progress when the time runs out the loop stops
/// with a timeout error.
///
/// # Parameters
/// * `P` - the inner polling policy, defaults to [Aip194Strict].
#[derive(Debug)]
pub struct LimitedElapsedTime<P = Aip194Strict>
where
    P: PollingErrorPolicy,
{
    inner: P,
    maximum_duration: std::time::Duration,
}

impl LimitedElapsedTime {
    /// Creates a new instance, with the default inner policy.
    pub fn new(maximum_duration: std::time::Duration) -> Self {
        Self {
            inner: Aip194Strict,
            maximum_duration,
        }
    }
}

impl<P> LimitedElapsedTime<P>
where
    P: PollingErrorPolicy,
{
    /// Creates a new instance with a custom inner policy.
    pub fn custom(inner: P, maximum_duration: std::time::Duration) -> Self {
        Self {
            inner,
            maximum_duration,
        }
    }

    fn in_progress_impl(&self, state: &PollingState, operation_name: &str) -> Result<()> {
        let elapsed = state.elapsed();
        if elapsed < self.maximum_duration {
            return Ok(());
        }
        Err(Error::timeout(Exhausted::new(
            operation_name,
            "elapsed time",
            format!("{elapsed:?}"),
            format!("{:?}", self.maximum_duration),
        )))
    }
}

impl<P> PollingErrorPolicy for LimitedElapsedTime<P>
where
    P: PollingErrorPolicy + 'static,
{
    fn on_error(&self, state: &PollingState, error: Error) -> RetryResult {
        match self.inner.on_error(state, error) {
            RetryResult::Continue(e) if state.elapsed() >= self.maximum_duration => {
                RetryResult::Exhausted(e)
            }
            r => r,
        }
    }

    fn on_in_progress(&self, state: &PollingState, operation_name: &str) -> Result<()> {
        self.inner.on_in_progress(state, operation_name)?;
        self.in_progress_impl(state, operation_name)
    }
}

/// A polling policy decorator that limits the number of attempts.
///
/// The policy passes through the results from the inner policy as long as
/// `attempt_count < maximum_attempts`. However, once the maximum number of
/// attempts is reached, the policy replaces any
/// [Continue][RetryResult::Continue] result with
/// [Exhausted][RetryResult::Exhausted].
///
/// # Parameters
/// * `P` - the inner polling policy.
#[derive(Debug)]
pub struct LimitedAttemptCount<P = Aip194Strict>
where
    P: PollingErrorPolicy,
{
    inner: P,
    maximum_attempts: u32,
}

impl LimitedAttemptCount {
    /// Creates a new instance, with the default inner policy.
    pub fn new(maximum_attempts: u32) -> Self {
        Self {
            inner: Aip194Strict,
            maximum_attempts,
        }
    }
}

impl<P> LimitedAttemptCount<P>
where
    P: PollingErrorPolicy,
{
    /// Creates a new instance with a custom inner policy.
    pub fn custom(inner: P, maximum_attempts: u32) -> Self {
        Self {
            inner,
            maximum_attempts,
        }
    }

    fn in_progress_impl(&self, state: &PollingState, operation_name: &str) -> Result<()> {
        if state.attempt_count < self.maximum_attempts {
            return Ok(());
        }
        Err(Error::timeout(Exhausted::new(
            operation_name,
            "attempt count",
            state.attempt_count.to_string(),
            self.maximum_attempts.to_string(),
        )))
    }
}

impl<P> PollingErrorPolicy for LimitedAttemptCount<P>
where
    P: PollingErrorPolicy,
{
    fn on_error(&self, state: &PollingState, error: Error) -> RetryResult {
        match self.inner.on_error(state, error) {
            RetryResult::Continue(e) if state.attempt_count >= self.maximum_attempts => {
                RetryResult::Exhausted(e)
            }
            r => r,
        }
    }

    fn on_in_progress(&self, state: &PollingState, operation_name: &str) -> Result<()> {
        self.inner.on_in_progress(state, operation_name)?;
        self.in_progress_impl(state, operation_name)
    }
}

/// A polling policy decorator that limits the number of consecutive errors.
///
/// Once `error_count` reaches `maximum_errors` the policy replaces any
/// [Continue][RetryResult::Continue] result with
/// [Exhausted][RetryResult::Exhausted]. Operations that are in progress are not
/// limited by this policy.
#[derive(Debug)]
pub struct LimitedErrorCount<P = Aip194Strict>
where
    P: PollingErrorPolicy,
{
    inner: P,
    maximum_errors: u32,
}

impl LimitedErrorCount {
    /// Creates a new instance, with the default inner policy.
    pub fn new(maximum_errors: u32) -> Self {
        Self::custom(Aip194Strict, maximum_errors)
    }
}

impl<P> LimitedErrorCount<P>
where
    P: PollingErrorPolicy,
{
    /// Creates a new instance with a custom inner policy.
    pub fn custom(inner: P, maximum_errors: u32) -> Self {
        Self {
            inner,
            maximum_errors,
        }
    }
}

impl<P> PollingErrorPolicy for LimitedErrorCount<P>
where
    P: PollingErrorPolicy,
{
    fn on_error(&self, state: &PollingState, error: Error) -> RetryResult {
        match self.inner.on_error(state, error) {
            RetryResult::Continue(e) if state.error_count >= self.maximum_errors => {
                RetryResult::Exhausted(e)
            }
            r => r,
        }
    }

    fn on_in_progress(&self, state: &PollingState, operation_name: &str) -> Result<()> {
        self.inner.on_in_progress(state, operation_name)
    }
}

/// Indicates that a polling loop has been exhausted.
#[derive(Debug, thiserror::Error)]
#[error("polling loop for {operation_name} exhausted, {limit_name} value ({value}) exceeds limit ({limit})")]
pub struct Exhausted {
    operation_name: String,
    limit_name: &'static str,
    value: String,
    limit: String,
}

impl Exhausted {
    pub fn new(
        operation_name: &str,
        limit_name: &'static str,
        value: String,
        limit: String,
    ) -> Self {
        Self {
            operation_name: operation_name.to_string(),
            limit_name,
            value,
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::rpc::Status;
    use std::error::Error as _;
    use std::time::Duration;
    use test_case::test_case;
    use tokio::time::Instant;

    mockall::mock! {
        #[derive(Debug)]
        Policy {}
        impl PollingErrorPolicy for Policy {
            fn on_error(&self, state: &PollingState, error: Error) -> RetryResult;
            fn on_in_progress(&self, state: &PollingState, operation_name: &str) -> Result<()>;
        }
    }

    fn started(ago: Duration) -> PollingState {
        PollingState::default().set_start(Instant::now() - ago)
    }

    fn attempts(n: u32) -> PollingState {
        PollingState::default().set_attempt_count(n)
    }

    // Verify `PollingErrorPolicyArg` can be converted from the desired types.
    #[test]
    fn polling_policy_arg() {
        let policy = LimitedAttemptCount::new(3);
        let _ = PollingErrorPolicyArg::from(policy);

        let policy: Arc<dyn PollingErrorPolicy> = Arc::new(LimitedAttemptCount::new(3));
        let _ = PollingErrorPolicyArg::from(policy);
    }

    #[test_case(unavailable(), true)]
    #[test_case(permission_denied(), false)]
    #[test_case(Error::io("err"), true)]
    #[test_case(Error::authentication("err"), true)]
    #[test_case(Error::deser("err"), false)]
    #[test_case(Error::other("err"), false)]
    fn aip194_strict(error: Error, want_continue: bool) {
        let p = Aip194Strict;
        let state = PollingState::default();
        assert!(p.on_in_progress(&state, "unused").is_ok());
        let got = p.on_error(&state, error);
        assert_eq!(got.is_continue(), want_continue, "{got:?}");
        assert_eq!(got.is_permanent(), !want_continue, "{got:?}");
    }

    #[test_case(Error::io("err"))]
    #[test_case(Error::authentication("err"))]
    #[test_case(Error::deser("err"))]
    #[test_case(permission_denied())]
    fn always_continue(error: Error) {
        let p = AlwaysContinue;
        let state = PollingState::default();
        assert!(p.on_in_progress(&state, "unused").is_ok());
        assert!(p.on_error(&state, error).is_continue());
    }

    #[test]
    fn with_time_limit() {
        let policy = AlwaysContinue.with_time_limit(Duration::from_secs(10));
        let got = policy.on_error(&started(Duration::from_secs(1)), permission_denied());
        assert!(got.is_continue(), "{got:?}");
        let got = policy.on_error(&started(Duration::from_secs(20)), permission_denied());
        assert!(got.is_exhausted(), "{got:?}");
    }

    #[test]
    fn with_attempt_limit() {
        let policy = AlwaysContinue.with_attempt_limit(3);
        let got = policy.on_error(&attempts(1), permission_denied());
        assert!(got.is_continue(), "{got:?}");
        let got = policy.on_error(&attempts(5), permission_denied());
        assert!(got.is_exhausted(), "{got:?}");
    }

    #[test]
    fn limited_elapsed_time_on_error() {
        let policy = LimitedElapsedTime::new(Duration::from_secs(20));
        let got = policy.on_error(&started(Duration::from_secs(10)), unavailable());
        assert!(got.is_continue(), "{got:?}");
        let got = policy.on_error(&started(Duration::from_secs(30)), unavailable());
        assert!(got.is_exhausted(), "{got:?}");
        let got = policy.on_error(&started(Duration::from_secs(30)), permission_denied());
        assert!(got.is_permanent(), "{got:?}");
    }

    #[test]
    fn limited_elapsed_time_in_progress() -> anyhow::Result<()> {
        let policy = LimitedElapsedTime::new(Duration::from_secs(20));
        policy.on_in_progress(&started(Duration::from_secs(10)), "unused")?;

        let err = policy
            .on_in_progress(&started(Duration::from_secs(30)), "test-operation-name")
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        let exhausted = err.source().and_then(|e| e.downcast_ref::<Exhausted>());
        assert!(exhausted.is_some(), "{err:?}");
        assert!(err.to_string().contains("test-operation-name"), "{err}");
        Ok(())
    }

    #[test]
    fn limited_elapsed_time_forwards() {
        let mut mock = MockPolicy::new();
        mock.expect_on_error()
            .times(1..)
            .returning(|_, e| RetryResult::Continue(e));
        mock.expect_on_in_progress()
            .times(1)
            .returning(|_, _| Err(Error::other("inner")));

        let policy = LimitedElapsedTime::custom(mock, Duration::from_secs(60));
        let got = policy.on_error(&PollingState::default(), unavailable());
        assert!(got.is_continue(), "{got:?}");
        let got = policy.on_in_progress(&PollingState::default(), "op");
        assert!(matches!(got, Err(ref e) if e.to_string().contains("inner")), "{got:?}");
    }

    #[test]
    fn limited_attempt_count_on_error() {
        let policy = LimitedAttemptCount::new(3);
        assert!(policy.on_error(&attempts(1), unavailable()).is_continue());
        assert!(policy.on_error(&attempts(2), unavailable()).is_continue());
        assert!(policy.on_error(&attempts(3), unavailable()).is_exhausted());
        assert!(policy.on_error(&attempts(1), permission_denied()).is_permanent());
    }

    #[test]
    fn limited_attempt_count_in_progress() {
        let policy = LimitedAttemptCount::new(3);
        assert!(policy.on_in_progress(&attempts(2), "unused").is_ok());

        let err = policy
            .on_in_progress(&attempts(3), "test-operation-name")
            .unwrap_err();
        assert!(err.is_timeout(), "{err:?}");
        let exhausted = err.source().and_then(|e| e.downcast_ref::<Exhausted>());
        assert!(exhausted.is_some(), "{err:?}");
    }

    #[test]
    fn limited_attempt_count_forwards() {
        let mut mock = MockPolicy::new();
        mock.expect_on_error()
            .times(1)
            .returning(|_, e| RetryResult::Permanent(e));
        mock.expect_on_in_progress().times(1).returning(|_, _| Ok(()));

        let policy = LimitedAttemptCount::custom(mock, 10);
        assert!(policy.on_error(&attempts(1), unavailable()).is_permanent());
        assert!(policy.on_in_progress(&attempts(1), "op").is_ok());
    }

    #[test]
    fn limited_error_count() {
        let policy = LimitedErrorCount::new(3);
        let state = |n: u32| PollingState::default().set_error_count(n);
        assert!(policy.on_error(&state(1), unavailable()).is_continue());
        assert!(policy.on_error(&state(2), unavailable()).is_continue());
        assert!(policy.on_error(&state(3), unavailable()).is_exhausted());
        assert!(policy.on_error(&state(1), permission_denied()).is_permanent());

        let many = PollingState::default().set_attempt_count(1000_u32);
        assert!(policy.on_in_progress(&many, "op").is_ok());
    }

    #[test]
    fn limited_error_count_forwards() {
        let mut mock = MockPolicy::new();
        mock.expect_on_in_progress()
            .times(1)
            .returning(|_, _| Err(Error::timeout("inner")));
        let policy = mock.with_error_limit(3);
        let got = policy.on_in_progress(&PollingState::default(), "op");
        assert!(matches!(got, Err(ref e) if e.is_timeout()), "{got:?}");
    }

    #[test]
    fn exhausted_display() {
        let e = Exhausted::new("op-123", "attempt count", "5".into(), "3".into());
        let got = e.to_string();
        assert!(got.contains("op-123"), "{got}");
        assert!(got.contains("attempt count value (5) exceeds limit (3)"), "{got}");
    }

    fn unavailable() -> Error {
        let status = Status::default()
            .set_code(Code::Unavailable)
            .set_message("UNAVAILABLE");
        Error::service(status)
    }

    fn permission_denied() -> Error {
        let status = Status::default()
            .set_code(Code::PermissionDenied)
            .set_message("PERMISSION_DENIED");
        Error::service(status)
    }
}
