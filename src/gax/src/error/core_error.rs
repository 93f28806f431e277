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

use super::rpc::Status;
use std::error::Error as StdError;

type BoxError = Box<dyn StdError + Send + Sync>;

/// The error returned when waiting for remote work.
///
/// Waiting for a long-running operation or a job notification can fail for
/// several reasons. The service may report that the work failed, the transport
/// may be unable to reach the service, the caller's deadline may expire, the
/// retry policy may be exhausted, or the caller may cancel the wait.
///
/// Most applications will just return the error or log it. Some applications
/// need to distinguish the cases, for example to treat a timeout as "the job
/// is still running". This type offers a series of predicates to determine the
/// error kind, and accessors for the most common details. Applications can
/// query the error [source][std::error::Error::source] for deeper information.
///
/// # Example
/// ```
/// use cloud_samples_gax::error::Error;
/// match example_function() {
///     Err(e) if matches!(e.status(), Some(_)) => {
///         println!("remote failure {e}, debug using {:?}", e.status());
///     },
///     Err(e) if e.is_timeout() => { println!("not enough time {e}"); },
///     Err(e) if e.is_transport() => { println!("cannot reach the service {e}"); },
///     Err(e) => { println!("some other error {e}"); },
///     Ok(_) => { println!("success, how boring"); },
/// }
///
/// fn example_function() -> Result<String, Error> {
///     // ... details omitted ...
///     # use cloud_samples_gax::error::rpc::{Code, Status};
///     # Err(Error::service(Status::default().set_code(Code::NotFound).set_message("NOT FOUND")))
/// }
/// ```
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<BoxError>,
}

impl Error {
    /// Creates an error with the information returned by the service.
    ///
    /// Use this for remote failures: the service accepted the work and later
    /// reported that it failed.
    ///
    /// # Example
    /// ```
    /// use cloud_samples_gax::error::Error;
    /// use cloud_samples_gax::error::rpc::{Code, Status};
    /// let status = Status::default().set_code(Code::NotFound).set_message("NOT FOUND");
    /// let error = Error::service(status.clone());
    /// assert_eq!(error.status(), Some(&status));
    /// ```
    pub fn service(status: Status) -> Self {
        Self {
            kind: ErrorKind::Service(Box::new(status)),
            source: None,
        }
    }

    /// Creates an error representing a timeout.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use cloud_samples_gax::error::Error;
    /// let error = Error::timeout("simulated timeout");
    /// assert!(error.is_timeout());
    /// assert!(error.source().is_some());
    /// ```
    pub fn timeout<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Timeout, source)
    }

    /// The awaited terminal state or notification did not arrive in time.
    ///
    /// This is always a client-side generated error. The remote work may or
    /// may not complete in the service. Callers decide whether a timeout is an
    /// application error or an acceptable "still working" outcome.
    ///
    /// # Troubleshooting
    ///
    /// The most common cause of this problem is a budget based on the latency
    /// observed when the service is not under load. Consider increasing the
    /// timeout to handle temporary latency increases too.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout)
    }

    /// Creates an error representing an exhausted policy.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use cloud_samples_gax::error::Error;
    /// let error = Error::exhausted("too many polling attempts");
    /// assert!(error.is_exhausted());
    /// assert!(error.source().is_some());
    /// ```
    pub fn exhausted<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Exhausted, source)
    }

    /// The wait could not complete before the polling policy expired.
    ///
    /// This is always a client-side generated error, but it may be the result
    /// of multiple errors received from the service.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.kind, ErrorKind::Exhausted)
    }

    /// Creates an error representing a cancelled wait.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use cloud_samples_gax::error::Error;
    /// let error = Error::cancelled("shutting down");
    /// assert!(error.is_cancelled());
    /// assert!(error.source().is_some());
    /// ```
    pub fn cancelled<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Cancelled, source)
    }

    /// The caller cancelled the wait before it completed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Creates an error representing a deserialization problem.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use cloud_samples_gax::error::Error;
    /// let error = Error::deser("simulated problem");
    /// assert!(error.is_deserialization());
    /// assert!(error.source().is_some());
    /// ```
    pub fn deser<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Deserialization, source)
    }

    /// The response, or the payload of a terminal operation, could not be
    /// deserialized.
    pub fn is_deserialization(&self) -> bool {
        matches!(self.kind, ErrorKind::Deserialization)
    }

    /// Creates an error representing an authentication problem.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use cloud_samples_gax::error::Error;
    /// let error = Error::authentication("expired token");
    /// assert!(error.is_authentication());
    /// assert!(error.is_transport());
    /// ```
    pub fn authentication<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Authentication, source)
    }

    /// Could not create the authentication headers before sending the request.
    ///
    /// # Troubleshooting
    ///
    /// Typically this indicates a misconfigured authentication environment for
    /// your application. Very rarely, this may indicate a failure to contact
    /// the services used to create access tokens.
    pub fn is_authentication(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication)
    }

    /// Creates an error representing a problem in the transport layer.
    ///
    /// Examples include: a broken connection after the request is sent, or a
    /// subscription stream closed by the service.
    ///
    /// # Example
    /// ```
    /// use std::error::Error as _;
    /// use cloud_samples_gax::error::Error;
    /// let error = Error::io("connection reset");
    /// assert!(error.is_io());
    /// assert!(error.is_transport());
    /// ```
    pub fn io<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Transport, source)
    }

    /// A problem in the transport layer without a response from the service.
    ///
    /// # Troubleshooting
    ///
    /// This indicates a problem completing the request. This type of error is
    /// rare, but includes crashes and restarts on proxies and load balancers.
    /// Most often, the solution is to use the right polling policy.
    pub fn is_io(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport)
    }

    /// A network or authentication problem prevented the request.
    ///
    /// Polling loops retry these errors a bounded number of times. Persistent
    /// transport errors are returned to the caller rather than retried until
    /// the deadline.
    pub fn is_transport(&self) -> bool {
        matches!(self.kind, ErrorKind::Transport | ErrorKind::Authentication)
    }

    /// The [Status] payload associated with this error.
    ///
    /// # Examples
    /// ```
    /// use cloud_samples_gax::error::{Error, rpc::{Code, Status}};
    /// let error = Error::service(Status::default().set_code(Code::NotFound));
    /// if let Some(status) = error.status() {
    ///     if status.code == Code::NotFound {
    ///         println!("cannot find the thing, more details in {:?}", status.details);
    ///     }
    /// }
    /// ```
    ///
    /// Services return a `Status` when they report a failure. It includes a
    /// numeric code for the error type, a human-readable message, and a
    /// sequence of details.
    pub fn status(&self) -> Option<&Status> {
        match &self.kind {
            ErrorKind::Service(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// An uncategorized error.
    pub fn other<T: Into<BoxError>>(source: T) -> Self {
        Self::with_source(ErrorKind::Other, source)
    }

    fn with_source<T: Into<BoxError>>(kind: ErrorKind, source: T) -> Self {
        let source = Some(source.into());
        Self { kind, source }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.kind, &self.source) {
            (ErrorKind::Deserialization, Some(e)) => {
                write!(f, "cannot deserialize the response {e}")
            }
            (ErrorKind::Authentication, Some(e)) => {
                write!(f, "cannot create the authentication headers {e}")
            }
            (ErrorKind::Timeout, Some(e)) => {
                write!(f, "the wait exceeded its deadline {e}")
            }
            (ErrorKind::Exhausted, Some(e)) => write!(f, "{e}"),
            (ErrorKind::Cancelled, Some(e)) => write!(f, "the wait was cancelled: {e}"),
            (ErrorKind::Transport, Some(e)) => {
                write!(f, "the transport reports an error: {e}")
            }
            (ErrorKind::Service(s), _) => {
                write!(
                    f,
                    "the service reports an error with code {} described as: {}",
                    s.code, s.message
                )
            }
            (ErrorKind::Other, Some(e)) => {
                write!(f, "an unclassified problem waiting for remote work: {e}")
            }
            (_, None) => unreachable!("no constructor allows this"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

/// The type of error held by an [Error] instance.
#[derive(Debug)]
enum ErrorKind {
    Deserialization,
    Authentication,
    Timeout,
    Exhausted,
    Cancelled,
    Transport,
    Service(Box<Status>),
    /// A uncategorized error.
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::rpc::Code;
    use std::error::Error as StdError;
    use test_case::test_case;

    #[derive(Debug, thiserror::Error)]
    #[error("simulated source")]
    struct Simulated;

    #[test]
    fn service() {
        let status = Status::default()
            .set_code(Code::NotFound)
            .set_message("NOT FOUND");
        let error = Error::service(status.clone());
        assert!(error.source().is_none(), "{error:?}");
        assert_eq!(error.status(), Some(&status));
        assert!(error.to_string().contains("NOT FOUND"), "{error}");
        assert!(error.to_string().contains(Code::NotFound.name()), "{error}");
        assert!(!error.is_timeout(), "{error:?}");
        assert!(!error.is_transport(), "{error:?}");
    }

    #[test]
    fn timeout() {
        let error = Error::timeout(Simulated);
        assert!(error.is_timeout(), "{error:?}");
        let got = error.source().and_then(|e| e.downcast_ref::<Simulated>());
        assert!(matches!(got, Some(Simulated)), "{error:?}");
        assert!(error.to_string().contains("simulated source"), "{error}");
        assert!(error.status().is_none(), "{error:?}");
        assert!(!error.is_transport(), "{error:?}");
    }

    #[test]
    fn exhausted() {
        let error = Error::exhausted(Simulated);
        assert!(error.is_exhausted(), "{error:?}");
        let got = error.source().and_then(|e| e.downcast_ref::<Simulated>());
        assert!(matches!(got, Some(Simulated)), "{error:?}");
        assert_eq!(error.to_string(), "simulated source");
        assert!(error.status().is_none(), "{error:?}");
    }

    #[test]
    fn cancelled() {
        let error = Error::cancelled(Simulated);
        assert!(error.is_cancelled(), "{error:?}");
        assert!(error.to_string().contains("cancelled"), "{error}");
        assert!(!error.is_timeout(), "{error:?}");
    }

    #[test]
    fn deserialization() {
        let error = Error::deser(Simulated);
        assert!(error.is_deserialization(), "{error:?}");
        assert!(error.to_string().contains("simulated source"), "{error}");
        assert!(!error.is_transport(), "{error:?}");
    }

    #[test_case(Error::io(Simulated), true, false; "io")]
    #[test_case(Error::authentication(Simulated), false, true; "authentication")]
    fn transport(error: Error, io: bool, authentication: bool) {
        assert!(error.is_transport(), "{error:?}");
        assert_eq!(error.is_io(), io, "{error:?}");
        assert_eq!(error.is_authentication(), authentication, "{error:?}");
        assert!(error.to_string().contains("simulated source"), "{error}");
        assert!(error.status().is_none(), "{error:?}");
    }

    #[test]
    fn other() {
        let error = Error::other(Simulated);
        assert!(!error.is_transport(), "{error:?}");
        assert!(!error.is_timeout(), "{error:?}");
        assert!(error.to_string().contains("unclassified"), "{error}");
    }

    #[test]
    fn traits() {
        static_assertions::assert_impl_all!(Error: Send, Sync, StdError);
    }
}
