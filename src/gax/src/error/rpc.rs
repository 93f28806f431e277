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

use serde::{Deserialize, Serialize};

/// The [Status] type defines a logical error model that is suitable for
/// different programming environments, including REST APIs and RPC APIs. Each
/// [Status] message contains three pieces of data: error code, error message,
/// and error details.
///
/// Long-running operations that fail carry a `Status`. The details are kept as
/// opaque JSON values, the poller never interprets them.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Status {
    /// The status code.
    pub code: Code,

    /// A developer-facing error message, which should be in English.
    pub message: String,

    /// A list of messages that carry the error details.
    pub details: Vec<serde_json::Value>,
}

impl Status {
    /// Sets the value for [code][Status::code].
    pub fn set_code<T: Into<Code>>(mut self, v: T) -> Self {
        self.code = v.into();
        self
    }

    /// Sets the value for [message][Status::message].
    pub fn set_message<T: Into<String>>(mut self, v: T) -> Self {
        self.message = v.into();
        self
    }

    /// Sets the value for [details][Status::details].
    pub fn set_details<T, I>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = I>,
        I: Into<serde_json::Value>,
    {
        self.details = v.into_iter().map(|v| v.into()).collect();
        self
    }
}

/// Declares [Code] and the conversions to and from its numeric value and its
/// name, from a single table.
macro_rules! canonical_codes {
    ($($(#[$doc:meta])* $variant:ident = $value:literal => $name:literal,)+) => {
        /// The canonical error codes for APIs.
        ///
        /// Sometimes multiple error codes may apply. Services should return the
        /// most specific error code that applies.
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        #[non_exhaustive]
        pub enum Code {
            $($(#[$doc])* $variant = $value,)+
        }

        impl Code {
            /// The name of the code, as used in JSON payloads.
            pub fn name(&self) -> &str {
                match self {
                    $(Code::$variant => $name,)+
                }
            }
        }

        /// Unknown values map to [Code::Unknown].
        impl std::convert::From<i32> for Code {
            fn from(value: i32) -> Self {
                match value {
                    $($value => Code::$variant,)+
                    _ => Code::default(),
                }
            }
        }

        impl std::convert::TryFrom<&str> for Code {
            type Error = String;
            fn try_from(value: &str) -> std::result::Result<Code, Self::Error> {
                match value {
                    $($name => Ok(Code::$variant),)+
                    _ => Err(format!("unknown status code value {value}")),
                }
            }
        }
    };
}

canonical_codes! {
    /// Not an error; returned on success.
    Ok = 0 => "OK",
    /// The operation was cancelled, typically by the caller.
    Cancelled = 1 => "CANCELLED",
    #[default]
    Unknown = 2 => "UNKNOWN",
    InvalidArgument = 3 => "INVALID_ARGUMENT",
    /// The deadline expired before the operation could complete.
    DeadlineExceeded = 4 => "DEADLINE_EXCEEDED",
    NotFound = 5 => "NOT_FOUND",
    AlreadyExists = 6 => "ALREADY_EXISTS",
    PermissionDenied = 7 => "PERMISSION_DENIED",
    /// Some resource has been exhausted, perhaps a per-user quota.
    ResourceExhausted = 8 => "RESOURCE_EXHAUSTED",
    /// The system is not in a state required for the operation's execution.
    FailedPrecondition = 9 => "FAILED_PRECONDITION",
    Aborted = 10 => "ABORTED",
    OutOfRange = 11 => "OUT_OF_RANGE",
    Unimplemented = 12 => "UNIMPLEMENTED",
    Internal = 13 => "INTERNAL",
    /// The service is currently unavailable.
    ///
    /// Most likely a transient condition, retry with a backoff.
    Unavailable = 14 => "UNAVAILABLE",
    DataLoss = 15 => "DATA_LOSS",
    Unauthenticated = 16 => "UNAUTHENTICATED",
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Code {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.name())
    }
}

/// Codes may arrive as names (`"NOT_FOUND"`) or as numbers (`5`).
#[derive(Deserialize)]
#[serde(untagged)]
enum CodeRepr {
    Number(i32),
    Name(String),
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        match CodeRepr::deserialize(deserializer)? {
            CodeRepr::Number(n) => Ok(Code::from(n)),
            CodeRepr::Name(s) => Code::try_from(s.as_str()).map_err(serde::de::Error::custom),
        }
    }
}
