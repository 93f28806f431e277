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

//! Shared helpers for waiting on remote work.
//!
//! This crate contains the types used by the operation poller and the
//! notification listener: a single error type, the policies that control
//! polling loops, and a one-shot signal with a deadline.
//!
//! Applications rarely use this crate directly. The `lro` and `pubsub` crates
//! re-export the types that appear in their APIs.

/// An alias of [std::result::Result] where the error is always [crate::error::Error].
///
/// This is the result type used by all functions that wait for remote work.
pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// The core error types.
pub mod error;

pub mod exponential_backoff;
pub mod options;
pub mod polling_backoff_policy;
pub mod polling_error_policy;
pub mod polling_state;
pub mod retry_result;
pub mod signal;
