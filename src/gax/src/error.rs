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

mod core_error;
pub use core_error::*;

/// Errors and error details reported by remote services.
///
/// Waiting for remote work can fail in three broad ways: the service reports
/// the work failed, the transport cannot reach the service, or the caller runs
/// out of time. The [Status] type carries the details in the first case.
///
/// # Examples
///
/// ```
/// use cloud_samples_gax::error::Error;
/// use cloud_samples_gax::error::rpc::Status;
/// fn handle_error(e: Error) {
///     if let Some(status) = e.status() {
///         println!("the service reported {status:?}")
///     }
/// }
/// ```
///
/// [Status]: rpc::Status
pub mod rpc;
