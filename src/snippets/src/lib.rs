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

//! Samples that start long-running work and wait for it.
//!
//! Two services are represented here. Creating a Bigtable instance or cluster
//! returns a long-running operation, the samples poll it with [lro]. A DLP
//! inspection job reports its completion by publishing a Pub/Sub message, the
//! samples wait for that message with [pubsub].
//!
//! The service surfaces are small traits ([bigtable::InstanceAdmin],
//! [dlp::DlpJobs]). The [fake] module implements them in memory, which is what
//! the `cloud-samples` binary and the tests use.

pub use gax::Result;
pub use gax::error::Error;

pub mod bigtable;
pub mod dlp;
pub mod fake;
pub mod invoke;
