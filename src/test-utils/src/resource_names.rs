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

//! Helper functions and types to generate random resource names.

use rand::{Rng, distr::Distribution};

/// A common prefix for resource ids.
///
/// Where possible, we use this prefix for randomly generated resource ids.
pub const PREFIX: &str = "rust-samples-";

/// Bigtable instance ids are at most 33 characters.
const INSTANCE_ID_LENGTH: usize = 33;

/// Bigtable cluster ids are at most 30 characters.
const CLUSTER_ID_LENGTH: usize = 30;

const JOB_ID_LENGTH: usize = 32;

/// Generate a random Bigtable instance id.
pub fn random_instance_id() -> String {
    let id = LowercaseAlphanumeric.random_string(INSTANCE_ID_LENGTH - PREFIX.len());
    format!("{PREFIX}{id}")
}

/// Generate a random Bigtable cluster id.
pub fn random_cluster_id() -> String {
    let id = LowercaseAlphanumeric.random_string(CLUSTER_ID_LENGTH - PREFIX.len());
    format!("{PREFIX}{id}")
}

/// Generate a random DLP job name in the given project.
pub fn random_job_name(project: &str) -> String {
    let id = LowercaseAlphanumeric.random_string(JOB_ID_LENGTH);
    format!("projects/{project}/dlpJobs/i-{id}")
}

const LOWERCASE_ALPHANUMERIC_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Sample a `u8`, uniformly distributed over ASCII lowercase letters and numbers: a-z and 0-9.
///
/// # Example
/// ```
/// use cloud_samples_test_utils::resource_names::LowercaseAlphanumeric;
/// let got: String = LowercaseAlphanumeric.random_string(32);
/// assert_eq!(got.len(), 32);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LowercaseAlphanumeric;

impl LowercaseAlphanumeric {
    /// Create a string with `n` characters from the character set.
    pub fn random_string(&self, n: usize) -> String {
        rand::rng()
            .sample_iter(self)
            .take(n)
            .map(char::from)
            .collect()
    }
}

impl Distribution<u8> for LowercaseAlphanumeric {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        let index = rng.random_range(0..LOWERCASE_ALPHANUMERIC_CHARSET.len());
        LOWERCASE_ALPHANUMERIC_CHARSET[index]
    }
}
