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

use anyhow::bail;
use clap::{Parser, Subcommand};
use humantime::parse_duration;
use std::time::Duration;

/// Run samples that wait on long-running work, against in-memory services.
#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = super::DESCRIPTION)]
pub struct Args {
    /// The project used in resource names.
    #[arg(long, default_value = "my-project")]
    pub project_id: String,

    /// How long to wait for each operation or notification.
    ///
    /// There is no default, pick a budget that fits the work.
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Duration,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Create Bigtable instances and wait until each one is ready.
    CreateInstance(CreateInstance),
    /// Run DLP inspection jobs and wait for their completion notifications.
    Inspect(Inspect),
}

#[derive(Clone, Debug, clap::Args)]
pub struct CreateInstance {
    /// The number of instances created concurrently.
    #[arg(long, default_value_t = 1)]
    pub instance_count: usize,

    /// The zone for the first cluster in each instance.
    #[arg(long, default_value = "us-central1-f")]
    pub zone: String,

    /// If set, add a second cluster in this zone once the instance is ready.
    #[arg(long)]
    pub second_zone: Option<String>,

    /// The time between status reads.
    #[arg(long, value_parser = parse_duration, default_value = "500ms")]
    pub poll_interval: Duration,

    /// The simulated operations complete on this status read.
    #[arg(long, default_value_t = 3)]
    pub reads_until_done: u32,
}

#[derive(Clone, Debug, clap::Args)]
pub struct Inspect {
    /// The number of jobs started concurrently.
    #[arg(long, default_value_t = 2)]
    pub job_count: usize,

    /// The Cloud Storage files to inspect.
    #[arg(long, default_value = "gs://my-bucket/*.txt")]
    pub url: String,

    /// The info types to look for, separated by commas.
    #[arg(long, value_delimiter = ',', default_values = ["EMAIL_ADDRESS", "PHONE_NUMBER"])]
    pub info_types: Vec<String>,

    /// The time each simulated job runs before publishing its notification.
    #[arg(long, value_parser = parse_duration, default_value = "500ms")]
    pub job_duration: Duration,
}

impl Args {
    /// Validates the arguments after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout.is_zero() {
            bail!("invalid timeout, must be greater than zero")
        }
        match &self.command {
            Command::CreateInstance(c) => {
                if c.instance_count == 0 {
                    bail!("invalid instance-count, must be greater than zero")
                }
                if c.reads_until_done == 0 {
                    bail!("invalid reads-until-done, must be greater than zero")
                }
                if c.poll_interval.is_zero() {
                    bail!("invalid poll-interval, must be greater than zero")
                }
                if c.poll_interval > self.timeout {
                    bail!(
                        "the poll-interval ({:?}) is longer than the timeout ({:?})",
                        c.poll_interval,
                        self.timeout
                    )
                }
            }
            Command::Inspect(c) => {
                if c.job_count == 0 {
                    bail!("invalid job-count, must be greater than zero")
                }
                if c.info_types.iter().all(|t| t.is_empty()) {
                    bail!("the info types must be non-empty: {:?}", c.info_types)
                }
            }
        }
        Ok(())
    }
}
