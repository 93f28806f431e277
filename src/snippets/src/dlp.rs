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

//! Run DLP inspection jobs and wait for their completion notification.
//!
//! An inspection job configured with a Pub/Sub action publishes a message
//! when it completes. The message carries the job name in the `DlpJobName`
//! attribute. [inspect_with_notification] creates the job, waits for that
//! message with a [NotificationListener], and then fetches the job to report
//! its findings.

pub mod model;

use crate::invoke::{Invoke, invoke};
use crate::{Error, Result};
use gax::error::rpc::{Code, Status};
use model::*;
use pubsub::NotificationListener;
use pubsub::subscriber::Subscription;
use std::sync::Arc;

/// The DLP methods used by the samples.
#[async_trait::async_trait]
pub trait DlpJobs: Send + Sync + std::fmt::Debug {
    /// Creates a new inspection job. The job starts running immediately.
    async fn create_inspect_job(&self, request: CreateDlpJobRequest) -> Result<DlpJob>;

    async fn get_dlp_job(&self, name: String) -> Result<DlpJob>;
}

#[async_trait::async_trait]
impl<T> DlpJobs for Arc<T>
where
    T: DlpJobs + ?Sized,
{
    async fn create_inspect_job(&self, request: CreateDlpJobRequest) -> Result<DlpJob> {
        T::create_inspect_job(self, request).await
    }
    async fn get_dlp_job(&self, name: String) -> Result<DlpJob> {
        T::get_dlp_job(self, name).await
    }
}

#[async_trait::async_trait]
impl<D> Invoke<GetDlpJobRequest> for D
where
    D: DlpJobs,
{
    type Response = DlpJob;
    async fn invoke(&self, request: GetDlpJobRequest) -> Result<DlpJob> {
        self.get_dlp_job(request.name).await
    }
}

/// The outcome of an inspection job, for humans.
#[derive(Clone, Debug, PartialEq)]
pub struct InspectReport {
    pub job_name: String,
    pub state: JobState,
    pub processed_bytes: i64,
    pub info_type_stats: Vec<InfoTypeStats>,
}

impl InspectReport {
    /// The total number of findings, across all info types.
    pub fn findings(&self) -> i64 {
        self.info_type_stats.iter().map(|s| s.count).sum()
    }
}

impl From<DlpJob> for InspectReport {
    fn from(job: DlpJob) -> Self {
        let details = job.inspect_details.unwrap_or_default();
        Self {
            job_name: job.name,
            state: job.state,
            processed_bytes: details.processed_bytes,
            info_type_stats: details.info_type_stats,
        }
    }
}

impl std::fmt::Display for InspectReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Job {} status: {:?}", self.job_name, self.state)?;
        if self.info_type_stats.is_empty() {
            return write!(f, "No findings.");
        }
        let mut lines = self.info_type_stats.iter().peekable();
        while let Some(s) = lines.next() {
            write!(f, "Found {} instance(s) of infoType {}", s.count, s.info_type.name)?;
            if lines.peek().is_some() {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}

/// Builds a request to inspect files in Cloud Storage.
///
/// The job publishes a notification to `topic` when it completes.
pub fn inspect_gcs_request<I, T>(project_id: &str, url: &str, topic: &str, info_types: I) -> CreateDlpJobRequest
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let config = InspectJobConfig::default()
        .set_storage_config(StorageConfig::cloud_storage(url))
        .set_inspect_config(
            InspectConfig::default()
                .set_info_types(info_types)
                .set_min_likelihood(Likelihood::Possible)
                .set_include_quote(true),
        )
        .set_actions([Action::pub_sub(topic)]);
    CreateDlpJobRequest::default()
        .set_parent(format!("projects/{project_id}/locations/global"))
        .set_inspect_job(config)
}

/// Creates an inspection job and waits for its completion notification.
///
/// `listener` decides how long to wait and how notifications are matched to
/// the job. After the notification arrives the job is fetched again, its
/// results are in the returned report.
///
/// Returns an error if the job cannot be created, if the notification does
/// not arrive in time, or if the job failed.
///
/// # Example
/// ```
/// # use cloud_samples_snippets::dlp::{inspect_gcs_request, inspect_with_notification};
/// # use cloud_samples_snippets::fake::FakeDlp;
/// # use pubsub::NotificationListener;
/// # use pubsub::memory::MemorySubscription;
/// # tokio_test::block_on(async {
/// use std::time::Duration;
/// let subscription = MemorySubscription::new("projects/p/subscriptions/dlp-jobs");
/// let dlp = FakeDlp::new(subscription.clone());
/// let listener = NotificationListener::new(subscription).with_timeout(Duration::from_secs(60));
/// let request = inspect_gcs_request("p", "gs://bucket/*.txt", "projects/p/topics/dlp-jobs", ["EMAIL_ADDRESS"]);
/// let report = inspect_with_notification(&dlp, &listener, request).await?;
/// println!("{report}");
/// # Ok::<(), cloud_samples_snippets::Error>(())
/// # });
/// ```
pub async fn inspect_with_notification<D, S>(
    dlp: &D,
    listener: &NotificationListener<S>,
    request: CreateDlpJobRequest,
) -> Result<InspectReport>
where
    D: DlpJobs,
    S: Subscription,
{
    let job = dlp.create_inspect_job(request).await?;
    tracing::info!(job = %job.name, "inspection job created, waiting for its notification");
    let message = listener.wait_for(job.name.as_str()).await?;
    tracing::debug!(job = %job.name, message_id = %message.message_id, "received job notification");

    let job = invoke(dlp, GetDlpJobRequest::new(job.name)).await?;
    if job.state == JobState::Failed {
        let status = job.errors.first().cloned().unwrap_or_else(|| {
            Status::default()
                .set_code(Code::Unknown)
                .set_message(format!("job {} failed", job.name))
        });
        return Err(Error::service(status));
    }
    let report = InspectReport::from(job);
    tracing::info!(job = %report.job_name, findings = report.findings(), "inspection job completed");
    Ok(report)
}
