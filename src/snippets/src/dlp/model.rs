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

use gax::error::rpc::Status;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// The type of data to look for, for example `PHONE_NUMBER` or
/// `EMAIL_ADDRESS`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct InfoType {
    pub name: String,
}

impl InfoType {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self { name: name.into() }
    }
}

/// Coarse buckets for the likelihood of a finding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Likelihood {
    #[default]
    LikelihoodUnspecified,
    VeryUnlikely,
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
}

/// A BigQuery table.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct BigQueryTable {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl BigQueryTable {
    pub fn new<P, D, T>(project_id: P, dataset_id: D, table_id: T) -> Self
    where
        P: Into<String>,
        D: Into<String>,
        T: Into<String>,
    {
        Self {
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
        }
    }
}

/// Where the inspection job reads its data.
///
/// Exactly one of the fields should be set.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct StorageConfig {
    /// A Cloud Storage URL, such as `gs://my-bucket/*.txt`.
    pub cloud_storage_url: Option<String>,

    /// A Datastore kind in the default namespace.
    pub datastore_kind: Option<String>,

    pub big_query_table: Option<BigQueryTable>,
}

impl StorageConfig {
    pub fn cloud_storage<T: Into<String>>(url: T) -> Self {
        Self {
            cloud_storage_url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn datastore<T: Into<String>>(kind: T) -> Self {
        Self {
            datastore_kind: Some(kind.into()),
            ..Default::default()
        }
    }

    pub fn big_query(table: BigQueryTable) -> Self {
        Self {
            big_query_table: Some(table),
            ..Default::default()
        }
    }
}

/// What to look for.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct InspectConfig {
    pub info_types: Vec<InfoType>,

    /// Only findings at or above this likelihood are reported.
    pub min_likelihood: Likelihood,

    /// Zero means the service default.
    pub max_findings_per_request: i32,

    pub include_quote: bool,
}

impl InspectConfig {
    /// Sets the value for [info_types][InspectConfig::info_types].
    pub fn set_info_types<T, I>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = I>,
        I: Into<String>,
    {
        self.info_types = v.into_iter().map(InfoType::new).collect();
        self
    }

    /// Sets the value for [min_likelihood][InspectConfig::min_likelihood].
    pub fn set_min_likelihood<T: Into<Likelihood>>(mut self, v: T) -> Self {
        self.min_likelihood = v.into();
        self
    }

    /// Sets the value for [max_findings_per_request][InspectConfig::max_findings_per_request].
    pub fn set_max_findings_per_request<T: Into<i32>>(mut self, v: T) -> Self {
        self.max_findings_per_request = v.into();
        self
    }

    /// Sets the value for [include_quote][InspectConfig::include_quote].
    pub fn set_include_quote<T: Into<bool>>(mut self, v: T) -> Self {
        self.include_quote = v.into();
        self
    }
}

/// An action to run when the job completes.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub enum Action {
    /// Publish a notification to a Pub/Sub topic, in the form
    /// `projects/{project}/topics/{topic}`.
    PubSub { topic: String },
    /// Save the findings to a BigQuery table.
    SaveFindings { table: BigQueryTable },
}

impl Action {
    pub fn pub_sub<T: Into<String>>(topic: T) -> Self {
        Self::PubSub {
            topic: topic.into(),
        }
    }

    /// The topic, if this action publishes a notification.
    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::PubSub { topic } => Some(topic),
            Self::SaveFindings { .. } => None,
        }
    }
}

/// The configuration of an inspection job.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct InspectJobConfig {
    pub storage_config: Option<StorageConfig>,

    pub inspect_config: Option<InspectConfig>,

    pub actions: Vec<Action>,
}

impl InspectJobConfig {
    /// Sets the value for [storage_config][InspectJobConfig::storage_config].
    pub fn set_storage_config<T: Into<StorageConfig>>(mut self, v: T) -> Self {
        self.storage_config = Some(v.into());
        self
    }

    /// Sets the value for [inspect_config][InspectJobConfig::inspect_config].
    pub fn set_inspect_config<T: Into<InspectConfig>>(mut self, v: T) -> Self {
        self.inspect_config = Some(v.into());
        self
    }

    /// Sets the value for [actions][InspectJobConfig::actions].
    pub fn set_actions<T: IntoIterator<Item = Action>>(mut self, v: T) -> Self {
        self.actions = v.into_iter().collect();
        self
    }

    /// The topics notified when the job completes.
    pub fn notification_topics(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().filter_map(Action::topic)
    }
}

/// Request message for `CreateDlpJob`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct CreateDlpJobRequest {
    /// The parent resource, in the form `projects/{project}/locations/{location}`.
    pub parent: String,

    pub inspect_job: Option<InspectJobConfig>,

    /// Optional, the service assigns a job id if empty.
    pub job_id: String,
}

impl CreateDlpJobRequest {
    /// Sets the value for [parent][CreateDlpJobRequest::parent].
    pub fn set_parent<T: Into<String>>(mut self, v: T) -> Self {
        self.parent = v.into();
        self
    }

    /// Sets the value for [inspect_job][CreateDlpJobRequest::inspect_job].
    pub fn set_inspect_job<T: Into<InspectJobConfig>>(mut self, v: T) -> Self {
        self.inspect_job = Some(v.into());
        self
    }

    /// Sets the value for [job_id][CreateDlpJobRequest::job_id].
    pub fn set_job_id<T: Into<String>>(mut self, v: T) -> Self {
        self.job_id = v.into();
        self
    }
}

/// Request message for `GetDlpJob`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct GetDlpJobRequest {
    pub name: String,
}

impl GetDlpJobRequest {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self { name: name.into() }
    }
}

/// The possible states of a DLP job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    JobStateUnspecified,
    Pending,
    Running,
    Done,
    Canceled,
    Failed,
}

impl JobState {
    /// Returns `true` if the job will not change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Canceled | Self::Failed)
    }
}

/// The number of findings of one info type.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct InfoTypeStats {
    pub info_type: InfoType,
    pub count: i64,
}

impl InfoTypeStats {
    pub fn new<T: Into<String>>(info_type: T, count: i64) -> Self {
        Self {
            info_type: InfoType::new(info_type),
            count,
        }
    }
}

/// The results of an inspection job.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct InspectResult {
    pub processed_bytes: i64,
    pub total_estimated_bytes: i64,
    pub info_type_stats: Vec<InfoTypeStats>,
}

impl InspectResult {
    /// Sets the value for [processed_bytes][InspectResult::processed_bytes].
    pub fn set_processed_bytes<T: Into<i64>>(mut self, v: T) -> Self {
        self.processed_bytes = v.into();
        self
    }

    /// Sets the value for [total_estimated_bytes][InspectResult::total_estimated_bytes].
    pub fn set_total_estimated_bytes<T: Into<i64>>(mut self, v: T) -> Self {
        self.total_estimated_bytes = v.into();
        self
    }

    /// Sets the value for [info_type_stats][InspectResult::info_type_stats].
    pub fn set_info_type_stats<T: IntoIterator<Item = InfoTypeStats>>(mut self, v: T) -> Self {
        self.info_type_stats = v.into_iter().collect();
        self
    }
}

/// A DLP job, as returned by `CreateDlpJob` and `GetDlpJob`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct DlpJob {
    /// The server-assigned name, in the form
    /// `projects/{project}/dlpJobs/{job}`.
    pub name: String,

    pub state: JobState,

    pub create_time: Option<SystemTime>,

    pub end_time: Option<SystemTime>,

    /// Present once the inspection produced results.
    pub inspect_details: Option<InspectResult>,

    /// The errors encountered while running the job.
    pub errors: Vec<Status>,
}

impl DlpJob {
    /// Sets the value for [name][DlpJob::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the value for [state][DlpJob::state].
    pub fn set_state<T: Into<JobState>>(mut self, v: T) -> Self {
        self.state = v.into();
        self
    }

    /// Sets the value for [create_time][DlpJob::create_time].
    pub fn set_create_time<T: Into<SystemTime>>(mut self, v: T) -> Self {
        self.create_time = Some(v.into());
        self
    }

    /// Sets the value for [end_time][DlpJob::end_time].
    pub fn set_end_time<T: Into<SystemTime>>(mut self, v: T) -> Self {
        self.end_time = Some(v.into());
        self
    }

    /// Sets the value for [inspect_details][DlpJob::inspect_details].
    pub fn set_inspect_details<T: Into<InspectResult>>(mut self, v: T) -> Self {
        self.inspect_details = Some(v.into());
        self
    }

    /// Sets the value for [errors][DlpJob::errors].
    pub fn set_errors<T: IntoIterator<Item = Status>>(mut self, v: T) -> Self {
        self.errors = v.into_iter().collect();
        self
    }
}
