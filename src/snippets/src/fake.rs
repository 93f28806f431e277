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

//! In-memory services for the samples and their tests.
//!
//! [FakeInstanceAdmin] completes operations after a configured number of
//! status reads. [FakeDlp] runs each job for a configured time and then
//! publishes the completion notification to a [MemorySubscription], the way
//! DLP publishes to the topic in the job actions.

use crate::bigtable::{InstanceAdmin, RawOperation, model::*};
use crate::dlp::{DlpJobs, model::*};
use crate::{Error, Result};
use gax::error::rpc::{Code, Status};
use pubsub::DEFAULT_CORRELATION_ATTRIBUTE;
use pubsub::memory::MemorySubscription;
use pubsub::model::Message;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

/// Operations complete on this status read unless configured otherwise.
pub const DEFAULT_READS_UNTIL_DONE: u32 = 3;

/// Jobs complete after this time unless configured otherwise.
pub const DEFAULT_COMPLETION_DELAY: Duration = Duration::from_millis(500);

fn status(code: Code, message: impl Into<String>) -> Error {
    Error::service(Status::default().set_code(code).set_message(message))
}

fn to_json<T: Serialize>(v: &T) -> Result<serde_json::Value> {
    serde_json::to_value(v).map_err(Error::other)
}

/// An in-memory Bigtable instance admin service.
///
/// Clones share the same instances and operations.
#[derive(Clone, Debug)]
pub struct FakeInstanceAdmin {
    state: Arc<Mutex<AdminState>>,
    reads_until_done: u32,
    failure: Option<Status>,
}

#[derive(Debug, Default)]
struct AdminState {
    next_operation: u64,
    operations: HashMap<String, FakeOperation>,
    instances: HashMap<String, Instance>,
    clusters: HashMap<String, Cluster>,
}

#[derive(Debug)]
struct FakeOperation {
    reads: u32,
    done: bool,
    target: Target,
}

#[derive(Debug)]
enum Target {
    Instance(String, CreateInstanceMetadata),
    Cluster(String, CreateClusterMetadata),
}

impl Default for FakeInstanceAdmin {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeInstanceAdmin {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(AdminState::default())),
            reads_until_done: DEFAULT_READS_UNTIL_DONE,
            failure: None,
        }
    }

    /// Operations complete on the `v`-th status read.
    pub fn with_reads_until_done(mut self, v: u32) -> Self {
        self.reads_until_done = v.max(1);
        self
    }

    /// Operations fail with `v` instead of succeeding.
    pub fn with_failure(mut self, v: Status) -> Self {
        self.failure = Some(v);
        self
    }

    /// The number of status reads for the operation called `name`.
    pub fn operation_reads(&self, name: &str) -> Option<u32> {
        self.state().operations.get(name).map(|o| o.reads)
    }

    /// The instances that exist, in any state.
    pub fn instances(&self) -> Vec<Instance> {
        self.state().instances.values().cloned().collect()
    }

    fn state(&self) -> MutexGuard<'_, AdminState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self, state: &mut AdminState, parent: &str, target: Target) -> String {
        state.next_operation += 1;
        let name = format!("{parent}/operations/{}", state.next_operation);
        state.operations.insert(
            name.clone(),
            FakeOperation {
                reads: 0,
                done: false,
                target,
            },
        );
        name
    }

    fn snapshot(&self, state: &mut AdminState, name: String) -> Result<RawOperation> {
        let reads_until_done = self.reads_until_done;
        let Some(op) = state.operations.get_mut(&name) else {
            return Err(status(Code::NotFound, format!("operation {name} not found")));
        };
        op.reads += 1;
        let completes = !op.done && op.reads >= reads_until_done;
        op.done = op.done || completes;
        let (reads, done) = (op.reads, op.done);
        let now = SystemTime::now();
        match &mut op.target {
            Target::Instance(instance, metadata) => {
                let instance = instance.clone();
                if completes {
                    metadata.finish_time = Some(now);
                }
                let metadata = to_json(&*metadata)?;
                if !done {
                    return Ok(RawOperation::running(name).set_metadata(metadata));
                }
                if let Some(failure) = &self.failure {
                    state.instances.remove(&instance);
                    state.clusters.retain(|k, _| !k.starts_with(&format!("{instance}/")));
                    return Ok(RawOperation::failed(name, failure.clone()).set_metadata(metadata));
                }
                for (k, c) in state.clusters.iter_mut() {
                    if k.starts_with(&format!("{instance}/")) {
                        c.state = ClusterState::Ready;
                    }
                }
                let result = match state.instances.get_mut(&instance) {
                    Some(i) => {
                        i.state = InstanceState::Ready;
                        to_json(&*i)?
                    }
                    None => return Err(status(Code::NotFound, format!("instance {instance} not found"))),
                };
                Ok(RawOperation::succeeded(name, result).set_metadata(metadata))
            }
            Target::Cluster(cluster, metadata) => {
                let cluster = cluster.clone();
                metadata.progress_percent = progress_percent(reads, reads_until_done);
                if completes {
                    metadata.finish_time = Some(now);
                }
                let metadata = to_json(&*metadata)?;
                if !done {
                    return Ok(RawOperation::running(name).set_metadata(metadata));
                }
                if let Some(failure) = &self.failure {
                    state.clusters.remove(&cluster);
                    return Ok(RawOperation::failed(name, failure.clone()).set_metadata(metadata));
                }
                let result = match state.clusters.get_mut(&cluster) {
                    Some(c) => {
                        c.state = ClusterState::Ready;
                        to_json(&*c)?
                    }
                    None => return Err(status(Code::NotFound, format!("cluster {cluster} not found"))),
                };
                Ok(RawOperation::succeeded(name, result).set_metadata(metadata))
            }
        }
    }
}

#[async_trait::async_trait]
impl InstanceAdmin for FakeInstanceAdmin {
    async fn create_instance(&self, request: CreateInstanceRequest) -> Result<RawOperation> {
        if request.instance_id.is_empty() {
            return Err(status(Code::InvalidArgument, "the instance id is required"));
        }
        if request.clusters.is_empty() {
            return Err(status(Code::InvalidArgument, "at least one cluster is required"));
        }
        let name = format!("{}/instances/{}", request.parent, request.instance_id);
        let mut state = self.state();
        if state.instances.contains_key(&name) {
            return Err(status(Code::AlreadyExists, format!("instance {name} already exists")));
        }
        let instance = request
            .instance
            .clone()
            .unwrap_or_default()
            .set_name(&name)
            .set_state(InstanceState::Creating);
        state.instances.insert(name.clone(), instance);
        for (id, cluster) in &request.clusters {
            let cluster_name = format!("{name}/clusters/{id}");
            let cluster = cluster
                .clone()
                .set_name(&cluster_name)
                .set_state(ClusterState::Creating);
            state.clusters.insert(cluster_name, cluster);
        }
        let metadata = CreateInstanceMetadata::default()
            .set_original_request(request)
            .set_request_time(SystemTime::now());
        let json = to_json(&metadata)?;
        let operation = self.start(&mut state, &name, Target::Instance(name.clone(), metadata));
        tracing::debug!(operation = %operation, "started instance creation");
        Ok(RawOperation::pending(operation).set_metadata(json))
    }

    async fn create_cluster(&self, request: CreateClusterRequest) -> Result<RawOperation> {
        let mut state = self.state();
        if !state.instances.contains_key(&request.parent) {
            return Err(status(Code::NotFound, format!("instance {} not found", request.parent)));
        }
        let name = format!("{}/clusters/{}", request.parent, request.cluster_id);
        if state.clusters.contains_key(&name) {
            return Err(status(Code::AlreadyExists, format!("cluster {name} already exists")));
        }
        let cluster = request
            .cluster
            .clone()
            .unwrap_or_default()
            .set_name(&name)
            .set_state(ClusterState::Creating);
        state.clusters.insert(name.clone(), cluster);
        let metadata = CreateClusterMetadata::default()
            .set_original_request(request)
            .set_request_time(SystemTime::now());
        let json = to_json(&metadata)?;
        let operation = self.start(&mut state, &name, Target::Cluster(name.clone(), metadata));
        tracing::debug!(operation = %operation, "started cluster creation");
        Ok(RawOperation::pending(operation).set_metadata(json))
    }

    async fn get_operation(&self, name: String) -> Result<RawOperation> {
        let mut state = self.state();
        self.snapshot(&mut state, name)
    }

    async fn get_instance(&self, name: String) -> Result<Instance> {
        self.state()
            .instances
            .get(&name)
            .cloned()
            .ok_or_else(|| status(Code::NotFound, format!("instance {name} not found")))
    }
}

fn progress_percent(reads: u32, reads_until_done: u32) -> i32 {
    let total = u64::from(reads_until_done.max(1));
    (u64::from(reads).min(total) * 100 / total) as i32
}

/// An in-memory DLP service.
///
/// Jobs configured with a Pub/Sub action publish a notification to the
/// subscription when they complete. The notification carries the job name in
/// the `DlpJobName` attribute and the job, as JSON, in its data. The fake
/// does not model topics: every job publishes to the same subscription.
#[derive(Clone, Debug)]
pub struct FakeDlp {
    subscription: MemorySubscription,
    jobs: Arc<Mutex<DlpState>>,
    completion_delay: Duration,
    findings: HashMap<String, i64>,
    failure: Option<Status>,
}

#[derive(Debug, Default)]
struct DlpState {
    next_job: u64,
    jobs: HashMap<String, DlpJob>,
}

impl FakeDlp {
    /// Creates a service that publishes notifications to `subscription`.
    pub fn new(subscription: MemorySubscription) -> Self {
        Self {
            subscription,
            jobs: Arc::new(Mutex::new(DlpState::default())),
            completion_delay: DEFAULT_COMPLETION_DELAY,
            findings: HashMap::new(),
            failure: None,
        }
    }

    /// Jobs complete `v` after they are created.
    pub fn with_completion_delay(mut self, v: Duration) -> Self {
        self.completion_delay = v;
        self
    }

    /// Jobs find `count` instances of each info type they inspect for.
    ///
    /// Info types not listed here have no findings.
    pub fn with_findings<T, K>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        self.findings = v.into_iter().map(|(k, c)| (k.into(), c)).collect();
        self
    }

    /// Jobs fail with `v`. The notification is published anyway.
    pub fn with_failure(mut self, v: Status) -> Self {
        self.failure = Some(v);
        self
    }

    /// All the jobs created so far.
    pub fn jobs(&self) -> Vec<DlpJob> {
        self.state().jobs.values().cloned().collect()
    }

    fn state(&self) -> MutexGuard<'_, DlpState> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, name: &str, config: &InspectJobConfig) -> Option<DlpJob> {
        let stats = config
            .inspect_config
            .iter()
            .flat_map(|c| c.info_types.iter())
            .filter_map(|t| {
                self.findings
                    .get(&t.name)
                    .filter(|c| **c > 0)
                    .map(|c| InfoTypeStats::new(&t.name, *c))
            })
            .collect::<Vec<_>>();
        let mut state = self.state();
        let job = state.jobs.get_mut(name)?;
        job.end_time = Some(SystemTime::now());
        match &self.failure {
            Some(f) => {
                job.state = JobState::Failed;
                job.errors = vec![f.clone()];
            }
            None => {
                job.state = JobState::Done;
                job.inspect_details = Some(
                    InspectResult::default()
                        .set_processed_bytes(1024)
                        .set_total_estimated_bytes(1024)
                        .set_info_type_stats(stats),
                );
            }
        }
        Some(job.clone())
    }
}

#[async_trait::async_trait]
impl DlpJobs for FakeDlp {
    async fn create_inspect_job(&self, request: CreateDlpJobRequest) -> Result<DlpJob> {
        let Some(config) = request.inspect_job else {
            return Err(status(Code::InvalidArgument, "the inspect job configuration is required"));
        };
        if config.storage_config.is_none() {
            return Err(status(Code::InvalidArgument, "the storage configuration is required"));
        }
        let job = {
            let mut state = self.state();
            state.next_job += 1;
            let id = match request.job_id.as_str() {
                "" => format!("i-{}", state.next_job),
                id => format!("i-{id}"),
            };
            let name = format!("{}/dlpJobs/{id}", request.parent);
            if state.jobs.contains_key(&name) {
                return Err(status(Code::AlreadyExists, format!("job {name} already exists")));
            }
            let job = DlpJob::default()
                .set_name(&name)
                .set_state(JobState::Running)
                .set_create_time(SystemTime::now());
            state.jobs.insert(name, job.clone());
            job
        };
        tracing::debug!(job = %job.name, "started inspection job");

        let notify = config.notification_topics().next().is_some();
        let fake = self.clone();
        let name = job.name.clone();
        tokio::spawn(async move {
            tokio::time::sleep(fake.completion_delay).await;
            let Some(done) = fake.complete(&name, &config) else {
                return;
            };
            if !notify {
                return;
            }
            let data = serde_json::to_vec(&done).unwrap_or_default();
            fake.subscription.publish(
                Message::new()
                    .set_data(data)
                    .set_attributes([(DEFAULT_CORRELATION_ATTRIBUTE, name.as_str())]),
            );
        });
        Ok(job)
    }

    async fn get_dlp_job(&self, name: String) -> Result<DlpJob> {
        self.state()
            .jobs
            .get(&name)
            .cloned()
            .ok_or_else(|| status(Code::NotFound, format!("job {name} not found")))
    }
}
