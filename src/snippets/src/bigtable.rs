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

//! Create Bigtable instances and clusters, and wait until they are ready.
//!
//! Creating an instance or a cluster starts a long-running operation. The
//! workflows in this module submit the request and poll the operation with
//! the caller's [PollingOptions]. There is no default timeout: the caller
//! decides how long to wait.

pub mod model;

use crate::invoke::{Invoke, invoke};
use crate::{Error, Result};
use futures::StreamExt;
use lro::{Operation, OperationState, Poller, PollingOptions, PollingResult};
use model::*;
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// A long-running operation as returned by the admin service.
///
/// The result and the metadata are JSON values, the workflows decode them
/// into the types for each method.
pub type RawOperation = Operation<serde_json::Value, serde_json::Value>;

/// The Bigtable instance admin methods used by the samples.
#[async_trait::async_trait]
pub trait InstanceAdmin: Send + Sync + std::fmt::Debug {
    /// Starts creating an instance and its clusters.
    async fn create_instance(&self, request: CreateInstanceRequest) -> Result<RawOperation>;

    /// Starts creating a cluster in an existing instance.
    async fn create_cluster(&self, request: CreateClusterRequest) -> Result<RawOperation>;

    /// Reads the current state of the operation called `name`.
    async fn get_operation(&self, name: String) -> Result<RawOperation>;

    async fn get_instance(&self, name: String) -> Result<Instance>;
}

#[async_trait::async_trait]
impl<T> InstanceAdmin for Arc<T>
where
    T: InstanceAdmin + ?Sized,
{
    async fn create_instance(&self, request: CreateInstanceRequest) -> Result<RawOperation> {
        T::create_instance(self, request).await
    }
    async fn create_cluster(&self, request: CreateClusterRequest) -> Result<RawOperation> {
        T::create_cluster(self, request).await
    }
    async fn get_operation(&self, name: String) -> Result<RawOperation> {
        T::get_operation(self, name).await
    }
    async fn get_instance(&self, name: String) -> Result<Instance> {
        T::get_instance(self, name).await
    }
}

#[async_trait::async_trait]
impl<A> Invoke<GetInstanceRequest> for A
where
    A: InstanceAdmin,
{
    type Response = Instance;
    async fn invoke(&self, request: GetInstanceRequest) -> Result<Instance> {
        self.get_instance(request.name).await
    }
}

/// Builds the request to create a production instance with one cluster.
pub fn instance_request(
    project_id: &str,
    instance_id: &str,
    cluster_id: &str,
    zone: &str,
) -> CreateInstanceRequest {
    let instance = Instance::default()
        .set_display_name(instance_id)
        .set_instance_type(InstanceType::Production)
        .set_labels([("prod-label", "prod-label")]);
    let cluster = Cluster::default()
        .set_location(format!("projects/{project_id}/locations/{zone}"))
        .set_serve_nodes(1)
        .set_default_storage_type(StorageType::Ssd);
    CreateInstanceRequest::default()
        .set_parent(format!("projects/{project_id}"))
        .set_instance_id(instance_id)
        .set_instance(instance)
        .set_clusters([(cluster_id, cluster)])
}

/// Builds the request to add a cluster to an existing instance.
pub fn cluster_request(
    project_id: &str,
    instance_id: &str,
    cluster_id: &str,
    zone: &str,
    serve_nodes: i32,
) -> CreateClusterRequest {
    let cluster = Cluster::default()
        .set_location(format!("projects/{project_id}/locations/{zone}"))
        .set_serve_nodes(serve_nodes)
        .set_default_storage_type(StorageType::Ssd);
    CreateClusterRequest::default()
        .set_parent(format!("projects/{project_id}/instances/{instance_id}"))
        .set_cluster_id(cluster_id)
        .set_cluster(cluster)
}

/// Creates an instance and waits until the operation completes.
///
/// Returns the instance as reported by `GetInstance` after the operation
/// succeeded. Fails if the operation fails, if polling fails, or if the
/// operation is still running when the timeout in `options` expires.
///
/// # Example
/// ```
/// # use cloud_samples_snippets::bigtable::{create_instance, instance_request};
/// # use cloud_samples_snippets::fake::FakeInstanceAdmin;
/// # use lro::{FixedDelay, PollingOptions};
/// # tokio_test::block_on(async {
/// use std::time::Duration;
/// let admin = FakeInstanceAdmin::new().with_reads_until_done(2);
/// let options = PollingOptions::default()
///     .with_backoff_policy(FixedDelay::new(Duration::from_millis(10)))
///     .with_timeout(Duration::from_secs(60));
/// let request = instance_request("my-project", "my-instance", "my-cluster", "us-central1-f");
/// let instance = create_instance(admin, request, options).await?;
/// assert_eq!(instance.name, "projects/my-project/instances/my-instance");
/// # Ok::<(), cloud_samples_snippets::Error>(())
/// # });
/// ```
pub async fn create_instance<A>(
    admin: A,
    request: CreateInstanceRequest,
    options: PollingOptions,
) -> Result<Instance>
where
    A: InstanceAdmin + Clone + 'static,
{
    tracing::info!(parent = %request.parent, instance_id = %request.instance_id, "creating instance");
    let starter = admin.clone();
    let reader = admin.clone();
    let created = lro::new_poller(
        options,
        move || async move {
            decode::<Instance, CreateInstanceMetadata>(starter.create_instance(request).await?)
        },
        move |name: String| {
            let admin = reader.clone();
            async move { decode::<Instance, CreateInstanceMetadata>(admin.get_operation(name).await?) }
        },
    )
    .until_done()
    .await?;

    let instance = invoke(&admin, GetInstanceRequest::new(created.name)).await?;
    tracing::info!(name = %instance.name, state = ?instance.state, "instance created");
    Ok(instance)
}

/// Creates a cluster and waits until the operation completes.
///
/// Logs the progress reported by the service while the operation runs.
/// Returns the cluster in the operation result.
pub async fn create_cluster<A>(
    admin: A,
    request: CreateClusterRequest,
    options: PollingOptions,
) -> Result<Cluster>
where
    A: InstanceAdmin + Clone + 'static,
{
    tracing::info!(parent = %request.parent, cluster_id = %request.cluster_id, "creating cluster");
    let starter = admin.clone();
    let reader = admin;
    let mut stream = lro::new_poller(
        options,
        move || async move {
            decode::<Cluster, CreateClusterMetadata>(starter.create_cluster(request).await?)
        },
        move |name: String| {
            let admin = reader.clone();
            async move { decode::<Cluster, CreateClusterMetadata>(admin.get_operation(name).await?) }
        },
    )
    .into_stream();

    let cluster = loop {
        match stream.next().await {
            Some(PollingResult::InProgress(metadata)) => {
                let progress = metadata.map(|m| m.progress_percent).unwrap_or_default();
                tracing::info!(progress_percent = progress, "cluster creation in progress");
            }
            Some(PollingResult::PollingError(e)) => {
                tracing::warn!("cannot read the cluster creation status, will retry: {e}");
            }
            Some(PollingResult::Completed(r)) => break r?,
            None => return Err(Error::other("the poller stopped without a result")),
        }
    };
    tracing::info!(name = %cluster.name, serve_nodes = cluster.serve_nodes, "cluster created");
    Ok(cluster)
}

/// Converts a raw operation into one with typed result and metadata.
fn decode<R, M>(op: RawOperation) -> Result<Operation<R, M>>
where
    R: DeserializeOwned,
    M: DeserializeOwned,
{
    let metadata = op
        .metadata()
        .cloned()
        .map(serde_json::from_value::<M>)
        .transpose()
        .map_err(Error::deser)?;
    let decoded = match op.state() {
        OperationState::Pending => Operation::pending(op.name()),
        OperationState::Running => Operation::running(op.name()),
        OperationState::Succeeded => {
            let result = op.result().cloned().unwrap_or_default();
            Operation::succeeded(op.name(), serde_json::from_value(result).map_err(Error::deser)?)
        }
        OperationState::Failed => {
            Operation::failed(op.name(), op.error().cloned().unwrap_or_default())
        }
    };
    Ok(match metadata {
        Some(m) => decoded.set_metadata(m),
        None => decoded,
    })
}
