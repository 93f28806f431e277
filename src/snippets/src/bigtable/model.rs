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
use std::collections::HashMap;
use std::time::SystemTime;

/// A collection of Bigtable clusters.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Instance {
    /// The unique name of the instance, in the form
    /// `projects/{project}/instances/{instance}`.
    pub name: String,

    /// The descriptive name for the instance, as it appears in UIs.
    pub display_name: String,

    pub state: InstanceState,

    #[serde(rename = "type")]
    pub instance_type: InstanceType,

    pub labels: HashMap<String, String>,
}

impl Instance {
    /// Sets the value for [name][Instance::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the value for [display_name][Instance::display_name].
    pub fn set_display_name<T: Into<String>>(mut self, v: T) -> Self {
        self.display_name = v.into();
        self
    }

    /// Sets the value for [state][Instance::state].
    pub fn set_state<T: Into<InstanceState>>(mut self, v: T) -> Self {
        self.state = v.into();
        self
    }

    /// Sets the value for [instance_type][Instance::instance_type].
    pub fn set_instance_type<T: Into<InstanceType>>(mut self, v: T) -> Self {
        self.instance_type = v.into();
        self
    }

    /// Sets the value for [labels][Instance::labels].
    pub fn set_labels<T, K, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.labels = v.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }
}

/// The possible states of an instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    #[default]
    StateNotKnown,
    /// The instance can serve requests.
    Ready,
    /// The instance is being created, it cannot serve requests yet.
    Creating,
}

/// The type of an instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceType {
    #[default]
    TypeUnspecified,
    Production,
    Development,
}

/// A set of Bigtable nodes serving the tables of an instance in one zone.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct Cluster {
    /// The unique name of the cluster, in the form
    /// `projects/{project}/instances/{instance}/clusters/{cluster}`.
    pub name: String,

    /// The zone where the cluster nodes run, in the form
    /// `projects/{project}/locations/{zone}`.
    pub location: String,

    pub state: ClusterState,

    /// The number of nodes allocated to the cluster.
    pub serve_nodes: i32,

    pub default_storage_type: StorageType,
}

impl Cluster {
    /// Sets the value for [name][Cluster::name].
    pub fn set_name<T: Into<String>>(mut self, v: T) -> Self {
        self.name = v.into();
        self
    }

    /// Sets the value for [location][Cluster::location].
    pub fn set_location<T: Into<String>>(mut self, v: T) -> Self {
        self.location = v.into();
        self
    }

    /// Sets the value for [state][Cluster::state].
    pub fn set_state<T: Into<ClusterState>>(mut self, v: T) -> Self {
        self.state = v.into();
        self
    }

    /// Sets the value for [serve_nodes][Cluster::serve_nodes].
    pub fn set_serve_nodes<T: Into<i32>>(mut self, v: T) -> Self {
        self.serve_nodes = v.into();
        self
    }

    /// Sets the value for [default_storage_type][Cluster::default_storage_type].
    pub fn set_default_storage_type<T: Into<StorageType>>(mut self, v: T) -> Self {
        self.default_storage_type = v.into();
        self
    }
}

/// The possible states of a cluster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterState {
    #[default]
    StateNotKnown,
    Ready,
    Creating,
    Resizing,
    Disabled,
}

/// The storage media for the tables in a cluster.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageType {
    #[default]
    StorageTypeUnspecified,
    Ssd,
    Hdd,
}

/// Request message for `CreateInstance`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct CreateInstanceRequest {
    /// The project that will own the instance, in the form
    /// `projects/{project}`.
    pub parent: String,

    /// The id for the new instance, the last segment of its name.
    pub instance_id: String,

    pub instance: Option<Instance>,

    /// The clusters to create with the instance, keyed by cluster id. At
    /// least one cluster is required.
    pub clusters: HashMap<String, Cluster>,
}

impl CreateInstanceRequest {
    /// Sets the value for [parent][CreateInstanceRequest::parent].
    pub fn set_parent<T: Into<String>>(mut self, v: T) -> Self {
        self.parent = v.into();
        self
    }

    /// Sets the value for [instance_id][CreateInstanceRequest::instance_id].
    pub fn set_instance_id<T: Into<String>>(mut self, v: T) -> Self {
        self.instance_id = v.into();
        self
    }

    /// Sets the value for [instance][CreateInstanceRequest::instance].
    pub fn set_instance<T: Into<Instance>>(mut self, v: T) -> Self {
        self.instance = Some(v.into());
        self
    }

    /// Sets the value for [clusters][CreateInstanceRequest::clusters].
    pub fn set_clusters<T, K>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, Cluster)>,
        K: Into<String>,
    {
        self.clusters = v.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self
    }
}

/// Request message for `CreateCluster`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct CreateClusterRequest {
    /// The instance that will own the cluster, in the form
    /// `projects/{project}/instances/{instance}`.
    pub parent: String,

    pub cluster_id: String,

    pub cluster: Option<Cluster>,
}

impl CreateClusterRequest {
    /// Sets the value for [parent][CreateClusterRequest::parent].
    pub fn set_parent<T: Into<String>>(mut self, v: T) -> Self {
        self.parent = v.into();
        self
    }

    /// Sets the value for [cluster_id][CreateClusterRequest::cluster_id].
    pub fn set_cluster_id<T: Into<String>>(mut self, v: T) -> Self {
        self.cluster_id = v.into();
        self
    }

    /// Sets the value for [cluster][CreateClusterRequest::cluster].
    pub fn set_cluster<T: Into<Cluster>>(mut self, v: T) -> Self {
        self.cluster = Some(v.into());
        self
    }
}

/// Request message for `GetInstance`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct GetInstanceRequest {
    pub name: String,
}

impl GetInstanceRequest {
    pub fn new<T: Into<String>>(name: T) -> Self {
        Self { name: name.into() }
    }
}

/// The metadata for the operation returned by `CreateInstance`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct CreateInstanceMetadata {
    /// The request that prompted the initiation of this operation.
    pub original_request: Option<CreateInstanceRequest>,

    /// The time at which the request was received.
    pub request_time: Option<SystemTime>,

    /// The time at which the operation failed or was completed successfully.
    pub finish_time: Option<SystemTime>,
}

impl CreateInstanceMetadata {
    /// Sets the value for [original_request][CreateInstanceMetadata::original_request].
    pub fn set_original_request<T: Into<CreateInstanceRequest>>(mut self, v: T) -> Self {
        self.original_request = Some(v.into());
        self
    }

    /// Sets the value for [request_time][CreateInstanceMetadata::request_time].
    pub fn set_request_time<T: Into<SystemTime>>(mut self, v: T) -> Self {
        self.request_time = Some(v.into());
        self
    }

    /// Sets the value for [finish_time][CreateInstanceMetadata::finish_time].
    pub fn set_finish_time<T: Into<SystemTime>>(mut self, v: T) -> Self {
        self.finish_time = Some(v.into());
        self
    }
}

/// The metadata for the operation returned by `CreateCluster`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
#[non_exhaustive]
pub struct CreateClusterMetadata {
    pub original_request: Option<CreateClusterRequest>,

    pub request_time: Option<SystemTime>,

    pub finish_time: Option<SystemTime>,

    /// An estimate of the work completed, between 0 and 100.
    pub progress_percent: i32,
}

impl CreateClusterMetadata {
    /// Sets the value for [original_request][CreateClusterMetadata::original_request].
    pub fn set_original_request<T: Into<CreateClusterRequest>>(mut self, v: T) -> Self {
        self.original_request = Some(v.into());
        self
    }

    /// Sets the value for [request_time][CreateClusterMetadata::request_time].
    pub fn set_request_time<T: Into<SystemTime>>(mut self, v: T) -> Self {
        self.request_time = Some(v.into());
        self
    }

    /// Sets the value for [finish_time][CreateClusterMetadata::finish_time].
    pub fn set_finish_time<T: Into<SystemTime>>(mut self, v: T) -> Self {
        self.finish_time = Some(v.into());
        self
    }

    /// Sets the value for [progress_percent][CreateClusterMetadata::progress_percent].
    pub fn set_progress_percent<T: Into<i32>>(mut self, v: T) -> Self {
        self.progress_percent = v.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn instance_serde() -> anyhow::Result<()> {
        let instance = Instance::default()
            .set_name("projects/p/instances/i")
            .set_display_name("Sample Instance")
            .set_state(InstanceState::Ready)
            .set_instance_type(InstanceType::Production)
            .set_labels([("env", "test")]);
        let value = serde_json::to_value(&instance)?;
        assert_eq!(
            value,
            json!({
                "name": "projects/p/instances/i",
                "displayName": "Sample Instance",
                "state": "READY",
                "type": "PRODUCTION",
                "labels": {"env": "test"},
            })
        );
        assert_eq!(serde_json::from_value::<Instance>(value)?, instance);
        Ok(())
    }

    #[test]
    fn cluster_defaults() -> anyhow::Result<()> {
        let got = serde_json::from_value::<Cluster>(json!({"name": "c", "serveNodes": 3}))?;
        assert_eq!(got.name, "c");
        assert_eq!(got.serve_nodes, 3);
        assert_eq!(got.state, ClusterState::StateNotKnown);
        assert_eq!(got.default_storage_type, StorageType::StorageTypeUnspecified);
        Ok(())
    }

    #[test]
    fn metadata_keeps_request() -> anyhow::Result<()> {
        let request = CreateClusterRequest::default()
            .set_parent("projects/p/instances/i")
            .set_cluster_id("c")
            .set_cluster(Cluster::default().set_serve_nodes(1));
        let metadata = CreateClusterMetadata::default()
            .set_original_request(request.clone())
            .set_progress_percent(50);
        let got = serde_json::from_value::<CreateClusterMetadata>(serde_json::to_value(&metadata)?)?;
        assert_eq!(got.original_request, Some(request));
        assert_eq!(got.progress_percent, 50);
        Ok(())
    }
}
