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

//! Runs the samples against in-memory services.

const DESCRIPTION: &str = concat!(
    "Runs the samples that wait on long-running work. The create-instance",
    " command creates Bigtable instances and polls each creation operation",
    " until it completes. The inspect command starts DLP inspection jobs and",
    " waits for the Pub/Sub notification each job publishes when it completes.",
    " Both commands use in-memory services, set RUST_LOG=debug to see each",
    " status read and each delivered notification."
);

mod args;

use args::{Args, Command, CreateInstance, Inspect};
use clap::Parser;
use cloud_samples_snippets::bigtable::{cluster_request, create_cluster, create_instance, instance_request};
use cloud_samples_snippets::dlp::{inspect_gcs_request, inspect_with_notification};
use cloud_samples_snippets::fake::{FakeDlp, FakeInstanceAdmin};
use futures::future::join_all;
use lro::{FixedDelay, PollingOptions};
use pubsub::NotificationListener;
use pubsub::memory::MemorySubscription;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = enable_tracing();

    let args = Args::parse();
    args.validate()?;
    tracing::info!("{args:?}");

    let failures = match &args.command {
        Command::CreateInstance(c) => create_instances(&args, c).await,
        Command::Inspect(c) => inspect(&args, c).await,
    };
    if failures > 0 {
        anyhow::bail!("{failures} sample(s) failed");
    }
    tracing::info!("DONE");
    Ok(())
}

async fn create_instances(args: &Args, command: &CreateInstance) -> usize {
    let admin = FakeInstanceAdmin::new().with_reads_until_done(command.reads_until_done);
    let options = PollingOptions::default()
        .with_backoff_policy(FixedDelay::new(command.poll_interval))
        .with_timeout(args.timeout);

    let runs = (0..command.instance_count).map(|i| {
        let admin = admin.clone();
        let options = options.clone();
        async move {
            let instance_id = format!("sample-instance-{i}");
            let request = instance_request(&args.project_id, &instance_id, "cluster-1", &command.zone);
            let instance = create_instance(admin.clone(), request, options.clone()).await?;
            println!("Created instance {}", instance.name);
            println!("{}", serde_json::to_string_pretty(&instance).map_err(lro::Error::other)?);
            if let Some(zone) = &command.second_zone {
                let request = cluster_request(&args.project_id, &instance_id, "cluster-2", zone, 3);
                let cluster = create_cluster(admin, request, options).await?;
                println!("Created cluster {} with {} nodes", cluster.name, cluster.serve_nodes);
            }
            Ok::<_, lro::Error>(())
        }
    });
    report(join_all(runs).await)
}

async fn inspect(args: &Args, command: &Inspect) -> usize {
    let subscription =
        MemorySubscription::new(format!("projects/{}/subscriptions/dlp-jobs", args.project_id));
    let findings = command
        .info_types
        .iter()
        .enumerate()
        .map(|(i, t)| (t.clone(), i as i64 + 1));
    let dlp = FakeDlp::new(subscription.clone())
        .with_completion_delay(command.job_duration)
        .with_findings(findings);
    let listener = NotificationListener::new(subscription).with_timeout(args.timeout);
    let topic = format!("projects/{}/topics/dlp-jobs", args.project_id);

    let runs = (0..command.job_count).map(|_| {
        let request = inspect_gcs_request(
            &args.project_id,
            &command.url,
            &topic,
            command.info_types.iter().cloned(),
        );
        let dlp = &dlp;
        let listener = &listener;
        async move {
            let report = inspect_with_notification(dlp, listener, request).await?;
            println!("{report}");
            Ok::<_, lro::Error>(())
        }
    });
    report(join_all(runs).await)
}

/// Logs each failed sample and returns the number of failures.
fn report(results: Vec<lro::Result<()>>) -> usize {
    results
        .into_iter()
        .enumerate()
        .filter_map(|(i, r)| r.err().map(|e| (i, e)))
        .inspect(|(i, e)| tracing::error!("error in sample {i}: {e}"))
        .count()
}

fn enable_tracing() -> tracing::dispatcher::DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_level(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_default(subscriber)
}
