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

#[cfg(test)]
mod tests {
    use cloud_samples_pubsub as pubsub;
    use gax::error::rpc::{Code, Status};
    use gax::polling_backoff_policy::FixedDelay;
    use pubsub::error::ListenError;
    use pubsub::memory::MemorySubscription;
    use pubsub::model::Message;
    use pubsub::subscriber::handler::{AckResult, AtLeastOnce, Handler};
    use pubsub::subscriber::stream::StreamingSubscription;
    use pubsub::subscriber::{DispatchHandle, MessageCallback, Subscription, SubscriptionHandle};
    use pubsub::{Correlation, Error, NotificationListener, Result, await_notification};
    use std::error::Error as _;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use test_utils::captured_events;
    use test_utils::resource_names::random_job_name;
    use tokio::time::Instant;

    const SUBSCRIPTION: &str = "projects/test-project/subscriptions/dlp-jobs";

    fn job(id: &str) -> String {
        format!("projects/test-project/dlpJobs/{id}")
    }

    fn notification(job_id: &str) -> Message {
        Message::new().set_attributes([("DlpJobName", job_id)])
    }

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    /// Keeps a copy of every handle, to verify the listener releases them.
    struct Recording {
        inner: MemorySubscription,
        handles: Mutex<Vec<Arc<DispatchHandle>>>,
    }

    impl Recording {
        fn new(inner: MemorySubscription) -> Self {
            Self {
                inner,
                handles: Mutex::default(),
            }
        }

        fn handles(&self) -> Vec<Arc<DispatchHandle>> {
            self.handles.lock().expect("handles mutex").clone()
        }
    }

    #[async_trait::async_trait]
    impl Subscription for Recording {
        type Handle = Arc<DispatchHandle>;

        async fn subscribe(&self, callback: MessageCallback) -> Result<Self::Handle> {
            let handle = Arc::new(self.inner.subscribe(callback).await?);
            self.handles.lock().expect("handles mutex").push(handle.clone());
            Ok(handle)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn other_jobs_are_declined() -> anyhow::Result<()> {
        let subscription = MemorySubscription::new(SUBSCRIPTION).with_redelivery_delay(ms(50));
        let waiter = {
            let subscription = subscription.clone();
            tokio::spawn(async move {
                await_notification(subscription, job("a"), Duration::from_secs(10)).await
            })
        };
        tokio::time::sleep(ms(10)).await;
        let b = subscription.publish(notification(&job("b")));
        tokio::time::sleep(ms(200)).await;
        assert!(!waiter.is_finished());
        assert!(subscription.nack_count() >= 1, "{subscription:?}");
        assert!(subscription.acked_ids().is_empty(), "{subscription:?}");

        let a = subscription.publish(notification(&job("a")));
        let got = waiter.await??;
        assert_eq!(got.message_id, a);
        assert_eq!(subscription.acked_ids(), vec![a.clone()]);
        assert_eq!(subscription.active_subscribers(), 0);

        // The notification for "b" is still there for its own listener.
        let got = await_notification(&subscription, job("b"), Duration::from_secs(10)).await?;
        assert_eq!(got.message_id, b);
        assert_eq!(subscription.acked_ids(), vec![a, b]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waiters() -> anyhow::Result<()> {
        let subscription = MemorySubscription::new(SUBSCRIPTION).with_redelivery_delay(ms(20));
        let waiters: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|id| {
                let subscription = subscription.clone();
                tokio::spawn(async move {
                    await_notification(subscription, job(id), Duration::from_secs(30)).await
                })
            })
            .collect();
        tokio::time::sleep(ms(10)).await;
        let mut want = Vec::new();
        for id in ["c", "b", "a"] {
            want.push(subscription.publish(notification(&job(id))));
            tokio::time::sleep(ms(100)).await;
        }
        want.reverse();
        let mut got = Vec::new();
        for w in waiters {
            got.push(w.await??.message_id);
        }
        assert_eq!(got, want);
        assert_eq!(subscription.active_subscribers(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_unsubscribes() -> anyhow::Result<()> {
        let memory = MemorySubscription::new(SUBSCRIPTION);
        let recording = Recording::new(memory.clone());
        let other = memory.publish(notification(&random_job_name("test-project")));

        let start = Instant::now();
        let wanted = random_job_name("test-project");
        let got = NotificationListener::new(&recording)
            .with_timeout(Duration::from_secs(2))
            .wait_for(wanted.as_str())
            .await;
        assert_eq!(start.elapsed(), Duration::from_secs(2));
        let err = got.expect_err("no notification for the wanted job");
        assert!(err.is_timeout(), "{err:?}");
        let source = err.source().and_then(|e| e.downcast_ref::<ListenError>());
        assert!(
            matches!(source, Some(e) if e.job_id() == wanted),
            "{err:?}"
        );

        let handles = recording.handles();
        assert_eq!(handles.len(), 1);
        assert!(handles.iter().all(|h| !h.is_subscribed()));
        assert_eq!(memory.active_subscribers(), 0);
        // Nothing was acknowledged, the other notification is not lost.
        assert!(memory.acked_ids().is_empty());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(memory.pending(), 1, "{other} should be pending");
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn duplicate_notifications() -> anyhow::Result<()> {
        let subscription = MemorySubscription::new(SUBSCRIPTION).with_max_concurrency(8);
        let mut ids = Vec::new();
        for _ in 0..16 {
            ids.push(subscription.publish(notification(&job("a"))));
            subscription.publish(notification(&job("b")));
        }
        let got = await_notification(&subscription, job("a"), Duration::from_secs(30)).await?;
        assert!(ids.contains(&got.message_id), "{got:?}");

        let acked = subscription.acked_ids();
        assert!(acked.contains(&got.message_id), "{acked:?}");
        assert!(acked.iter().all(|id| ids.contains(id)), "{acked:?}");
        let mut unique = acked.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), acked.len(), "{acked:?}");
        assert_eq!(subscription.active_subscribers(), 0);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_errors_are_retried() -> anyhow::Result<()> {
        let (_guard, events) = captured_events::capture();
        let subscription = MemorySubscription::new(SUBSCRIPTION);
        let unavailable = || Error::service(Status::default().set_code(Code::Unavailable));
        subscription.fail_next_subscribe(unavailable());
        subscription.fail_next_subscribe(unavailable());
        subscription.publish(notification(&job("a")));

        let start = Instant::now();
        let got = NotificationListener::new(&subscription)
            .with_timeout(Duration::from_secs(10))
            .with_subscribe_backoff_policy(FixedDelay::new(ms(250)))
            .wait_for(job("a"))
            .await?;
        assert_eq!(got.attribute("DlpJobName"), Some(job("a").as_str()));
        assert_eq!(start.elapsed(), ms(500));
        let warnings = events.matching(tracing::Level::WARN, "cannot subscribe");
        assert_eq!(warnings.len(), 2, "{:?}", events.events());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn deleted_while_waiting() {
        let subscription = MemorySubscription::new(SUBSCRIPTION);
        let deleter = {
            let subscription = subscription.clone();
            tokio::spawn(async move {
                tokio::time::sleep(ms(300)).await;
                subscription.delete();
            })
        };
        let got = await_notification(&subscription, job("a"), Duration::from_secs(10)).await;
        assert!(
            matches!(got, Err(ref e) if e.status().map(|s| s.code) == Some(Code::NotFound)),
            "{got:?}"
        );
        let _ = deleter.await;
    }

    #[tokio::test(start_paused = true)]
    async fn custom_correlation() -> anyhow::Result<()> {
        let subscription = MemorySubscription::new(SUBSCRIPTION);
        subscription.publish(Message::new().set_attributes([("DlpJobName", "job-1")]));
        let want = subscription.publish(Message::new().set_attributes([("jobName", "job-1")]));
        let got = NotificationListener::new(&subscription)
            .with_correlation(Correlation::attribute("jobName"))
            .with_timeout(Duration::from_secs(10))
            .wait_for("job-1")
            .await?;
        assert_eq!(got.message_id, want);
        Ok(())
    }

    #[tokio::test]
    async fn streaming_transport() -> anyhow::Result<()> {
        use tokio::sync::mpsc::unbounded_channel;
        let (ack_tx, mut acks) = unbounded_channel();
        let items: Vec<Result<(Message, Handler)>> = ["b", "a"]
            .into_iter()
            .map(|id| {
                let message = notification(&job(id)).set_message_id(format!("m-{id}"));
                let handler = Handler::from(AtLeastOnce::new(format!("ack-{id}"), ack_tx.clone()));
                Ok((message, handler))
            })
            .collect();
        let items = Mutex::new(Some(items));
        let subscription = StreamingSubscription::new(move || {
            let items = items.lock().expect("items mutex").take().unwrap_or_default();
            async move {
                use futures::StreamExt;
                Ok::<_, Error>(futures::stream::iter(items).chain(futures::stream::pending()))
            }
        })
        .with_max_concurrency(1);
        let got = await_notification(&subscription, job("a"), Duration::from_secs(10)).await?;
        assert_eq!(got.message_id, "m-a");

        let mut settled = vec![acks.recv().await, acks.recv().await];
        settled.sort_by_key(|r| r.as_ref().map(|r| r.ack_id().to_string()));
        assert_eq!(
            settled,
            vec![
                Some(AckResult::Ack("ack-a".to_string())),
                Some(AckResult::Nack("ack-b".to_string()))
            ]
        );
        Ok(())
    }
}
