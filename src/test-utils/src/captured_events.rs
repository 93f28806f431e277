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

//! Capture tracing events to assert on them.
//!
//! The polling loop and the notification listener report retries and
//! rejected messages as tracing events. Tests use [capture] to verify those
//! events without parsing formatted output.

use std::sync::{Arc, Mutex};
use tracing::{Event, Level, Subscriber, field};
use tracing_subscriber::{Layer, layer::Context, prelude::*};

/// A captured event: its level and its `message` field.
#[derive(Clone, Debug, PartialEq)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
}

/// The events captured since [capture] was called.
#[derive(Clone, Debug, Default)]
pub struct CapturedEvents {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedEvents {
    /// Returns a copy of the events captured so far.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Returns the events at `level` whose message contains `needle`.
    pub fn matching(&self, level: Level, needle: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level && e.message.contains(needle))
            .collect()
    }
}

struct MessageVisitor<'a>(&'a mut String);

impl field::Visit for MessageVisitor<'_> {
    fn record_str(&mut self, field: &field::Field, value: &str) {
        if field.name() == "message" {
            self.0.push_str(value);
        }
    }

    fn record_debug(&mut self, field: &field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.0.push_str(&format!("{value:?}"));
        }
    }
}

struct CaptureLayer(CapturedEvents);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut message = String::new();
        event.record(&mut MessageVisitor(&mut message));
        if let Ok(mut events) = self.0.events.lock() {
            events.push(CapturedEvent {
                level: *event.metadata().level(),
                message,
            });
        }
    }
}

/// Capture all the events emitted by the current thread.
///
/// The capture stops when the returned guard is dropped. Use a
/// `current_thread` runtime so all the tasks in the test run in this thread.
///
/// # Example
/// ```
/// use cloud_samples_test_utils::captured_events::capture;
/// let (_guard, events) = capture();
/// tracing::warn!("transient error, retrying");
/// assert_eq!(events.matching(tracing::Level::WARN, "retrying").len(), 1);
/// ```
pub fn capture() -> (tracing::subscriber::DefaultGuard, CapturedEvents) {
    let events = CapturedEvents::default();
    let subscriber = tracing_subscriber::registry().with(CaptureLayer(events.clone()));
    (tracing::subscriber::set_default(subscriber), events)
}
