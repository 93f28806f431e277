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

//! The messages delivered by a subscription.

use std::collections::HashMap;
use std::time::SystemTime;

/// A message delivered by a subscription.
///
/// Job notifications carry the job identifier in one of the
/// [attributes][Message::attributes], see [Correlation][crate::Correlation].
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct Message {
    /// The message id, assigned by the service when the message is published.
    pub message_id: String,

    /// The message payload.
    pub data: bytes::Bytes,

    /// Attributes for this message.
    pub attributes: HashMap<String, String>,

    /// The time at which the message was published.
    pub publish_time: Option<SystemTime>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the value of [message_id][Message::message_id].
    pub fn set_message_id<T: Into<String>>(mut self, v: T) -> Self {
        self.message_id = v.into();
        self
    }

    /// Sets the value of [data][Message::data].
    pub fn set_data<T: Into<bytes::Bytes>>(mut self, v: T) -> Self {
        self.data = v.into();
        self
    }

    /// Sets the value of [attributes][Message::attributes].
    pub fn set_attributes<T, K, V>(mut self, v: T) -> Self
    where
        T: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.attributes = v.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    /// Sets the value of [publish_time][Message::publish_time].
    pub fn set_publish_time<T: Into<SystemTime>>(mut self, v: T) -> Self {
        self.publish_time = Some(v.into());
        self
    }

    /// Returns the value of the attribute called `key`, if present.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters() {
        let now = SystemTime::now();
        let m = Message::new()
            .set_message_id("m-001")
            .set_data("payload")
            .set_attributes([("DlpJobName", "projects/p/dlpJobs/j-1"), ("k", "v")])
            .set_publish_time(now);
        assert_eq!(m.message_id, "m-001");
        assert_eq!(m.data, bytes::Bytes::from_static(b"payload"));
        assert_eq!(m.attribute("DlpJobName"), Some("projects/p/dlpJobs/j-1"));
        assert_eq!(m.attribute("k"), Some("v"));
        assert_eq!(m.attribute("missing"), None);
        assert_eq!(m.publish_time, Some(now));
    }
}
