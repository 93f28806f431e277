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

use tokio::sync::mpsc::UnboundedSender;

/// The action an application does with a message.
///
/// Transports receive these over the channel given to [AtLeastOnce::new] and
/// forward them to the service.
#[derive(Clone, Debug, PartialEq)]
pub enum AckResult {
    Ack(String),
    Nack(String),
}

impl AckResult {
    /// The ack id of the message.
    pub fn ack_id(&self) -> &str {
        match self {
            AckResult::Ack(id) | AckResult::Nack(id) => id,
        }
    }
}

/// A handler for acknowledging or rejecting messages.
///
/// Both [ack][Handler::ack] and [nack][Handler::nack] consume the handler, so
/// each delivery is settled at most once.
#[derive(Debug)]
#[non_exhaustive]
pub enum Handler {
    AtLeastOnce(AtLeastOnce),
}

impl Handler {
    /// Acknowledge the message associated with this handler.
    ///
    /// Note that the acknowledgement is best effort. The message may still be
    /// redelivered to this listener, or another listener.
    pub fn ack(self) {
        match self {
            Handler::AtLeastOnce(h) => h.ack(),
        }
    }

    /// Rejects the message associated with this handler.
    ///
    /// The service will redeliver this message, possibly to another listener.
    pub fn nack(self) {
        match self {
            Handler::AtLeastOnce(h) => h.nack(),
        }
    }

    /// The ack id of the message associated with this handler.
    pub fn ack_id(&self) -> &str {
        match self {
            Handler::AtLeastOnce(h) => &h.ack_id,
        }
    }
}

impl From<AtLeastOnce> for Handler {
    fn from(value: AtLeastOnce) -> Self {
        Handler::AtLeastOnce(value)
    }
}

/// A handler for at-least-once delivery.
#[derive(Debug)]
pub struct AtLeastOnce {
    ack_id: String,
    ack_tx: UnboundedSender<AckResult>,
}

impl AtLeastOnce {
    /// Creates a handler that reports the outcome for `ack_id` on `ack_tx`.
    pub fn new<T: Into<String>>(ack_id: T, ack_tx: UnboundedSender<AckResult>) -> Self {
        Self {
            ack_id: ack_id.into(),
            ack_tx,
        }
    }

    /// Acknowledge the message associated with this handler.
    ///
    /// Note that the acknowledgement is best effort. The message may still be
    /// redelivered to this listener, or another listener.
    pub fn ack(self) {
        let _ = self.ack_tx.send(AckResult::Ack(self.ack_id));
    }

    /// Rejects the message associated with this handler.
    ///
    /// The service will redeliver this message, possibly to another listener.
    pub fn nack(self) {
        let _ = self.ack_tx.send(AckResult::Nack(self.ack_id));
    }
}
