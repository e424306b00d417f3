//! Queue Delivery Types
//!
//! A `Message` is one delivery of a job from the queue backend. It is built
//! by the driver when messages are received and is read-only afterwards:
//! every field is exposed through an accessor and there are no setters.
//! Delivery state (acked, rejected) lives in `MessageContext`, never here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Application-defined job payload
pub type MessageBody = Map<String, Value>;

/// One delivery of a queue message
///
/// `id` identifies the logical message and survives redelivery.
/// `receipt_handle` identifies this delivery only; a redelivered message
/// gets a new handle and the old one becomes stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    body: MessageBody,
    attributes: HashMap<String, String>,
    receipt_handle: String,
    received_count: u32,
    timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a delivery. `received_count` is clamped to at least 1.
    pub fn new(
        id: impl Into<String>,
        body: MessageBody,
        attributes: HashMap<String, String>,
        receipt_handle: impl Into<String>,
        received_count: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            body,
            attributes,
            receipt_handle: receipt_handle.into(),
            received_count: received_count.max(1),
            timestamp,
        }
    }

    pub fn builder(id: impl Into<String>) -> MessageBuilder {
        MessageBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    /// Alias for `body()`
    pub fn data(&self) -> &MessageBody {
        &self.body
    }

    /// Look up a single body field
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn receipt_handle(&self) -> &str {
        &self.receipt_handle
    }

    /// Number of times this logical message has been delivered, starting at 1
    pub fn received_count(&self) -> u32 {
        self.received_count
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Deserialize the body into an application type
    pub fn parse_body<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(Value::Object(self.body.clone()))
    }
}

/// Builder used by drivers and tests to assemble a delivery
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    id: String,
    body: MessageBody,
    attributes: HashMap<String, String>,
    receipt_handle: Option<String>,
    received_count: u32,
    timestamp: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: MessageBody::new(),
            attributes: HashMap::new(),
            receipt_handle: None,
            received_count: 1,
            timestamp: None,
        }
    }

    pub fn body(mut self, body: MessageBody) -> Self {
        self.body = body;
        self
    }

    /// Set the body from a JSON value. Non-object values are stored under `"value"`.
    pub fn json(mut self, value: Value) -> Self {
        self.body = match value {
            Value::Object(map) => map,
            other => {
                let mut map = MessageBody::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body.insert(key.into(), value.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn receipt_handle(mut self, handle: impl Into<String>) -> Self {
        self.receipt_handle = Some(handle.into());
        self
    }

    pub fn received_count(mut self, count: u32) -> Self {
        self.received_count = count;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Finish the delivery. Without an explicit handle, `receipt-<id>` is used.
    pub fn build(self) -> Message {
        let receipt_handle = self
            .receipt_handle
            .unwrap_or_else(|| format!("receipt-{}", self.id));
        Message::new(
            self.id,
            self.body,
            self.attributes,
            receipt_handle,
            self.received_count,
            self.timestamp.unwrap_or_else(Utc::now),
        )
    }
}
