// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Messages
//!
//! Outgoing messages are described with [`PublishMessage`]; every delivery a
//! consumer receives is handed to the handler as a [`ConsumerMessage`].

use crate::errors::AmqpError;
use lapin::{
    options::BasicPublishOptions,
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties,
};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Default content type for plain text messages
pub const TEXT_CONTENT_TYPE: &str = "text/plain";
/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

const PERSISTENT_DELIVERY_MODE: u8 = 2;

/// A message to be published to an exchange.
///
/// The default exchange (`""`) routes on the queue name, so a message built
/// with only a routing key lands directly in that queue.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishMessage {
    pub(crate) exchange: String,
    pub(crate) routing_key: String,
    pub(crate) body: Vec<u8>,
    pub(crate) mandatory: bool,
    pub(crate) persistent: bool,
    pub(crate) content_type: String,
    pub(crate) headers: BTreeMap<ShortString, AMQPValue>,
}

impl PublishMessage {
    pub fn new(body: impl Into<Vec<u8>>) -> PublishMessage {
        PublishMessage {
            exchange: String::new(),
            routing_key: String::new(),
            body: body.into(),
            mandatory: false,
            persistent: false,
            content_type: TEXT_CONTENT_TYPE.to_owned(),
            headers: BTreeMap::default(),
        }
    }

    /// Serializes `payload` as JSON and marks the message as `application/json`.
    pub fn json<T: Serialize>(payload: &T) -> Result<PublishMessage, AmqpError> {
        let body =
            serde_json::to_vec(payload).map_err(|e| AmqpError::ParsePayloadError(e.to_string()))?;
        Ok(PublishMessage::new(body).content_type(JSON_CONTENT_TYPE))
    }

    pub fn exchange(mut self, exchange: &str) -> Self {
        self.exchange = exchange.to_owned();
        self
    }

    pub fn routing_key(mut self, key: &str) -> Self {
        self.routing_key = key.to_owned();
        self
    }

    /// Asks the broker to return the message if it cannot be routed to any queue.
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    /// Marks the message to be written to disk by durable queues.
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_owned();
        self
    }

    pub fn header(mut self, key: &str, value: AMQPValue) -> Self {
        self.headers.insert(ShortString::from(key), value);
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub(crate) fn options(&self) -> BasicPublishOptions {
        // `immediate` is not supported by RabbitMQ since 3.0
        BasicPublishOptions {
            mandatory: self.mandatory,
            immediate: false,
        }
    }

    /// Builds the AMQP properties, merging `trace_headers` with the message headers.
    pub(crate) fn properties(
        &self,
        trace_headers: BTreeMap<ShortString, AMQPValue>,
    ) -> BasicProperties {
        let mut headers = trace_headers;
        headers.extend(self.headers.clone());

        let props = BasicProperties::default()
            .with_content_type(ShortString::from(self.content_type.clone()))
            .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
            .with_headers(FieldTable::from(headers));

        if self.persistent {
            props.with_delivery_mode(PERSISTENT_DELIVERY_MODE)
        } else {
            props
        }
    }
}

/// A message delivered to a consumer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsumerMessage {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub content_type: Option<String>,
    pub headers: BTreeMap<ShortString, AMQPValue>,
    pub data: Vec<u8>,
}

impl ConsumerMessage {
    pub fn new(delivery_tag: u64, data: impl Into<Vec<u8>>) -> ConsumerMessage {
        ConsumerMessage {
            delivery_tag,
            data: data.into(),
            ..Default::default()
        }
    }

    /// The body as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl From<lapin::message::Delivery> for ConsumerMessage {
    fn from(delivery: lapin::message::Delivery) -> Self {
        let headers = delivery
            .properties
            .headers()
            .as_ref()
            .map(|table| table.inner().clone())
            .unwrap_or_default();

        ConsumerMessage {
            delivery_tag: delivery.delivery_tag,
            exchange: delivery.exchange.to_string(),
            routing_key: delivery.routing_key.to_string(),
            redelivered: delivery.redelivered,
            content_type: delivery
                .properties
                .content_type()
                .as_ref()
                .map(|ct| ct.to_string()),
            headers,
            data: delivery.data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::types::LongString;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Order {
        id: u32,
        item: &'static str,
    }

    #[test]
    fn text_message_defaults() {
        let msg = PublishMessage::new("hello world").routing_key("simple_mode");

        assert_eq!(msg.exchange, "");
        assert_eq!(msg.routing_key, "simple_mode");
        assert_eq!(msg.body(), b"hello world");

        let opts = msg.options();
        assert!(!opts.mandatory);
        assert!(!opts.immediate);

        let props = msg.properties(BTreeMap::new());
        assert_eq!(
            props.content_type().as_ref().map(|c| c.as_str()),
            Some(TEXT_CONTENT_TYPE)
        );
        assert!(props.message_id().is_some());
        assert!(props.delivery_mode().is_none());
    }

    #[test]
    fn json_message() {
        let msg = PublishMessage::json(&Order { id: 7, item: "book" })
            .unwrap()
            .persistent()
            .mandatory();

        assert_eq!(msg.body(), br#"{"id":7,"item":"book"}"#);
        assert!(msg.options().mandatory);

        let props = msg.properties(BTreeMap::new());
        assert_eq!(
            props.content_type().as_ref().map(|c| c.as_str()),
            Some(JSON_CONTENT_TYPE)
        );
        assert_eq!(props.delivery_mode(), &Some(PERSISTENT_DELIVERY_MODE));
    }

    #[test]
    fn message_headers_override_trace_headers() {
        let mut trace = BTreeMap::new();
        trace.insert(
            ShortString::from("traceparent"),
            AMQPValue::LongString(LongString::from("00-trace")),
        );
        trace.insert(
            ShortString::from("tenant"),
            AMQPValue::LongString(LongString::from("from-trace")),
        );

        let msg = PublishMessage::new("x")
            .header("tenant", AMQPValue::LongString(LongString::from("acme")));
        let props = msg.properties(trace);
        let headers = props.headers().as_ref().unwrap().inner();

        assert_eq!(headers.len(), 2);
        assert_eq!(
            headers.get(&ShortString::from("tenant")),
            Some(&AMQPValue::LongString(LongString::from("acme")))
        );
    }

    #[test]
    fn consumer_message_text() {
        let msg = ConsumerMessage::new(3, "hello");
        assert_eq!(msg.delivery_tag, 3);
        assert_eq!(msg.text(), "hello");
    }
}
