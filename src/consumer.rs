// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Consumer
//!
//! Consumer registration parameters, the handler seam invoked for each delivery,
//! and the per-message processing that acknowledges or rejects the delivery
//! according to the handler outcome.

use crate::{channel::AmqpChannel, errors::AmqpError, message::ConsumerMessage, otel};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use opentelemetry::{
    global::BoxedTracer,
    trace::{Span, Status},
};
use std::borrow::Cow;
use tracing::{debug, error, warn};

/// Parameters used to register a consumer on a queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerDefinition {
    pub(crate) queue: String,
    pub(crate) consumer_tag: String,
    pub(crate) auto_ack: bool,
    pub(crate) exclusive: bool,
    pub(crate) no_local: bool,
    pub(crate) no_wait: bool,
}

impl ConsumerDefinition {
    /// Consumes from `queue` with manual acknowledgements and a broker-generated tag.
    pub fn new(queue: &str) -> ConsumerDefinition {
        ConsumerDefinition {
            queue: queue.to_owned(),
            ..Default::default()
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn consumer_tag(mut self, tag: &str) -> Self {
        self.consumer_tag = tag.to_owned();
        self
    }

    /// The broker considers every message acknowledged as soon as it is delivered.
    pub fn auto_ack(mut self) -> Self {
        self.auto_ack = true;
        self
    }

    /// Requests to be the only consumer of the queue.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Not supported by RabbitMQ, kept for other AMQP 0.9.1 brokers.
    pub fn no_local(mut self) -> Self {
        self.no_local = true;
        self
    }

    pub fn no_wait(mut self) -> Self {
        self.no_wait = true;
        self
    }
}

/// Handler invoked once per delivered message.
///
/// Closures of the form `Fn(&ConsumerMessage) -> Result<(), AmqpError>` implement
/// this trait, so simple handlers need no dedicated type.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn exec(&self, msg: &ConsumerMessage) -> Result<(), AmqpError>;
}

#[async_trait]
impl<F> ConsumerHandler for F
where
    F: Fn(&ConsumerMessage) -> Result<(), AmqpError> + Send + Sync,
{
    async fn exec(&self, msg: &ConsumerMessage) -> Result<(), AmqpError> {
        self(msg)
    }
}

/// Processes one delivery.
///
/// With manual acknowledgements a successful handler acks the delivery and a
/// failing one rejects it without requeue. With auto-ack the broker already
/// considers the message settled and failures are only logged.
pub(crate) async fn consume(
    tracer: &BoxedTracer,
    msg: &ConsumerMessage,
    handler: &dyn ConsumerHandler,
    channel: &dyn AmqpChannel,
    auto_ack: bool,
) -> Result<(), AmqpError> {
    let (_ctx, mut span) = otel::new_span(&msg.headers, tracer, &msg.routing_key);

    debug!(
        "received: {} - exchange: {}",
        msg.delivery_tag, msg.exchange
    );

    let result = handler.exec(msg).await;

    if auto_ack {
        if let Err(err) = result {
            warn!(error = err.to_string(), "handler failure on auto-acked message");
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("handler failure"),
            });
        } else {
            span.set_status(Status::Ok);
        }
        return Ok(());
    }

    if result.is_ok() {
        debug!("message successfully processed");
        return match channel.ack(msg.delivery_tag).await {
            Err(e) => {
                error!(error = e.to_string(), "error whiling ack msg");
                span.record_error(&e);
                span.set_status(Status::Error {
                    description: Cow::from("error to ack msg"),
                });
                Err(e)
            }
            _ => {
                span.set_status(Status::Ok);
                Ok(())
            }
        };
    }

    warn!("error whiling handling msg, rejecting");
    match channel.reject(msg.delivery_tag, false).await {
        Err(e) => {
            error!(error = e.to_string(), "error whiling nack msg");
            span.record_error(&e);
            span.set_status(Status::Error {
                description: Cow::from("error to nack msg"),
            });
            Err(e)
        }
        _ => {
            span.set_status(Status::Error {
                description: Cow::from("handler failure"),
            });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockAmqpChannel;
    use mockall::predicate::eq;
    use opentelemetry::global;

    fn tracer() -> BoxedTracer {
        global::tracer("consumer tests")
    }

    #[tokio::test]
    async fn acks_when_handler_succeeds() {
        let mut handler = MockConsumerHandler::new();
        handler
            .expect_exec()
            .withf(|msg| msg.data == b"hello world")
            .times(1)
            .returning(|_| Ok(()));

        let mut channel = MockAmqpChannel::new();
        channel.expect_ack().with(eq(7)).times(1).returning(|_| Ok(()));
        channel.expect_reject().never();

        let msg = ConsumerMessage::new(7, "hello world");
        let res = consume(&tracer(), &msg, &handler, &channel, false).await;

        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn rejects_without_requeue_when_handler_fails() {
        let mut handler = MockConsumerHandler::new();
        handler
            .expect_exec()
            .returning(|_| Err(AmqpError::HandlerError("boom".to_owned())));

        let mut channel = MockAmqpChannel::new();
        channel.expect_ack().never();
        channel
            .expect_reject()
            .with(eq(9), eq(false))
            .times(1)
            .returning(|_, _| Ok(()));

        let msg = ConsumerMessage::new(9, "bad");
        assert!(consume(&tracer(), &msg, &handler, &channel, false)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn forwards_ack_failure() {
        let handler = |_: &ConsumerMessage| -> Result<(), AmqpError> { Ok(()) };

        let mut channel = MockAmqpChannel::new();
        channel
            .expect_ack()
            .returning(|_| Err(AmqpError::AckMessageError("channel closed".to_owned())));

        let msg = ConsumerMessage::new(1, "x");
        let res = consume(&tracer(), &msg, &handler, &channel, false).await;

        assert_eq!(
            res,
            Err(AmqpError::AckMessageError("channel closed".to_owned()))
        );
    }

    #[tokio::test]
    async fn auto_ack_never_settles() {
        let handler = |_: &ConsumerMessage| -> Result<(), AmqpError> {
            Err(AmqpError::HandlerError("ignored".to_owned()))
        };

        let mut channel = MockAmqpChannel::new();
        channel.expect_ack().never();
        channel.expect_reject().never();

        let msg = ConsumerMessage::new(2, "x");
        assert!(consume(&tracer(), &msg, &handler, &channel, true)
            .await
            .is_ok());
    }

    #[test]
    fn definition_defaults_to_manual_ack() {
        let def = ConsumerDefinition::new("simple_mode");

        assert_eq!(def.queue(), "simple_mode");
        assert_eq!(def.consumer_tag, "");
        assert!(!def.auto_ack);

        let def = def.consumer_tag("worker-1").auto_ack().exclusive();
        assert_eq!(def.consumer_tag, "worker-1");
        assert!(def.auto_ack);
        assert!(def.exclusive);
    }
}
