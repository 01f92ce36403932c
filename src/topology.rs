// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Chained Topology Declarations
//!
//! State shared by the [`Publisher`](crate::publisher::Publisher) and the
//! [`Dispatcher`](crate::dispatcher::Dispatcher) builders: the channel, the last
//! declared queue and the accumulated error. Once an error is stored every further
//! chained call is skipped, so the first error wins and is reported by `err()`.

use crate::{
    channel::AmqpChannel,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition, QueueState},
};
use std::sync::Arc;
use tracing::debug;

pub(crate) struct AmqpTopology {
    pub(crate) channel: Arc<dyn AmqpChannel>,
    pub(crate) queue: Option<QueueState>,
    pub(crate) err: Option<AmqpError>,
}

impl AmqpTopology {
    pub(crate) fn new(channel: Arc<dyn AmqpChannel>) -> AmqpTopology {
        AmqpTopology {
            channel,
            queue: None,
            err: None,
        }
    }

    /// True when a previous call failed and the chain must be skipped.
    pub(crate) fn failed(&self) -> bool {
        if let Some(err) = &self.err {
            debug!(error = err.to_string(), "skipping chained call");
            return true;
        }
        false
    }

    pub(crate) fn record<T>(&mut self, result: Result<T, AmqpError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.err = Some(err);
                None
            }
        }
    }

    pub(crate) async fn exchange(&mut self, def: &ExchangeDefinition) {
        if self.failed() {
            return;
        }
        let result = self.channel.declare_exchange(def).await;
        self.record(result);
    }

    pub(crate) async fn queue(&mut self, def: &QueueDefinition) {
        if self.failed() {
            return;
        }
        let result = self.channel.declare_queue(def).await;
        if let Some(state) = self.record(result) {
            self.queue = Some(state);
        }
    }

    pub(crate) async fn bind(&mut self, binding: &QueueBinding) {
        if self.failed() {
            return;
        }
        let result = self.channel.bind_queue(binding).await;
        self.record(result);
    }

    pub(crate) fn result(&self) -> Result<(), AmqpError> {
        match &self.err {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub(crate) async fn close(&self) -> Result<(), AmqpError> {
        self.channel.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockAmqpChannel;

    #[tokio::test]
    async fn first_error_wins() {
        let mut channel = MockAmqpChannel::new();
        channel.expect_declare_exchange().times(1).returning(|def| {
            Err(AmqpError::DeclareExchangeError(
                def.name().to_owned(),
                "ACCESS_REFUSED".to_owned(),
            ))
        });
        channel.expect_declare_queue().never();
        channel.expect_bind_queue().never();

        let mut topology = AmqpTopology::new(Arc::new(channel));
        topology.exchange(&ExchangeDefinition::new("logs")).await;
        topology.queue(&QueueDefinition::new("logs_all")).await;
        topology.bind(&QueueBinding::new("logs_all").exchange("logs")).await;

        assert_eq!(
            topology.result(),
            Err(AmqpError::DeclareExchangeError(
                "logs".to_owned(),
                "ACCESS_REFUSED".to_owned()
            ))
        );
        assert!(topology.queue.is_none());
    }

    #[tokio::test]
    async fn keeps_declared_queue_state() {
        let mut channel = MockAmqpChannel::new();
        channel.expect_declare_queue().returning(|_| {
            Ok(QueueState {
                name: "amq.gen-123".to_owned(),
                message_count: 4,
                consumer_count: 0,
            })
        });

        let mut topology = AmqpTopology::new(Arc::new(channel));
        topology.queue(&QueueDefinition::new("").exclusive()).await;

        assert!(topology.result().is_ok());
        assert_eq!(topology.queue.as_ref().map(|q| q.name.as_str()), Some("amq.gen-123"));
    }
}
