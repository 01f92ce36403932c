// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types
//!
//! Broker failures are never classified or retried here: the message of the
//! underlying `lapin` error is carried as a string inside a variant that names
//! the operation that failed.

use thiserror::Error;

/// Represents errors that can occur during AMQP/RabbitMQ operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmqpError {
    /// Internal errors that don't fit into other categories
    #[error("internal error: {0}")]
    InternalError(String),

    /// Error establishing a connection to the RabbitMQ server
    #[error("failed to connect to RabbitMQ: {0}")]
    ConnectionError(String),

    /// Error creating a channel from an established connection
    #[error("failed to open a channel: {0}")]
    ChannelError(String),

    /// Error declaring an exchange, with the exchange name and the broker error
    #[error("failed to declare an exchange `{0}`: {1}")]
    DeclareExchangeError(String, String),

    /// Error declaring a queue, with the queue name and the broker error
    #[error("failed to declare a queue `{0}`: {1}")]
    DeclareQueueError(String, String),

    /// Error binding a queue to an exchange, with the queue name, exchange name and broker error
    #[error("failed to bind queue `{0}` to exchange `{1}`: {2}")]
    BindingExchangeToQueueError(String, String, String),

    /// Error setting the channel prefetch count
    #[error("failed to configure qos: {0}")]
    QoSDeclarationError(String),

    /// Error publishing a message or waiting for its confirmation
    #[error("failed to publish a message: {0}")]
    PublishingError(String),

    /// A publish did not complete within the configured timeout, in milliseconds
    #[error("timed out publishing a message after {0} ms")]
    PublishTimeoutError(u128),

    /// Error serializing a message payload
    #[error("failed to serialize payload: {0}")]
    ParsePayloadError(String),

    /// Error registering a consumer, with the queue name and the broker error
    #[error("failed to register a consumer on `{0}`: {1}")]
    BindingConsumerError(String, String),

    /// Error reading a delivery from a consumer stream
    #[error("failed to consume message: {0}")]
    ConsumerError(String),

    /// Error acknowledging a delivery
    #[error("failed to ack message: {0}")]
    AckMessageError(String),

    /// Error rejecting a delivery
    #[error("failed to reject message: {0}")]
    NackMessageError(String),

    /// Error cancelling a consumer, with the consumer tag and the broker error
    #[error("failed to cancel consumer `{0}`: {1}")]
    CancelConsumerError(String, String),

    /// Error closing the channel or the connection
    #[error("failed to close: {0}")]
    CloseError(String),

    /// The exchange type string is not one of direct/fanout/topic/headers
    #[error("unsupported exchange kind `{0}`")]
    InvalidExchangeKind(String),

    /// Returned by a consumer handler that could not process a message
    #[error("handler failure: {0}")]
    HandlerError(String),
}

/// Errors raised while locating or reading the YAML configuration file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("config file `{name}` not found in {paths}")]
    NotFound { name: String, paths: String },

    #[error("failed to read config file `{0}`: {1}")]
    ReadError(String, String),

    #[error("failed to parse config: {0}")]
    ParseError(String),
}
