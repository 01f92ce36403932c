// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Fluent builders over a RabbitMQ connection: declare exchanges, queues and
//! bindings, publish messages and consume them, chaining each step and keeping
//! the first error.

mod otel;
mod topology;

pub mod channel;
pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod errors;
pub mod exchange;
pub mod message;
pub mod publisher;
pub mod queue;
