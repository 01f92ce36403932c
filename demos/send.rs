// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Publishes a few messages: one straight to a queue through the default
//! exchange, then one per severity through a direct exchange.
//!
//! `cargo run --example send -- "hello world"`

use fluent_rabbitmq::{
    config::{AppConfig, ConfigLoader},
    exchange::ExchangeDefinition,
    message::PublishMessage,
    publisher::Publisher,
    queue::QueueDefinition,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = AppConfig::load(&ConfigLoader::default()).unwrap_or_default();
    let body = std::env::args().nth(1).unwrap_or_else(|| "hello world".to_owned());

    let publisher = Publisher::new(&cfg.rabbitmq.uri()).await?;

    let mut publisher = publisher
        .queue(&QueueDefinition::new("simple_mode"))
        .await
        .send(&PublishMessage::new(body.as_str()).routing_key("simple_mode"))
        .await
        .exchange(&ExchangeDefinition::new("logs_direct").direct())
        .await;

    for severity in ["info", "warning", "error"] {
        publisher = publisher
            .send(
                &PublishMessage::new(format!("{severity}: {body}"))
                    .exchange("logs_direct")
                    .routing_key(severity),
            )
            .await;
    }

    let result = publisher.result();
    publisher.close().await?;

    Ok(result?)
}
