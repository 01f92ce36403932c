// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! Consumes the queues filled by the `send` demo until Ctrl-C.
//!
//! `cargo run --example receive`

use fluent_rabbitmq::{
    config::{AppConfig, ConfigLoader},
    consumer::ConsumerDefinition,
    dispatcher::Dispatcher,
    errors::AmqpError,
    exchange::ExchangeDefinition,
    message::ConsumerMessage,
    queue::{QueueBinding, QueueDefinition},
};
use tracing_subscriber::EnvFilter;

fn print_message(msg: &ConsumerMessage) -> Result<(), AmqpError> {
    println!(" [x] {} {}", msg.routing_key, msg.text());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = AppConfig::load(&ConfigLoader::default()).unwrap_or_default();

    let mut dispatcher = Dispatcher::new(&cfg.rabbitmq.uri())
        .await?
        .queue(&QueueDefinition::new("simple_mode"))
        .await
        .receive(&ConsumerDefinition::new("simple_mode").auto_ack(), print_message)
        .await
        .exchange(&ExchangeDefinition::new("logs_direct").direct())
        .await
        .queue(&QueueDefinition::new("logs_errors"))
        .await
        .bind(
            &QueueBinding::new("logs_errors")
                .exchange("logs_direct")
                .routing_key("error"),
        )
        .await
        .prefetch(10)
        .await
        .receive(&ConsumerDefinition::new("logs_errors"), print_message)
        .await;

    let result = dispatcher.wait_for_ctrl_c().await;
    dispatcher.close().await?;

    Ok(result?)
}
