// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Dispatcher
//!
//! The consuming side of the fluent API. `receive` registers a consumer and spawns
//! one worker task that drains its delivery stream, invoking the handler once per
//! message. `receive` returns right away; the caller decides how long to keep
//! consuming with [`Dispatcher::wait_until`] or [`Dispatcher::wait_for_ctrl_c`].

use crate::{
    channel::{new_amqp_channel, AmqpChannel, DeliveryStream},
    consumer::{consume, ConsumerDefinition, ConsumerHandler},
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition, QueueState},
    topology::AmqpTopology,
};
use futures_util::{future::join_all, StreamExt};
use opentelemetry::global;
use std::{future::Future, sync::Arc};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};

const CONNECTION_NAME: &str = "fluent-rabbitmq-dispatcher";

struct Worker {
    consumer_tag: String,
    handle: JoinHandle<()>,
}

/// Consuming side of the fluent API.
pub struct Dispatcher {
    topology: AmqpTopology,
    workers: Vec<Worker>,
    shutdown: watch::Sender<bool>,
}

impl Dispatcher {
    /// Dials the broker and opens the channel owned by this dispatcher.
    pub async fn new(uri: &str) -> Result<Dispatcher, AmqpError> {
        let channel = new_amqp_channel(uri, CONNECTION_NAME).await?;
        Ok(Dispatcher::from_channel(channel))
    }

    /// Creates a dispatcher over an already opened channel.
    ///
    /// # Parameters
    /// * `channel` - Channel owned by this dispatcher from now on
    ///
    /// # Returns
    /// A dispatcher with no recorded error and no consumers
    pub fn from_channel(channel: Arc<dyn AmqpChannel>) -> Dispatcher {
        let (shutdown, _) = watch::channel(false);

        Dispatcher {
            topology: AmqpTopology::new(channel),
            workers: vec![],
            shutdown,
        }
    }

    /// Declares an exchange, skipped when an earlier call in the chain failed.
    ///
    /// # Parameters
    /// * `def` - The exchange definition
    ///
    /// # Returns
    /// Self for method chaining
    pub async fn exchange(mut self, def: &ExchangeDefinition) -> Self {
        self.topology.exchange(def).await;
        self
    }

    /// Declares a queue, skipped when an earlier call in the chain failed.
    ///
    /// The broker's answer is kept and available through [`Dispatcher::queue_state`].
    ///
    /// # Parameters
    /// * `def` - The queue definition
    ///
    /// # Returns
    /// Self for method chaining
    pub async fn queue(mut self, def: &QueueDefinition) -> Self {
        self.topology.queue(def).await;
        self
    }

    /// Binds a queue to an exchange, skipped when an earlier call in the chain failed.
    ///
    /// # Parameters
    /// * `binding` - The queue binding
    ///
    /// # Returns
    /// Self for method chaining
    pub async fn bind(mut self, binding: &QueueBinding) -> Self {
        self.topology.bind(binding).await;
        self
    }

    /// Limits how many unacknowledged messages the broker pushes to this channel.
    pub async fn prefetch(mut self, count: u16) -> Self {
        if self.topology.failed() {
            return self;
        }
        let result = self.topology.channel.qos(count).await;
        self.topology.record(result);
        self
    }

    /// Registers a consumer and spawns the worker that feeds `handler`.
    pub async fn receive<H>(mut self, def: &ConsumerDefinition, handler: H) -> Self
    where
        H: ConsumerHandler + 'static,
    {
        if self.topology.failed() {
            return self;
        }

        let result = self.topology.channel.consume(def).await;
        let Some((consumer_tag, stream)) = self.topology.record(result) else {
            return self;
        };

        debug!(
            consumer_tag = consumer_tag.as_str(),
            queue = def.queue.as_str(),
            "consumer registered"
        );

        let handle = tokio::spawn(run_worker(
            stream,
            Arc::new(handler),
            self.topology.channel.clone(),
            def.auto_ack,
            consumer_tag.clone(),
            self.shutdown.subscribe(),
        ));

        self.workers.push(Worker {
            consumer_tag,
            handle,
        });

        self
    }

    /// Waits until every consumer stream is closed by the broker or `shutdown` resolves.
    ///
    /// On shutdown each worker cancels its consumer and stops; messages already
    /// handed to a handler finish processing first. Consumers registered after this
    /// call returns start with a cleared shutdown flag.
    ///
    /// When an earlier chained call failed, the workers of the consumers that were
    /// registered before the failure are stopped and the recorded error is returned.
    ///
    /// # Parameters
    /// * `shutdown` - Future whose completion requests the workers to stop
    ///
    /// # Returns
    /// Ok(()) once every worker is done, or the first error of the chain
    pub async fn wait_until<F>(&mut self, shutdown: F) -> Result<(), AmqpError>
    where
        F: Future<Output = ()>,
    {
        if let Err(err) = self.topology.result() {
            self.stop_workers().await;
            return Err(err);
        }

        info!(" [*] Waiting for messages");

        let (tags, handles): (Vec<String>, Vec<JoinHandle<()>>) = self
            .workers
            .drain(..)
            .map(|w| (w.consumer_tag, w.handle))
            .unzip();

        let all = join_all(handles);
        tokio::pin!(all);
        tokio::pin!(shutdown);

        let results = tokio::select! {
            results = &mut all => results,
            _ = &mut shutdown => {
                debug!(consumers = ?tags, "shutdown requested");
                self.shutdown.send_replace(true);
                all.await
            }
        };
        self.shutdown.send_replace(false);

        for res in results {
            if let Err(err) = res {
                error!(error = err.to_string(), "consumer worker failure");
                return Err(AmqpError::InternalError(err.to_string()));
            }
        }

        Ok(())
    }

    /// Same as [`Dispatcher::wait_until`] with Ctrl-C as the shutdown signal.
    pub async fn wait_for_ctrl_c(&mut self) -> Result<(), AmqpError> {
        info!("To exit press CTRL+C");
        self.wait_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = err.to_string(), "failure to listen for ctrl-c");
            }
        })
        .await
    }

    /// The first error recorded by the chain, if any.
    pub fn err(&self) -> Option<&AmqpError> {
        self.topology.err.as_ref()
    }

    /// The outcome of the chain so far.
    ///
    /// # Returns
    /// Ok(()) when every call succeeded, otherwise a clone of the first error
    pub fn result(&self) -> Result<(), AmqpError> {
        self.topology.result()
    }

    /// State of the last queue declared through this dispatcher.
    pub fn queue_state(&self) -> Option<&QueueState> {
        self.topology.queue.as_ref()
    }

    /// Stops any running workers, then closes the channel and the connection.
    pub async fn close(mut self) -> Result<(), AmqpError> {
        self.stop_workers().await;
        self.topology.close().await
    }

    async fn stop_workers(&mut self) {
        self.shutdown.send_replace(true);
        for worker in self.workers.drain(..) {
            if let Err(err) = worker.handle.await {
                warn!(
                    error = err.to_string(),
                    consumer_tag = worker.consumer_tag.as_str(),
                    "consumer worker failure"
                );
            }
        }
        self.shutdown.send_replace(false);
    }
}

async fn run_worker(
    mut stream: DeliveryStream,
    handler: Arc<dyn ConsumerHandler>,
    channel: Arc<dyn AmqpChannel>,
    auto_ack: bool,
    consumer_tag: String,
    mut shutdown: watch::Receiver<bool>,
) {
    let tracer = global::tracer("amqp consumer");

    loop {
        tokio::select! {
            next = stream.next() => match next {
                Some(Ok(msg)) => {
                    let res = consume(
                        &tracer,
                        &msg,
                        handler.as_ref(),
                        channel.as_ref(),
                        auto_ack,
                    )
                    .await;
                    if let Err(err) = res {
                        error!(error = err.to_string(), "error consume msg");
                    }
                }
                Some(Err(err)) => error!(error = err.to_string(), "errors consume msg"),
                None => {
                    debug!(consumer_tag = consumer_tag.as_str(), "delivery stream closed");
                    return;
                }
            },
            // the watch guard must not live across the cancel await
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                if let Err(err) = channel.cancel(&consumer_tag).await {
                    warn!(error = err.to_string(), "failure to cancel consumer");
                }
                debug!(consumer_tag = consumer_tag.as_str(), "consumer stopped");
                return;
            }
        }
    }
}
