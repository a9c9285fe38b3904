use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::models::{ChannelId, InboundMessage};
use crate::pipeline::{Outcome, SignalPipeline};

/// Router plus one worker per channel.
pub struct Workers {
    router: JoinHandle<()>,
    workers: Vec<(ChannelId, JoinHandle<()>)>,
}

impl Workers {
    /// Waits for every task to finish. In-flight messages complete first.
    pub async fn join(self) {
        if let Err(e) = self.router.await {
            warn!("Router task failed: {}", e);
        }
        for (channel, handle) in self.workers {
            if let Err(e) = handle.await {
                warn!("Worker for channel {} failed: {}", channel, e);
            }
        }
    }
}

/// Starts the router and per-channel workers.
///
/// The router reads `inbound` and forwards each message to its channel's
/// bounded queue without waiting. When a channel's queue is full the message
/// is logged and dropped, so a stalled channel never holds up the others.
/// Each worker processes its queue sequentially. Setting `shutdown` to true stops
/// both from taking new messages.
pub fn spawn_workers(
    pipeline: Arc<SignalPipeline>,
    inbound: mpsc::Receiver<InboundMessage>,
    capacity: usize,
    shutdown: watch::Receiver<bool>,
) -> Workers {
    let mut queues = HashMap::new();
    let mut workers = Vec::new();

    for channel in pipeline.channels() {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        queues.insert(channel.clone(), tx);
        let handle = tokio::spawn(worker(
            channel.clone(),
            pipeline.clone(),
            rx,
            shutdown.clone(),
        ));
        workers.push((channel, handle));
    }

    let router = tokio::spawn(route(inbound, queues, shutdown));
    Workers { router, workers }
}

async fn route(
    mut inbound: mpsc::Receiver<InboundMessage>,
    queues: HashMap<ChannelId, mpsc::Sender<InboundMessage>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }
        let msg = tokio::select! {
            _ = shutdown.changed() => break,
            msg = inbound.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        let Some(queue) = queues.get(&msg.channel) else {
            warn!("Dropping message for unconfigured channel {}", msg.channel);
            continue;
        };
        match queue.try_send(msg) {
            Ok(()) => {}
            Err(TrySendError::Full(msg)) => error!(
                "Queue for channel {} is full, dropping message: {}",
                msg.channel,
                msg.text.chars().take(80).collect::<String>()
            ),
            Err(TrySendError::Closed(msg)) => {
                debug!("Worker queue for channel {} closed", msg.channel)
            }
        }
    }
    info!("Router stopped");
}

async fn worker(
    channel: ChannelId,
    pipeline: Arc<SignalPipeline>,
    mut queue: mpsc::Receiver<InboundMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Worker for channel {} started", channel);
    loop {
        if *shutdown.borrow() {
            break;
        }
        let msg = tokio::select! {
            _ = shutdown.changed() => break,
            msg = queue.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };

        match pipeline.process(&msg).await {
            Outcome::Created(trade) => debug!("Channel {} -> {}", channel, trade.trade_id),
            other => debug!("Channel {} -> {:?}", channel, other),
        }
    }
    info!("Worker for channel {} stopped", channel);
}
