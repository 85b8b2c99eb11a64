//! Fixed pool of outbound connections shared by the whole fleet.
//!
//! Each connection owns a bounded queue of serialized telemetry and a
//! sender task that writes the queue to the socket in FIFO order. Buses
//! push into a queue through a [`QueueHandle`]; when the queue is full the
//! push suspends until the sender frees a slot.
//!
//! Shutdown is cooperative: [`ConnectionMultiplexer::close`] cancels the
//! senders, each sender closes its queue to new pushes, flushes what is
//! already buffered, closes the socket and reports how much it sent.

use std::fmt::Display;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assignment::AssignmentPolicy;
use crate::error::SimulatorError;

/// The queue behind a [`QueueHandle`] no longer accepts messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("send queue is closed")]
pub struct QueueClosed;

/// Producer side of one connection's send queue.
#[derive(Debug, Clone)]
pub struct QueueHandle {
    connection: usize,
    tx: mpsc::Sender<String>,
}

impl QueueHandle {
    /// Enqueue one serialized message, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] once the connection has failed or the pool is
    /// shutting down.
    pub async fn push(&self, message: String) -> Result<(), QueueClosed> {
        self.tx
            .send(message)
            .await
            .map_err(|mpsc::error::SendError(_)| QueueClosed)
    }

    /// Index of the connection this queue feeds.
    pub const fn connection(&self) -> usize {
        self.connection
    }

    /// Messages currently waiting in the queue.
    pub fn buffered(&self) -> usize {
        self.tx.max_capacity().saturating_sub(self.tx.capacity())
    }

    /// Whether the queue has stopped accepting messages.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a bounded queue for connection `connection`.
pub(crate) fn bounded_queue(connection: usize, capacity: usize) -> (QueueHandle, mpsc::Receiver<String>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (QueueHandle { connection, tx }, rx)
}

/// What a sender task did before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderReport {
    /// Connection index.
    pub connection: usize,
    /// Messages written to the socket.
    pub sent: u64,
    /// Whether the sender stopped because the transport failed.
    pub failed: bool,
}

/// A fixed set of outbound connections, each with its own send queue.
#[derive(Debug)]
pub struct ConnectionMultiplexer {
    queues: Vec<QueueHandle>,
    senders: Vec<JoinHandle<SenderReport>>,
    readers: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl ConnectionMultiplexer {
    /// Open `pool_size` connections to `url`, each with a queue holding at
    /// most `capacity` messages.
    ///
    /// # Errors
    ///
    /// Returns [`SimulatorError::Connect`] if any connection cannot be
    /// opened. Connections opened before the failure are closed first.
    pub async fn connect(url: &str, pool_size: usize, capacity: usize) -> Result<Self, SimulatorError> {
        let mut sinks = Vec::with_capacity(pool_size);
        let mut readers = Vec::with_capacity(pool_size);

        for connection in 0..pool_size {
            let ws = match connect_async(url).await {
                Ok((ws, _)) => ws,
                Err(e) => {
                    warn!(connection, url, error = %e, "Outbound connection failed");
                    close_partial_pool(sinks, readers).await;
                    return Err(SimulatorError::Connect {
                        url: url.to_owned(),
                        message: e.to_string(),
                    });
                }
            };
            info!(connection, url, "Outbound connection open");

            let (sink, stream) = ws.split();
            sinks.push(sink);
            readers.push(tokio::spawn(read_replies(connection, stream)));
        }

        let mut multiplexer = Self::from_sinks(sinks, capacity);
        multiplexer.readers = readers;
        Ok(multiplexer)
    }

    /// Build a pool over already-open sinks, one sender task per sink.
    pub fn from_sinks<S>(sinks: Vec<S>, capacity: usize) -> Self
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: Display,
    {
        let shutdown = CancellationToken::new();
        let mut queues = Vec::with_capacity(sinks.len());
        let mut senders = Vec::with_capacity(sinks.len());

        for (connection, sink) in sinks.into_iter().enumerate() {
            let (handle, rx) = bounded_queue(connection, capacity);
            queues.push(handle);
            senders.push(tokio::spawn(run_sender(connection, sink, rx, shutdown.clone())));
        }

        Self {
            queues,
            senders,
            readers: Vec::new(),
            shutdown,
        }
    }

    /// Number of connections in the pool.
    pub fn pool_size(&self) -> usize {
        self.queues.len()
    }

    /// Hand out the queue `policy` picks. `None` for an empty pool.
    pub fn assign(&self, policy: &dyn AssignmentPolicy) -> Option<QueueHandle> {
        let index = policy.assign(self.queues.len());
        self.queues.get(index).or_else(|| self.queues.first()).cloned()
    }

    /// Stop accepting messages, flush every queue and close every
    /// connection.
    ///
    /// Pushes that were suspended on a full queue fail with
    /// [`QueueClosed`]; everything already queued is sent.
    pub async fn close(self) -> Vec<SenderReport> {
        self.shutdown.cancel();
        drop(self.queues);

        let mut reports = Vec::with_capacity(self.senders.len());
        for (connection, sender) in self.senders.into_iter().enumerate() {
            match sender.await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(connection, error = %e, "Sender task did not finish cleanly");
                }
            }
        }

        for reader in self.readers {
            reader.abort();
        }

        reports
    }
}

/// Close connections opened by a pool that failed to come up.
async fn close_partial_pool<S>(sinks: Vec<S>, readers: Vec<JoinHandle<()>>)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    for (connection, mut sink) in sinks.into_iter().enumerate() {
        if let Err(e) = sink.close().await {
            debug!(connection, error = %e, "Outbound connection did not close cleanly");
        }
    }
    for reader in readers {
        reader.abort();
    }
}

/// Write one queue to one socket until shutdown or transport failure.
async fn run_sender<S>(
    connection: usize,
    mut sink: S,
    mut rx: mpsc::Receiver<String>,
    shutdown: CancellationToken,
) -> SenderReport
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let mut sent: u64 = 0;
    let mut draining = false;

    loop {
        let next = if draining {
            rx.recv().await
        } else {
            tokio::select! {
                message = rx.recv() => message,
                () = shutdown.cancelled() => {
                    rx.close();
                    draining = true;
                    debug!(connection, buffered = rx.len(), "Draining send queue");
                    continue;
                }
            }
        };

        // Every handle is gone or the queue is closed and empty.
        let Some(message) = next else { break };

        if let Err(e) = sink.send(Message::Text(message.into())).await {
            warn!(connection, error = %e, sent, "Outbound connection failed");
            rx.close();
            return SenderReport {
                connection,
                sent,
                failed: true,
            };
        }
        sent = sent.saturating_add(1);
    }

    if let Err(e) = sink.close().await {
        debug!(connection, error = %e, "Outbound connection did not close cleanly");
    }
    info!(connection, sent, "Outbound connection closed");

    SenderReport {
        connection,
        sent,
        failed: false,
    }
}

/// Log the server's replies. A healthy fleet never gets any.
async fn read_replies<St>(connection: usize, mut stream: St)
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                warn!(connection, reply = %text.as_str(), "Server rejected telemetry");
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection, error = %e, "Reply stream ended");
                break;
            }
        }
    }
}
