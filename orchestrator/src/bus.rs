//! Bounded fire-and-forget message bus.
//!
//! Senders enqueue addressed [`AgentMessage`]s; a single dispatch loop drains
//! the queue in FIFO order and hands each message to its target agent on a
//! separately spawned task, so a slow agent never stalls the loop. Responses
//! are discarded and delivery is at-most-once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::agents::AgentContext;
use crate::error::BusError;
use crate::metrics::BUS_MESSAGES;
use crate::models::AgentMessage;
use crate::registry::AgentRegistry;

#[derive(Debug, Clone, Copy)]
pub struct BusSettings {
    pub capacity: usize,
    pub send_timeout: Duration,
    /// Deadline for each dispatched `process` call.
    pub call_timeout: Duration,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            capacity: 100,
            send_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Enqueued,
    TimedOut,
    Closed,
}

#[derive(Clone)]
pub struct MessageBus {
    sender: mpsc::Sender<AgentMessage>,
    send_timeout: Duration,
}

impl MessageBus {
    /// Creates the bus and its undrained receiving end.
    pub fn channel(capacity: usize, send_timeout: Duration) -> (Self, mpsc::Receiver<AgentMessage>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender,
                send_timeout,
            },
            receiver,
        )
    }

    /// Creates the bus and spawns its dispatch loop. The loop exits once
    /// every `MessageBus` clone has been dropped.
    pub fn spawn(registry: Arc<AgentRegistry>, settings: BusSettings) -> (Self, JoinHandle<()>) {
        let (bus, receiver) = Self::channel(settings.capacity, settings.send_timeout);
        let handle = tokio::spawn(dispatch_loop(receiver, registry, settings.call_timeout));
        (bus, handle)
    }

    /// Enqueues `message`, waiting at most the send timeout for space.
    pub async fn try_send(&self, message: AgentMessage) -> Result<(), BusError> {
        match self.sender.send_timeout(message, self.send_timeout).await {
            Ok(()) => Ok(()),
            Err(SendTimeoutError::Timeout(message)) => Err(BusError::DeliveryTimeout {
                to_agent: message.to_agent,
                timeout: self.send_timeout,
            }),
            Err(SendTimeoutError::Closed(_)) => Err(BusError::Closed),
        }
    }

    /// Fire-and-forget send: failures are logged and reported, never raised.
    pub async fn send(&self, message: AgentMessage) -> DeliveryStatus {
        let to_agent = message.to_agent.clone();
        let message_id = message.id.clone();

        let status = match self.try_send(message).await {
            Ok(()) => {
                debug!(to = %to_agent, message_id = %message_id, "Message enqueued");
                DeliveryStatus::Enqueued
            }
            Err(e @ BusError::DeliveryTimeout { .. }) => {
                warn!(to = %to_agent, message_id = %message_id, error = %e, "Message timeout, dropping");
                DeliveryStatus::TimedOut
            }
            Err(e @ BusError::Closed) => {
                warn!(to = %to_agent, message_id = %message_id, error = %e, "Message bus closed, dropping");
                DeliveryStatus::Closed
            }
        };

        let outcome = match status {
            DeliveryStatus::Enqueued => "enqueued",
            DeliveryStatus::TimedOut => "timed_out",
            DeliveryStatus::Closed => "closed",
        };
        BUS_MESSAGES.with_label_values(&[outcome]).inc();
        status
    }
}

async fn dispatch_loop(
    mut receiver: mpsc::Receiver<AgentMessage>,
    registry: Arc<AgentRegistry>,
    call_timeout: Duration,
) {
    info!("Message dispatch loop started");

    while let Some(message) = receiver.recv().await {
        let Some(agent) = registry.lookup(&message.to_agent).await else {
            debug!(to = %message.to_agent, message_id = %message.id, "No such agent, dropping message");
            BUS_MESSAGES.with_label_values(&["dropped"]).inc();
            continue;
        };

        BUS_MESSAGES.with_label_values(&["dispatched"]).inc();
        tokio::spawn(async move {
            let ctx = AgentContext::background();
            let message_id = message.id.clone();
            match tokio::time::timeout(call_timeout, agent.process(&ctx, message)).await {
                Ok(Ok(_)) => debug!(agent = %agent.id(), message_id = %message_id, "Dispatched message processed"),
                Ok(Err(e)) => warn!(agent = %agent.id(), message_id = %message_id, error = %e, "Agent processing error"),
                Err(_) => warn!(agent = %agent.id(), message_id = %message_id, "Agent processing timed out"),
            }
        });
    }

    info!("Message dispatch loop stopped");
}
