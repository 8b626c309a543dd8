//! Message and event types shared across the simulation.
//!
//! A [`Message`] is an immutable value once constructed; the simulator
//! never mutates a message after the behavior model builds it. Events wrap
//! a message with a direction and timestamp and are the only thing the
//! simulation persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel nickname for senders the client could not identify.
///
/// Behavior models never respond to messages attributed to this sender.
pub const UNKNOWN_SENDER: &str = "unknown";

/// A single instant message between two agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Destination nickname (empty for parsed incoming messages, which do
    /// not carry their destination on the wire).
    pub to: String,
    /// Sender nickname.
    pub from: String,
    /// Message body.
    pub content: String,
    /// Whether this message travels on the deniable channel.
    pub is_deniable: bool,
}

impl Message {
    /// Create a regular (non-deniable) message.
    pub fn regular(to: &str, from: &str, content: String) -> Self {
        Self {
            to: to.to_string(),
            from: from.to_string(),
            content,
            is_deniable: false,
        }
    }

    /// Create a deniable message.
    pub fn deniable(to: &str, from: &str, content: String) -> Self {
        Self {
            to: to.to_string(),
            from: from.to_string(),
            content,
            is_deniable: true,
        }
    }

    /// True when the sender could not be identified by the client.
    pub fn from_unknown_sender(&self) -> bool {
        self.from.is_empty() || self.from == UNKNOWN_SENDER
    }
}

/// Direction of a logged message event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// The owning agent wrote this message to its client.
    Send,
    /// The owning agent read this message from its client.
    Receive,
}

/// One append-only event log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    /// Event direction.
    pub event_type: EventType,
    /// Wall-clock time the simulator observed the message.
    pub timestamp: DateTime<Utc>,
    /// The message itself.
    pub message: Message,
}

impl MessageEvent {
    /// Create an event stamped with the current wall-clock time.
    pub fn now(event_type: EventType, message: Message) -> Self {
        Self {
            event_type,
            timestamp: Utc::now(),
            message,
        }
    }
}

/// Immutable behavior parameters, recorded in the per-run user snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorParams {
    /// Probability an autonomous slot produces a regular message.
    pub send_probability: f64,
    /// Probability an incoming message is answered.
    pub response_probability: f64,
    /// Probability an autonomous slot produces a deniable message.
    pub deniable_probability: f64,
    /// Delay scale factor applied while bursting.
    pub burst_modifier: f64,
    /// Burst-counter increment per new deniable exchange.
    pub deniable_burst_size: u32,
    /// Mean inter-message delay in seconds.
    pub mean_delay_secs: f64,
}
