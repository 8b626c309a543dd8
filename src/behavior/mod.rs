//! Per-agent behavioral state machines.
//!
//! A behavior model owns every probabilistic decision one agent makes:
//! whether and when to send, to whom, whether a message goes out on the
//! deniable channel, and whether an incoming message gets a reply. Each
//! model owns its own seeded RNG stream, so a fixed master seed reproduces
//! the exact decision sequence of a run; nothing random is shared between
//! agents.
//!
//! The simulation loops talk to models through the [`Behavior`] trait and
//! never reach into the concrete state, which is what lets the agent keep
//! the model behind a single mutex and avoid racing the RNG stream across
//! its send and listen loops.

mod generator;
mod human;

use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::network::SimUser;
use crate::protocol::{BehaviorParams, Message};

pub use generator::generate_traits;
pub use human::HumanTraits;

/// Pluggable inter-message-time function: draws the seconds until the next
/// autonomous send given the model's (possibly burst-scaled) mean delay.
pub type DelayFn = fn(rng: &mut StdRng, mean_secs: f64) -> f64;

/// Smallest valid delay-draw range, in seconds. Degenerate means are
/// clamped up to this so a draw can never panic on an empty range.
pub const MIN_DELAY_RANGE_SECS: f64 = 1.0;

/// Uniform draw over `[0, mean)`.
pub fn uniform_delay(rng: &mut StdRng, mean_secs: f64) -> f64 {
    rng.gen_range(0.0..mean_secs.max(MIN_DELAY_RANGE_SECS))
}

/// Exponential inter-arrival draw with the given mean.
pub fn exponential_delay(rng: &mut StdRng, mean_secs: f64) -> f64 {
    let u: f64 = rng.gen();
    -mean_secs.max(MIN_DELAY_RANGE_SECS) * (1.0 - u).ln()
}

/// Named inter-message-time distributions selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayProfile {
    /// Uniform over `[0, mean)`.
    #[default]
    Uniform,
    /// Exponential with the given mean.
    Exponential,
}

impl DelayProfile {
    /// Resolve the profile to its delay function.
    pub fn delay_fn(self) -> DelayFn {
        match self {
            DelayProfile::Uniform => uniform_delay,
            DelayProfile::Exponential => exponential_delay,
        }
    }
}

/// Decision surface the simulation loops drive an agent through.
pub trait Behavior: Send {
    /// Human-readable description for logs and the user snapshot.
    fn behavior_name(&self) -> String;

    /// The immutable parameters this model was built with.
    fn params(&self) -> BehaviorParams;

    /// True while the deniable burst counter is positive.
    fn is_bursting(&self) -> bool;

    /// Time until the next autonomous send slot. While bursting the mean
    /// is scaled by the burst modifier and the burst counter decrements by
    /// one per draw.
    fn next_send_delay(&mut self) -> Duration;

    /// Delay before a reply goes out, capped so the reply cannot overrun
    /// the agent's next scheduled autonomous send.
    fn response_delay(&mut self, until_next_send: Duration) -> Duration;

    /// Whether an incoming message gets a reply. Unidentified senders are
    /// never answered.
    fn will_respond(&mut self, incoming: &Message) -> bool;

    /// Build the messages for one autonomous send slot: the deniable one
    /// first (so it can piggy-back ahead of the regular message in the
    /// same processing window), then the regular one.
    fn make_messages(&mut self, user: &SimUser) -> Vec<Message>;

    /// Build the reply to an incoming message, preserving its deniability.
    fn make_reply(&mut self, user: &SimUser, incoming: &Message) -> Message;
}
