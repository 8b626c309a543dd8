//! The simple-human-traits behavior model.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use super::{Behavior, DelayFn};
use crate::network::SimUser;
use crate::protocol::{BehaviorParams, Message};

/// Seconds a reply must stay clear of the next scheduled autonomous send.
const RESPONSE_SAFETY_MARGIN_SECS: f64 = 1.0;

/// Probability/state engine modeling one human user's messaging habits.
///
/// Every decision is a Bernoulli trial against the model's own RNG stream;
/// the deniable burst counter is the only other mutable state. The counter
/// rises by [`deniable_burst_size`](BehaviorParams::deniable_burst_size)
/// whenever a new deniable exchange begins and falls by one per burst-scaled
/// delay draw and per regular reply, with a floor at zero.
pub struct HumanTraits {
    name: String,
    send_probability: f64,
    response_probability: f64,
    deniable_probability: f64,
    burst_modifier: f64,
    deniable_burst_size: u32,
    burst_counter: u32,
    mean_delay_secs: f64,
    delay_fn: DelayFn,
    rng: StdRng,
}

impl HumanTraits {
    /// Create a model from its parameters, delay function, and own RNG.
    pub fn new(name: impl Into<String>, params: BehaviorParams, delay_fn: DelayFn, rng: StdRng) -> Self {
        Self {
            name: name.into(),
            send_probability: params.send_probability,
            response_probability: params.response_probability,
            deniable_probability: params.deniable_probability,
            burst_modifier: params.burst_modifier,
            deniable_burst_size: params.deniable_burst_size,
            burst_counter: 0,
            mean_delay_secs: params.mean_delay_secs,
            delay_fn,
            rng,
        }
    }

    /// Bernoulli trial for an autonomous regular send.
    pub fn will_send_regular(&mut self) -> bool {
        self.rng.gen::<f64>() > 1.0 - self.send_probability
    }

    /// Bernoulli trial for an autonomous deniable send.
    pub fn will_send_deniable(&mut self) -> bool {
        self.rng.gen::<f64>() > 1.0 - self.deniable_probability
    }

    /// Current deniable burst counter.
    pub fn burst_counter(&self) -> u32 {
        self.burst_counter
    }

    fn message_text(&self, to: &str, from: &str, deniable: bool) -> String {
        let kind = if deniable { "deniable" } else { "regular" };
        format!(
            "Hello {}, this is {} sending you a {} message.",
            to, from, kind
        )
    }
}

impl Behavior for HumanTraits {
    fn behavior_name(&self) -> String {
        format!(
            "human traits {} (send {:.3}, reply {:.3}, deniable {:.3})",
            self.name, self.send_probability, self.response_probability, self.deniable_probability
        )
    }

    fn params(&self) -> BehaviorParams {
        BehaviorParams {
            send_probability: self.send_probability,
            response_probability: self.response_probability,
            deniable_probability: self.deniable_probability,
            burst_modifier: self.burst_modifier,
            deniable_burst_size: self.deniable_burst_size,
            mean_delay_secs: self.mean_delay_secs,
        }
    }

    fn is_bursting(&self) -> bool {
        self.burst_counter > 0
    }

    fn next_send_delay(&mut self) -> Duration {
        let mut mean = self.mean_delay_secs;
        if self.is_bursting() {
            mean *= self.burst_modifier;
            self.burst_counter -= 1;
        }
        let secs = (self.delay_fn)(&mut self.rng, mean);
        Duration::from_secs_f64(secs.max(0.0))
    }

    fn response_delay(&mut self, until_next_send: Duration) -> Duration {
        // The cap keeps a floor of one second so a degenerate remaining
        // time never produces an invalid draw range.
        let cap = (until_next_send.as_secs_f64() - RESPONSE_SAFETY_MARGIN_SECS).max(1.0);
        let secs = (self.delay_fn)(&mut self.rng, self.mean_delay_secs);
        Duration::from_secs_f64(secs.min(cap).max(0.0))
    }

    fn will_respond(&mut self, incoming: &Message) -> bool {
        if incoming.from_unknown_sender() {
            return false;
        }
        self.rng.gen::<f64>() > 1.0 - self.response_probability
    }

    fn make_messages(&mut self, user: &SimUser) -> Vec<Message> {
        let mut messages = Vec::new();

        if self.will_send_deniable() && !user.deniable_contacts.is_empty() {
            let target = user
                .deniable_contacts
                .choose(&mut self.rng)
                .cloned()
                .unwrap_or_default();
            let text = self.message_text(&target, &user.nickname, true);
            messages.push(Message::deniable(&target, &user.nickname, text));
            self.burst_counter += self.deniable_burst_size;
        }

        if self.will_send_regular() && !user.regular_contacts.is_empty() {
            let target = user
                .regular_contacts
                .choose(&mut self.rng)
                .cloned()
                .unwrap_or_default();
            let text = self.message_text(&target, &user.nickname, false);
            messages.push(Message::regular(&target, &user.nickname, text));
        }

        messages
    }

    fn make_reply(&mut self, user: &SimUser, incoming: &Message) -> Message {
        if incoming.is_deniable {
            self.burst_counter += self.deniable_burst_size;
        } else {
            self.burst_counter = self.burst_counter.saturating_sub(1);
        }

        let text = self.message_text(&incoming.from, &user.nickname, incoming.is_deniable);
        Message {
            to: incoming.from.clone(),
            from: user.nickname.clone(),
            content: text,
            is_deniable: incoming.is_deniable,
        }
    }
}
