//! The simulated agent: one behavior model driving one client process.
//!
//! Lifecycle: `Provisioning → Connected → Running → Stopping → Stopped`.
//! Provisioning obtains a live process channel from the agent's client
//! handle; after the cohort-wide start signal and a settle delay, a send
//! loop and a listen loop run as independent tasks. They share only the
//! process channel (internally serialized) and the behavior model, which
//! sits behind a mutex so the two loops and any in-flight reply tasks
//! never race on its RNG stream.
//!
//! Stop is cooperative: each loop observes the broadcast stop flag at the
//! top of its iteration, so an in-flight sleep finishes before the loop
//! exits. The listen loop performs one final drain-and-read pass after
//! observing the stop flag.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::{sleep, Instant};

use crate::behavior::Behavior;
use crate::error::Result;
use crate::network::SimUser;
use crate::process::ProcessChannel;
use crate::protocol::{encode_command, parse_incoming, EventType, Message, MessageEvent};
use crate::runtime::ClientHandle;

/// Newline-terminated read command, issued by every listen pass.
const READ_LINE: &[u8] = b"read\n";

/// Agent lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    /// Requesting a live client process.
    Provisioning,
    /// Channel open, waiting for the cohort start signal.
    Connected,
    /// Send and listen loops active.
    Running,
    /// Stop observed, loops draining.
    Stopping,
    /// Channel closed, no further events.
    Stopped,
}

/// One simulated user driving one live client process.
pub struct SimulatedAgent {
    user: Arc<SimUser>,
    behavior: Arc<Mutex<Box<dyn Behavior>>>,
    channel: Arc<ProcessChannel>,
    events: mpsc::Sender<MessageEvent>,
    next_send_at: Arc<Mutex<Instant>>,
    settle: Duration,
    read_period: Duration,
    state: Mutex<AgentState>,
}

impl SimulatedAgent {
    /// Provision the agent's client process and open its channel.
    ///
    /// The client command is the configured argv with the agent's id and
    /// nickname appended. Failure leaves the cohort untouched; the caller
    /// logs it and drops this agent.
    #[allow(clippy::too_many_arguments)]
    pub async fn connect(
        user: SimUser,
        behavior: Box<dyn Behavior>,
        handle: &ClientHandle,
        client_command: &[String],
        permits: Arc<Semaphore>,
        events: mpsc::Sender<MessageEvent>,
        settle: Duration,
        read_period: Duration,
    ) -> Result<Self> {
        let mut command = client_command.to_vec();
        command.push(user.id.to_string());
        command.push(user.nickname.clone());

        let channel = ProcessChannel::open(Arc::clone(&handle.factory), command, permits).await?;
        tracing::debug!("agent {} connected", user.nickname);

        Ok(Self {
            user: Arc::new(user),
            behavior: Arc::new(Mutex::new(behavior)),
            channel: Arc::new(channel),
            events,
            next_send_at: Arc::new(Mutex::new(Instant::now())),
            settle,
            read_period,
            state: Mutex::new(AgentState::Connected),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AgentState {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn set_state(&self, state: AgentState) {
        *self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = state;
    }

    /// The user this agent simulates.
    pub fn user(&self) -> &SimUser {
        &self.user
    }

    /// Drive the agent until the stop signal lands.
    ///
    /// Waits for the shared start signal so every agent's timers begin
    /// from a common zero, lets the spawned client settle, then runs the
    /// send and listen loops to completion and closes the channel.
    pub async fn run(self, mut start: watch::Receiver<bool>, stop: watch::Receiver<bool>) {
        let started = *start.borrow();
        if !started && start.changed().await.is_err() {
            // Orchestrator went away before the run began.
            self.channel.close().await;
            return;
        }

        sleep(self.settle).await;
        self.set_state(AgentState::Running);
        tracing::debug!("agent {} running", self.user.nickname);

        let agent = Arc::new(self);
        let listener = {
            let agent = Arc::clone(&agent);
            let stop = stop.clone();
            tokio::spawn(async move { agent.listen_loop(stop).await })
        };

        // The send loop returning means stop was observed (or the channel
        // died); the listener may still be in its final drain pass.
        agent.send_loop(stop).await;
        agent.set_state(AgentState::Stopping);
        let _ = listener.await;

        agent.channel.close().await;
        agent.set_state(AgentState::Stopped);
        tracing::debug!("agent {} stopped", agent.user.nickname);
    }

    /// Autonomous send loop: sleep out the behavioral delay, then emit and
    /// write whatever the model decided to say this slot.
    async fn send_loop(&self, stop: watch::Receiver<bool>) {
        loop {
            if *stop.borrow() {
                break;
            }

            let delay = self.behavior().next_send_delay();
            *self.lock_next_send_at() = Instant::now() + delay;
            sleep(delay).await;

            let messages = self.behavior().make_messages(&self.user);
            for message in messages {
                self.emit(EventType::Send, message.clone()).await;
                let line = format!("{}\n", encode_command(&message));
                if let Err(err) = self.channel.send(line.as_bytes()).await {
                    tracing::warn!("agent {} send failed: {}", self.user.nickname, err);
                    self.channel.close().await;
                    return;
                }
            }
        }
    }

    /// Listen loop: periodically ask the client to print buffered
    /// messages, parse them, and schedule replies. Performs one final
    /// drain pass after the stop signal is observed.
    async fn listen_loop(&self, stop: watch::Receiver<bool>) {
        loop {
            let stopping = *stop.borrow();
            sleep(self.read_period).await;

            let lines = match self.read_pass().await {
                Ok(lines) => lines,
                Err(err) => {
                    tracing::warn!("agent {} read failed: {}", self.user.nickname, err);
                    self.channel.close().await;
                    return;
                }
            };

            for line in lines {
                // Malformed output is noise, not an error.
                let Some(message) = parse_incoming(&line) else {
                    continue;
                };
                self.emit(EventType::Receive, message.clone()).await;
                self.maybe_reply(message);
            }

            if stopping {
                break;
            }
        }
    }

    async fn read_pass(&self) -> Result<Vec<String>> {
        self.channel.send(READ_LINE).await?;
        self.channel.read_lines(b'\n').await
    }

    /// Decide on a reply and, if the model wants one, schedule it after
    /// the behavioral response delay on its own task. Burst counters move
    /// at construction time, not at delivery time.
    fn maybe_reply(&self, incoming: Message) {
        let (reply, delay) = {
            let mut behavior = self.behavior();
            if !behavior.will_respond(&incoming) {
                return;
            }
            let reply = behavior.make_reply(&self.user, &incoming);
            let remaining = self.lock_next_send_at().duration_since(Instant::now());
            let delay = behavior.response_delay(remaining);
            (reply, delay)
        };

        let channel = Arc::clone(&self.channel);
        let events = self.events.clone();
        let nickname = self.user.nickname.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            let _ = events
                .send(MessageEvent::now(EventType::Send, reply.clone()))
                .await;
            let line = format!("{}\n", encode_command(&reply));
            if let Err(err) = channel.send(line.as_bytes()).await {
                tracing::warn!("agent {} reply failed: {}", nickname, err);
            }
        });
    }

    async fn emit(&self, event_type: EventType, message: Message) {
        if self
            .events
            .send(MessageEvent::now(event_type, message))
            .await
            .is_err()
        {
            tracing::debug!("event log closed; event dropped");
        }
    }

    fn behavior(&self) -> MutexGuard<'_, Box<dyn Behavior>> {
        self.behavior
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_next_send_at(&self) -> MutexGuard<'_, Instant> {
        self.next_send_at
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
