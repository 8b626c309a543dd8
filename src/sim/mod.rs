//! Traffic simulation orchestration.
//!
//! The orchestrator builds the agent population (identities, behavioral
//! traits, contact topologies), snapshots it, provisions agents in
//! batches, and drives the run:
//!
//! ```text
//! build population ─► snapshot users.json ─► provision (batched, barrier
//! per batch) ─► start packet capture ─► broadcast start ─► run for the
//! configured duration ─► broadcast stop ─► grace period ─► close logs
//! ```
//!
//! The start broadcast gives every agent a common time zero; the stop
//! broadcast is observed cooperatively at the top of each loop iteration,
//! so shutdown latency is bounded by the longest in-flight sleep rather
//! than being immediate.

mod agent;
mod logger;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tokio::time::sleep;

use crate::behavior::{generate_traits, Behavior};
use crate::config::Config;
use crate::error::{Result, SimError};
use crate::network::{populate_deniable_contacts, populate_regular_contacts, SimUser};
use crate::process::channel_permits;
use crate::runtime::{ClientHandle, PacketCapture};

pub use agent::{AgentState, SimulatedAgent};
pub use logger::{SimLogger, UserRecord};

/// Orchestrates one simulation run over a provisioned client fleet.
pub struct TrafficSimulator {
    config: Config,
    clients: Vec<ClientHandle>,
    capture: Option<Box<dyn PacketCapture>>,
}

impl TrafficSimulator {
    /// Validate the configuration against the provisioned fleet.
    ///
    /// Fatal before anything starts: invalid config values, infeasible
    /// degree bounds, or fewer provisioned clients than the requested
    /// population.
    pub fn new(config: Config, clients: Vec<ClientHandle>) -> Result<Self> {
        config.validate()?;
        if clients.len() < config.simulation.population {
            return Err(SimError::Config(format!(
                "population {} exceeds the {} provisioned clients",
                config.simulation.population,
                clients.len()
            )));
        }
        Ok(Self {
            config,
            clients,
            capture: None,
        })
    }

    /// Attach a packet-capture collaborator.
    pub fn with_capture(mut self, capture: Box<dyn PacketCapture>) -> Self {
        self.capture = Some(capture);
        self
    }

    /// Run the simulation to completion; returns the run's log directory.
    pub async fn run(self) -> Result<PathBuf> {
        let sim = self.config.simulation.clone();
        let mut rng = StdRng::seed_from_u64(sim.seed);

        // Population: traits, identities, and the two contact topologies.
        let traits = generate_traits(sim.population, &self.config.traits, &mut rng);
        let mut users: Vec<SimUser> = (0..sim.population)
            .map(|i| SimUser::new(i as u32, i.to_string()))
            .collect();
        populate_regular_contacts(&mut users, self.config.topology.regular, &mut rng)?;
        populate_deniable_contacts(&mut users, self.config.topology.deniable, &mut rng)?;

        let logger = SimLogger::create(&sim.output_dir)?;
        tracing::info!("run {} logging to {:?}", logger.run_id(), logger.dir());

        // Static snapshot before anything is live.
        let records: Vec<UserRecord> = users
            .iter()
            .zip(traits.iter())
            .enumerate()
            .map(|(i, (user, model))| UserRecord {
                user: user.clone(),
                behavior: model.params(),
                behavior_name: model.behavior_name(),
                address: self.clients[i].address.clone(),
            })
            .collect();
        logger.log_users(&records)?;

        let (log_shutdown_tx, log_shutdown_rx) = watch::channel(false);
        let (events, log_task) = logger.start_event_log(log_shutdown_rx);

        // Provision the cohort in batches, with a join barrier per batch
        // to bound peak load on the provisioning layer.
        let permits = channel_permits(self.config.channel.permit_cap);
        let settle = Duration::from_secs(sim.client_settle_secs);
        let read_period = Duration::from_secs(sim.read_period_secs);

        let mut pending: Vec<(usize, SimUser, Box<dyn Behavior>)> = users
            .into_iter()
            .zip(traits)
            .enumerate()
            .map(|(i, (user, model))| (i, user, Box::new(model) as Box<dyn Behavior>))
            .collect();

        let mut agents: Vec<SimulatedAgent> = Vec::new();
        while !pending.is_empty() {
            let batch: Vec<_> = pending
                .drain(..sim.batch_size.min(pending.len()))
                .collect();

            let connections = batch.into_iter().map(|(i, user, behavior)| {
                let handle = self.clients[i].clone();
                let command = self.config.client.command.clone();
                let permits = Arc::clone(&permits);
                let events = events.clone();
                async move {
                    let nickname = user.nickname.clone();
                    match SimulatedAgent::connect(
                        user,
                        behavior,
                        &handle,
                        &command,
                        permits,
                        events,
                        settle,
                        read_period,
                    )
                    .await
                    {
                        Ok(agent) => Some(agent),
                        Err(err) => {
                            // Losing one agent does not abort the cohort.
                            tracing::warn!("agent {} failed to provision: {}", nickname, err);
                            None
                        }
                    }
                }
            });

            agents.extend(join_all(connections).await.into_iter().flatten());
            if !pending.is_empty() {
                sleep(Duration::from_secs(sim.batch_settle_secs)).await;
            }
        }

        tracing::info!("{} of {} agents connected", agents.len(), sim.population);
        if agents.is_empty() {
            return Err(SimError::Provision("no agents could be provisioned".into()));
        }

        // Everyone is Connected; bring up the capture before any traffic.
        let _capture_guard = match &self.capture {
            Some(capture) => {
                let guard = capture.start(
                    &self.config.capture.interface,
                    logger.dir(),
                    sim.duration_secs + self.config.capture.padding_secs,
                )?;
                sleep(Duration::from_secs(self.config.capture.settle_secs)).await;
                Some(guard)
            }
            None => None,
        };

        // Release the cohort from a common time zero.
        let (start_tx, start_rx) = watch::channel(false);
        let (stop_tx, stop_rx) = watch::channel(false);
        for agent in agents {
            tokio::spawn(agent.run(start_rx.clone(), stop_rx.clone()));
        }
        let _ = start_tx.send(true);
        tracing::info!("simulation running for {}s", sim.duration_secs);

        sleep(Duration::from_secs(sim.duration_secs)).await;

        let _ = stop_tx.send(true);
        tracing::info!("stop broadcast; draining for {}s", sim.grace_secs);
        sleep(Duration::from_secs(sim.grace_secs)).await;

        // Close the event log; agent tasks still sleeping observe the stop
        // flag on their next iteration and wind down on their own.
        drop(events);
        let _ = log_shutdown_tx.send(true);
        match log_task.await {
            Ok(result) => result?,
            Err(err) => tracing::warn!("event log task failed: {}", err),
        }

        tracing::info!("simulation done");
        Ok(logger.dir().to_path_buf())
    }
}
