//! # DenIM Simulation Testbed
//!
//! Generates synthetic instant-messaging traffic among simulated human
//! agents, each driving a live message-relay client process, so the
//! resulting network traces can be analyzed for the traffic-analysis
//! resistance of a deniable-messaging (DenIM) protocol.
//!
//! ## Architecture
//!
//! ```text
//! TrafficSimulator
//!    │  builds population, contact graphs, snapshot
//!    ├──► ContactNetwork (regular + deniable, edge-disjoint)
//!    ├──► SimulatedAgent ×N          (batched startup, shared start/stop)
//!    │       ├─ Behavior model      (send/respond/deniable decisions)
//!    │       ├─ ProcessChannel      (throttled, serialized, reconnecting)
//!    │       │     └─ SessionFactory ──► live client process   [external]
//!    │       └─ send loop ∥ listen loop ──► MessageEvent stream
//!    ├──► SimLogger                  (users.json, messages.json)
//!    └──► PacketCapture                                        [external]
//! ```
//!
//! Compute provisioning (containers, networks, IP assignment) and packet
//! capture are consumed as interfaces; the simulator never creates
//! infrastructure itself.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use denim::config::Config;
//! use denim::runtime::{ClientHandle, LocalProcessFactory};
//! use denim::sim::TrafficSimulator;
//!
//! let config = Config::from_file("denim-sim.toml")?.apply_env();
//!
//! // One handle per provisioned client resource.
//! let clients: Vec<ClientHandle> = (0..config.simulation.population)
//!     .map(|_| ClientHandle::new(Arc::new(LocalProcessFactory)))
//!     .collect();
//!
//! let run_dir = TrafficSimulator::new(config, clients)?.run().await?;
//! println!("logs in {:?}", run_dir);
//! ```
//!
//! ## Determinism
//!
//! A single master seed fixes trait generation, both contact topologies,
//! and every agent's private decision stream. Wall-clock effects (process
//! scheduling, client latency) still vary between runs; the *behavioral*
//! decision sequence does not.

pub mod behavior;
pub mod config;
pub mod error;
pub mod network;
pub mod process;
pub mod protocol;
pub mod runtime;
pub mod sim;

pub use behavior::{Behavior, HumanTraits};
pub use config::Config;
pub use error::{Result, SimError};
pub use network::{DegreeRange, SimUser};
pub use process::{ProcessChannel, SessionFactory};
pub use protocol::{EventType, Message, MessageEvent};
pub use runtime::{ClientHandle, LocalProcessFactory, PacketCapture};
pub use sim::{SimulatedAgent, TrafficSimulator};
