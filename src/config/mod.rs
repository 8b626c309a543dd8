//! Simulation configuration.
//!
//! Supports configuration from:
//! - TOML config files
//! - Environment variables (`DENIM_SIM_*` overrides)
//! - CLI arguments (applied by the binary)
//!
//! Every configuration-time failure the orchestrator treats as fatal is
//! checked in [`Config::validate`] before any agent starts.

use std::path::PathBuf;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::behavior::DelayProfile;
use crate::error::{Result, SimError};
use crate::network::DegreeRange;

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Run timing, population size, and shutdown pacing
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Contact graph degree bounds
    #[serde(default)]
    pub topology: TopologyConfig,

    /// Behavioral trait generation
    #[serde(default)]
    pub traits: TraitsConfig,

    /// Process channel throttling
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Packet capture coordination
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Client process launch
    #[serde(default)]
    pub client: ClientConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SimError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| SimError::Config(format!("Failed to parse config: {e}")))
    }

    /// Apply environment variable overrides (`DENIM_SIM_*`)
    pub fn apply_env(mut self) -> Self {
        if let Ok(val) = std::env::var("DENIM_SIM_POPULATION") {
            if let Ok(val) = val.parse() {
                self.simulation.population = val;
            }
        }
        if let Ok(val) = std::env::var("DENIM_SIM_DURATION_SECS") {
            if let Ok(val) = val.parse() {
                self.simulation.duration_secs = val;
            }
        }
        if let Ok(val) = std::env::var("DENIM_SIM_SEED") {
            if let Ok(val) = val.parse() {
                self.simulation.seed = val;
            }
        }
        if let Ok(val) = std::env::var("DENIM_SIM_INTERFACE") {
            self.capture.interface = val;
        }
        if let Ok(val) = std::env::var("DENIM_SIM_OUTPUT_DIR") {
            self.simulation.output_dir = PathBuf::from(val);
        }

        self
    }

    /// Check every configuration-time invariant. Fatal before any agent
    /// starts; see the error-handling design notes.
    pub fn validate(&self) -> Result<()> {
        if self.simulation.population == 0 {
            return Err(SimError::Config("population must be positive".into()));
        }
        if self.simulation.duration_secs == 0 {
            return Err(SimError::Config("duration must be positive".into()));
        }
        if self.simulation.batch_size == 0 {
            return Err(SimError::Config("batch size must be positive".into()));
        }
        if self.client.command.is_empty() {
            return Err(SimError::Config("client command must not be empty".into()));
        }

        self.topology.regular.validate(self.simulation.population)?;
        self.topology.deniable.validate(self.simulation.population)?;

        self.traits.validate()?;

        Ok(())
    }
}

/// Run timing and population configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of simulated agents
    pub population: usize,

    /// Traffic generation time in seconds (excludes startup and shutdown)
    pub duration_secs: u64,

    /// Agents provisioned per startup batch
    pub batch_size: usize,

    /// Pause between startup batches, in seconds
    pub batch_settle_secs: u64,

    /// Pause after the start signal before an agent's loops begin, giving
    /// its spawned client time to initialize
    pub client_settle_secs: u64,

    /// Listen loop read period in seconds
    pub read_period_secs: u64,

    /// Grace period after the stop broadcast before the run returns
    pub grace_secs: u64,

    /// Master RNG seed; fixes traits, topologies and behavior streams
    pub seed: u64,

    /// Directory run logs are written under
    pub output_dir: PathBuf,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            population: 100,
            duration_secs: 3600,
            batch_size: 50,
            batch_settle_secs: 1,
            client_settle_secs: 5,
            read_period_secs: 1,
            grace_secs: 5,
            seed: 42,
            output_dir: PathBuf::from("logs"),
        }
    }
}

/// Contact graph degree bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyConfig {
    /// Regular contact graph degree bounds `[min, max)`
    pub regular: DegreeRange,

    /// Deniable contact graph degree bounds `[min, max)`
    pub deniable: DegreeRange,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            regular: DegreeRange { min: 2, max: 4 },
            deniable: DegreeRange { min: 1, max: 2 },
        }
    }
}

/// How per-agent probabilities are drawn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraitsMode {
    /// Scatter around averages observed on real traffic
    #[default]
    Realistic,
    /// Draw uniformly from the configured ranges
    Ranged,
}

/// Inclusive probability bounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityRange {
    /// Inclusive lower bound
    pub min: f64,
    /// Inclusive upper bound
    pub max: f64,
}

impl ProbabilityRange {
    /// Draw uniformly from `[min, max]`
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        rng.gen_range(self.min..=self.max)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min)
            || !(0.0..=1.0).contains(&self.max)
            || self.min > self.max
        {
            return Err(SimError::Config(format!(
                "{} range [{}, {}] is not a valid probability range",
                name, self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Behavioral trait generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraitsConfig {
    /// Probability generation mode
    pub mode: TraitsMode,

    /// Regular send probability bounds (ranged mode)
    pub send_probability: ProbabilityRange,

    /// Response probability bounds (ranged mode)
    pub response_probability: ProbabilityRange,

    /// Deniable send probability bounds (both modes)
    pub deniable_probability: ProbabilityRange,

    /// Delay scale factor applied while bursting
    pub burst_modifier: f64,

    /// Burst-counter increment per new deniable exchange
    pub deniable_burst_size: u32,

    /// Mean inter-message delay in seconds
    pub mean_delay_secs: f64,

    /// Inter-message-time distribution
    pub delay: DelayProfile,
}

impl Default for TraitsConfig {
    fn default() -> Self {
        Self {
            mode: TraitsMode::Realistic,
            send_probability: ProbabilityRange { min: 0.2, max: 0.6 },
            response_probability: ProbabilityRange { min: 0.3, max: 0.7 },
            deniable_probability: ProbabilityRange { min: 0.1, max: 0.3 },
            burst_modifier: 0.5,
            deniable_burst_size: 10,
            mean_delay_secs: 10.0,
            delay: DelayProfile::Uniform,
        }
    }
}

impl TraitsConfig {
    fn validate(&self) -> Result<()> {
        self.send_probability.validate("send probability")?;
        self.response_probability.validate("response probability")?;
        self.deniable_probability.validate("deniable probability")?;

        if self.burst_modifier <= 0.0 {
            return Err(SimError::Config("burst modifier must be positive".into()));
        }
        if self.mean_delay_secs <= 0.0 {
            return Err(SimError::Config("mean delay must be positive".into()));
        }
        Ok(())
    }
}

/// Process channel configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Cap on simultaneously in-flight channel operations across all
    /// agents; 0 selects the host's available parallelism
    pub permit_cap: usize,
}

/// Packet capture coordination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Network interface handed to the capture collaborator
    pub interface: String,

    /// Seconds added to the capture duration beyond the run duration
    pub padding_secs: u64,

    /// Seconds to wait after starting the capture before traffic begins
    pub settle_secs: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interface: "eth0".to_string(),
            padding_secs: 3,
            settle_secs: 2,
        }
    }
}

/// Client process launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Client argv prefix; the agent's id and nickname are appended
    pub command: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            command: vec!["./client".to_string()],
        }
    }
}
