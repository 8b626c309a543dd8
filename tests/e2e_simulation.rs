//! End-to-end simulation runs over an in-memory mock runtime.
//!
//! These tests drive the full orchestrator path (population build,
//! snapshot, batched provisioning, start/stop broadcast, event log)
//! without any real client processes: sessions are in-memory recorders
//! whose receive buffers are preloaded with one incoming line each.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use denim::config::{Config, ProbabilityRange, TraitsMode};
use denim::network::DegreeRange;
use denim::process::{ProcessSession, SessionConn, SessionFactory, SharedBuffer};
use denim::runtime::ClientHandle;
use denim::sim::TrafficSimulator;
use denim::{Result, SimError};

struct MockConn {
    writes: Arc<Mutex<Vec<String>>>,
}

impl SessionConn for MockConn {
    fn write_all<'a>(
        &'a mut self,
        payload: &'a [u8],
    ) -> Pin<Box<dyn Future<Output = std::io::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.writes
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(payload).into_owned());
            Ok(())
        })
    }

    fn close(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

/// In-memory runtime: every spawned session records its writes and starts
/// with one delivered message already buffered. Optionally refuses to
/// provision one specific agent id.
struct MockRuntime {
    writes: Arc<Mutex<Vec<String>>>,
    refuse_id: Option<String>,
}

impl MockRuntime {
    fn new() -> Self {
        Self {
            writes: Arc::default(),
            refuse_id: None,
        }
    }

    fn refusing(id: &str) -> Self {
        Self {
            writes: Arc::default(),
            refuse_id: Some(id.to_string()),
        }
    }
}

impl SessionFactory for MockRuntime {
    fn spawn<'a>(
        &'a self,
        command: &'a [String],
        _capture_output: bool,
    ) -> Pin<Box<dyn Future<Output = Result<ProcessSession>> + Send + 'a>> {
        Box::pin(async move {
            // The agent id is the first appended argument.
            if let (Some(refused), Some(id)) = (&self.refuse_id, command.get(1)) {
                if refused == id {
                    return Err(SimError::Provision(format!(
                        "no client resource for agent {id}"
                    )));
                }
            }

            let buffer = SharedBuffer::default();
            buffer
                .lock()
                .unwrap()
                .extend_from_slice(b"Regular watcher9:ping\n");
            let conn = MockConn {
                writes: Arc::clone(&self.writes),
            };
            Ok(ProcessSession::new(Box::new(conn), buffer))
        })
    }
}

/// Small, fast, deterministic-enough setup: four agents, two seconds of
/// traffic, every send slot guaranteed to produce a regular message.
fn test_config(output_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.simulation.population = 4;
    config.simulation.duration_secs = 2;
    config.simulation.batch_size = 2;
    config.simulation.batch_settle_secs = 0;
    config.simulation.client_settle_secs = 0;
    config.simulation.read_period_secs = 1;
    config.simulation.grace_secs = 1;
    config.simulation.seed = 42;
    config.simulation.output_dir = output_dir.to_path_buf();

    config.topology.regular = DegreeRange { min: 1, max: 2 };
    config.topology.deniable = DegreeRange { min: 1, max: 2 };

    config.traits.mode = TraitsMode::Ranged;
    config.traits.send_probability = ProbabilityRange { min: 1.0, max: 1.0 };
    config.traits.response_probability = ProbabilityRange { min: 0.0, max: 0.0 };
    config.traits.deniable_probability = ProbabilityRange { min: 0.0, max: 0.0 };
    config.traits.mean_delay_secs = 1.0;

    config
}

fn fleet(runtime: &Arc<MockRuntime>, count: usize) -> Vec<ClientHandle> {
    (0..count)
        .map(|i| {
            let factory: Arc<dyn SessionFactory> = Arc::clone(runtime) as Arc<dyn SessionFactory>;
            ClientHandle::with_address(factory, format!("10.10.248.{}", i + 2))
        })
        .collect()
}

#[tokio::test]
async fn test_full_run_writes_snapshot_and_events() {
    let tmp = tempfile::tempdir().unwrap();
    let runtime = Arc::new(MockRuntime::new());
    let config = test_config(tmp.path());

    let run_dir = TrafficSimulator::new(config, fleet(&runtime, 4))
        .unwrap()
        .run()
        .await
        .unwrap();

    // Snapshot: four agents, matched contact pairs, assigned addresses.
    let users: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join("users.json")).unwrap())
            .unwrap();
    let users = users.as_array().unwrap();
    assert_eq!(users.len(), 4);
    for record in users {
        assert_eq!(record["user"]["regularContacts"].as_array().unwrap().len(), 1);
        assert_eq!(record["user"]["deniableContacts"].as_array().unwrap().len(), 1);
        assert!(record["address"].as_str().unwrap().starts_with("10.10.248."));
        assert!(record["behavior"]["sendProbability"].as_f64().unwrap() >= 1.0);
    }

    // Event log: a closed JSON array holding sends (every slot fires) and
    // the preloaded receives.
    let events: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join("messages.json")).unwrap())
            .unwrap();
    let events = events.as_array().unwrap();
    assert!(!events.is_empty());
    assert!(events.iter().any(|e| e["eventType"] == "Send"));
    assert!(events.iter().any(|e| e["eventType"] == "Receive"
        && e["message"]["from"] == "watcher9"));

    // Wire traffic: periodic reads plus the agents' regular sends.
    let writes = runtime.writes.lock().unwrap();
    assert!(writes.iter().any(|w| w == "read\n"));
    assert!(writes.iter().any(|w| w.starts_with("send:")));
}

#[tokio::test]
async fn test_provisioning_failure_does_not_abort_the_cohort() {
    let tmp = tempfile::tempdir().unwrap();
    let runtime = Arc::new(MockRuntime::refusing("0"));
    let config = test_config(tmp.path());

    let run_dir = TrafficSimulator::new(config, fleet(&runtime, 4))
        .unwrap()
        .run()
        .await
        .unwrap();

    // The snapshot was written before provisioning and still lists all
    // four agents, including the one that never came up.
    let users: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join("users.json")).unwrap())
            .unwrap();
    assert_eq!(users.as_array().unwrap().len(), 4);

    // The surviving agents still produced traffic.
    let writes = runtime.writes.lock().unwrap();
    assert!(writes.iter().any(|w| w.starts_with("send:")));
}

#[tokio::test]
async fn test_insufficient_fleet_fails_before_anything_starts() {
    let tmp = tempfile::tempdir().unwrap();
    let runtime = Arc::new(MockRuntime::new());
    let config = test_config(tmp.path());

    let result = TrafficSimulator::new(config, fleet(&runtime, 2));
    assert!(matches!(result, Err(SimError::Config(_))));

    // Nothing was provisioned and no run directory was created.
    assert!(runtime.writes.lock().unwrap().is_empty());
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}
