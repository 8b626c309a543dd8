//! External collaborator interfaces.
//!
//! Provisioning compute resources, building images, and invoking packet
//! capture are not simulation logic; the simulator consumes them through
//! the narrow surfaces defined here. A provisioning layer hands the
//! orchestrator one [`ClientHandle`] per client resource it prepared
//! (container, VM, or local process), and the simulator never creates,
//! starts, or network-attaches anything itself.

mod local;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::process::SessionFactory;

pub use local::LocalProcessFactory;

/// One provisioned client resource an agent can be attached to.
#[derive(Clone)]
pub struct ClientHandle {
    /// Externally assigned address, recorded in the user snapshot.
    pub address: Option<String>,
    /// Capability spawning live sessions on this client.
    pub factory: Arc<dyn SessionFactory>,
}

impl ClientHandle {
    /// Handle without an externally assigned address.
    pub fn new(factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            address: None,
            factory,
        }
    }

    /// Handle with an externally assigned address.
    pub fn with_address(factory: Arc<dyn SessionFactory>, address: impl Into<String>) -> Self {
        Self {
            address: Some(address.into()),
            factory,
        }
    }
}

/// Packet capture collaborator.
///
/// The simulator only supplies timing and output-directory coordination;
/// how the capture is invoked is the collaborator's business.
pub trait PacketCapture: Send + Sync {
    /// Start capturing `interface` into `output_dir` for `duration_secs`.
    /// The returned guard is held for the length of the run; dropping it
    /// releases whatever the collaborator allocated.
    fn start(
        &self,
        interface: &str,
        output_dir: &Path,
        duration_secs: u64,
    ) -> Result<Box<dyn CaptureGuard>>;
}

/// Handle to a running capture.
pub trait CaptureGuard: Send {}
