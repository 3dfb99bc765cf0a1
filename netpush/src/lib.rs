//! # netpush
//!
//! Push rendered configuration to network devices over interactive SSH
//! sessions.
//!
//! Devices do not all take configuration the same way. Some apply each line
//! as it is entered and need an explicit save; others stage changes in a
//! candidate configuration until `commit`. netpush drives the device CLI
//! through a small per-family state machine that copes with both, and with
//! the timing quirks, partial failures and hostname changes real hardware
//! produces along the way.
//!
//! ## Features
//!
//! - Async SSH sessions via russh, with ANSI-stripped tail-search prompt matching
//! - Immediate-commit (Huawei VRP 5) and staged-commit (Huawei VRP 8, JUNOS) drivers
//! - Commit fallback, best-effort recovery and prompt re-capture after hostname changes
//! - Structured per-device transcripts and fleet summaries
//! - Vendor syntax tables replaceable from YAML
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use netpush::{
//!     ConfigCommandList, DriverRegistry, FleetJob, FleetOptions, FleetRunner, Inventory,
//!     SessionOrchestrator, SshConnector, TimingPolicy,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netpush::Error> {
//!     let inventory = Inventory::load("inventory/devices.yml")?;
//!     let commands = ConfigCommandList::from_rendered("sysname core-1\nntp unicast-server 192.0.2.10");
//!
//!     let registry = Arc::new(DriverRegistry::builtin(TimingPolicy::default())?);
//!     let orchestrator = SessionOrchestrator::new(registry, SshConnector);
//!     let runner = FleetRunner::new(orchestrator, FleetOptions::default());
//!
//!     let jobs: Vec<FleetJob> = inventory
//!         .devices()?
//!         .into_iter()
//!         .map(|device| FleetJob::new(device, commands.clone()))
//!         .collect();
//!
//!     let summary = runner.run(&jobs).await;
//!     println!("{} ok, {} failed", summary.succeeded().count(), summary.failed().count());
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod command;
pub mod driver;
pub mod error;
pub mod fleet;
pub mod inventory;
pub mod orchestrator;
pub mod platform;
pub mod session;
pub mod transport;

// Re-export main types for convenience
pub use command::ConfigCommandList;
pub use driver::{
    DriverRegistry, DriverState, SessionResult, SessionStatus, Step, TimingPolicy, VendorDriver,
};
pub use error::{Error, ErrorKind, Result};
pub use fleet::{
    FleetJob, FleetMode, FleetOptions, FleetOutcome, FleetRunner, FleetSummary, InterruptHandle,
    ParseModeError,
};
pub use inventory::{DeviceDescriptor, Inventory};
pub use orchestrator::SessionOrchestrator;
pub use platform::{DriverFamily, VendorId, VendorSyntax};
pub use session::{ConnectParams, Connector, Session, SshConnector};
pub use transport::{AuthMethod, SshConfig};
