//! Fleet runner: probe and configure devices one after another.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{info, warn};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::command::ConfigCommandList;
use crate::driver::{SessionResult, SessionStatus};
use crate::inventory::DeviceDescriptor;
use crate::orchestrator::SessionOrchestrator;
use crate::session::Connector;

/// Cloneable stop flag, checked between devices.
///
/// Wire it to `tokio::signal::ctrl_c` to stop a run cleanly: the device in
/// progress finishes its current step sequence and the rest are skipped.
#[derive(Debug, Clone, Default)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the run stop before the next device.
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a fleet run does to each device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FleetMode {
    /// Connectivity probe only.
    Check,
    /// Probe, then report what would be sent without sending it.
    Plan,
    /// Probe, then apply the configuration.
    #[default]
    Apply,
}

/// A mode name that is not `check`, `plan` or `apply`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown mode '{0}' (expected check, plan or apply)")]
pub struct ParseModeError(String);

impl FromStr for FleetMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "check" => Ok(FleetMode::Check),
            "plan" => Ok(FleetMode::Plan),
            "apply" => Ok(FleetMode::Apply),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// Options for a fleet run.
#[derive(Debug, Clone, Default)]
pub struct FleetOptions {
    pub mode: FleetMode,
    pub interrupt: InterruptHandle,
}

/// One device and the configuration rendered for it.
#[derive(Debug, Clone)]
pub struct FleetJob {
    pub device: DeviceDescriptor,
    pub commands: ConfigCommandList,
}

impl FleetJob {
    pub fn new(device: DeviceDescriptor, commands: ConfigCommandList) -> Self {
        Self { device, commands }
    }
}

/// Per-device record of a fleet run.
#[derive(Debug, Clone, Serialize)]
pub struct FleetOutcome {
    pub device: String,
    pub success: bool,
    pub error: Option<String>,
    /// Prompt seen by the connectivity probe.
    pub probe_prompt: Option<String>,
    /// Number of lines that would be sent, in plan mode.
    pub planned: Option<usize>,
    pub result: Option<SessionResult>,
    pub elapsed: Duration,
}

impl FleetOutcome {
    fn new(device: &str, started: Instant) -> Self {
        Self {
            device: device.to_string(),
            success: true,
            error: None,
            probe_prompt: None,
            planned: None,
            result: None,
            elapsed: started.elapsed(),
        }
    }

    fn failed(device: &str, error: impl Into<String>, started: Instant) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::new(device, started)
        }
    }
}

/// Outcome of a whole fleet run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FleetSummary {
    /// One entry per device that was started, in run order.
    pub outcomes: Vec<FleetOutcome>,
    /// Devices never started because the run was interrupted.
    pub skipped: Vec<String>,
    pub interrupted: bool,
}

impl FleetSummary {
    pub fn succeeded(&self) -> impl Iterator<Item = &FleetOutcome> {
        self.outcomes.iter().filter(|o| o.success)
    }

    pub fn failed(&self) -> impl Iterator<Item = &FleetOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    /// True when every started device succeeded and nothing was skipped.
    pub fn all_succeeded(&self) -> bool {
        self.skipped.is_empty() && self.outcomes.iter().all(|o| o.success)
    }
}

/// Runs jobs sequentially, one open session at a time.
pub struct FleetRunner<C> {
    orchestrator: SessionOrchestrator<C>,
    options: FleetOptions,
}

impl<C: Connector> FleetRunner<C> {
    pub fn new(orchestrator: SessionOrchestrator<C>, options: FleetOptions) -> Self {
        Self {
            orchestrator,
            options,
        }
    }

    pub fn orchestrator(&self) -> &SessionOrchestrator<C> {
        &self.orchestrator
    }

    /// Run every job. A failing device never stops the others.
    pub async fn run(&self, jobs: &[FleetJob]) -> FleetSummary {
        let mut summary = FleetSummary::default();

        for (index, job) in jobs.iter().enumerate() {
            if self.options.interrupt.is_interrupted() {
                summary.interrupted = true;
                summary
                    .skipped
                    .extend(jobs[index..].iter().map(|job| job.device.name.clone()));
                warn!("interrupted, skipping {} device(s)", summary.skipped.len());
                break;
            }

            let outcome = self.run_job(job).await;
            if outcome.success {
                info!("{}: ok", outcome.device);
            } else {
                warn!(
                    "{}: failed: {}",
                    outcome.device,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
            summary.outcomes.push(outcome);
        }

        summary
    }

    async fn run_job(&self, job: &FleetJob) -> FleetOutcome {
        let started = Instant::now();
        let name = job.device.name.as_str();

        let prompt = match self.orchestrator.probe(&job.device).await {
            Ok(prompt) => prompt,
            Err(e) => return FleetOutcome::failed(name, format!("probe failed: {}", e), started),
        };

        let mut outcome = match self.options.mode {
            FleetMode::Check => FleetOutcome::new(name, started),
            FleetMode::Plan => FleetOutcome {
                planned: Some(job.commands.len()),
                ..FleetOutcome::new(name, started)
            },
            FleetMode::Apply => self.apply(job, started).await,
        };
        outcome.probe_prompt = Some(prompt);
        outcome.elapsed = started.elapsed();
        outcome
    }

    async fn apply(&self, job: &FleetJob, started: Instant) -> FleetOutcome {
        let name = job.device.name.as_str();
        if self.options.interrupt.is_interrupted() {
            return FleetOutcome::failed(name, "interrupted before apply", started);
        }

        let result = match self
            .orchestrator
            .run_one_device(&job.device, &job.commands)
            .await
        {
            Ok(result) => result,
            Err(e) => return FleetOutcome::failed(name, e.to_string(), started),
        };

        let error = match result.status {
            SessionStatus::Success => None,
            SessionStatus::PartialFailure => Some(format!(
                "{} of {} commands failed",
                result.failed_commands().count(),
                job.commands.len()
            )),
            SessionStatus::Fatal => Some(
                result
                    .last_error()
                    .unwrap_or("configuration session failed")
                    .to_string(),
            ),
        };

        FleetOutcome {
            success: error.is_none(),
            error,
            result: Some(result),
            ..FleetOutcome::new(name, started)
        }
    }
}
