//! Structured record of one driver run.

use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use tokio::time::Instant;

use crate::platform::VendorId;

/// States of the configuration state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Idle,
    EnteringConfig,
    ApplyingCommands,
    Committing,
    Saving,
    Returning,
    Verifying,
    Recovering,
    Done,
    Fatal,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// What a transcript entry was sent for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    EnterConfig,
    Command,
    Block,
    Commit,
    CommitFallback,
    Save,
    SaveConfirm,
    Exit,
    PromptBefore,
    PromptAfter,
    Recovery,
}

/// How one step went.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Warning(String),
    Failed(String),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// One command sent and what came back.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptEntry {
    /// State the driver was in when the command was sent.
    pub state: DriverState,

    pub step: Step,

    /// The command text. Block entries hold every line, newline-separated.
    pub command: String,

    /// Raw device output, escape sequences stripped.
    pub output: String,

    pub outcome: Outcome,

    pub elapsed: Duration,
}

/// Severity of a diagnostic note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteLevel {
    Info,
    Warning,
    Error,
}

/// Free-text diagnostic attached to a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub level: NoteLevel,
    pub message: String,
}

/// Terminal status of a driver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionStatus {
    /// Every step went through (warnings allowed).
    Success,
    /// Some configuration lines failed but the run completed.
    PartialFailure,
    /// The run could not complete. The transcript holds what happened.
    Fatal,
}

/// Result of applying one command list to one device.
///
/// Built up while the driver runs and never changed after it is returned.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub vendor: VendorId,

    pub status: SessionStatus,

    pub transcript: Vec<TranscriptEntry>,

    /// Prompt captured before anything was configured.
    pub prompt_before: Option<String>,

    /// Prompt captured after a hostname change.
    pub new_prompt: Option<String>,

    pub notes: Vec<Note>,

    /// Every state entered, in order, starting with `Idle`.
    pub states: Vec<DriverState>,

    pub elapsed: Duration,
}

impl SessionResult {
    pub fn is_success(&self) -> bool {
        self.status == SessionStatus::Success
    }

    /// Entries recorded for `step`, in order.
    pub fn entries(&self, step: Step) -> impl Iterator<Item = &TranscriptEntry> {
        self.transcript.iter().filter(move |entry| entry.step == step)
    }

    /// Commands that failed while applying configuration.
    pub fn failed_commands(&self) -> impl Iterator<Item = &TranscriptEntry> {
        self.transcript
            .iter()
            .filter(|entry| entry.step == Step::Command && entry.outcome.is_failed())
    }

    /// Message of the last error-level note.
    pub fn last_error(&self) -> Option<&str> {
        self.notes
            .iter()
            .rev()
            .find(|note| note.level == NoteLevel::Error)
            .map(|note| note.message.as_str())
    }
}

/// Accumulates a [`SessionResult`] while a driver runs.
pub(crate) struct Recorder {
    vendor: VendorId,
    started: Instant,
    state: DriverState,
    states: Vec<DriverState>,
    transcript: Vec<TranscriptEntry>,
    notes: Vec<Note>,
    pub(crate) prompt_before: Option<String>,
    pub(crate) new_prompt: Option<String>,
}

impl Recorder {
    pub(crate) fn new(vendor: VendorId) -> Self {
        Self {
            vendor,
            started: Instant::now(),
            state: DriverState::Idle,
            states: vec![DriverState::Idle],
            transcript: Vec::new(),
            notes: Vec::new(),
            prompt_before: None,
            new_prompt: None,
        }
    }

    pub(crate) fn enter(&mut self, state: DriverState) {
        debug!("{}: {} -> {}", self.vendor, self.state, state);
        self.state = state;
        self.states.push(state);
    }

    pub(crate) fn state(&self) -> DriverState {
        self.state
    }

    pub(crate) fn record(
        &mut self,
        step: Step,
        command: impl Into<String>,
        output: impl Into<String>,
        outcome: Outcome,
        elapsed: Duration,
    ) {
        self.transcript.push(TranscriptEntry {
            state: self.state,
            step,
            command: command.into(),
            output: output.into(),
            outcome,
            elapsed,
        });
    }

    pub(crate) fn note(&mut self, level: NoteLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoteLevel::Info => info!("{}: {}", self.vendor, message),
            NoteLevel::Warning | NoteLevel::Error => warn!("{}: {}", self.vendor, message),
        }
        self.notes.push(Note { level, message });
    }

    pub(crate) fn finish(mut self, status: SessionStatus) -> SessionResult {
        self.enter(match status {
            SessionStatus::Fatal => DriverState::Fatal,
            _ => DriverState::Done,
        });
        SessionResult {
            vendor: self.vendor,
            status,
            transcript: self.transcript,
            prompt_before: self.prompt_before,
            new_prompt: self.new_prompt,
            notes: self.notes,
            states: self.states,
            elapsed: self.started.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_tracks_states_and_entries() {
        let mut recorder = Recorder::new(VendorId::HuaweiVrp8);
        recorder.enter(DriverState::ApplyingCommands);
        recorder.record(
            Step::Command,
            "sysname x",
            "Error: bad",
            Outcome::Failed("Error:".into()),
            Duration::ZERO,
        );
        recorder.note(NoteLevel::Error, "first");
        recorder.note(NoteLevel::Error, "second");

        let result = recorder.finish(SessionStatus::PartialFailure);
        assert_eq!(
            result.states,
            [DriverState::Idle, DriverState::ApplyingCommands, DriverState::Done]
        );
        assert_eq!(result.transcript[0].state, DriverState::ApplyingCommands);
        assert_eq!(result.failed_commands().count(), 1);
        assert_eq!(result.last_error(), Some("second"));
        assert!(!result.is_success());
    }

    #[test]
    fn test_fatal_finish_enters_fatal() {
        let result = Recorder::new(VendorId::HuaweiVrp5).finish(SessionStatus::Fatal);
        assert_eq!(result.states.last(), Some(&DriverState::Fatal));
    }

    #[test]
    fn test_outcome_serializes_tagged() {
        let json = serde_json::to_string(&Outcome::Warning("slow".into())).unwrap();
        assert_eq!(json, r#"{"outcome":"warning","message":"slow"}"#);
    }
}
