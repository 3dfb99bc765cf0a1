//! Configuration drivers.
//!
//! A driver runs the configuration state machine for one vendor family over a
//! [`Session`]: enter configuration mode, apply the command list, commit or
//! save, return to operational mode and re-read the prompt when the hostname
//! changed. Which machine runs is decided by the vendor's
//! [`DriverFamily`]; everything vendor specific comes from its
//! [`VendorSyntax`].
//!
//! Drivers never return errors. Every failure ends up in the
//! [`SessionResult`] transcript and notes, and a run that cannot continue
//! finishes with [`SessionStatus::Fatal`].

mod immediate;
mod registry;
mod result;
mod staged;
mod timing;

pub use immediate::ImmediateCommitDriver;
pub use registry::DriverRegistry;
pub use result::{
    DriverState, Note, NoteLevel, Outcome, SessionResult, SessionStatus, Step, TranscriptEntry,
};
pub use staged::StagedCommitDriver;
pub use timing::TimingPolicy;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::FutureExt;
use log::{debug, warn};
use tokio::time::Instant;

use crate::command::ConfigCommandList;
use crate::error::{Error, Result};
use crate::platform::{DriverFamily, VendorId, VendorSyntax};
use crate::session::Session;
use result::Recorder;

/// The driver registered for one vendor.
#[derive(Debug, Clone)]
pub enum VendorDriver {
    Immediate(ImmediateCommitDriver),
    Staged(StagedCommitDriver),
}

impl VendorDriver {
    /// Build the driver matching the syntax table's family.
    pub fn new(vendor: VendorId, syntax: VendorSyntax, timing: TimingPolicy) -> Result<Self> {
        syntax.validate()?;
        Ok(match syntax.family {
            DriverFamily::ImmediateCommit => {
                VendorDriver::Immediate(ImmediateCommitDriver::new(vendor, syntax, timing))
            }
            DriverFamily::StagedCommit => {
                VendorDriver::Staged(StagedCommitDriver::new(vendor, syntax, timing))
            }
        })
    }

    pub fn vendor(&self) -> VendorId {
        match self {
            VendorDriver::Immediate(driver) => driver.vendor(),
            VendorDriver::Staged(driver) => driver.vendor(),
        }
    }

    pub fn syntax(&self) -> &VendorSyntax {
        match self {
            VendorDriver::Immediate(driver) => driver.syntax(),
            VendorDriver::Staged(driver) => driver.syntax(),
        }
    }

    pub fn family(&self) -> DriverFamily {
        self.syntax().family
    }

    /// Apply `commands` over `session`.
    ///
    /// A panic inside the state machine ends the run as [`SessionStatus::Fatal`]
    /// with the transcript recorded up to that point.
    pub async fn apply<S: Session>(&self, session: &mut S, commands: &ConfigCommandList) -> SessionResult {
        let mut recorder = Recorder::new(self.vendor());
        let run = AssertUnwindSafe(async {
            match self {
                VendorDriver::Immediate(driver) => driver.run(session, commands, &mut recorder).await,
                VendorDriver::Staged(driver) => driver.run(session, commands, &mut recorder).await,
            }
        })
        .catch_unwind()
        .await;

        match run {
            Ok(status) => recorder.finish(status),
            Err(payload) => {
                let message = panic_message(&*payload);
                warn!("{}: driver panicked in {}: {}", self.vendor(), recorder.state(), message);
                recorder.note(NoteLevel::Error, format!("driver panicked: {}", message));
                recorder.finish(SessionStatus::Fatal)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Failure message for output carrying one of the vendor's failure markers.
fn reported_failure(syntax: &VendorSyntax, output: &str) -> Option<String> {
    syntax
        .detect_failure(output)
        .map(|marker| format!("device reported '{}'", marker))
}

/// Read the prompt before anything is configured. Best effort.
async fn capture_baseline<S: Session>(session: &mut S, recorder: &mut Recorder) {
    match session.capture_prompt().await {
        Ok(prompt) => {
            debug!("baseline prompt: {}", prompt);
            recorder.prompt_before = Some(prompt);
        }
        Err(e) => recorder.note(
            NoteLevel::Warning,
            format!("could not read prompt before configuring: {}", e),
        ),
    }
}

/// Wait for a hostname change to land, then re-read the prompt.
///
/// Both prompts are recorded whether or not they differ. Failing to read the
/// new prompt is a warning.
async fn verify_hostname<S: Session>(session: &mut S, recorder: &mut Recorder, settle: Duration) {
    tokio::time::sleep(settle).await;
    recorder.enter(DriverState::Verifying);

    let before = recorder.prompt_before.clone().unwrap_or_default();
    recorder.record(Step::PromptBefore, "", before.clone(), Outcome::Ok, Duration::ZERO);

    let started = Instant::now();
    match session.capture_prompt().await {
        Ok(after) => {
            recorder.record(Step::PromptAfter, "", after.clone(), Outcome::Ok, started.elapsed());
            if after == before {
                recorder.note(NoteLevel::Info, format!("prompt unchanged after hostname change: {}", after));
            } else {
                recorder.note(NoteLevel::Info, format!("prompt changed from '{}' to '{}'", before, after));
            }
            recorder.new_prompt = Some(after);
        }
        Err(e) => {
            recorder.record(
                Step::PromptAfter,
                "",
                "",
                Outcome::Warning(e.to_string()),
                started.elapsed(),
            );
            recorder.note(
                NoteLevel::Warning,
                format!("could not read prompt after hostname change: {}", e),
            );
        }
    }
}

/// Best-effort attempt to leave configuration mode after a fatal failure.
async fn recover<S: Session>(
    session: &mut S,
    syntax: &VendorSyntax,
    timing: &TimingPolicy,
    recorder: &mut Recorder,
    cause: &Error,
) {
    recorder.enter(DriverState::Recovering);
    debug!("recovering after: {}", cause);

    let Some(exit) = syntax.mode_exit.as_deref() else {
        recorder.note(NoteLevel::Warning, "no mode-exit command, recovery skipped");
        return;
    };

    let started = Instant::now();
    let attempt = tokio::time::timeout(
        timing.recovery_timeout,
        session.send_line_timed(exit, timing.recovery_settle),
    )
    .await;
    match attempt {
        Ok(Ok(output)) => {
            recorder.record(Step::Recovery, exit, output, Outcome::Ok, started.elapsed());
            recorder.note(NoteLevel::Info, format!("recovery: sent '{}'", exit));
        }
        Ok(Err(e)) => {
            recorder.record(Step::Recovery, exit, "", Outcome::Failed(e.to_string()), started.elapsed());
            recorder.note(NoteLevel::Warning, format!("recovery failed: {}", e));
        }
        Err(_) => {
            let message = format!("no answer within {:?}", timing.recovery_timeout);
            recorder.record(Step::Recovery, exit, "", Outcome::Failed(message.clone()), started.elapsed());
            recorder.note(NoteLevel::Warning, format!("recovery failed: {}", message));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::vendors;
    use crate::session::mock::{Call, MockScript, MockSession};

    #[test]
    fn test_family_selects_machine() {
        let vrp5 = VendorDriver::new(
            VendorId::HuaweiVrp5,
            vendors::huawei_vrp5::syntax(),
            TimingPolicy::instant(),
        )
        .unwrap();
        assert!(matches!(vrp5, VendorDriver::Immediate(_)));

        let junos = VendorDriver::new(
            VendorId::JuniperJunos,
            vendors::juniper_junos::syntax(),
            TimingPolicy::instant(),
        )
        .unwrap();
        assert!(matches!(junos, VendorDriver::Staged(_)));
        assert_eq!(junos.family(), DriverFamily::StagedCommit);
    }

    #[test]
    fn test_rejects_incomplete_staged_syntax() {
        let mut syntax = vendors::huawei_vrp8::syntax();
        syntax.commit = None;
        assert!(VendorDriver::new(VendorId::HuaweiVrp8, syntax, TimingPolicy::instant()).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_list_still_commits_on_staged_vendors() {
        for id in [VendorId::HuaweiVrp8, VendorId::JuniperJunos] {
            let syntax = id.builtin_syntax();
            let driver = VendorDriver::new(id, syntax.clone(), TimingPolicy::default()).unwrap();
            let mut session = MockSession::new(MockScript::new("<core-1>"));
            let result = driver.apply(&mut session, &ConfigCommandList::default()).await;

            assert_eq!(result.status, SessionStatus::Success);
            assert_eq!(
                result.states,
                [
                    DriverState::Idle,
                    DriverState::EnteringConfig,
                    DriverState::ApplyingCommands,
                    DriverState::Committing,
                    DriverState::Returning,
                    DriverState::Done,
                ]
            );
            assert_eq!(result.entries(Step::Command).count(), 0);
            assert!(session.calls().contains(&Call::Timed(syntax.commit.unwrap())));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_list_on_immediate_vendor_sends_empty_block_and_saves() {
        let driver =
            VendorDriver::new(VendorId::HuaweiVrp5, vendors::huawei_vrp5::syntax(), TimingPolicy::default()).unwrap();
        let mut session = MockSession::new(MockScript::new("<core-1>"));
        let result = driver.apply(&mut session, &ConfigCommandList::default()).await;

        assert_eq!(result.status, SessionStatus::Success);
        assert_eq!(result.entries(Step::Block).next().unwrap().command, "");
        assert!(session.calls().contains(&Call::Block(vec!["system-view".into(), "return".into()])));
        assert!(session.calls().contains(&Call::Expect("save".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_becomes_fatal_with_partial_transcript() {
        let driver =
            VendorDriver::new(VendorId::HuaweiVrp8, vendors::huawei_vrp8::syntax(), TimingPolicy::default()).unwrap();
        let script = MockScript::new("<core-1>").panic_on("sysname core-2");
        let mut session = MockSession::new(script);
        let commands = ConfigCommandList::from_rendered("sysname core-2");

        let result = driver.apply(&mut session, &commands).await;

        assert_eq!(result.status, SessionStatus::Fatal);
        assert_eq!(result.states.last(), Some(&DriverState::Fatal));
        assert_eq!(result.entries(Step::EnterConfig).count(), 1);
        assert!(result.last_error().unwrap().contains("scripted panic on 'sysname core-2'"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovery_is_bounded() {
        let syntax = vendors::huawei_vrp8::syntax();
        let timing = TimingPolicy::default();
        let mut session = MockSession::new(MockScript::new("[~core-1]"));
        let mut recorder = Recorder::new(VendorId::HuaweiVrp8);
        let cause = Error::from(crate::error::ChannelError::Closed);

        recover(&mut session, &syntax, &timing, &mut recorder, &cause).await;

        assert_eq!(recorder.state(), DriverState::Recovering);
        assert_eq!(session.calls(), [Call::Timed("return".into())]);
        let result = recorder.finish(SessionStatus::Fatal);
        assert_eq!(result.entries(Step::Recovery).count(), 1);
    }
}
