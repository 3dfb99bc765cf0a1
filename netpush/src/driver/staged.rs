//! Driver for vendors with a candidate configuration and explicit commit.

use log::debug;
use tokio::time::Instant;

use super::result::Recorder;
use super::{
    DriverState, NoteLevel, Outcome, SessionResult, SessionStatus, Step, TimingPolicy,
    capture_baseline, recover, reported_failure, verify_hostname,
};
use crate::command::ConfigCommandList;
use crate::error::{DriverError, Result, VendorError};
use crate::platform::{VendorId, VendorSyntax};
use crate::session::Session;

/// Staged-commit state machine, shared by every vendor of the family.
///
/// Lines go out one at a time with a settle interval each, so every line
/// gets its own transcript entry. A failed line is recorded and the rest are
/// still sent; the commit is attempted regardless.
#[derive(Debug, Clone)]
pub struct StagedCommitDriver {
    vendor: VendorId,
    syntax: VendorSyntax,
    timing: TimingPolicy,
}

impl StagedCommitDriver {
    pub fn new(vendor: VendorId, syntax: VendorSyntax, timing: TimingPolicy) -> Self {
        Self {
            vendor,
            syntax,
            timing,
        }
    }

    pub fn vendor(&self) -> VendorId {
        self.vendor
    }

    pub fn syntax(&self) -> &VendorSyntax {
        &self.syntax
    }

    pub fn timing(&self) -> &TimingPolicy {
        &self.timing
    }

    /// Apply `commands`.
    ///
    /// Fatal when configuration mode cannot be entered or when the commit
    /// fails on both attempts. Failed lines make the run a partial failure.
    /// An empty list still enters, commits and leaves configuration mode.
    pub async fn apply<S: Session>(&self, session: &mut S, commands: &ConfigCommandList) -> SessionResult {
        let mut recorder = Recorder::new(self.vendor);
        let status = self.run(session, commands, &mut recorder).await;
        recorder.finish(status)
    }

    pub(crate) async fn run<S: Session>(
        &self,
        session: &mut S,
        commands: &ConfigCommandList,
        recorder: &mut Recorder,
    ) -> SessionStatus {
        capture_baseline(session, recorder).await;

        recorder.enter(DriverState::EnteringConfig);
        if let Err(e) = self.enter_config(session, recorder).await {
            recorder.note(NoteLevel::Error, format!("could not enter configuration mode: {}", e));
            recover(session, &self.syntax, &self.timing, recorder, &e).await;
            return SessionStatus::Fatal;
        }
        tokio::time::sleep(self.timing.config_entry_wait).await;

        recorder.enter(DriverState::ApplyingCommands);
        let failed = self.apply_lines(session, recorder, commands).await;
        if failed > 0 {
            recorder.note(
                NoteLevel::Warning,
                format!("{} of {} commands failed", failed, commands.len()),
            );
        }

        recorder.enter(DriverState::Committing);
        if let Err(e) = self.commit(session, recorder).await {
            recorder.note(NoteLevel::Error, format!("commit failed on both attempts: {}", e));
            recover(session, &self.syntax, &self.timing, recorder, &e).await;
            return SessionStatus::Fatal;
        }

        recorder.enter(DriverState::Returning);
        self.leave_config(session, recorder).await;

        if commands.changes_hostname(&self.syntax.hostname_keywords) {
            verify_hostname(session, recorder, self.timing.staged_hostname_settle).await;
        }

        if failed > 0 {
            SessionStatus::PartialFailure
        } else {
            SessionStatus::Success
        }
    }

    fn command<'a>(&self, command: &'a Option<String>, what: &str) -> Result<&'a str> {
        command.as_deref().ok_or_else(|| {
            VendorError::InvalidSyntax {
                vendor: self.syntax.name.clone(),
                message: format!("no {} command", what),
            }
            .into()
        })
    }

    async fn enter_config<S: Session>(&self, session: &mut S, recorder: &mut Recorder) -> Result<()> {
        let enter = self.command(&self.syntax.config_enter, "config-mode entry")?;
        let started = Instant::now();
        match session.send_line_timed(enter, self.timing.settle).await {
            Ok(output) => match reported_failure(&self.syntax, &output) {
                Some(message) => {
                    recorder.record(
                        Step::EnterConfig,
                        enter,
                        output,
                        Outcome::Failed(message.clone()),
                        started.elapsed(),
                    );
                    Err(DriverError::Rejected {
                        command: enter.to_string(),
                        message,
                    }
                    .into())
                }
                None => {
                    recorder.record(Step::EnterConfig, enter, output, Outcome::Ok, started.elapsed());
                    Ok(())
                }
            },
            Err(e) => {
                recorder.record(
                    Step::EnterConfig,
                    enter,
                    "",
                    Outcome::Failed(e.to_string()),
                    started.elapsed(),
                );
                Err(e)
            }
        }
    }

    /// Send each line, returning how many failed.
    async fn apply_lines<S: Session>(
        &self,
        session: &mut S,
        recorder: &mut Recorder,
        commands: &ConfigCommandList,
    ) -> usize {
        let mut failed = 0;
        for (index, command) in commands.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.timing.inter_command_delay).await;
            }
            let started = Instant::now();
            match session.send_line_timed(command, self.timing.settle).await {
                Ok(output) => {
                    let outcome = match reported_failure(&self.syntax, &output) {
                        Some(message) => {
                            failed += 1;
                            debug!("{}: '{}' failed: {}", self.vendor, command, message);
                            Outcome::Failed(message)
                        }
                        None => Outcome::Ok,
                    };
                    recorder.record(Step::Command, command, output, outcome, started.elapsed());
                }
                Err(e) => {
                    failed += 1;
                    debug!("{}: '{}' failed: {}", self.vendor, command, e);
                    recorder.record(
                        Step::Command,
                        command,
                        "",
                        Outcome::Failed(e.to_string()),
                        started.elapsed(),
                    );
                }
            }
        }
        failed
    }

    /// Commit with the long settle, then once more waiting for the prompt.
    ///
    /// Both attempts are recorded with whatever the device printed.
    async fn commit<S: Session>(&self, session: &mut S, recorder: &mut Recorder) -> Result<()> {
        let commit = self.command(&self.syntax.commit, "commit")?;

        let started = Instant::now();
        let primary = match session.send_line_timed(commit, self.timing.commit_settle).await {
            Ok(output) => match reported_failure(&self.syntax, &output) {
                None => {
                    recorder.record(Step::Commit, commit, output, Outcome::Ok, started.elapsed());
                    return Ok(());
                }
                Some(message) => {
                    recorder.record(
                        Step::Commit,
                        commit,
                        output,
                        Outcome::Failed(message.clone()),
                        started.elapsed(),
                    );
                    message
                }
            },
            Err(e) => {
                let message = e.to_string();
                recorder.record(
                    Step::Commit,
                    commit,
                    "",
                    Outcome::Failed(message.clone()),
                    started.elapsed(),
                );
                message
            }
        };
        recorder.note(
            NoteLevel::Warning,
            format!("commit failed ({}), retrying until the prompt returns", primary),
        );

        let started = Instant::now();
        match session
            .send_line_expect(
                commit,
                &self.syntax.prompt_pattern,
                self.timing.commit_fallback_timeout,
            )
            .await
        {
            Ok(output) => match reported_failure(&self.syntax, &output) {
                None => {
                    recorder.record(Step::CommitFallback, commit, output, Outcome::Ok, started.elapsed());
                    recorder.note(NoteLevel::Warning, "commit succeeded on the fallback attempt");
                    Ok(())
                }
                Some(message) => {
                    recorder.record(
                        Step::CommitFallback,
                        commit,
                        output,
                        Outcome::Failed(message.clone()),
                        started.elapsed(),
                    );
                    Err(DriverError::Rejected {
                        command: commit.to_string(),
                        message,
                    }
                    .into())
                }
            },
            Err(e) => {
                recorder.record(
                    Step::CommitFallback,
                    commit,
                    "",
                    Outcome::Failed(e.to_string()),
                    started.elapsed(),
                );
                Err(e)
            }
        }
    }

    /// Leave configuration mode. Failures are warnings.
    async fn leave_config<S: Session>(&self, session: &mut S, recorder: &mut Recorder) {
        let Some(exit) = self.syntax.mode_exit.as_deref() else {
            return;
        };
        let started = Instant::now();
        match session.send_line_timed(exit, self.timing.exit_wait).await {
            Ok(output) => {
                let outcome = match reported_failure(&self.syntax, &output) {
                    Some(message) => {
                        recorder.note(NoteLevel::Warning, format!("'{}': {}", exit, message));
                        Outcome::Warning(message)
                    }
                    None => Outcome::Ok,
                };
                recorder.record(Step::Exit, exit, output, outcome, started.elapsed());
            }
            Err(e) => {
                recorder.record(
                    Step::Exit,
                    exit,
                    "",
                    Outcome::Warning(e.to_string()),
                    started.elapsed(),
                );
                recorder.note(NoteLevel::Warning, format!("could not leave configuration mode: {}", e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::vendors::{huawei_vrp8, juniper_junos};
    use crate::session::mock::{Call, Failure, MockScript, MockSession};

    fn vrp8() -> StagedCommitDriver {
        StagedCommitDriver::new(VendorId::HuaweiVrp8, huawei_vrp8::syntax(), TimingPolicy::default())
    }

    fn commands(lines: &[&str]) -> ConfigCommandList {
        ConfigCommandList::new(lines.iter().map(|l| l.to_string()).collect()).unwrap()
    }

    fn steps(result: &SessionResult) -> Vec<Step> {
        result.transcript.iter().map(|entry| entry.step).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_sysname_full_sequence() {
        let script = MockScript::new("<HUAWEI>").then_prompt("<core-1>");
        let mut session = MockSession::new(script);

        let result = vrp8().apply(&mut session, &commands(&["sysname core-1"])).await;

        assert_eq!(result.status, SessionStatus::Success);
        assert_eq!(
            steps(&result),
            [
                Step::EnterConfig,
                Step::Command,
                Step::Commit,
                Step::Exit,
                Step::PromptBefore,
                Step::PromptAfter,
            ]
        );
        assert_eq!(result.prompt_before.as_deref(), Some("<HUAWEI>"));
        assert_eq!(result.new_prompt.as_deref(), Some("<core-1>"));
        assert_eq!(
            session.calls(),
            [
                Call::CapturePrompt,
                Call::Timed("system-view".into()),
                Call::Timed("sysname core-1".into()),
                Call::Timed("commit".into()),
                Call::Timed("return".into()),
                Call::CapturePrompt,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_attempted_after_failed_lines() {
        let script = MockScript::new("<HUAWEI>")
            .output("undo bogus", "undo bogus\nError: Unrecognized command found at '^' position.\n[~HUAWEI]")
            .fail_timed("ospf 1", Failure::Timeout);
        let mut session = MockSession::new(script);

        let result = vrp8()
            .apply(&mut session, &commands(&["undo bogus", "ospf 1", "area 0"]))
            .await;

        assert_eq!(result.status, SessionStatus::PartialFailure);
        assert_eq!(result.failed_commands().count(), 2);
        assert!(session.calls().contains(&Call::Timed("area 0".into())));
        assert!(session.calls().contains(&Call::Timed("commit".into())));
        assert!(result.states.contains(&DriverState::Committing));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_config_entry_skips_commit() {
        let script = MockScript::new("<HUAWEI>").fail_timed("system-view", Failure::Closed);
        let mut session = MockSession::new(script);

        let result = vrp8().apply(&mut session, &commands(&["sysname core-1"])).await;

        assert_eq!(result.status, SessionStatus::Fatal);
        assert!(!result.states.contains(&DriverState::Committing));
        assert!(!session.calls().contains(&Call::Timed("commit".into())));
        assert_eq!(steps(&result), [Step::EnterConfig, Step::Recovery]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_config_entry_is_fatal() {
        let script = MockScript::new("<HUAWEI>")
            .output("system-view", "system-view\nError: Too many parameters found.\n<HUAWEI>");
        let mut session = MockSession::new(script);

        let result = vrp8().apply(&mut session, &commands(&["sysname core-1"])).await;

        assert_eq!(result.status, SessionStatus::Fatal);
        assert!(result.last_error().unwrap().contains("configuration mode"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_fallback_success() {
        let script = MockScript::new("<HUAWEI>").fail_timed("commit", Failure::Timeout);
        let mut session = MockSession::new(script);

        let result = vrp8().apply(&mut session, &commands(&["ntp unicast-server 192.0.2.10"])).await;

        assert_eq!(result.status, SessionStatus::Success);
        let primary = result.entries(Step::Commit).next().unwrap();
        assert!(primary.outcome.is_failed());
        let fallback = result.entries(Step::CommitFallback).next().unwrap();
        assert_eq!(fallback.outcome, Outcome::Ok);
        assert_eq!(fallback.output, "commit\n<HUAWEI>");
        assert!(
            result
                .notes
                .iter()
                .any(|n| n.level == NoteLevel::Warning && n.message.contains("fallback"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_primary_output_is_recorded() {
        let script = MockScript::new("<HUAWEI>").output("commit", "commit\n[~HUAWEI]");
        let mut session = MockSession::new(script);

        let result = vrp8().apply(&mut session, &commands(&["ntp unicast-server 192.0.2.10"])).await;

        assert_eq!(result.entries(Step::Commit).next().unwrap().output, "commit\n[~HUAWEI]");
        assert_eq!(result.entries(Step::CommitFallback).count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_fails_twice_is_fatal() {
        let script = MockScript::new("<HUAWEI>")
            .fail_timed("commit", Failure::Timeout)
            .fail_expect("commit", Failure::Timeout);
        let mut session = MockSession::new(script);

        let result = vrp8().apply(&mut session, &commands(&["sysname core-1"])).await;

        assert_eq!(result.status, SessionStatus::Fatal);
        assert_eq!(
            steps(&result),
            [
                Step::EnterConfig,
                Step::Command,
                Step::Commit,
                Step::CommitFallback,
                Step::Recovery,
            ]
        );
        assert_eq!(result.states.last(), Some(&DriverState::Fatal));
        assert!(result.states.contains(&DriverState::Recovering));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_rejected_twice_is_fatal() {
        let script = MockScript::new("<HUAWEI>")
            .output("commit", "commit\nError: The configuration fails to be committed.\n[*HUAWEI]");
        let mut session = MockSession::new(script);

        let result = vrp8().apply(&mut session, &commands(&["sysname core-1"])).await;

        assert_eq!(result.status, SessionStatus::Fatal);
        assert!(result.entries(Step::CommitFallback).next().unwrap().outcome.is_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_failure_is_a_warning() {
        let script = MockScript::new("<HUAWEI>").fail_timed("return", Failure::Closed);
        let mut session = MockSession::new(script);

        let result = vrp8().apply(&mut session, &commands(&["ntp unicast-server 192.0.2.10"])).await;

        assert_eq!(result.status, SessionStatus::Success);
        let exit = result.entries(Step::Exit).next().unwrap();
        assert!(matches!(exit.outcome, Outcome::Warning(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_list_same_states() {
        let list = commands(&["interface GE0/0/1", "undo bogus", "sysname core-1"]);
        let script = MockScript::new("<HUAWEI>")
            .then_prompt("<core-1>")
            .output("undo bogus", "Error: Unrecognized command");

        let mut first = MockSession::new(script.clone());
        let mut second = MockSession::new(script);
        let a = vrp8().apply(&mut first, &list).await;
        let b = vrp8().apply(&mut second, &list).await;

        assert_eq!(a.states, b.states);
        assert_eq!(a.status, b.status);
        assert_eq!(first.calls(), second.calls());
    }

    #[tokio::test(start_paused = true)]
    async fn test_junos_uses_its_own_vocabulary() {
        let driver = StagedCommitDriver::new(
            VendorId::JuniperJunos,
            juniper_junos::syntax(),
            TimingPolicy::instant(),
        );
        let script = MockScript::new("admin@edge-1>").then_prompt("admin@edge-2>");
        let mut session = MockSession::new(script);

        let result = driver
            .apply(&mut session, &commands(&["set system host-name edge-2"]))
            .await;

        assert_eq!(result.status, SessionStatus::Success);
        assert_eq!(result.new_prompt.as_deref(), Some("admin@edge-2>"));
        let calls = session.calls();
        assert_eq!(calls[1], Call::Timed("configure".into()));
        assert!(calls.contains(&Call::Timed("exit configuration-mode".into())));
    }
}
