//! Driver for vendors where configuration takes effect as it is entered.

use log::debug;
use tokio::time::Instant;

use super::result::Recorder;
use super::{
    DriverState, NoteLevel, Outcome, SessionResult, SessionStatus, Step, TimingPolicy,
    capture_baseline, recover, reported_failure, verify_hostname,
};
use crate::command::ConfigCommandList;
use crate::platform::{VendorId, VendorSyntax};
use crate::session::Session;

/// Immediate-commit state machine.
///
/// The whole list goes out as one block, wrapped in the config-mode entry
/// and exit lines, followed by a save. Sending a block trades per-line
/// attribution for throughput: the transcript holds one entry for it.
#[derive(Debug, Clone)]
pub struct ImmediateCommitDriver {
    vendor: VendorId,
    syntax: VendorSyntax,
    timing: TimingPolicy,
}

impl ImmediateCommitDriver {
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

    /// Apply `commands`. Only a failed block send makes the run fatal.
    ///
    /// An empty list still sends the entry and exit lines and saves.
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

        recorder.enter(DriverState::ApplyingCommands);
        let lines = self.syntax.wrap_block(commands.as_slice());
        let block = commands.as_slice().join("\n");
        debug!("{}: sending {} line block", self.vendor, lines.len());

        let started = Instant::now();
        match session
            .send_block(&lines, self.timing.block_timeout, false)
            .await
        {
            Ok(output) => {
                let outcome = match reported_failure(&self.syntax, &output) {
                    Some(message) => {
                        recorder.note(
                            NoteLevel::Warning,
                            format!("configuration block: {}", message),
                        );
                        Outcome::Warning(message)
                    }
                    None => Outcome::Ok,
                };
                recorder.record(Step::Block, block, output, outcome, started.elapsed());
            }
            Err(e) => {
                recorder.record(
                    Step::Block,
                    block,
                    "",
                    Outcome::Failed(e.to_string()),
                    started.elapsed(),
                );
                recorder.note(
                    NoteLevel::Error,
                    format!("configuration block failed: {}", e),
                );
                recover(session, &self.syntax, &self.timing, recorder, &e).await;
                return SessionStatus::Fatal;
            }
        }

        if commands.changes_hostname(&self.syntax.hostname_keywords) {
            verify_hostname(session, recorder, self.timing.hostname_settle).await;
        }

        self.save(session, recorder).await;

        SessionStatus::Success
    }

    /// Persist the running configuration. Failures are warnings.
    async fn save<S: Session>(&self, session: &mut S, recorder: &mut Recorder) {
        let Some(save) = self.syntax.save.as_deref() else {
            return;
        };
        recorder.enter(DriverState::Saving);

        let pattern = match self.syntax.save_expect_pattern() {
            Ok(pattern) => pattern,
            Err(e) => {
                recorder.note(NoteLevel::Warning, format!("save skipped: {}", e));
                return;
            }
        };

        let started = Instant::now();
        let output = match session
            .send_line_expect(save, &pattern, self.timing.save_timeout)
            .await
        {
            Ok(output) => output,
            Err(e) => {
                recorder.record(
                    Step::Save,
                    save,
                    "",
                    Outcome::Warning(e.to_string()),
                    started.elapsed(),
                );
                recorder.note(NoteLevel::Warning, format!("save failed: {}", e));
                return;
            }
        };

        let asks_confirmation = self
            .syntax
            .save_confirm
            .as_ref()
            .is_some_and(|confirm| confirm.is_match(output.as_bytes()));
        let outcome = match reported_failure(&self.syntax, &output) {
            Some(message) => {
                recorder.note(NoteLevel::Warning, format!("save: {}", message));
                Outcome::Warning(message)
            }
            None => Outcome::Ok,
        };
        recorder.record(Step::Save, save, output, outcome, started.elapsed());

        if !asks_confirmation {
            return;
        }

        let answer = self.syntax.save_answer.as_str();
        let started = Instant::now();
        match session
            .send_line_expect(answer, &self.syntax.prompt_pattern, self.timing.save_timeout)
            .await
        {
            Ok(output) => {
                recorder.record(Step::SaveConfirm, answer, output, Outcome::Ok, started.elapsed());
            }
            Err(e) => {
                recorder.record(
                    Step::SaveConfirm,
                    answer,
                    "",
                    Outcome::Warning(e.to_string()),
                    started.elapsed(),
                );
                recorder.note(
                    NoteLevel::Warning,
                    format!("save confirmation not acknowledged: {}", e),
                );
            }
        }
    }
}
