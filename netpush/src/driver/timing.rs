//! Settle intervals and step timeouts.

use std::time::Duration;

/// Timing used by the drivers.
///
/// Device CLIs do not reliably say when a step inside a configuration
/// transaction is finished, so most steps send a line and collect output
/// until the channel has been quiet for a settle interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingPolicy {
    /// Quiet period for ordinary timed sends.
    pub settle: Duration,

    /// Wait after entering configuration mode.
    pub config_entry_wait: Duration,

    /// Pause between configuration lines on staged-commit devices.
    pub inter_command_delay: Duration,

    /// Quiet period after `commit`. Commits can take several seconds.
    pub commit_settle: Duration,

    /// Bound for the prompt-expecting commit retry.
    pub commit_fallback_timeout: Duration,

    /// Quiet period after leaving configuration mode.
    pub exit_wait: Duration,

    /// Wait before re-reading the prompt after a hostname change.
    pub hostname_settle: Duration,

    /// Same, on staged-commit devices where the change lands at commit.
    pub staged_hostname_settle: Duration,

    /// Bound for a whole configuration block on immediate-commit devices.
    pub block_timeout: Duration,

    /// Bound for the save command and its confirmation.
    pub save_timeout: Duration,

    /// Quiet period for the best-effort exit during recovery.
    pub recovery_settle: Duration,

    /// Hard bound on the recovery step.
    pub recovery_timeout: Duration,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            config_entry_wait: Duration::from_secs(2),
            inter_command_delay: Duration::from_secs(1),
            commit_settle: Duration::from_secs(4),
            commit_fallback_timeout: Duration::from_secs(20),
            exit_wait: Duration::from_secs(1),
            hostname_settle: Duration::from_secs(2),
            staged_hostname_settle: Duration::from_secs(3),
            block_timeout: Duration::from_secs(15),
            save_timeout: Duration::from_secs(10),
            recovery_settle: Duration::from_secs(1),
            recovery_timeout: Duration::from_secs(5),
        }
    }
}

impl TimingPolicy {
    /// A policy with every sleep and settle interval set to zero.
    ///
    /// Timeouts keep their default values.
    pub fn instant() -> Self {
        Self {
            settle: Duration::ZERO,
            config_entry_wait: Duration::ZERO,
            inter_command_delay: Duration::ZERO,
            commit_settle: Duration::ZERO,
            exit_wait: Duration::ZERO,
            hostname_settle: Duration::ZERO,
            staged_hostname_settle: Duration::ZERO,
            recovery_settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_settle_outlasts_plain_settle() {
        let timing = TimingPolicy::default();
        assert!(timing.commit_settle > timing.settle);
        assert!(timing.staged_hostname_settle > timing.hostname_settle);
        assert!(timing.commit_fallback_timeout > timing.commit_settle);
    }

    #[test]
    fn test_instant_keeps_timeouts() {
        let timing = TimingPolicy::instant();
        assert!(timing.settle.is_zero());
        assert_eq!(timing.block_timeout, TimingPolicy::default().block_timeout);
    }
}
