//! Huawei VRP 8 syntax table.
//!
//! VRP 8 defaults to two-stage configuration: lines entered in system view
//! are staged (the prompt gains a `*`) and only take effect on `commit`.
//!
//! # Prompt Examples
//!
//! ```text
//! <HUAWEI>          # user view
//! [~HUAWEI]         # system view, nothing pending
//! [*HUAWEI]         # system view, uncommitted changes
//! [*HUAWEI-100GE1/0/1]
//! ```

use super::huawei_vrp5::{VRP_FAILURE_MARKERS, VRP_PROMPT};
use crate::platform::{DriverFamily, VendorSyntax};

/// Vendor name for Huawei VRP 8.
pub const VENDOR_NAME: &str = "huawei_vrp8";

/// Create the Huawei VRP 8 syntax table.
pub fn syntax() -> VendorSyntax {
    let mut syntax = VendorSyntax::new(VENDOR_NAME, DriverFamily::StagedCommit, VRP_PROMPT)
        .unwrap()
        .with_config_enter("system-view")
        .with_commit("commit")
        .with_mode_exit("return")
        .with_hostname_keyword("sysname")
        .with_on_open_command("screen-length 0 temporary");

    for marker in VRP_FAILURE_MARKERS {
        syntax = syntax.with_failure_marker(marker);
    }
    syntax
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vrp8_syntax() {
        let syntax = syntax();
        assert_eq!(syntax.name, "huawei_vrp8");
        assert_eq!(syntax.family, DriverFamily::StagedCommit);
        assert_eq!(syntax.config_enter.as_deref(), Some("system-view"));
        assert_eq!(syntax.commit.as_deref(), Some("commit"));
        assert_eq!(syntax.mode_exit.as_deref(), Some("return"));
        assert!(syntax.save.is_none());
        assert!(syntax.validate().is_ok());
    }

    #[test]
    fn test_two_stage_prompts() {
        let prompt = syntax().prompt_pattern;
        assert!(prompt.is_match(b"[~HUAWEI]"));
        assert!(prompt.is_match(b"[*HUAWEI]"));
        assert!(prompt.is_match(b"[*HUAWEI-100GE1/0/1]"));
        assert!(prompt.is_match(b"<core-1>"));
    }

    #[test]
    fn test_commit_failure_detected() {
        let syntax = syntax();
        assert!(
            syntax
                .detect_failure("Error: The configuration fails to be committed.")
                .is_some()
        );
    }
}
