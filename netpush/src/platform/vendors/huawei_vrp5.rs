//! Huawei VRP 5 syntax table.
//!
//! VRP 5 applies each configuration line as soon as it is accepted in
//! system view; there is no candidate configuration. Changes survive a reload
//! only after `save`, which asks for confirmation.
//!
//! # Prompt Examples
//!
//! ```text
//! <HUAWEI>                          # user view
//! [HUAWEI]                          # system view
//! [HUAWEI-GigabitEthernet0/0/1]     # interface view
//! [HUAWEI-ui-vty0 4]                # view names may contain spaces
//! ```

use crate::platform::{DriverFamily, VendorSyntax};

/// Vendor name for Huawei VRP 5.
pub const VENDOR_NAME: &str = "huawei_vrp5";

/// Prompt pattern shared by the VRP releases.
///
/// Matches `<name>` and `[name]`, the `~`/`*` markers VRP 8 adds in
/// two-stage mode, and sub-view suffixes.
pub(crate) const VRP_PROMPT: &str = r"(?m)^[<\[][~*]?[\w\-.:/@]{1,63}(?:-[^\]\r\n]*)?[>\]]\s*$";

/// Markers VRP prints when it rejects a line.
pub(crate) const VRP_FAILURE_MARKERS: [&str; 5] = [
    "Error:",
    "Unrecognized command",
    "Incomplete command",
    "Wrong parameter",
    "Too many parameters",
];

/// Create the Huawei VRP 5 syntax table.
pub fn syntax() -> VendorSyntax {
    let mut syntax = VendorSyntax::new(VENDOR_NAME, DriverFamily::ImmediateCommit, VRP_PROMPT)
        .unwrap()
        .with_config_enter("system-view")
        .with_mode_exit("return")
        .with_save("save", r"[Yy]/[Nn]", "Y")
        .unwrap()
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
    fn test_vrp5_syntax() {
        let syntax = syntax();
        assert_eq!(syntax.name, "huawei_vrp5");
        assert_eq!(syntax.family, DriverFamily::ImmediateCommit);
        assert_eq!(syntax.config_enter.as_deref(), Some("system-view"));
        assert_eq!(syntax.mode_exit.as_deref(), Some("return"));
        assert_eq!(syntax.save.as_deref(), Some("save"));
        assert!(syntax.commit.is_none());
        assert!(syntax.changes_hostname("sysname core-1"));
    }

    #[test]
    fn test_prompt_match() {
        let prompt = syntax().prompt_pattern;

        assert!(prompt.is_match(b"<HUAWEI>"));
        assert!(prompt.is_match(b"<core-1> "));
        assert!(prompt.is_match(b"[HUAWEI]"));
        assert!(prompt.is_match(b"[HUAWEI-GigabitEthernet0/0/1]"));
        assert!(prompt.is_match(b"[HUAWEI-ui-vty0 4]"));
        assert!(prompt.is_match(b"save\r\nSave the configuration successfully.\r\n<HUAWEI>"));

        assert!(!prompt.is_match(b"Are you sure to continue?[Y/N]:"));
        assert!(!prompt.is_match(b"display version"));
    }

    #[test]
    fn test_save_confirmation() {
        let syntax = syntax();
        let confirm = syntax.save_confirm.as_ref().unwrap();
        assert!(confirm.is_match(b"Are you sure to continue?[Y/N]:"));
        assert!(confirm.is_match(b"continue? [y/n]"));
        assert_eq!(syntax.save_answer, "Y");
    }

    #[test]
    fn test_failure_markers() {
        let syntax = syntax();
        assert_eq!(
            syntax.detect_failure("Error: Unrecognized command found at '^' position."),
            Some("Error:")
        );
        assert_eq!(syntax.detect_failure("Info: Succeeded."), None);
    }
}
