//! Juniper JUNOS syntax table.
//!
//! JUNOS edits a candidate configuration entered with `configure`; nothing
//! takes effect until `commit`. Prompt patterns are adapted from scrapli.
//!
//! # Prompt Examples
//!
//! ```text
//! user@router>              # operational mode
//! [edit]
//! user@router#              # configuration mode
//! {master:0}
//! user@router>              # routing-engine indicator on its own line
//! ```

use crate::platform::{DriverFamily, VendorSyntax};

/// Vendor name for Juniper JUNOS.
pub const VENDOR_NAME: &str = "juniper_junos";

/// Create the Juniper JUNOS syntax table.
pub fn syntax() -> VendorSyntax {
    VendorSyntax::new(
        VENDOR_NAME,
        DriverFamily::StagedCommit,
        r"(?mi)^(\{\w+(:(\w+)?\d)?\}\n)?[\w\-@()/:\.]{1,63}[>#]\s*$",
    )
    .unwrap()
    .with_config_enter("configure")
    .with_commit("commit")
    .with_mode_exit("exit configuration-mode")
    .with_hostname_keyword("host-name")
    .with_failure_marker("unknown command")
    .with_failure_marker("syntax error")
    .with_failure_marker("error:")
    .with_failure_marker("missing argument")
    .with_failure_marker("is ambiguous")
    .with_failure_marker("No valid completions")
    .with_on_open_command("set cli screen-length 0")
    .with_on_open_command("set cli screen-width 511")
}
