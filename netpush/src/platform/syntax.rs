//! Vendor syntax tables.
//!
//! A [`VendorSyntax`] holds every vendor-specific string the drivers need:
//! how to enter and leave configuration mode, how to commit or save, what
//! the prompt looks like, which commands rename the device, and which output
//! markers mean a command was rejected. Driver logic is vendor-agnostic given
//! this table; only [`DriverFamily`] selects the state machine.
//!
//! Tables are built in code for the supported vendors and can be replaced
//! from YAML (see [`SyntaxSpec`]).

use regex::bytes::Regex;
use serde::Deserialize;

use super::DriverFamily;
use crate::error::{ChannelError, Result, VendorError};

/// Per-vendor CLI vocabulary consumed by the drivers.
#[derive(Debug, Clone)]
pub struct VendorSyntax {
    /// Vendor name, used in logs and errors.
    pub name: String,

    /// Which state machine drives this vendor.
    pub family: DriverFamily,

    /// Command that enters configuration mode.
    pub config_enter: Option<String>,

    /// Command that commits the candidate configuration.
    pub commit: Option<String>,

    /// Command that leaves configuration mode.
    pub mode_exit: Option<String>,

    /// Command that persists the running configuration.
    pub save: Option<String>,

    /// Pattern of the yes/no question the save command may ask.
    pub save_confirm: Option<Regex>,

    /// Answer sent to the save confirmation.
    pub save_answer: String,

    /// Substrings that mark a command as a hostname change.
    pub hostname_keywords: Vec<String>,

    /// Pattern matching the device prompt in any mode.
    pub prompt_pattern: Regex,

    /// Output substrings that mean the device rejected a command.
    pub failure_markers: Vec<String>,

    /// Commands sent right after login (paging off and similar).
    pub on_open_commands: Vec<String>,
}

impl VendorSyntax {
    /// Create a syntax table with only a name, family and prompt pattern.
    pub fn new(name: impl Into<String>, family: DriverFamily, prompt_pattern: &str) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            family,
            config_enter: None,
            commit: None,
            mode_exit: None,
            save: None,
            save_confirm: None,
            save_answer: "Y".to_string(),
            hostname_keywords: vec![],
            prompt_pattern: Regex::new(prompt_pattern).map_err(ChannelError::from)?,
            failure_markers: vec![],
            on_open_commands: vec![],
        })
    }

    /// Set the configuration-mode entry command.
    pub fn with_config_enter(mut self, command: impl Into<String>) -> Self {
        self.config_enter = Some(command.into());
        self
    }

    /// Set the commit command.
    pub fn with_commit(mut self, command: impl Into<String>) -> Self {
        self.commit = Some(command.into());
        self
    }

    /// Set the configuration-mode exit command.
    pub fn with_mode_exit(mut self, command: impl Into<String>) -> Self {
        self.mode_exit = Some(command.into());
        self
    }

    /// Set the save command and its confirmation handling.
    pub fn with_save(
        mut self,
        command: impl Into<String>,
        confirm_pattern: &str,
        answer: impl Into<String>,
    ) -> Result<Self> {
        self.save = Some(command.into());
        self.save_confirm = Some(Regex::new(confirm_pattern).map_err(ChannelError::from)?);
        self.save_answer = answer.into();
        Ok(self)
    }

    /// Add a hostname-change keyword.
    pub fn with_hostname_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.hostname_keywords.push(keyword.into());
        self
    }

    /// Add a failure marker.
    pub fn with_failure_marker(mut self, marker: impl Into<String>) -> Self {
        self.failure_markers.push(marker.into());
        self
    }

    /// Add a command to run after login.
    pub fn with_on_open_command(mut self, command: impl Into<String>) -> Self {
        self.on_open_commands.push(command.into());
        self
    }

    /// First failure marker found in `output`, if any.
    pub fn detect_failure(&self, output: &str) -> Option<&str> {
        self.failure_markers
            .iter()
            .find(|marker| output.contains(marker.as_str()))
            .map(String::as_str)
    }

    /// Whether `command` changes the device hostname.
    pub fn changes_hostname(&self, command: &str) -> bool {
        self.hostname_keywords
            .iter()
            .any(|keyword| command.contains(keyword.as_str()))
    }

    /// Pattern that ends a save command: either the confirmation question
    /// or the prompt when the device saves without asking.
    pub fn save_expect_pattern(&self) -> Result<Regex> {
        let pattern = match &self.save_confirm {
            Some(confirm) => format!(
                "(?:{})|(?:{})",
                confirm.as_str(),
                self.prompt_pattern.as_str()
            ),
            None => self.prompt_pattern.as_str().to_string(),
        };
        Ok(Regex::new(&pattern).map_err(ChannelError::from)?)
    }

    /// Lines actually written for a configuration block: the commands wrapped
    /// in the entry and exit commands when the table defines them.
    pub fn wrap_block(&self, commands: &[String]) -> Vec<String> {
        let mut lines = Vec::with_capacity(commands.len() + 2);
        lines.extend(self.config_enter.iter().cloned());
        lines.extend(commands.iter().cloned());
        lines.extend(self.mode_exit.iter().cloned());
        lines
    }

    /// Check that the table has what its family needs.
    pub fn validate(&self) -> Result<()> {
        let missing = |what: &str| -> Result<()> {
            Err(VendorError::InvalidSyntax {
                vendor: self.name.clone(),
                message: format!("{} family requires a {} command", self.family, what),
            }
            .into())
        };

        if self.family == DriverFamily::StagedCommit {
            if self.config_enter.is_none() {
                return missing("config-mode entry");
            }
            if self.commit.is_none() {
                return missing("commit");
            }
            if self.mode_exit.is_none() {
                return missing("mode-exit");
            }
        }
        if self.save.is_some() && self.save_answer.is_empty() {
            return Err(VendorError::InvalidSyntax {
                vendor: self.name.clone(),
                message: "save confirmation answer is empty".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Build a syntax table from its serialized form.
    pub fn from_spec(name: impl Into<String>, spec: SyntaxSpec) -> Result<Self> {
        let name = name.into();
        let mut syntax = Self::new(name, spec.family, &spec.prompt_pattern)?;
        syntax.config_enter = spec.config_enter;
        syntax.commit = spec.commit;
        syntax.mode_exit = spec.mode_exit;
        if let Some(save) = spec.save {
            let confirm = spec
                .save_confirm_pattern
                .unwrap_or_else(|| r"[Yy]/[Nn]".to_string());
            syntax = syntax.with_save(save, &confirm, spec.save_answer)?;
        }
        syntax.hostname_keywords = spec.hostname_keywords;
        syntax.failure_markers = spec.failure_markers;
        syntax.on_open_commands = spec.on_open_commands;
        syntax.validate()?;
        Ok(syntax)
    }
}

/// Serialized form of a [`VendorSyntax`], as read from YAML.
///
/// ```yaml
/// family: staged_commit
/// config_enter: system-view
/// commit: commit
/// mode_exit: return
/// prompt_pattern: '(?m)^[<\[][~*]?[\w\-.:/@]{1,63}[>\]]\s*$'
/// hostname_keywords: [sysname]
/// failure_markers: ["Error:"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SyntaxSpec {
    pub family: DriverFamily,
    #[serde(default)]
    pub config_enter: Option<String>,
    #[serde(default)]
    pub commit: Option<String>,
    #[serde(default)]
    pub mode_exit: Option<String>,
    #[serde(default)]
    pub save: Option<String>,
    #[serde(default)]
    pub save_confirm_pattern: Option<String>,
    #[serde(default = "default_save_answer")]
    pub save_answer: String,
    #[serde(default)]
    pub hostname_keywords: Vec<String>,
    pub prompt_pattern: String,
    #[serde(default)]
    pub failure_markers: Vec<String>,
    #[serde(default)]
    pub on_open_commands: Vec<String>,
}

fn default_save_answer() -> String {
    "Y".to_string()
}
