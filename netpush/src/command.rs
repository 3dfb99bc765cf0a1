//! Ordered configuration command lists.

use serde::Serialize;

use crate::error::{DriverError, Result};

/// Configuration lines to push to one device, in the order they are sent.
///
/// Every line is non-empty. The list cannot be changed once built; drivers
/// replay it exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ConfigCommandList {
    commands: Vec<String>,
}

impl ConfigCommandList {
    /// Build a list, rejecting blank lines.
    pub fn new(commands: Vec<String>) -> Result<Self> {
        if let Some(index) = commands.iter().position(|c| c.trim().is_empty()) {
            return Err(DriverError::InvalidCommands {
                message: format!("line {} is blank", index + 1),
            }
            .into());
        }
        Ok(Self { commands })
    }

    /// Build a list from rendered configuration text: each line is trimmed
    /// and blank lines are dropped.
    pub fn from_rendered(text: &str) -> Self {
        Self {
            commands: text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Whether any command contains one of `keywords`.
    pub fn changes_hostname(&self, keywords: &[String]) -> bool {
        self.commands
            .iter()
            .any(|command| keywords.iter().any(|k| command.contains(k.as_str())))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.commands.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl<'a> IntoIterator for &'a ConfigCommandList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
