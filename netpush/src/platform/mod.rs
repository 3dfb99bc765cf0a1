//! Vendor identities and syntax tables.
//!
//! This module defines what differs between vendors: the CLI vocabulary for
//! entering configuration, committing, saving and leaving, plus prompt
//! patterns and failure markers.

mod syntax;
pub mod vendors;

pub use syntax::{SyntaxSpec, VendorSyntax};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VendorError;

/// Supported vendor CLI dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorId {
    /// Huawei VRP 5: changes take effect on entry, persisted with `save`.
    HuaweiVrp5,
    /// Huawei VRP 8: two-stage configuration with explicit `commit`.
    HuaweiVrp8,
    /// Juniper JUNOS: candidate configuration with explicit `commit`.
    JuniperJunos,
}

impl VendorId {
    /// All vendor ids, in registration order.
    pub const ALL: [VendorId; 3] = [
        VendorId::HuaweiVrp5,
        VendorId::HuaweiVrp8,
        VendorId::JuniperJunos,
    ];

    /// Inventory spelling of this vendor id.
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorId::HuaweiVrp5 => "huawei_vrp5",
            VendorId::HuaweiVrp8 => "huawei_vrp8",
            VendorId::JuniperJunos => "juniper_junos",
        }
    }

    /// Built-in syntax table for this vendor.
    pub fn builtin_syntax(&self) -> VendorSyntax {
        match self {
            VendorId::HuaweiVrp5 => vendors::huawei_vrp5::syntax(),
            VendorId::HuaweiVrp8 => vendors::huawei_vrp8::syntax(),
            VendorId::JuniperJunos => vendors::juniper_junos::syntax(),
        }
    }
}

impl fmt::Display for VendorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorId {
    type Err = VendorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VendorId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| VendorError::UnknownVendor {
                vendor: s.to_string(),
            })
    }
}

/// Shape of the configuration state machine a vendor needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverFamily {
    /// Each line takes effect as it is accepted; no commit step.
    ImmediateCommit,
    /// Changes are staged and made effective by an explicit commit.
    StagedCommit,
}

impl fmt::Display for DriverFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverFamily::ImmediateCommit => f.write_str("immediate-commit"),
            DriverFamily::StagedCommit => f.write_str("staged-commit"),
        }
    }
}
