//! Vendor id to driver dispatch table.

use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info};

use super::{TimingPolicy, VendorDriver};
use crate::error::{Result, VendorError};
use crate::platform::{SyntaxSpec, VendorId, VendorSyntax};

/// Maps each vendor id to exactly one driver.
#[derive(Debug, Clone)]
pub struct DriverRegistry {
    timing: TimingPolicy,
    drivers: IndexMap<VendorId, VendorDriver>,
}

impl DriverRegistry {
    /// Create an empty registry. Drivers added through overrides use `timing`.
    pub fn new(timing: TimingPolicy) -> Self {
        Self {
            timing,
            drivers: IndexMap::new(),
        }
    }

    /// Create a registry with a driver for every built-in vendor.
    pub fn builtin(timing: TimingPolicy) -> Result<Self> {
        let mut registry = Self::new(timing);
        for vendor in VendorId::ALL {
            let driver = VendorDriver::new(vendor, vendor.builtin_syntax(), registry.timing.clone())?;
            registry.register(driver)?;
        }
        Ok(registry)
    }

    /// Register a driver. Each vendor id can only be registered once.
    pub fn register(&mut self, driver: VendorDriver) -> Result<()> {
        let vendor = driver.vendor();
        if self.drivers.contains_key(&vendor) {
            return Err(VendorError::AlreadyRegistered {
                vendor: vendor.to_string(),
            }
            .into());
        }
        debug!("registered {} driver for {}", driver.family(), vendor);
        self.drivers.insert(vendor, driver);
        Ok(())
    }

    /// Register a driver, returning the one it replaced.
    pub fn replace(&mut self, driver: VendorDriver) -> Option<VendorDriver> {
        self.drivers.insert(driver.vendor(), driver)
    }

    /// Driver for `vendor`.
    pub fn get(&self, vendor: VendorId) -> Result<&VendorDriver> {
        self.drivers.get(&vendor).ok_or_else(|| {
            VendorError::UnknownVendor {
                vendor: vendor.to_string(),
            }
            .into()
        })
    }

    pub fn contains(&self, vendor: VendorId) -> bool {
        self.drivers.contains_key(&vendor)
    }

    /// Registered vendor ids, in registration order.
    pub fn vendors(&self) -> impl Iterator<Item = VendorId> + '_ {
        self.drivers.keys().copied()
    }

    pub fn timing(&self) -> &TimingPolicy {
        &self.timing
    }

    /// Replace syntax tables from a YAML map of vendor id to table.
    ///
    /// Every table is validated before any driver is replaced. Returns the
    /// number of drivers replaced.
    pub fn overrides_from_yaml(&mut self, yaml: &str) -> Result<usize> {
        let specs: IndexMap<VendorId, SyntaxSpec> = serde_yaml::from_str(yaml).map_err(VendorError::from)?;

        let mut drivers = Vec::with_capacity(specs.len());
        for (vendor, spec) in specs {
            let syntax = VendorSyntax::from_spec(vendor.as_str(), spec)?;
            drivers.push(VendorDriver::new(vendor, syntax, self.timing.clone())?);
        }

        let count = drivers.len();
        for driver in drivers {
            info!("using syntax override for {}", driver.vendor());
            self.replace(driver);
        }
        Ok(count)
    }

    /// Replace syntax tables from a YAML file.
    pub fn load_overrides(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| VendorError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.overrides_from_yaml(&yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::platform::DriverFamily;
    use tokio_test::{assert_err, assert_ok};

    const OVERRIDE: &str = r#"
huawei_vrp5:
  family: staged_commit
  config_enter: system-view
  commit: commit
  mode_exit: return
  prompt_pattern: '(?m)^[<\[][~*]?[\w\-.:/@]{1,63}[>\]]\s*$'
  hostname_keywords: [sysname]
  failure_markers: ["Error:"]
"#;

    #[test]
    fn test_builtin_registers_every_vendor() {
        let registry = DriverRegistry::builtin(TimingPolicy::default()).unwrap();
        assert_eq!(registry.vendors().collect::<Vec<_>>(), VendorId::ALL);
        assert_eq!(
            registry.get(VendorId::HuaweiVrp5).unwrap().family(),
            DriverFamily::ImmediateCommit
        );
    }

    #[test]
    fn test_unknown_vendor() {
        let registry = DriverRegistry::new(TimingPolicy::default());
        let err = registry.get(VendorId::JuniperJunos).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownVendor);
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = DriverRegistry::builtin(TimingPolicy::default()).unwrap();
        let driver = registry.get(VendorId::HuaweiVrp8).unwrap().clone();
        assert_err!(registry.register(driver.clone()));
        assert!(registry.replace(driver).is_some());
    }

    #[test]
    fn test_yaml_override_replaces_driver() {
        let mut registry = DriverRegistry::builtin(TimingPolicy::default()).unwrap();
        assert_eq!(assert_ok!(registry.overrides_from_yaml(OVERRIDE)), 1);

        let driver = registry.get(VendorId::HuaweiVrp5).unwrap();
        assert_eq!(driver.family(), DriverFamily::StagedCommit);
        assert_eq!(driver.syntax().commit.as_deref(), Some("commit"));
    }

    #[test]
    fn test_invalid_override_changes_nothing() {
        let mut registry = DriverRegistry::builtin(TimingPolicy::default()).unwrap();
        let yaml = "huawei_vrp5:\n  family: staged_commit\n  prompt_pattern: '>'\n";
        assert_err!(registry.overrides_from_yaml(yaml));
        assert_eq!(
            registry.get(VendorId::HuaweiVrp5).unwrap().family(),
            DriverFamily::ImmediateCommit
        );

        assert_err!(registry.overrides_from_yaml("cisco_ios: {}"));
    }

    #[test]
    fn test_missing_override_file() {
        let mut registry = DriverRegistry::new(TimingPolicy::default());
        assert_err!(registry.load_overrides("/nonexistent/netpush-syntax.yaml"));
    }
}
