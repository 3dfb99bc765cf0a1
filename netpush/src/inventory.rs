//! Device inventory.
//!
//! The inventory is a YAML document with a top-level `devices:` list:
//!
//! ```yaml
//! devices:
//!   - name: core-1
//!     host: 192.0.2.1
//!     vendor: huawei_vrp8
//!     device_type: huawei_vrpv8
//!     username: admin
//!     password: secret
//!     port: 22
//!     conn_timeout: 15
//!     template: core.j2
//! ```
//!
//! Keys the core has no use for, such as the `template` the renderer reads,
//! are ignored. Entries are read loosely so that [`Inventory::validate`] can report every
//! problem at once instead of stopping at the first missing field.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::{Error, InventoryError, Result};
use crate::platform::VendorId;
use crate::transport::{AuthMethod, SshConfig};

/// One device, with everything needed to reach it.
pub struct DeviceDescriptor {
    /// Unique inventory name.
    pub name: String,
    pub host: String,
    pub vendor: VendorId,
    /// Device type string, as the inventory spells it.
    pub device_type: String,
    pub username: String,
    pub password: Option<SecretString>,
    pub key_file: Option<PathBuf>,
    pub port: Option<u16>,
    /// Connection and login timeout.
    pub conn_timeout: Option<Duration>,
    /// Read timeout for the interactive session.
    pub timeout: Option<Duration>,
}

impl DeviceDescriptor {
    /// SSH settings for this device.
    ///
    /// A password wins over a key file when both are present.
    pub fn ssh_config(&self) -> SshConfig {
        let auth = match (&self.password, &self.key_file) {
            (Some(password), _) => AuthMethod::Password(copy_secret(password)),
            (None, Some(path)) => AuthMethod::PrivateKey {
                path: path.clone(),
                passphrase: None,
            },
            (None, None) => AuthMethod::None,
        };

        let mut config = SshConfig::new(self.host.clone(), self.username.clone(), auth);
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(timeout) = self.conn_timeout {
            config.timeout = timeout;
        }
        if let Some(timeout) = self.timeout {
            config.read_timeout = timeout;
        }
        config
    }
}

impl Clone for DeviceDescriptor {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            host: self.host.clone(),
            vendor: self.vendor,
            device_type: self.device_type.clone(),
            username: self.username.clone(),
            password: self.password.as_ref().map(copy_secret),
            key_file: self.key_file.clone(),
            port: self.port,
            conn_timeout: self.conn_timeout,
            timeout: self.timeout,
        }
    }
}

impl fmt::Debug for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceDescriptor")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("vendor", &self.vendor)
            .field("device_type", &self.device_type)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_file", &self.key_file)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

fn copy_secret(secret: &SecretString) -> SecretString {
    SecretString::from(secret.expose_secret().to_owned())
}

/// An inventory entry as written, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
struct DeviceRecord {
    name: Option<String>,
    host: Option<String>,
    vendor: Option<String>,
    device_type: Option<String>,
    username: Option<String>,
    password: Option<String>,
    key_file: Option<PathBuf>,
    port: Option<i64>,
    conn_timeout: Option<u64>,
    timeout: Option<u64>,
}

impl DeviceRecord {
    fn label(&self, index: usize) -> String {
        format!(
            "Device #{} ({})",
            index + 1,
            self.name.as_deref().unwrap_or("UNNAMED")
        )
    }

    /// Convert to a descriptor, or every problem with this entry.
    fn descriptor(&self, index: usize) -> std::result::Result<DeviceDescriptor, Vec<String>> {
        let label = self.label(index);
        let mut errors = Vec::new();

        let mut required = |field: &str, value: &Option<String>| -> String {
            match value.as_deref().map(str::trim) {
                Some(value) if !value.is_empty() => value.to_string(),
                _ => {
                    errors.push(format!("{}: Missing required field '{}'", label, field));
                    String::new()
                }
            }
        };
        let name = required("name", &self.name);
        let host = required("host", &self.host);
        let vendor = required("vendor", &self.vendor);
        let device_type = required("device_type", &self.device_type);
        let username = required("username", &self.username);

        let vendor = match vendor.parse::<VendorId>() {
            Ok(vendor) => Some(vendor),
            Err(_) if vendor.is_empty() => None,
            Err(_) => {
                errors.push(format!("{}: Unknown vendor '{}'", label, vendor));
                None
            }
        };

        let password = self.password.as_deref().filter(|p| !p.is_empty());
        if password.is_none() && self.key_file.is_none() {
            errors.push(format!(
                "{}: Missing required field 'password' (or 'key_file')",
                label
            ));
        }

        let port = match self.port {
            None => None,
            Some(port) => match u16::try_from(port) {
                Ok(port) if port != 0 => Some(port),
                _ => {
                    errors.push(format!("{}: Invalid port {}", label, port));
                    None
                }
            },
        };

        for (field, value) in [("conn_timeout", self.conn_timeout), ("timeout", self.timeout)] {
            if value == Some(0) {
                errors.push(format!("{}: '{}' must be positive", label, field));
            }
        }

        match vendor {
            Some(vendor) if errors.is_empty() => Ok(DeviceDescriptor {
                name,
                host,
                vendor,
                device_type,
                username,
                password: password.map(|p| SecretString::from(p.to_owned())),
                key_file: self.key_file.clone(),
                port,
                conn_timeout: self.conn_timeout.map(Duration::from_secs),
                timeout: self.timeout.map(Duration::from_secs),
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    devices: Vec<DeviceRecord>,
}

/// Problems found by [`Inventory::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Problems that make an entry unusable.
    pub errors: Vec<String>,
    /// Suspicious but usable entries.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A parsed device inventory.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    records: Vec<DeviceRecord>,
}

impl Inventory {
    /// Parse an inventory document. Only YAML syntax is checked here.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: InventoryFile = serde_yaml::from_str(yaml).map_err(InventoryError::from)?;
        Ok(Self {
            records: file.devices,
        })
    }

    /// Read and parse an inventory file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| InventoryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&yaml)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Check every entry and the inventory as a whole.
    ///
    /// Duplicate names are errors, duplicate hosts are warnings.
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();
        let mut names = HashSet::new();
        let mut hosts = HashSet::new();

        for (index, record) in self.records.iter().enumerate() {
            if let Err(errors) = record.descriptor(index) {
                report.errors.extend(errors);
            }
            if let Some(name) = record.name.as_deref().filter(|n| !n.is_empty()) {
                if !names.insert(name) {
                    report.errors.push(format!(
                        "{}: Duplicate device name '{}'",
                        record.label(index),
                        name
                    ));
                }
            }
            if let Some(host) = record.host.as_deref().filter(|h| !h.is_empty()) {
                if !hosts.insert(host) {
                    report.warnings.push(format!(
                        "{}: Duplicate host '{}'",
                        record.label(index),
                        host
                    ));
                }
            }
        }
        report
    }

    /// All devices, in inventory order. Fails if validation finds errors.
    pub fn devices(&self) -> Result<Vec<DeviceDescriptor>> {
        let report = self.validate();
        for warning in &report.warnings {
            warn!("{}", warning);
        }
        if !report.is_ok() {
            return Err(InventoryError::Invalid {
                errors: report.errors,
            }
            .into());
        }
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                record
                    .descriptor(index)
                    .map_err(|errors| Error::from(InventoryError::Invalid { errors }))
            })
            .collect()
    }

    /// The device named `name`.
    pub fn get(&self, name: &str) -> Result<DeviceDescriptor> {
        let (index, record) = self
            .records
            .iter()
            .enumerate()
            .find(|(_, record)| record.name.as_deref() == Some(name))
            .ok_or_else(|| InventoryError::DeviceNotFound {
                name: name.to_string(),
            })?;
        record
            .descriptor(index)
            .map_err(|errors| Error::from(InventoryError::Invalid { errors }))
    }
}
