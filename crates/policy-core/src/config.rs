//! Main configuration
//!
//! The main configuration names the policy and state directories and maps
//! every policy type to its document file:
//!
//! ```yaml
//! general:
//!   policy-path: /etc/policy/policy
//!   state-path: /var/lib/policy/state
//! policy:
//!   groups: groups.yaml
//!   services: services.yaml
//! modules:
//!   pam: { directory: /etc/pam.d }
//! ```
//!
//! Relative paths are resolved against the directory holding the
//! configuration file.

use crate::error::{Error, Result};
use crate::tree::walk;
use policy_fs::{NormalizedPath, load_document};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Keys that must be present, in the order they are checked.
const REQUIRED_KEYS: &[&[&str]] = &[
    &["general"],
    &["general", "policy-path"],
    &["general", "state-path"],
    &["policy"],
];

/// Location of the configuration relative to the working directory.
const LOCAL_CONFIG: &str = "config/main.yaml";

/// The `general` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(rename = "policy-path")]
    pub policy_path: String,
    #[serde(rename = "state-path")]
    pub state_path: String,
}

/// Parsed main configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainConfig {
    pub general: GeneralConfig,
    /// Policy type -> document file name
    pub policy: BTreeMap<String, String>,
    /// Per-module settings
    #[serde(default)]
    pub modules: BTreeMap<String, Value>,
    #[serde(skip)]
    base_dir: Option<NormalizedPath>,
}

impl MainConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &NormalizedPath) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::ConfigNotFound {
                path: path.to_native(),
            });
        }
        let value: Value = load_document(path)?.unwrap_or(Value::Null);
        let config = Self::from_value(value, path.parent())?;
        tracing::debug!(path = %path, policies = config.policy.len(), "Loaded main configuration");
        Ok(config)
    }

    /// Validate and deserialize an in-memory configuration.
    ///
    /// `base_dir` anchors relative paths; `None` leaves them as written.
    pub fn from_value(value: Value, base_dir: Option<NormalizedPath>) -> Result<Self> {
        let Some(root) = value.as_object() else {
            return Err(Error::InvalidConfig {
                message: "configuration root must be a mapping".into(),
            });
        };
        for key in REQUIRED_KEYS {
            if walk(root, key).is_none() {
                return Err(Error::MissingConfigKey { key: key.join(".") });
            }
        }

        let mut config: Self = serde_json::from_value(value).map_err(|e| Error::InvalidConfig {
            message: e.to_string(),
        })?;
        config.base_dir = base_dir;
        Ok(config)
    }

    /// Find the configuration file.
    ///
    /// An explicit path wins; otherwise `./config/main.yaml`, then
    /// `main.yaml` in the user configuration directory.
    pub fn locate(explicit: Option<&Path>) -> Result<NormalizedPath> {
        if let Some(path) = explicit {
            return Ok(NormalizedPath::new(path));
        }

        let local = NormalizedPath::new(LOCAL_CONFIG);
        if local.is_file() {
            return Ok(local);
        }

        let global = dirs::config_dir()
            .map(|dir| dir.join("policy").join("main.yaml"))
            .unwrap_or_else(|| PathBuf::from(LOCAL_CONFIG));
        let global = NormalizedPath::new(global);
        if global.is_file() {
            Ok(global)
        } else {
            Err(Error::ConfigNotFound {
                path: local.to_native(),
            })
        }
    }

    fn resolve(&self, path: &str) -> NormalizedPath {
        match &self.base_dir {
            Some(base) => base.join(path),
            None => NormalizedPath::new(path),
        }
    }

    /// Directory holding the policy documents.
    pub fn policy_dir(&self) -> NormalizedPath {
        self.resolve(&self.general.policy_path)
    }

    /// Directory holding the state documents.
    pub fn state_dir(&self) -> NormalizedPath {
        self.resolve(&self.general.state_path)
    }

    /// Settings of one module, if configured.
    pub fn module_settings(&self, module: &str) -> Option<&Value> {
        self.modules.get(module)
    }

    /// A string setting of one module.
    pub fn module_setting_str(&self, module: &str, key: &str) -> Option<&str> {
        self.module_settings(module)
            .and_then(|settings| settings.get(key))
            .and_then(Value::as_str)
    }
}
