//! Service access rules in PAM stacks
//!
//! Each access attribute of a service becomes one tagged fragment in
//! `<pam dir>/<service>`, inserted before the first `account` line:
//!
//! ```text
//! ### BEGIN policy module pam -- groups_allow ###
//! account required pam_succeed_if.so quiet user ingroup admin:staff
//! ### END policy module pam -- groups_allow ###
//! ```

use crate::error::{Error, Result};
use crate::params::{required_str, string_list};
use policy_blocks::{FragmentTag, Placement, remove_fragment_from_file, upsert_fragment_in_file};
use policy_core::{
    AttributeDiff, Change, ChangeSet, ChangeState, ExecutionError, HandledAttributes, MainConfig,
    Module,
};
use policy_fs::NormalizedPath;
use serde_json::json;

pub const PAM_MODULE: &str = "pam";

/// Policy type holding per-service access rules
pub const SERVICES_POLICY: &str = "services";

const DEFAULT_PAM_DIR: &str = "/etc/pam.d";

/// Fragments go before the first line of this module type
const ACCOUNT_LINE: &str = "^account";

/// The access attributes and their rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    GroupsAllow,
    GroupsDeny,
    UsersAllow,
    UsersDeny,
}

impl AccessRule {
    pub const ALL: [AccessRule; 4] = [
        Self::GroupsAllow,
        Self::GroupsDeny,
        Self::UsersAllow,
        Self::UsersDeny,
    ];

    pub fn parse(attribute: &str) -> Option<Self> {
        match attribute {
            "groups_allow" => Some(Self::GroupsAllow),
            "groups_deny" => Some(Self::GroupsDeny),
            "users_allow" => Some(Self::UsersAllow),
            "users_deny" => Some(Self::UsersDeny),
            _ => None,
        }
    }

    pub fn attribute(&self) -> &'static str {
        match self {
            Self::GroupsAllow => "groups_allow",
            Self::GroupsDeny => "groups_deny",
            Self::UsersAllow => "users_allow",
            Self::UsersDeny => "users_deny",
        }
    }

    /// The `pam_succeed_if` line for a list of names.
    pub fn render(&self, names: &[String]) -> String {
        let (control, test) = match self {
            Self::GroupsAllow => ("required", "ingroup"),
            Self::GroupsDeny => ("requisite", "notingroup"),
            Self::UsersAllow => ("required", "in"),
            Self::UsersDeny => ("requisite", "notin"),
        };
        format!(
            "account {control} pam_succeed_if.so quiet user {test} {}",
            names.join(":")
        )
    }
}

enum PamOperation {
    SetAccess,
    RemoveAccess,
}

impl PamOperation {
    fn parse(operation: &str) -> Option<Self> {
        match operation {
            "set_access" => Some(Self::SetAccess),
            "remove_access" => Some(Self::RemoveAccess),
            _ => None,
        }
    }
}

/// The `pam` module.
pub struct PamModule {
    directory: NormalizedPath,
}

impl PamModule {
    pub fn new(directory: NormalizedPath) -> Self {
        Self { directory }
    }

    /// Uses `modules.pam.directory`, defaulting to `/etc/pam.d`.
    pub fn from_config(config: &MainConfig) -> Self {
        let directory = config
            .module_setting_str(PAM_MODULE, "directory")
            .unwrap_or(DEFAULT_PAM_DIR);
        Self::new(NormalizedPath::new(directory))
    }

    fn target(&self, change: &Change) -> Result<(NormalizedPath, AccessRule)> {
        let service = required_str(change, "service")?;
        if service.contains('/') {
            return Err(Error::invalid_parameter("service", "must be a plain file name"));
        }
        let rule = required_str(change, "attribute")
            .and_then(|attribute| {
                AccessRule::parse(attribute)
                    .ok_or_else(|| Error::invalid_parameter("attribute", "not an access rule"))
            })?;
        Ok((self.directory.join(service), rule))
    }

    fn set_access(&self, change: &Change) -> Result<ChangeState> {
        let (path, rule) = self.target(change)?;
        let names = string_list(change.param("value"));
        let tag = FragmentTag::new(PAM_MODULE, rule.attribute());
        if names.is_empty() {
            remove_fragment_from_file(&path, &tag)?;
            return Ok(ChangeState::Completed);
        }
        let placement = Placement::before(ACCOUNT_LINE)?;
        let changed = upsert_fragment_in_file(&path, &tag, &[rule.render(&names)], &placement)?;
        tracing::info!(%path, rule = rule.attribute(), changed, "Applied access rule");
        Ok(ChangeState::Completed)
    }

    fn remove_access(&self, change: &Change) -> Result<ChangeState> {
        let (path, rule) = self.target(change)?;
        let tag = FragmentTag::new(PAM_MODULE, rule.attribute());
        let removed = remove_fragment_from_file(&path, &tag)?;
        tracing::info!(%path, rule = rule.attribute(), removed, "Removed access rule");
        Ok(ChangeState::Completed)
    }
}

impl Module for PamModule {
    fn name(&self) -> &str {
        PAM_MODULE
    }

    fn handled_attributes(&self) -> HandledAttributes {
        HandledAttributes::from([(
            SERVICES_POLICY.to_string(),
            AccessRule::ALL
                .iter()
                .map(|rule| rule.attribute().to_string())
                .collect(),
        )])
    }

    fn set_attribute(&mut self, diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
        Some(ChangeSet::from(Change::with_params(
            PAM_MODULE,
            "set_access",
            json!({"service": diff.group, "attribute": diff.attribute, "value": diff.value}),
        )))
    }

    fn remove_attribute(&mut self, diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
        Some(ChangeSet::from(Change::with_params(
            PAM_MODULE,
            "remove_access",
            json!({"service": diff.group, "attribute": diff.attribute}),
        )))
    }

    fn perform_change(&mut self, change: &Change) -> std::result::Result<ChangeState, ExecutionError> {
        let outcome = match PamOperation::parse(&change.operation) {
            Some(PamOperation::SetAccess) => self.set_access(change),
            Some(PamOperation::RemoveAccess) => self.remove_access(change),
            None => return Ok(ChangeState::NotHandled),
        };
        outcome.map_err(|e| e.in_module(PAM_MODULE))
    }
}
