//! Disk quotas
//!
//! `groupquota` limits a group as a whole, `userquota` limits every member
//! of the group individually. A limit is a size (`"100M"`, `2048`) used
//! for both soft and hard limits, or a `{soft, hard}` mapping. Users
//! created later pick up their group's `userquota` through the
//! `UserAdded` hook.

use crate::error::{Error, Result};
use crate::params::required_str;
use crate::runner::{SharedRunner, run_checked};
use crate::shadow::{ADD_GROUP, ADD_USER, GROUPS_POLICY, SHADOW_MODULE};
use crate::units::parse_size_value;
use policy_core::{
    AttributeDiff, Change, ChangeSet, ChangeState, EventCategory, ExecutionError,
    HandledAttributes, MainConfig, Module, PolicySet,
};
use serde_json::{Value, json};

pub const QUOTA_MODULE: &str = "quota";

const DEFAULT_FILESYSTEM: &str = "/home";

/// Soft and hard block limits in kilobytes; zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QuotaLimits {
    pub soft: u64,
    pub hard: u64,
}

impl QuotaLimits {
    /// Limits from a policy value; null means no limit.
    pub fn parse(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(limits) => {
                let limit = |key: &str| limits.get(key).map(parse_size_value).transpose();
                let soft = limit("soft")?;
                let hard = limit("hard")?;
                let soft = soft.or(hard).unwrap_or(0);
                Ok(Self {
                    soft,
                    hard: hard.unwrap_or(soft),
                })
            }
            other => {
                let size = parse_size_value(other)?;
                Ok(Self {
                    soft: size,
                    hard: size,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuotaKind {
    User,
    Group,
}

impl QuotaKind {
    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "user" => Some(Self::User),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    fn flag(&self) -> &'static str {
        match self {
            Self::User => "-u",
            Self::Group => "-g",
        }
    }
}

enum QuotaOperation {
    SetQuota,
    SetMemberQuotas,
}

impl QuotaOperation {
    fn parse(operation: &str) -> Option<Self> {
        match operation {
            "set_quota" => Some(Self::SetQuota),
            "set_member_quotas" => Some(Self::SetMemberQuotas),
            _ => None,
        }
    }
}

fn set_quota(kind: &str, name: &str, value: Option<&Value>) -> Change {
    Change::with_params(
        QUOTA_MODULE,
        "set_quota",
        json!({"kind": kind, "name": name, "value": value}),
    )
}

/// Members listed in a `getent group` line (`name:x:gid:a,b,c`).
pub fn group_members(getent_line: &str) -> Vec<String> {
    getent_line
        .trim()
        .splitn(4, ':')
        .nth(3)
        .map(|members| {
            members
                .split(',')
                .map(str::trim)
                .filter(|member| !member.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// The `quota` module.
pub struct QuotaModule {
    filesystem: String,
    runner: SharedRunner,
}

impl QuotaModule {
    pub fn new(filesystem: impl Into<String>, runner: SharedRunner) -> Self {
        Self {
            filesystem: filesystem.into(),
            runner,
        }
    }

    /// Uses `modules.quota.filesystem`, defaulting to `/home`.
    pub fn from_config(config: &MainConfig, runner: SharedRunner) -> Self {
        let filesystem = config
            .module_setting_str(QUOTA_MODULE, "filesystem")
            .unwrap_or(DEFAULT_FILESYSTEM);
        Self::new(filesystem, runner)
    }

    fn setquota(&self, kind: QuotaKind, name: &str, limits: QuotaLimits) -> Result<()> {
        let args = vec![
            kind.flag().to_string(),
            name.to_string(),
            limits.soft.to_string(),
            limits.hard.to_string(),
            "0".to_string(),
            "0".to_string(),
            self.filesystem.clone(),
        ];
        run_checked(self.runner.as_ref(), "setquota", &args, None)?;
        Ok(())
    }

    fn limits(change: &Change) -> Result<QuotaLimits> {
        QuotaLimits::parse(change.param("value").unwrap_or(&Value::Null))
    }

    fn apply_quota(&self, change: &Change) -> Result<ChangeState> {
        let kind = required_str(change, "kind").and_then(|kind| {
            QuotaKind::parse(kind).ok_or_else(|| Error::invalid_parameter("kind", "expected user or group"))
        })?;
        let name = required_str(change, "name")?;
        self.setquota(kind, name, Self::limits(change)?)?;
        Ok(ChangeState::Completed)
    }

    fn apply_member_quotas(&self, change: &Change) -> Result<ChangeState> {
        let group = required_str(change, "group")?;
        let limits = Self::limits(change)?;
        let output = run_checked(
            self.runner.as_ref(),
            "getent",
            &["group".to_string(), group.to_string()],
            None,
        )?;
        for member in group_members(&output.stdout) {
            self.setquota(QuotaKind::User, &member, limits)?;
        }
        Ok(ChangeState::Completed)
    }

    fn changeset_for(diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
        let change = match diff.attribute {
            "groupquota" => set_quota("group", diff.group, diff.value),
            "userquota" => Change::with_params(
                QUOTA_MODULE,
                "set_member_quotas",
                json!({"group": diff.group, "value": diff.value}),
            ),
            _ => return None,
        };
        Some(ChangeSet::from(change))
    }
}

impl Module for QuotaModule {
    fn name(&self) -> &str {
        QUOTA_MODULE
    }

    fn handled_attributes(&self) -> HandledAttributes {
        HandledAttributes::from([(
            GROUPS_POLICY.to_string(),
            vec!["userquota".to_string(), "groupquota".to_string()],
        )])
    }

    fn event_hooks(&self) -> Vec<EventCategory> {
        vec![EventCategory::UserAdded, EventCategory::GroupAdded]
    }

    /// Extend account creation with the quota the group policy asks for.
    fn handle_event(
        &mut self,
        event: EventCategory,
        changeset: &mut ChangeSet,
        policies: &PolicySet,
    ) -> std::result::Result<(), ExecutionError> {
        let Some(groups) = policies.get(GROUPS_POLICY) else {
            return Ok(());
        };
        let (operation, attribute, kind) = match event {
            EventCategory::UserAdded => (ADD_USER, "userquota", "user"),
            EventCategory::GroupAdded => (ADD_GROUP, "groupquota", "group"),
            _ => return Ok(()),
        };

        let mut additions = Vec::new();
        for change in changeset.changes() {
            if change.subsystem != SHADOW_MODULE || change.operation != operation {
                continue;
            }
            let (Some(name), Some(group)) = (
                change.param_str(if kind == "user" { "username" } else { "group" }),
                change.param_str("group"),
            ) else {
                continue;
            };
            if let Some(value) = groups.get(&[group, attribute]) {
                additions.push(set_quota(kind, name, Some(&value)));
            }
        }

        tracing::debug!(%event, added = additions.len(), "Quota hook");
        changeset.extend(additions);
        Ok(())
    }

    fn set_attribute(&mut self, diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
        Self::changeset_for(diff)
    }

    fn remove_attribute(&mut self, diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
        Self::changeset_for(diff)
    }

    fn perform_change(&mut self, change: &Change) -> std::result::Result<ChangeState, ExecutionError> {
        let outcome = match QuotaOperation::parse(&change.operation) {
            Some(QuotaOperation::SetQuota) => self.apply_quota(change),
            Some(QuotaOperation::SetMemberQuotas) => self.apply_member_quotas(change),
            None => return Ok(ChangeState::NotHandled),
        };
        outcome.map_err(|e| e.in_module(QUOTA_MODULE))
    }
}
