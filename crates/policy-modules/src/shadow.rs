//! User and group accounts
//!
//! Handles the account attributes of the `groups` policy. Default-section
//! changes to `basedir`, `shell` and `inactive` are pushed into the system
//! defaults with `useradd -D`; every other attribute is only recorded in
//! state and takes effect when accounts are created.
//!
//! User and group lifecycle changesets are built on request by
//! [`add_user`], [`mod_user`], [`del_user`], [`add_group`] and
//! [`del_group`]. A user's account settings are the policy of their
//! primary group overlaid with per-request overrides.

use crate::error::{Error, Result};
use crate::params::{flag, optional_arg, required_str, string_list};
use crate::runner::{SharedRunner, run_checked};
use chrono::{Duration, Utc};
use policy_core::{
    AttributeDiff, Change, ChangeSet, ChangeState, DEFAULT_SECTION, ExecutionError,
    HandledAttributes, Module, PolicyView, merge_into,
};
use serde_json::{Map, Value, json};

pub const SHADOW_MODULE: &str = "shadow";

/// Policy type holding account settings
pub const GROUPS_POLICY: &str = "groups";

pub const ADD_USER: &str = "add_user";
pub const ADD_GROUP: &str = "add_group";

const HANDLED: &[&str] = &[
    "uid_min",
    "uid_max",
    "usergroups",
    "grouphomes",
    "basedir",
    "shell",
    "skeleton",
    "expire",
    "inactive",
    "create_homedir",
];

const DEFAULT_BASEDIR: &str = "/home";

/// Minimum password length when the policy does not set one
pub const DEFAULT_PASSWORD_MIN_LENGTH: usize = 8;

enum ShadowOperation {
    SetDefault,
    AddUser,
    ModUser,
    DelUser,
    SetPassword,
    AddGroup,
    DelGroup,
}

impl ShadowOperation {
    fn parse(operation: &str) -> Option<Self> {
        match operation {
            "set_default" => Some(Self::SetDefault),
            ADD_USER => Some(Self::AddUser),
            "mod_user" => Some(Self::ModUser),
            "del_user" => Some(Self::DelUser),
            "set_password" => Some(Self::SetPassword),
            ADD_GROUP => Some(Self::AddGroup),
            "del_group" => Some(Self::DelGroup),
            _ => None,
        }
    }
}

/// Password requirements from the default section of the groups policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_PASSWORD_MIN_LENGTH,
        }
    }
}

impl PasswordPolicy {
    pub fn from_policy(groups: Option<&PolicyView>) -> Self {
        let min_length = groups
            .and_then(|policy| policy.get(&[DEFAULT_SECTION, "password_min_length"]))
            .and_then(|value| value.as_u64())
            .and_then(|value| usize::try_from(value).ok())
            .unwrap_or(DEFAULT_PASSWORD_MIN_LENGTH);
        Self { min_length }
    }

    pub fn check(&self, password: &str) -> Result<()> {
        if password.chars().any(char::is_control) {
            return Err(Error::PasswordControlCharacter);
        }
        if password.chars().count() < self.min_length {
            return Err(Error::PasswordTooShort {
                min_length: self.min_length,
            });
        }
        Ok(())
    }
}

/// A user account operation requested by an administrator.
#[derive(Debug, Clone, Default)]
pub struct UserRequest {
    pub username: String,
    /// The first group is the primary group
    pub groups: Vec<String>,
    /// Account comment, usually the person's real name
    pub name: Option<String>,
    pub home_dir: Option<String>,
    pub password: Option<String>,
    /// Account settings overriding the group policy
    pub overrides: Map<String, Value>,
}

impl UserRequest {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    fn primary_group(&self) -> Option<&str> {
        self.groups.first().map(String::as_str)
    }

    fn extra_groups(&self) -> &[String] {
        self.groups.get(1..).unwrap_or_default()
    }
}

/// Settings of `group` (inheriting defaults) overlaid with `overrides`.
pub fn account_policy(
    groups: Option<&PolicyView>,
    group: &str,
    overrides: &Map<String, Value>,
) -> Map<String, Value> {
    let mut settings = match groups.and_then(|policy| policy.get(&[group])) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    merge_into(&mut settings, overrides);
    settings
}

/// `basedir/[group/]username`, `basedir` defaulting to `/home`.
pub fn home_directory(settings: &Map<String, Value>, group: &str, username: &str) -> String {
    let basedir = settings
        .get("basedir")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_BASEDIR)
        .trim_end_matches('/');
    let grouphomes = settings
        .get("grouphomes")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if grouphomes {
        format!("{basedir}/{group}/{username}")
    } else {
        format!("{basedir}/{username}")
    }
}

/// Expiry as `YYYY-MM-DD`; a number of days counts from today.
fn expire_date(value: &Value) -> Option<String> {
    match value {
        Value::Number(days) => {
            let days = days.as_i64()?;
            let date = Utc::now().date_naive() + Duration::days(days);
            Some(date.format("%Y-%m-%d").to_string())
        }
        Value::String(date) if !date.is_empty() => Some(date.clone()),
        _ => None,
    }
}

fn password_change(username: &str, password: Option<&str>) -> Option<Change> {
    password.map(|password| {
        Change::with_params(
            SHADOW_MODULE,
            "set_password",
            json!({"username": username, "password": password}),
        )
    })
}

/// Copy account settings that map to `useradd`/`usermod` options.
fn account_params(params: &mut Map<String, Value>, settings: &Map<String, Value>) {
    for key in ["shell", "inactive", "skeleton", "uid_min", "uid_max"] {
        if let Some(value) = settings.get(key).filter(|value| !value.is_null()) {
            params.insert(key.to_string(), value.clone());
        }
    }
    if let Some(date) = settings.get("expire").and_then(expire_date) {
        params.insert("expire".into(), Value::String(date));
    }
}

/// Changeset creating a user account.
pub fn add_user(groups: Option<&PolicyView>, request: &UserRequest) -> Result<ChangeSet> {
    let group = request.primary_group().ok_or(Error::MissingGroup)?;
    let settings = account_policy(groups, group, &request.overrides);

    let mut params = Map::new();
    params.insert("username".into(), json!(request.username));
    params.insert("group".into(), json!(group));
    let mut extra: Vec<String> = request.extra_groups().to_vec();
    for member_of in string_list(settings.get("usergroups")) {
        if member_of != group && !extra.contains(&member_of) {
            extra.push(member_of);
        }
    }
    params.insert("groups".into(), json!(extra));
    if let Some(name) = &request.name {
        params.insert("comment".into(), json!(name));
    }
    let home = request
        .home_dir
        .clone()
        .unwrap_or_else(|| home_directory(&settings, group, &request.username));
    params.insert("home".into(), json!(home));
    params.insert(
        "create_home".into(),
        json!(settings.get("create_homedir").and_then(Value::as_bool).unwrap_or(true)),
    );
    account_params(&mut params, &settings);

    let mut changeset = ChangeSet::from(Change::new(SHADOW_MODULE, ADD_USER, params));
    changeset.extend(password_change(&request.username, request.password.as_deref()));
    Ok(changeset)
}

/// Changeset modifying a user account; only requested settings change.
pub fn mod_user(request: &UserRequest) -> Result<ChangeSet> {
    let mut params = Map::new();
    params.insert("username".into(), json!(request.username));
    if let Some(group) = request.primary_group() {
        params.insert("group".into(), json!(group));
        params.insert("groups".into(), json!(request.extra_groups()));
    }
    if let Some(name) = &request.name {
        params.insert("comment".into(), json!(name));
    }
    if let Some(home) = &request.home_dir {
        params.insert("home".into(), json!(home));
    }
    account_params(&mut params, &request.overrides);

    let mut changeset = ChangeSet::new();
    if params.len() > 1 {
        changeset.append(Change::new(SHADOW_MODULE, "mod_user", params));
    }
    changeset.extend(password_change(&request.username, request.password.as_deref()));
    Ok(changeset)
}

/// Changeset deleting a user account.
pub fn del_user(username: &str, remove_home: bool) -> ChangeSet {
    ChangeSet::from(Change::with_params(
        SHADOW_MODULE,
        "del_user",
        json!({"username": username, "remove_home": remove_home}),
    ))
}

/// Changeset creating a group.
pub fn add_group(group: &str) -> ChangeSet {
    ChangeSet::from(Change::with_params(SHADOW_MODULE, ADD_GROUP, json!({"group": group})))
}

/// Changeset deleting a group.
pub fn del_group(group: &str) -> ChangeSet {
    ChangeSet::from(Change::with_params(SHADOW_MODULE, "del_group", json!({"group": group})))
}

/// The `shadow` module.
pub struct ShadowModule {
    runner: SharedRunner,
}

impl ShadowModule {
    pub fn new(runner: SharedRunner) -> Self {
        Self { runner }
    }

    fn run(&self, program: &str, args: Vec<String>, stdin: Option<&str>) -> Result<ChangeState> {
        run_checked(self.runner.as_ref(), program, &args, stdin)?;
        Ok(ChangeState::Completed)
    }

    fn update_defaults(&self, change: &Change) -> Result<ChangeState> {
        let attribute = required_str(change, "attribute")?;
        let value = optional_arg(change, "value")
            .ok_or_else(|| Error::invalid_parameter("value", "expected a scalar"))?;
        let option = match attribute {
            "basedir" => "-b",
            "shell" => "-s",
            "inactive" => "-f",
            _ => return Ok(ChangeState::NotHandled),
        };
        self.run("useradd", vec!["-D".into(), option.into(), value], None)
    }

    fn add_user(&self, change: &Change) -> Result<ChangeState> {
        let username = required_str(change, "username")?;
        let group = required_str(change, "group")?;

        let mut args = Vec::new();
        push_option(&mut args, "-c", optional_arg(change, "comment"));
        args.extend(["-g".to_string(), group.to_string()]);
        let extra = string_list(change.param("groups"));
        if !extra.is_empty() {
            args.extend(["-G".to_string(), extra.join(",")]);
        }
        push_option(&mut args, "-d", optional_arg(change, "home"));
        push_option(&mut args, "-s", optional_arg(change, "shell"));
        push_option(&mut args, "-e", optional_arg(change, "expire"));
        push_option(&mut args, "-f", optional_arg(change, "inactive"));
        if flag(change, "create_home", true) {
            args.push("-m".into());
            push_option(&mut args, "-k", optional_arg(change, "skeleton"));
        } else {
            args.push("-M".into());
        }
        for (param, key) in [("uid_min", "UID_MIN"), ("uid_max", "UID_MAX")] {
            if let Some(value) = optional_arg(change, param) {
                args.extend(["-K".to_string(), format!("{key}={value}")]);
            }
        }
        args.push(username.to_string());
        self.run("useradd", args, None)
    }

    fn mod_user(&self, change: &Change) -> Result<ChangeState> {
        let username = required_str(change, "username")?;

        let mut args = Vec::new();
        push_option(&mut args, "-c", optional_arg(change, "comment"));
        push_option(&mut args, "-g", optional_arg(change, "group"));
        if change.param("groups").is_some() {
            args.extend(["-G".to_string(), string_list(change.param("groups")).join(",")]);
        }
        if let Some(home) = optional_arg(change, "home") {
            args.extend(["-d".to_string(), home, "-m".to_string()]);
        }
        push_option(&mut args, "-s", optional_arg(change, "shell"));
        push_option(&mut args, "-e", optional_arg(change, "expire"));
        push_option(&mut args, "-f", optional_arg(change, "inactive"));
        if args.is_empty() {
            return Ok(ChangeState::NotHandled);
        }
        args.push(username.to_string());
        self.run("usermod", args, None)
    }

    fn del_user(&self, change: &Change) -> Result<ChangeState> {
        let username = required_str(change, "username")?;
        let mut args = Vec::new();
        if flag(change, "remove_home", false) {
            args.push("-r".to_string());
        }
        args.push(username.to_string());
        self.run("userdel", args, None)
    }

    fn set_password(&self, change: &Change) -> Result<ChangeState> {
        let username = required_str(change, "username")?;
        let password = required_str(change, "password")?;
        if username.contains(':') || username.chars().any(char::is_control) {
            return Err(Error::invalid_parameter("username", "not a valid account name"));
        }
        if password.chars().any(char::is_control) {
            return Err(Error::PasswordControlCharacter);
        }
        let input = format!("{username}:{password}\n");
        self.run("chpasswd", Vec::new(), Some(&input))
    }

    fn group_command(&self, program: &str, change: &Change) -> Result<ChangeState> {
        let group = required_str(change, "group")?;
        self.run(program, vec![group.to_string()], None)
    }
}

fn push_option(args: &mut Vec<String>, option: &str, value: Option<String>) {
    if let Some(value) = value {
        args.push(option.to_string());
        args.push(value);
    }
}

impl Module for ShadowModule {
    fn name(&self) -> &str {
        SHADOW_MODULE
    }

    fn handled_attributes(&self) -> HandledAttributes {
        HandledAttributes::from([(
            GROUPS_POLICY.to_string(),
            HANDLED.iter().map(|attribute| attribute.to_string()).collect(),
        )])
    }

    fn set_default(&mut self, diff: &AttributeDiff<'_>) -> Option<ChangeSet> {
        if !matches!(diff.attribute, "basedir" | "shell" | "inactive") {
            return None;
        }
        let value = diff.value?;
        Some(ChangeSet::from(Change::with_params(
            SHADOW_MODULE,
            "set_default",
            json!({"attribute": diff.attribute, "value": value}),
        )))
    }

    fn perform_change(&mut self, change: &Change) -> std::result::Result<ChangeState, ExecutionError> {
        let Some(operation) = ShadowOperation::parse(&change.operation) else {
            return Ok(ChangeState::NotHandled);
        };
        let outcome = match operation {
            ShadowOperation::SetDefault => self.update_defaults(change),
            ShadowOperation::AddUser => self.add_user(change),
            ShadowOperation::ModUser => self.mod_user(change),
            ShadowOperation::DelUser => self.del_user(change),
            ShadowOperation::SetPassword => self.set_password(change),
            ShadowOperation::AddGroup => self.group_command("groupadd", change),
            ShadowOperation::DelGroup => self.group_command("groupdel", change),
        };
        outcome.map_err(|e| e.in_module(SHADOW_MODULE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> PolicyView {
        PolicyView::from_value(
            GROUPS_POLICY,
            json!({
                "_default_": {"basedir": "/home", "shell": "/bin/bash", "password_min_length": 10},
                "www": {"basedir": "/srv", "grouphomes": true, "usergroups": ["web"]}
            }),
            true,
        )
    }

    #[test]
    fn account_policy_inherits_and_overrides() {
        let overrides = Map::from_iter([("shell".to_string(), json!("/bin/zsh"))]);
        let settings = account_policy(Some(&groups()), "www", &overrides);

        assert_eq!(settings["basedir"], json!("/srv"));
        assert_eq!(settings["shell"], json!("/bin/zsh"));
    }

    #[test]
    fn unknown_group_uses_defaults() {
        let settings = account_policy(Some(&groups()), "nobody", &Map::new());
        assert_eq!(settings["shell"], json!("/bin/bash"));
    }

    #[test]
    fn home_directory_with_group_segment() {
        let settings = account_policy(Some(&groups()), "www", &Map::new());
        assert_eq!(home_directory(&settings, "www", "ann"), "/srv/www/ann");
        assert_eq!(home_directory(&Map::new(), "www", "ann"), "/home/ann");
    }

    #[test]
    fn password_policy_reads_default_section() {
        let policy = PasswordPolicy::from_policy(Some(&groups()));
        assert_eq!(policy.min_length, 10);
        assert!(policy.check("short").is_err());
        assert!(policy.check("long enough!").is_ok());
        assert_eq!(PasswordPolicy::from_policy(None).min_length, 8);
    }

    #[test]
    fn password_with_line_break_is_rejected() {
        let policy = PasswordPolicy::default();
        assert!(matches!(
            policy.check("long enough
root:owned"),
            Err(Error::PasswordControlCharacter)
        ));
        assert!(policy.check("tab	inside!").is_err());
    }

    #[test]
    fn expire_days_become_a_date() {
        let date = expire_date(&json!(0)).unwrap();
        assert_eq!(date, Utc::now().date_naive().format("%Y-%m-%d").to_string());
        assert_eq!(expire_date(&json!("2030-01-01")).as_deref(), Some("2030-01-01"));
        assert_eq!(expire_date(&json!(null)), None);
    }
}
