//! User and group lifecycle modes

use policy_core::{Engine, EventCategory};
use policy_modules::shadow::{self, GROUPS_POLICY};
use policy_modules::{PasswordPolicy, UserRequest};
use serde_json::{Map, Value, json};

use crate::cli::AccountArgs;
use crate::error::Result;
use crate::interactive;

/// Account settings given on the command line, keyed like the groups policy.
fn overrides(args: &AccountArgs) -> Map<String, Value> {
    let mut overrides = Map::new();
    let mut put = |key: &str, value: Value| {
        overrides.insert(key.to_string(), value);
    };
    if let Some(base_dir) = &args.base_dir {
        put("basedir", json!(base_dir));
    }
    if let Some(shell) = &args.shell {
        put("shell", json!(shell));
    }
    if let Some(days) = args.expiredate {
        put("expire", json!(days));
    }
    if let Some(days) = args.inactive {
        put("inactive", json!(days));
    }
    if let Some(skel) = &args.skel {
        put("skeleton", json!(skel));
    }
    if args.create_home {
        put("create_homedir", json!(true));
    }
    if args.no_home {
        put("create_homedir", json!(false));
    }
    overrides
}

fn user_request(engine: &Engine, username: &str, args: &AccountArgs) -> Result<UserRequest> {
    let mut request = UserRequest::new(username);
    request.groups = args.groups.clone();
    request.name = args.name.clone();
    request.home_dir = args.home_dir.clone();
    request.overrides = overrides(args);
    if args.password {
        let policy = PasswordPolicy::from_policy(engine.policy(GROUPS_POLICY));
        request.password = Some(interactive::new_password(username, &policy)?);
    }
    Ok(request)
}

pub fn run_add_user(engine: &Engine, username: &str, args: &AccountArgs) -> Result<()> {
    let request = user_request(engine, username, args)?;
    let changeset = shadow::add_user(engine.policy(GROUPS_POLICY), &request)?;
    engine.propose(EventCategory::UserAdded, changeset)?;
    Ok(())
}

pub fn run_mod_user(engine: &Engine, username: &str, args: &AccountArgs) -> Result<()> {
    let request = user_request(engine, username, args)?;
    let changeset = shadow::mod_user(&request)?;
    engine.propose(EventCategory::UserModified, changeset)?;
    Ok(())
}

pub fn run_del_user(engine: &Engine, username: &str, args: &AccountArgs) -> Result<()> {
    engine.propose(
        EventCategory::UserRemoved,
        shadow::del_user(username, args.remove_home),
    )?;
    Ok(())
}

pub fn run_add_group(engine: &Engine, group: &str) -> Result<()> {
    engine.propose(EventCategory::GroupAdded, shadow::add_group(group))?;
    Ok(())
}

pub fn run_del_group(engine: &Engine, group: &str) -> Result<()> {
    engine.propose(EventCategory::GroupRemoved, shadow::del_group(group))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_use_policy_keys() {
        let args = AccountArgs {
            base_dir: Some("/srv".into()),
            expiredate: Some(30),
            no_home: true,
            ..AccountArgs::default()
        };
        let overrides = overrides(&args);
        assert_eq!(overrides["basedir"], json!("/srv"));
        assert_eq!(overrides["expire"], json!(30));
        assert_eq!(overrides["create_homedir"], json!(false));
        assert!(!overrides.contains_key("shell"));
    }
}
