//! [`TestPolicyDir`] builder for engine and CLI test scenarios.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory laid out as:
///
/// ```text
/// config/main.yaml
/// policy/<type>.yaml
/// state/<type>.yaml
/// ```
///
/// # Example
///
/// ```rust,no_run
/// use policy_test_utils::TestPolicyDir;
///
/// let dir = TestPolicyDir::new()
///     .with_policy("groups", "www:\n  basedir: /srv\n")
///     .with_state("groups", "{}\n");
/// let config = dir.write_config();
/// dir.assert_file_contains("state/groups.yaml", "{}");
/// ```
pub struct TestPolicyDir {
    temp_dir: TempDir,
    policies: BTreeMap<String, String>,
    modules: BTreeMap<String, String>,
}

impl Default for TestPolicyDir {
    fn default() -> Self {
        Self::new()
    }
}

impl TestPolicyDir {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
            policies: BTreeMap::new(),
            modules: BTreeMap::new(),
        }
    }

    /// Return the root path of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write `policy/<name>.yaml` and list it in the configuration.
    pub fn with_policy(mut self, name: &str, yaml: &str) -> Self {
        self.write("policy", name, yaml);
        self.policies.insert(name.to_string(), format!("{name}.yaml"));
        self
    }

    /// Write `state/<name>.yaml`.
    pub fn with_state(self, name: &str, yaml: &str) -> Self {
        self.write("state", name, yaml);
        self
    }

    /// Add an inline YAML flow mapping of settings for a module,
    /// e.g. `{ directory: /etc/pam.d }`.
    pub fn with_module_settings(mut self, module: &str, flow_yaml: &str) -> Self {
        self.modules.insert(module.to_string(), flow_yaml.to_string());
        self
    }

    /// Write `config/main.yaml` and return its path.
    ///
    /// Policy and state paths are relative to the configuration directory.
    pub fn write_config(&self) -> PathBuf {
        let mut config = String::from("general:\n  policy-path: ../policy\n  state-path: ../state\npolicy:\n");
        if self.policies.is_empty() {
            config = config.replace("policy:\n", "policy: {}\n");
        }
        for (name, file) in &self.policies {
            config.push_str(&format!("  {name}: {file}\n"));
        }
        if !self.modules.is_empty() {
            config.push_str("modules:\n");
            for (module, settings) in &self.modules {
                config.push_str(&format!("  {module}: {settings}\n"));
            }
        }

        let dir = self.root().join("config");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("main.yaml");
        fs::write(&path, config).unwrap();
        path
    }

    /// Read a file relative to the root.
    pub fn read(&self, path: &str) -> String {
        let full_path = self.root().join(path);
        fs::read_to_string(&full_path)
            .unwrap_or_else(|_| panic!("Could not read file: {}", full_path.display()))
    }

    /// Assert that `path` (relative to the root) exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_file_exists(&self, path: &str) {
        let full_path = self.root().join(path);
        assert!(
            full_path.exists(),
            "Expected file to exist: {}",
            full_path.display()
        );
    }

    /// Assert that the file at `path` (relative to root) contains `content`.
    ///
    /// # Panics
    /// Panics if the file cannot be read or does not contain `content`.
    pub fn assert_file_contains(&self, path: &str, content: &str) {
        let file_content = self.read(path);
        assert!(
            file_content.contains(content),
            "File {} does not contain expected content.\nExpected: {}\nActual: {}",
            path,
            content,
            file_content
        );
    }

    fn write(&self, dir: &str, name: &str, yaml: &str) {
        let dir = self.root().join(dir);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{name}.yaml")), yaml).unwrap();
    }
}
