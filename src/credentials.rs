//! Named credential bundles.
//!
//! Secrets live in a JSON file keyed by platform, with environment
//! variables of the form `SNAPVAULT_<PLATFORM>_<KEY>` taking precedence so
//! a scheduler can inject tokens without touching the file. Each platform
//! source asks its bundle for the keys it needs and fails with a named
//! error when one is missing.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

const ENV_PREFIX: &str = "SNAPVAULT";

#[derive(Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct CredentialStore {
    bundles: HashMap<String, HashMap<String, String>>,
}

impl CredentialStore {
    /// Load from a JSON file. A missing file yields an empty store so
    /// env-only setups work without one.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read credentials file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid credentials file {}", path.display()))
    }

    /// The bundle for one platform, merged with any env overrides. Never
    /// fails: a platform with no file entry and no env vars just produces
    /// an empty bundle, and the source's `require` calls name what's
    /// missing.
    pub fn bundle(&self, platform: &str) -> Credentials {
        let mut values = self.bundles.get(platform).cloned().unwrap_or_default();

        let env_bundle_prefix = format!(
            "{}_{}_",
            ENV_PREFIX,
            platform.to_ascii_uppercase().replace('-', "_")
        );
        for (name, value) in std::env::vars() {
            if let Some(key) = name.strip_prefix(&env_bundle_prefix) {
                values.insert(key.to_ascii_lowercase(), value);
            }
        }

        Credentials {
            platform: platform.to_string(),
            values,
        }
    }
}

/// One platform's secrets.
#[derive(Debug, Clone)]
pub struct Credentials {
    platform: String,
    values: HashMap<String, String>,
}

impl Credentials {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            anyhow::anyhow!(
                "missing credential '{key}' for platform '{platform}' (set it in the \
                 credentials file or via {prefix}_{platform_env}_{key_env})",
                platform = self.platform,
                prefix = ENV_PREFIX,
                platform_env = self.platform.to_ascii_uppercase().replace('-', "_"),
                key_env = key.to_ascii_uppercase(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_store(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("snapvault_credentials_tests");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_and_require() {
        let path = write_store(
            "basic.json",
            r#"{"reddit": {"client_id": "abc", "client_secret": "xyz"}}"#,
        );
        let store = CredentialStore::load(&path).unwrap();
        let creds = store.bundle("reddit");
        assert_eq!(creds.require("client_id").unwrap(), "abc");
        assert_eq!(creds.get("client_secret"), Some("xyz"));
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let store =
            CredentialStore::load(Path::new("/nonexistent/snapvault/creds.json")).unwrap();
        let creds = store.bundle("reddit");
        assert!(creds.get("client_id").is_none());
    }

    #[test]
    fn test_require_missing_names_key_and_env_var() {
        let store = CredentialStore::default();
        let err = store.bundle("reddit").require("client_id").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("client_id"));
        assert!(msg.contains("SNAPVAULT_REDDIT_CLIENT_ID"));
    }

    #[test]
    fn test_env_overrides_file() {
        let path = write_store(
            "env_override.json",
            r#"{"envtest": {"token": "from-file"}}"#,
        );
        std::env::set_var("SNAPVAULT_ENVTEST_TOKEN", "from-env");
        let store = CredentialStore::load(&path).unwrap();
        let creds = store.bundle("envtest");
        assert_eq!(creds.get("token"), Some("from-env"));
        std::env::remove_var("SNAPVAULT_ENVTEST_TOKEN");
    }

    #[test]
    fn test_invalid_json_rejected() {
        let path = write_store("invalid.json", "not json");
        assert!(CredentialStore::load(&path).is_err());
    }
}
