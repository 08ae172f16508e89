//! Generated parameter values.
//!
//! The store is shared by everything that resolves expressions during a
//! run. Generation goes through the map's entry lock, so two concurrent
//! resolutions of the same parameter always observe one value.

use dashmap::DashMap;
use rand::Rng;
use rand::distributions::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Where a stored value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOrigin {
    /// Read from the secret state file.
    Persisted,
    /// Generated during this run.
    Generated,
}

#[derive(Debug)]
struct StoredSecret {
    value: SecretString,
    origin: SecretOrigin,
}

#[derive(Debug, Default)]
pub struct SecretStore {
    values: DashMap<String, StoredSecret>,
}

#[derive(Serialize, Deserialize)]
struct SecretState {
    version: u32,
    #[serde(default)]
    secrets: BTreeMap<String, String>,
}

const STATE_VERSION: u32 = 1;

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load persisted values, or start empty when the file does not exist.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let store = Self::new();
        if !path.exists() {
            return Ok(store);
        }

        let content = std::fs::read_to_string(path).map_err(|e| crate::Error::SecretStateRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let state: SecretState =
            serde_json::from_str(&content).map_err(|e| crate::Error::SecretStateParse {
                path: path.to_path_buf(),
                source: e,
            })?;

        for (name, value) in state.secrets {
            store.values.insert(
                name,
                StoredSecret {
                    value: SecretString::from(value),
                    origin: SecretOrigin::Persisted,
                },
            );
        }
        tracing::debug!(count = store.values.len(), path = %path.display(), "loaded secret state");
        Ok(store)
    }

    /// Write every value to `path`, readable by the owner only on Unix.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let state = SecretState {
            version: STATE_VERSION,
            secrets: self
                .values
                .iter()
                .map(|entry| {
                    (
                        entry.key().clone(),
                        entry.value().value.expose_secret().to_owned(),
                    )
                })
                .collect(),
        };
        let content = serde_json::to_string_pretty(&state)
            .map_err(|e| crate::Error::SecretStateEncode { source: e })?;

        let write_err = |e| crate::Error::SecretStateWrite {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, content).map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }
        Ok(())
    }

    /// Return the value stored under `name`, generating one of
    /// `min_length` characters if there is none yet.
    pub fn get_or_generate(&self, name: &str, min_length: usize) -> String {
        let entry = self.values.entry(name.to_owned()).or_insert_with(|| {
            tracing::info!(parameter = name, length = min_length, "generated parameter value");
            StoredSecret {
                value: SecretString::from(generate_value(min_length)),
                origin: SecretOrigin::Generated,
            }
        });
        entry.value.expose_secret().to_owned()
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .map(|entry| entry.value.expose_secret().to_owned())
    }

    pub fn origin(&self, name: &str) -> Option<SecretOrigin> {
        self.values.get(name).map(|entry| entry.origin)
    }

    /// Number of values generated during this run.
    pub fn generated_count(&self) -> usize {
        self.values
            .iter()
            .filter(|entry| entry.origin == SecretOrigin::Generated)
            .count()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Random alphanumeric string of exactly `length` characters.
pub fn generate_value(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
