// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration store
//!
//! The register synchronisation and the configuration commit do not care
//! where the configuration lives. They go through [`ConfigStore`], which
//! gives typed access to the sections (and through them, per-field setters),
//! persistence and a reset to factory defaults.

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{debug, info};

use super::Config;

/// Access to the live configuration
pub trait ConfigStore: Send {
    /// Current configuration
    fn config(&self) -> &Config;

    /// Mutable access, used by the field setters
    fn config_mut(&mut self) -> &mut Config;

    /// Write the current configuration to durable storage
    fn persist(&mut self) -> Result<()>;

    /// Replace the configuration with factory defaults (not persisted)
    fn reset_to_default(&mut self) {
        info!("Resetting configuration to defaults");
        *self.config_mut() = Config::default();
    }
}

/// Configuration backed by a YAML file
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
    config: Config,
}

impl FileConfigStore {
    /// Load the configuration from `path`, creating a default file when it
    /// does not exist
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let config = Config::from_file(&path)?;
        Ok(Self { path, config })
    }

    /// Wrap an already loaded configuration
    pub fn new<P: AsRef<Path>>(path: P, config: Config) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn config(&self) -> &Config {
        &self.config
    }

    fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    fn persist(&mut self) -> Result<()> {
        debug!("Persisting configuration to {:?}", self.path);
        self.config.save_to_file(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_persist_and_reload() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.yaml");

        let mut store = FileConfigStore::open(&path)?;
        assert!(store.config_mut().device.set_id(42));
        store.persist()?;

        let reloaded = FileConfigStore::open(&path)?;
        assert_eq!(reloaded.config().device.id, 42);
        Ok(())
    }

    #[test]
    fn test_reset_to_default() {
        let mut store = FileConfigStore::new("unused.yaml", Config::default());
        store.config_mut().mqtt.set_base("plant-a");
        store.reset_to_default();
        assert_eq!(store.config(), &Config::default());
    }
}
