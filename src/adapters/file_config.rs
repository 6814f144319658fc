//! JSON file configuration adapter.
//!
//! Implements [`ConfigPort`] on top of a single JSON document.  A missing
//! file yields [`LinkConfig::default()`]; a file that parses but fails
//! validation is reported as such rather than silently repaired.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::app::ports::ConfigPort;
use crate::config::LinkConfig;
use crate::error::ConfigError;

pub struct FileConfigAdapter {
    path: PathBuf,
}

impl FileConfigAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigPort for FileConfigAdapter {
    fn load(&self) -> Result<LinkConfig, ConfigError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(
                    "FileConfig: {} not found, using defaults",
                    self.path.display()
                );
                return Ok(LinkConfig::default());
            }
            Err(e) => {
                warn!("FileConfig: reading {} failed: {}", self.path.display(), e);
                return Err(ConfigError::Io);
            }
        };

        let cfg: LinkConfig = serde_json::from_slice(&bytes).map_err(|e| {
            warn!("FileConfig: {} is not valid config: {}", self.path.display(), e);
            ConfigError::Corrupted
        })?;
        cfg.validate()?;
        info!("FileConfig: loaded {}", self.path.display());
        Ok(cfg)
    }

    fn save(&self, config: &LinkConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let json = serde_json::to_vec_pretty(config).map_err(|_| ConfigError::Io)?;

        // Write beside the target, then rename over it.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .and_then(|()| fs::rename(&tmp, &self.path))
            .map_err(|e| {
                warn!("FileConfig: writing {} failed: {}", self.path.display(), e);
                ConfigError::Io
            })?;
        info!("FileConfig: saved {}", self.path.display());
        Ok(())
    }
}
