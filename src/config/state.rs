// Application state module
// Holds the loaded configuration and the resolved document root

use std::path::{Path, PathBuf};

use super::types::Config;
use crate::error::ServerError;

/// Application state, shared read-only by every connection
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    /// Canonical document root; every served path must stay below it
    root: PathBuf,
}

impl AppState {
    /// Resolve the configured document root and build the shared state
    pub fn new(config: Config) -> Result<Self, ServerError> {
        let root = canonical_root(Path::new(&config.server.root))?;
        Ok(Self { config, root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn canonical_root(path: &Path) -> Result<PathBuf, ServerError> {
    let root = path
        .canonicalize()
        .map_err(|source| ServerError::DocumentRoot {
            path: path.to_path_buf(),
            source,
        })?;
    if !root.is_dir() {
        return Err(ServerError::NotADirectory { path: root });
    }
    Ok(root)
}
