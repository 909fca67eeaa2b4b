//! Hospital policy lookup.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Text used when the policy document cannot be read.
pub const FALLBACK_POLICY: &str = "Standard Medical Guidelines apply.";

/// Reads the hospital policy document that grounds each analysis.
#[derive(Debug, Clone)]
pub struct PolicyProvider {
    path: PathBuf,
}

impl PolicyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the policy text, falling back to [`FALLBACK_POLICY`] on any error.
    pub fn load(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                debug!("Loaded policy from {} ({} bytes)", self.path.display(), text.len());
                text
            }
            Err(e) => {
                warn!(
                    "Could not read policy {}: {}; using fallback",
                    self.path.display(),
                    e
                );
                FALLBACK_POLICY.to_string()
            }
        }
    }
}
