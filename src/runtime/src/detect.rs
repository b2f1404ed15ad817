//! Source classification.
//!
//! Decides which [`SourceKind`] a user-supplied image string names and
//! returns the locator the matching provider should be given.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use imgscope_core::error::{Result, ScopeError};
use imgscope_core::SourceKind;

use crate::archive;
use crate::docker::DockerApi;
use crate::reference::ImageReference;

/// Classifies image strings into a source kind and locator.
pub struct SourceDetector {
    docker: Arc<dyn DockerApi>,
}

impl SourceDetector {
    pub fn new(docker: Arc<dyn DockerApi>) -> Self {
        Self { docker }
    }

    /// Classify `input`.
    ///
    /// Resolution order:
    /// 1. an explicit `<scheme>:` prefix naming a known kind,
    /// 2. an existing path (OCI layout directory, docker or OCI tarball),
    /// 3. a reference the docker daemon holds locally.
    ///
    /// Anything else is a [`ScopeError::Classification`].
    pub fn detect(&self, input: &str) -> Result<(SourceKind, String)> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ScopeError::Classification("empty image input".to_string()));
        }

        if let Some((kind, rest)) = split_scheme(input) {
            if rest.is_empty() {
                return Err(ScopeError::Classification(format!(
                    "missing locator after '{}:'",
                    kind
                )));
            }
            let locator = if kind.is_path() {
                expand_home(rest).display().to_string()
            } else {
                rest.to_string()
            };
            tracing::debug!(%kind, locator = %locator, "Explicit source scheme");
            return Ok((kind, locator));
        }

        let path = expand_home(input);
        if path.exists() {
            let kind = classify_path(&path)?;
            let locator = path.canonicalize().unwrap_or(path).display().to_string();
            tracing::debug!(%kind, locator = %locator, "Classified path");
            return Ok((kind, locator));
        }

        if let Ok(reference) = ImageReference::parse(input) {
            let normalized = reference.full_reference();
            if self.docker.image_exists(&normalized)? {
                tracing::debug!(reference = %normalized, "Found image in docker daemon");
                return Ok((SourceKind::DockerDaemon, normalized));
            }
        }

        Err(ScopeError::Classification(format!(
            "'{}' is not an existing path or an image known to the docker daemon",
            input
        )))
    }
}

impl std::fmt::Debug for SourceDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDetector").finish_non_exhaustive()
    }
}

/// Split `scheme:rest` when `scheme` names a known source kind.
fn split_scheme(input: &str) -> Option<(SourceKind, &str)> {
    let (scheme, rest) = input.split_once(':')?;
    match SourceKind::from_scheme(scheme) {
        SourceKind::Unknown => None,
        kind => Some((kind, rest)),
    }
}

/// Expand a leading `~` to the home directory.
fn expand_home(input: &str) -> PathBuf {
    let home = || dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));
    if input == "~" {
        home()
    } else if let Some(rest) = input.strip_prefix("~/") {
        home().join(rest)
    } else {
        PathBuf::from(input)
    }
}

fn classify_path(path: &Path) -> Result<SourceKind> {
    if path.is_dir() {
        if path.join("oci-layout").is_file() {
            return Ok(SourceKind::OciDirectory);
        }
        return Err(ScopeError::Classification(format!(
            "directory {} is not an OCI image layout",
            path.display()
        )));
    }

    if path.is_file() && archive::is_tar_archive(path) {
        let entries = archive::top_level_entries(path)
            .map_err(|e| ScopeError::Classification(e.to_string()))?;
        if entries.contains("manifest.json") {
            return Ok(SourceKind::DockerArchive);
        }
        if entries.contains("oci-layout") || entries.contains("index.json") {
            return Ok(SourceKind::OciArchive);
        }
    }

    Err(ScopeError::Classification(format!(
        "{} is not a docker or OCI image archive",
        path.display()
    )))
}
