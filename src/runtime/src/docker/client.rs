//! Docker daemon access.
//!
//! The daemon is reached through the `docker` CLI: `docker image inspect`
//! to check for an image and `docker save` to export it as a tarball.

use std::path::Path;
use std::process::{Command, Output};

use imgscope_core::error::{Result, ScopeError};
use imgscope_core::ScopeConfig;

/// Operations the pipeline needs from a docker daemon.
pub trait DockerApi: Send + Sync {
    /// Whether the daemon holds `reference` locally.
    ///
    /// An unreachable daemon is reported as `Ok(false)`.
    fn image_exists(&self, reference: &str) -> Result<bool>;

    /// Export `reference` as a `docker save` tarball at `destination`.
    fn save(&self, reference: &str, destination: &Path) -> Result<()>;
}

/// [`DockerApi`] backed by the docker CLI.
#[derive(Debug, Clone)]
pub struct DockerCli {
    /// CLI binary (e.g. "docker", "podman", or an absolute path)
    binary: String,
    /// Value for `DOCKER_HOST`, if overridden
    host: Option<String>,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            host: None,
        }
    }

    /// Point the CLI at a specific daemon.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn from_config(config: &ScopeConfig) -> Self {
        let cli = Self::new(config.docker_binary.clone());
        match &config.docker_host {
            Some(host) => cli.with_host(host.clone()),
            None => cli,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    fn run(&self, args: &[&str]) -> std::io::Result<Output> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        if let Some(ref host) = self.host {
            cmd.env("DOCKER_HOST", host);
        }
        cmd.output()
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerApi for DockerCli {
    fn image_exists(&self, reference: &str) -> Result<bool> {
        match self.run(&["image", "inspect", "--format", "{{.Id}}", reference]) {
            Ok(output) => {
                tracing::debug!(
                    reference,
                    found = output.status.success(),
                    "Probed docker daemon"
                );
                Ok(output.status.success())
            }
            Err(e) => {
                tracing::debug!(binary = %self.binary, error = %e, "Docker CLI unavailable");
                Ok(false)
            }
        }
    }

    fn save(&self, reference: &str, destination: &Path) -> Result<()> {
        let destination_str = destination.to_string_lossy();
        let output = self
            .run(&["save", "-o", destination_str.as_ref(), reference])
            .map_err(|e| {
                ScopeError::Docker(format!("Failed to run {}: {}", self.binary, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ScopeError::Docker(format!(
                "docker save {} failed: {}",
                reference,
                stderr.trim()
            )));
        }

        tracing::debug!(reference, destination = %destination.display(), "Saved image from daemon");
        Ok(())
    }
}
