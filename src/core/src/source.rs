//! Image source kinds.

use serde::{Deserialize, Serialize};

/// How an image reference should be acquired.
///
/// Produced once per acquisition by the source classifier. `Unknown` is a
/// classification failure sentinel and never has a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// A tarball produced by `docker save`.
    DockerArchive,
    /// An image held by the local docker daemon.
    DockerDaemon,
    /// An OCI image layout directory.
    OciDirectory,
    /// A tarball of an OCI image layout.
    OciArchive,
    /// No strategy applies.
    Unknown,
}

impl SourceKind {
    /// All kinds that have an acquisition strategy.
    pub const KNOWN: [SourceKind; 4] = [
        SourceKind::DockerArchive,
        SourceKind::DockerDaemon,
        SourceKind::OciDirectory,
        SourceKind::OciArchive,
    ];

    /// Parse an explicit scheme prefix such as `oci-dir` in `oci-dir:./layout`.
    ///
    /// Unrecognized schemes map to `Unknown` so that `busybox:latest` is not
    /// mistaken for a scheme.
    pub fn from_scheme(scheme: &str) -> Self {
        match scheme.to_ascii_lowercase().as_str() {
            "docker-archive" => Self::DockerArchive,
            "docker" | "docker-daemon" => Self::DockerDaemon,
            "oci-dir" | "oci-directory" => Self::OciDirectory,
            "oci-archive" => Self::OciArchive,
            _ => Self::Unknown,
        }
    }

    /// Whether the locator for this kind is a filesystem path.
    pub fn is_path(&self) -> bool {
        matches!(
            self,
            Self::DockerArchive | Self::OciDirectory | Self::OciArchive
        )
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DockerArchive => write!(f, "docker-archive"),
            Self::DockerDaemon => write!(f, "docker"),
            Self::OciDirectory => write!(f, "oci-dir"),
            Self::OciArchive => write!(f, "oci-archive"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match Self::from_scheme(s) {
            Self::Unknown => Err(format!(
                "unknown image source: '{}' (supported: docker-archive, docker, oci-dir, oci-archive)",
                s
            )),
            kind => Ok(kind),
        }
    }
}
