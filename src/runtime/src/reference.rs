//! Image reference parsing.
//!
//! Parses daemon image references like `busybox:latest` or
//! `ghcr.io/org/app@sha256:...` into structured components. Used by the
//! source classifier to decide whether an input can name a daemon image.

use imgscope_core::error::{Result, ScopeError};

/// Default registry when none is specified.
const DEFAULT_REGISTRY: &str = "docker.io";

/// Default tag when none is specified.
const DEFAULT_TAG: &str = "latest";

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Registry hostname (e.g., "ghcr.io", "docker.io")
    pub registry: String,
    /// Repository path (e.g., "library/busybox")
    pub repository: String,
    /// Tag (e.g., "latest")
    pub tag: Option<String>,
    /// Digest (e.g., "sha256:abc123...")
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image reference string.
    ///
    /// Supports formats:
    /// - `busybox` → docker.io/library/busybox:latest
    /// - `busybox:1.36` → docker.io/library/busybox:1.36
    /// - `myuser/myimage` → docker.io/myuser/myimage:latest
    /// - `ghcr.io/org/image:tag` → ghcr.io/org/image:tag
    /// - `ghcr.io/org/image@sha256:abc...` → ghcr.io/org/image@sha256:abc...
    ///
    /// Path-like strings (`./image.tar`, `/tmp/x`, uppercase names) are rejected.
    pub fn parse(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(ScopeError::Classification(
                "empty image reference".to_string(),
            ));
        }

        let (name_tag, digest) = Self::split_digest(reference)?;
        let (name, tag) = Self::split_tag(name_tag);
        let (registry, repository) = Self::split_registry_repository(name, reference)?;

        if let Some(ref tag) = tag {
            if !Self::valid_tag(tag) {
                return Err(ScopeError::Classification(format!(
                    "invalid tag '{}' in reference '{}'",
                    tag, reference
                )));
            }
        }

        // Apply default tag if no tag and no digest
        let tag = match (tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (tag, _) => tag.map(str::to_string),
        };

        Ok(ImageReference {
            registry,
            repository,
            tag,
            digest,
        })
    }

    /// Split off `@algorithm:hex`.
    fn split_digest(reference: &str) -> Result<(&str, Option<String>)> {
        match reference.rsplit_once('@') {
            Some((name_tag, digest)) => {
                let valid = digest
                    .split_once(':')
                    .map(|(algo, hex)| {
                        !algo.is_empty()
                            && !hex.is_empty()
                            && hex.chars().all(|c| c.is_ascii_hexdigit())
                    })
                    .unwrap_or(false);
                if !valid {
                    return Err(ScopeError::Classification(format!(
                        "invalid digest format in reference '{}': expected algorithm:hex",
                        reference
                    )));
                }
                Ok((name_tag, Some(digest.to_string())))
            }
            None => Ok((reference, None)),
        }
    }

    /// Split `name:tag`, treating a colon before the last `/` as a registry port.
    fn split_tag(name_tag: &str) -> (&str, Option<&str>) {
        let last_segment_start = name_tag.rfind('/').map(|p| p + 1).unwrap_or(0);
        match name_tag[last_segment_start..].rfind(':') {
            Some(colon) => {
                let colon = last_segment_start + colon;
                (&name_tag[..colon], Some(&name_tag[colon + 1..]))
            }
            None => (name_tag, None),
        }
    }

    /// Split a name into registry and repository components.
    fn split_registry_repository(name: &str, reference: &str) -> Result<(String, String)> {
        let (registry, repository) = match name.split_once('/') {
            // The first component is a registry if it looks like a hostname
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            Some(_) => (DEFAULT_REGISTRY.to_string(), name.to_string()),
            // Single name like "busybox" → "library/busybox" for Docker Hub
            None => (DEFAULT_REGISTRY.to_string(), format!("library/{}", name)),
        };

        let registry_ok = registry.starts_with(|c: char| c.is_ascii_alphanumeric())
            && registry
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'));
        if !registry_ok {
            return Err(ScopeError::Classification(format!(
                "invalid registry '{}' in reference '{}'",
                registry, reference
            )));
        }

        if repository.is_empty() || !repository.split('/').all(Self::valid_path_component) {
            return Err(ScopeError::Classification(format!(
                "invalid repository name in reference '{}'",
                reference
            )));
        }

        Ok((registry, repository))
    }

    /// Lowercase alphanumerics separated by `.`, `_`, `__` or `-`.
    fn valid_path_component(component: &str) -> bool {
        let bytes = component.as_bytes();
        match (bytes.first(), bytes.last()) {
            (Some(first), Some(last)) => {
                (first.is_ascii_lowercase() || first.is_ascii_digit())
                    && (last.is_ascii_lowercase() || last.is_ascii_digit())
                    && bytes.iter().all(|b| {
                        b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'.' | b'_' | b'-')
                    })
                    && !component.contains("..")
            }
            _ => false,
        }
    }

    fn valid_tag(tag: &str) -> bool {
        !tag.is_empty()
            && tag.len() <= 128
            && !tag.starts_with(['.', '-'])
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    }

    /// Get the full reference string.
    pub fn full_reference(&self) -> String {
        let mut s = format!("{}/{}", self.registry, self.repository);
        if let Some(ref tag) = self.tag {
            s.push(':');
            s.push_str(tag);
        }
        if let Some(ref digest) = self.digest {
            s.push('@');
            s.push_str(digest);
        }
        s
    }
}

impl std::fmt::Display for ImageReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.full_reference())
    }
}
