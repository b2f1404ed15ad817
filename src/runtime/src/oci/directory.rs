//! OCI image layout directory provider.
//!
//! Handles parsing of an OCI image layout including index, manifest and
//! configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use imgscope_core::error::{Result, ScopeError};
use imgscope_core::SourceKind;
use oci_spec::image::{Descriptor, ImageConfiguration, ImageIndex, ImageManifest, MediaType};

use crate::image::{parse_image_config, Image, ImageConfig, ImageMetadata, Layer};
use crate::provider::Provider;
use crate::scratch::TempDirGenerator;

/// Annotation carrying the reference name of a manifest in `index.json`.
const REF_NAME_ANNOTATION: &str = "org.opencontainers.image.ref.name";

/// Acquires images from an OCI image layout on disk.
#[derive(Debug, Clone)]
pub struct OciDirectoryProvider {
    path: PathBuf,
    scratch: Arc<TempDirGenerator>,
}

impl OciDirectoryProvider {
    pub fn new(path: impl Into<PathBuf>, scratch: Arc<TempDirGenerator>) -> Self {
        Self {
            path: path.into(),
            scratch,
        }
    }

    /// Root directory of the layout.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Provider for OciDirectoryProvider {
    /// The directory must contain a valid OCI image layout:
    /// - oci-layout file
    /// - index.json
    /// - blobs/<algorithm>/ directory with manifest, config, and layers
    fn provide(&self) -> Result<Image> {
        let root_dir = &self.path;
        validate_oci_layout(root_dir)?;

        let index = load_index(root_dir)?;
        let (descriptor, manifest, tags) = resolve_manifest(root_dir, &index)?;

        let config_digest = manifest.config().digest().to_string();
        let oci_config = load_config(root_dir, &config_digest)?;
        let diff_ids = oci_config.rootfs().diff_ids();

        let layers = manifest
            .layers()
            .iter()
            .enumerate()
            .map(|(index, layer)| {
                let size = u64::try_from(layer.size()).map_err(|_| {
                    ScopeError::OciImageError(format!(
                        "Invalid size {} for layer {}",
                        layer.size(),
                        layer.digest()
                    ))
                })?;
                Ok(Layer {
                    index,
                    digest: layer.digest().to_string(),
                    media_type: layer.media_type().to_string(),
                    size,
                    diff_id: diff_ids.get(index).cloned(),
                    blob_path: blob_path(root_dir, &layer.digest().to_string())?,
                    content_dir: None,
                    file_count: 0,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let metadata = ImageMetadata {
            id: Some(config_digest),
            manifest_digest: Some(descriptor.digest().to_string()),
            tags,
            architecture: oci_config.architecture().to_string(),
            os: oci_config.os().to_string(),
        };

        tracing::debug!(
            path = %root_dir.display(),
            layers = layers.len(),
            "Loaded OCI image layout"
        );

        Ok(Image::new(
            SourceKind::OciDirectory,
            root_dir.display().to_string(),
            metadata,
            ImageConfig::from_oci_config(&oci_config),
            layers,
            Arc::clone(&self.scratch),
        ))
    }
}

/// Validate that the directory contains a valid OCI layout.
fn validate_oci_layout(root_dir: &Path) -> Result<()> {
    for required in ["oci-layout", "index.json", "blobs"] {
        if !root_dir.join(required).exists() {
            return Err(ScopeError::OciImageError(format!(
                "Not a valid OCI layout: missing {} in {}",
                required,
                root_dir.display()
            )));
        }
    }
    Ok(())
}

/// Load the image index from index.json.
fn load_index(root_dir: &Path) -> Result<ImageIndex> {
    let index_path = root_dir.join("index.json");
    let content = std::fs::read_to_string(&index_path).map_err(|e| {
        ScopeError::OciImageError(format!(
            "Failed to read index.json at {}: {}",
            index_path.display(),
            e
        ))
    })?;

    serde_json::from_str(&content)
        .map_err(|e| ScopeError::OciImageError(format!("Failed to parse index.json: {}", e)))
}

/// Pick the image manifest: the first manifest in the index, following one
/// level of nested index.
///
/// Also returns the reference names annotated on the descriptors that led
/// to the chosen manifest.
fn resolve_manifest(
    root_dir: &Path,
    index: &ImageIndex,
) -> Result<(Descriptor, ImageManifest, Vec<String>)> {
    let descriptor = index
        .manifests()
        .first()
        .ok_or_else(|| ScopeError::OciImageError("No manifests in index.json".to_string()))?;

    if *descriptor.media_type() == MediaType::ImageIndex {
        let nested: ImageIndex = load_blob(root_dir, &descriptor.digest().to_string(), "index")?;
        let inner = nested
            .manifests()
            .iter()
            .find(|d| *d.media_type() == MediaType::ImageManifest)
            .ok_or_else(|| {
                ScopeError::OciImageError(format!(
                    "No image manifest in nested index {}",
                    descriptor.digest()
                ))
            })?;
        let manifest = load_blob(root_dir, &inner.digest().to_string(), "manifest")?;
        let mut tags = ref_name(descriptor);
        for tag in ref_name(inner) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        return Ok((inner.clone(), manifest, tags));
    }

    let manifest = load_blob(root_dir, &descriptor.digest().to_string(), "manifest")?;
    Ok((descriptor.clone(), manifest, ref_name(descriptor)))
}

/// Load the image configuration from blobs.
fn load_config(root_dir: &Path, digest: &str) -> Result<ImageConfiguration> {
    let content = read_blob(root_dir, digest, "config")?;
    parse_image_config(&content)
        .map_err(|e| ScopeError::OciImageError(format!("Failed to parse config: {}", e)))
}

fn load_blob<T: serde::de::DeserializeOwned>(root_dir: &Path, digest: &str, what: &str) -> Result<T> {
    let content = read_blob(root_dir, digest, what)?;
    serde_json::from_str(&content)
        .map_err(|e| ScopeError::OciImageError(format!("Failed to parse {}: {}", what, e)))
}

fn read_blob(root_dir: &Path, digest: &str, what: &str) -> Result<String> {
    let blob_path = blob_path(root_dir, digest)?;
    std::fs::read_to_string(&blob_path).map_err(|e| {
        ScopeError::OciImageError(format!(
            "Failed to read {} at {}: {}",
            what,
            blob_path.display(),
            e
        ))
    })
}

/// Reference name annotated on a single descriptor.
fn ref_name(descriptor: &Descriptor) -> Vec<String> {
    descriptor
        .annotations()
        .as_ref()
        .and_then(|a| a.get(REF_NAME_ANNOTATION).cloned())
        .into_iter()
        .collect()
}

/// Get the path to a blob by digest, refusing digests that would leave
/// the blobs directory.
pub(crate) fn blob_path(root_dir: &Path, digest: &str) -> Result<PathBuf> {
    // Digest format: "sha256:abc123..."
    let (algorithm, hash) = digest.split_once(':').unwrap_or(("sha256", digest));
    let safe = |part: &str| {
        !part.is_empty() && part != "." && part != ".." && !part.contains(['/', '\\'])
    };
    if !safe(algorithm) || !safe(hash) {
        return Err(ScopeError::OciImageError(format!(
            "Invalid blob digest: {}",
            digest
        )));
    }
    Ok(root_dir.join("blobs").join(algorithm).join(hash))
}
