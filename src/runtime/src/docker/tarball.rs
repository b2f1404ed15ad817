//! `docker save` tarball provider.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use imgscope_core::error::{Result, ScopeError};
use imgscope_core::SourceKind;
use oci_spec::image::ImageConfiguration;
use serde::Deserialize;

use crate::archive;
use crate::image::{parse_image_config, Image, ImageConfig, ImageMetadata, Layer};
use crate::provider::Provider;
use crate::scratch::TempDirGenerator;

/// Media type recorded for docker-save layers (uncompressed tar).
const DOCKER_LAYER_MEDIA_TYPE: &str = "application/vnd.docker.image.rootfs.diff.tar";

/// Media type recorded for gzip layers found in docker archives.
const DOCKER_LAYER_GZIP_MEDIA_TYPE: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

/// One entry of a docker archive's `manifest.json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManifestEntry {
    config: String,
    #[serde(default)]
    repo_tags: Option<Vec<String>>,
    layers: Vec<String>,
}

/// Acquires images from a tarball produced by `docker save`.
#[derive(Debug, Clone)]
pub struct DockerArchiveProvider {
    path: PathBuf,
    scratch: Arc<TempDirGenerator>,
}

impl DockerArchiveProvider {
    pub fn new(path: impl Into<PathBuf>, scratch: Arc<TempDirGenerator>) -> Self {
        Self {
            path: path.into(),
            scratch,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Provider for DockerArchiveProvider {
    fn provide(&self) -> Result<Image> {
        let root_dir = self.scratch.new_directory("docker-archive")?;
        archive::unpack_archive(&self.path, &root_dir)?;

        let entry = load_manifest(&root_dir)?;
        let config_path = archive_path(&root_dir, &entry.config)?;
        let oci_config = load_config(&config_path)?;
        let diff_ids = oci_config.rootfs().diff_ids();

        let mut layers = Vec::with_capacity(entry.layers.len());
        for (index, name) in entry.layers.iter().enumerate() {
            let blob_path = archive_path(&root_dir, name)?;
            let size = std::fs::metadata(&blob_path)
                .map_err(|e| {
                    ScopeError::Docker(format!("Layer {} missing from archive: {}", name, e))
                })?
                .len();
            let diff_id = diff_ids.get(index).cloned();
            let gzip = archive::is_gzip(&blob_path)?;

            layers.push(Layer {
                index,
                // diff ids hash the uncompressed tar, so they only verify plain layers
                digest: if gzip {
                    String::new()
                } else {
                    diff_id.clone().unwrap_or_default()
                },
                media_type: if gzip {
                    DOCKER_LAYER_GZIP_MEDIA_TYPE
                } else {
                    DOCKER_LAYER_MEDIA_TYPE
                }
                .to_string(),
                size,
                diff_id,
                blob_path,
                content_dir: None,
                file_count: 0,
            });
        }

        let metadata = ImageMetadata {
            id: Some(archive::sha256_file(&config_path)?),
            manifest_digest: None,
            tags: entry.repo_tags.unwrap_or_default(),
            architecture: oci_config.architecture().to_string(),
            os: oci_config.os().to_string(),
        };

        tracing::debug!(
            path = %self.path.display(),
            layers = layers.len(),
            "Loaded docker archive"
        );

        Ok(Image::new(
            SourceKind::DockerArchive,
            self.path.display().to_string(),
            metadata,
            ImageConfig::from_oci_config(&oci_config),
            layers,
            Arc::clone(&self.scratch),
        ))
    }
}

/// Read the first image entry of `manifest.json`.
fn load_manifest(root_dir: &Path) -> Result<ManifestEntry> {
    let manifest_path = root_dir.join("manifest.json");
    let content = std::fs::read_to_string(&manifest_path).map_err(|e| {
        ScopeError::Docker(format!(
            "Not a docker archive: cannot read manifest.json: {}",
            e
        ))
    })?;

    let entries: Vec<ManifestEntry> = serde_json::from_str(&content)
        .map_err(|e| ScopeError::Docker(format!("Failed to parse manifest.json: {}", e)))?;

    entries
        .into_iter()
        .next()
        .ok_or_else(|| ScopeError::Docker("No images in manifest.json".to_string()))
}

fn load_config(path: &Path) -> Result<ImageConfiguration> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        ScopeError::Docker(format!("Failed to read config {}: {}", path.display(), e))
    })?;
    parse_image_config(&content)
        .map_err(|e| ScopeError::Docker(format!("Failed to parse image config: {}", e)))
}

/// Resolve a path named inside `manifest.json`, refusing escapes.
fn archive_path(root_dir: &Path, name: &str) -> Result<PathBuf> {
    let relative = Path::new(name);
    if relative.is_absolute()
        || relative
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(ScopeError::Docker(format!(
            "Invalid path in manifest.json: {}",
            name
        )));
    }
    Ok(root_dir.join(relative))
}
