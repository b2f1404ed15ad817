//! The acquired image handle.
//!
//! Providers return an [`Image`] describing the manifest, configuration and
//! layer blobs on disk. [`Image::read`] is the separate, explicit
//! materialization step: it verifies each layer blob and extracts it into
//! scratch space.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use imgscope_core::error::Result;
use imgscope_core::event::{events, EventPublisher, ImageEvent, NoopPublisher};
use imgscope_core::SourceKind;
use oci_spec::image::ImageConfiguration;
use serde::Serialize;

use crate::archive;
use crate::scratch::TempDirGenerator;

/// Identity and platform of an acquired image.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImageMetadata {
    /// Image ID (config digest)
    pub id: Option<String>,
    /// Manifest digest, when the source records one
    pub manifest_digest: Option<String>,
    /// Tags / reference names
    pub tags: Vec<String>,
    pub architecture: String,
    pub os: String,
}

/// Runtime configuration carried by the image.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImageConfig {
    /// Entrypoint command
    pub entrypoint: Option<Vec<String>>,

    /// Default command arguments
    pub cmd: Option<Vec<String>>,

    /// Environment variables
    pub env: Vec<(String, String)>,

    /// Working directory
    pub working_dir: Option<String>,

    /// User to run as
    pub user: Option<String>,

    /// Exposed ports
    pub exposed_ports: Vec<String>,

    /// Labels
    pub labels: HashMap<String, String>,
}

impl ImageConfig {
    /// Create from an OCI (or docker-compatible) image configuration.
    pub fn from_oci_config(oci_config: &ImageConfiguration) -> Self {
        let config = oci_config.config().as_ref();

        let env = config
            .and_then(|c| c.env().as_ref())
            .map(|env_list| {
                env_list
                    .iter()
                    .filter_map(|e| e.split_once('='))
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            entrypoint: config.and_then(|c| c.entrypoint().clone()),
            cmd: config.and_then(|c| c.cmd().clone()),
            env,
            working_dir: config.and_then(|c| c.working_dir().clone()),
            user: config.and_then(|c| c.user().clone()),
            exposed_ports: config
                .and_then(|c| c.exposed_ports().clone())
                .unwrap_or_default(),
            labels: config.and_then(|c| c.labels().clone()).unwrap_or_default(),
        }
    }
}

/// Parse an image configuration blob.
///
/// `history` is optional in image configs but required by
/// `ImageConfiguration`, so a missing one is filled in as empty.
pub(crate) fn parse_image_config(content: &str) -> serde_json::Result<ImageConfiguration> {
    let mut value: serde_json::Value = serde_json::from_str(content)?;
    if let Some(object) = value.as_object_mut() {
        object
            .entry("history")
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
    }
    serde_json::from_value(value)
}

/// One filesystem layer of an image.
#[derive(Debug, Clone, Serialize)]
pub struct Layer {
    /// Position in the layer stack, 0 is the base
    pub index: usize,
    /// Digest the blob on disk must hash to
    pub digest: String,
    pub media_type: String,
    /// Blob size in bytes
    pub size: u64,
    /// Digest of the uncompressed tar, when known
    pub diff_id: Option<String>,
    /// Blob location on disk
    pub blob_path: PathBuf,
    /// Where `read` extracted the layer
    pub content_dir: Option<PathBuf>,
    /// Regular files extracted by `read`
    pub file_count: usize,
}

impl Layer {
    /// Whether this layer has been extracted.
    pub fn is_read(&self) -> bool {
        self.content_dir.is_some()
    }
}

/// An acquired container image.
pub struct Image {
    source: SourceKind,
    locator: String,
    metadata: ImageMetadata,
    config: ImageConfig,
    layers: Vec<Layer>,
    scratch: Arc<TempDirGenerator>,
    publisher: Arc<dyn EventPublisher>,
}

impl Image {
    /// Assemble a handle. Called by providers.
    pub fn new(
        source: SourceKind,
        locator: impl Into<String>,
        metadata: ImageMetadata,
        config: ImageConfig,
        layers: Vec<Layer>,
        scratch: Arc<TempDirGenerator>,
    ) -> Self {
        Self {
            source,
            locator: locator.into(),
            metadata,
            config,
            layers,
            scratch,
            publisher: Arc::new(NoopPublisher),
        }
    }

    /// Route read progress events to `publisher`.
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Re-label the source (used by providers that delegate to another).
    pub(crate) fn set_source(&mut self, source: SourceKind, locator: impl Into<String>) {
        self.source = source;
        self.locator = locator.into();
    }

    pub(crate) fn metadata_mut(&mut self) -> &mut ImageMetadata {
        &mut self.metadata
    }

    /// Source kind the image was acquired from.
    pub fn source(&self) -> SourceKind {
        self.source
    }

    /// Normalized locator the image was acquired from.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    pub fn config(&self) -> &ImageConfig {
        &self.config
    }

    /// Layers in order, bottom to top.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Sum of layer blob sizes.
    pub fn size(&self) -> u64 {
        self.layers.iter().map(|l| l.size).sum()
    }

    /// Whether every layer has been extracted.
    pub fn is_read(&self) -> bool {
        self.layers.iter().all(Layer::is_read)
    }

    /// Verify and extract every layer into scratch space.
    ///
    /// Layers already extracted by an earlier call are skipped. Each layer
    /// goes into its own directory; layers are not merged.
    pub fn read(&mut self) -> Result<()> {
        self.publisher.publish(ImageEvent::with_map(
            events::IMAGE_READ_STARTED,
            self.event_fields(),
        ));

        for layer in self.layers.iter_mut().filter(|l| !l.is_read()) {
            archive::verify_digest(&layer.blob_path, &layer.digest)?;

            let target = self
                .scratch
                .new_directory(&format!("layer-{}", layer.index))?;
            layer.file_count = archive::extract_layer(&layer.blob_path, &layer.media_type, &target)?;
            layer.content_dir = Some(target);

            let mut fields = HashMap::new();
            fields.insert("index".to_string(), serde_json::json!(layer.index));
            fields.insert("digest".to_string(), serde_json::json!(layer.digest));
            fields.insert("files".to_string(), serde_json::json!(layer.file_count));
            self.publisher
                .publish(ImageEvent::with_map(events::IMAGE_LAYER_READ, fields));
        }

        tracing::debug!(
            source = %self.source,
            location = %self.locator,
            layers = self.layers.len(),
            "Read image"
        );

        self.publisher.publish(ImageEvent::with_map(
            events::IMAGE_READ_COMPLETED,
            self.event_fields(),
        ));
        Ok(())
    }

    /// Find the topmost layer containing `path` (relative to the image root).
    ///
    /// Only meaningful after [`Image::read`].
    pub fn find_file(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let relative = path.as_ref().strip_prefix("/").unwrap_or(path.as_ref());
        self.layers
            .iter()
            .rev()
            .filter_map(|l| l.content_dir.as_ref())
            .map(|dir| dir.join(relative))
            .find(|candidate| candidate.symlink_metadata().is_ok())
    }

    fn event_fields(&self) -> HashMap<String, serde_json::Value> {
        let mut fields = HashMap::new();
        fields.insert("source".to_string(), serde_json::json!(self.source.to_string()));
        fields.insert("location".to_string(), serde_json::json!(self.locator));
        fields.insert("layers".to_string(), serde_json::json!(self.layers.len()));
        fields
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("source", &self.source)
            .field("locator", &self.locator)
            .field("metadata", &self.metadata)
            .field("layers", &self.layers.len())
            .finish()
    }
}
