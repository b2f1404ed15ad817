//! Image acquisition pipeline.
//!
//! [`ImageClient`] ties classification, option resolution, provider
//! selection and the optional read pass together. It owns (a share of) the
//! scratch space every provider writes into, and the logger and event
//! publisher the pipeline reports through.

use std::collections::HashMap;
use std::sync::Arc;

use imgscope_core::error::{Result, ScopeError};
use imgscope_core::event::{events, EventPublisher, ImageEvent, NoopPublisher};
use imgscope_core::log::{Logger, NoopLogger};
use imgscope_core::{ProcessingOption, ScopeConfig, SourceKind};

use crate::detect::SourceDetector;
use crate::docker::{DockerApi, DockerCli};
use crate::image::Image;
use crate::provider::{ImageProvider, Provider};
use crate::scratch::TempDirGenerator;

/// Acquires images by locator.
pub struct ImageClient {
    config: ScopeConfig,
    docker: Arc<dyn DockerApi>,
    detector: SourceDetector,
    scratch: Arc<TempDirGenerator>,
    logger: Arc<dyn Logger>,
    publisher: Arc<dyn EventPublisher>,
}

impl ImageClient {
    /// Client with default configuration and inert observability hooks.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ImageClientBuilder {
        ImageClientBuilder::default()
    }

    pub fn config(&self) -> &ScopeConfig {
        &self.config
    }

    /// Scratch space shared by every image this client acquires.
    pub fn scratch(&self) -> &Arc<TempDirGenerator> {
        &self.scratch
    }

    /// Acquire the image named by `locator`.
    ///
    /// With no `options` the image is read. The returned handle is fully
    /// read when the effective option is [`ProcessingOption::ReadImage`]; a
    /// read failure discards the handle and returns [`ScopeError::Read`].
    pub fn get_image(&self, locator: &str, options: &[ProcessingOption]) -> Result<Image> {
        let (kind, location) = self.detector.detect(locator)?;

        let option = ProcessingOption::resolve(options);

        self.logger.debug(&format!(
            "image: source={} location={} processing_option={}",
            kind, location, option
        ));

        let provider = ImageProvider::new(kind, &location, &self.scratch, &self.docker)?;

        self.publisher.publish(ImageEvent::with_map(
            events::IMAGE_ACQUIRE_STARTED,
            event_fields(kind, &location, option),
        ));

        match self.acquire(&provider, option) {
            Ok(image) => {
                self.publisher.publish(ImageEvent::with_map(
                    events::IMAGE_ACQUIRE_COMPLETED,
                    event_fields(kind, &location, option),
                ));
                Ok(image)
            }
            Err(e) => {
                let mut fields = event_fields(kind, &location, option);
                fields.insert("error".to_string(), serde_json::json!(e.to_string()));
                self.publisher
                    .publish(ImageEvent::with_map(events::IMAGE_ACQUIRE_FAILED, fields));
                Err(e)
            }
        }
    }

    /// Provide, then read if `option` asks for it.
    fn acquire(&self, provider: &ImageProvider, option: ProcessingOption) -> Result<Image> {
        let mut image = provider
            .provide()?
            .with_publisher(Arc::clone(&self.publisher));

        if option >= ProcessingOption::ReadImage {
            image.read().map_err(ScopeError::read)?;
        }
        Ok(image)
    }

    /// Remove every scratch directory this client's images used.
    ///
    /// Images acquired earlier must no longer be used afterwards.
    pub fn cleanup(&self) -> Result<()> {
        self.scratch.cleanup()
    }
}

impl Default for ImageClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ImageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageClient")
            .field("config", &self.config)
            .field("scratch", &self.scratch)
            .finish_non_exhaustive()
    }
}

fn event_fields(
    kind: SourceKind,
    location: &str,
    option: ProcessingOption,
) -> HashMap<String, serde_json::Value> {
    let mut fields = HashMap::new();
    fields.insert("source".to_string(), serde_json::json!(kind.to_string()));
    fields.insert("location".to_string(), serde_json::json!(location));
    fields.insert("option".to_string(), serde_json::json!(option.to_string()));
    fields
}

/// Builder for [`ImageClient`].
///
/// Anything not set is derived from the configuration (scratch space, docker
/// CLI) or falls back to the inert hooks.
#[derive(Default)]
pub struct ImageClientBuilder {
    config: Option<ScopeConfig>,
    docker: Option<Arc<dyn DockerApi>>,
    scratch: Option<Arc<TempDirGenerator>>,
    logger: Option<Arc<dyn Logger>>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl ImageClientBuilder {
    pub fn config(mut self, config: ScopeConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn docker(mut self, docker: Arc<dyn DockerApi>) -> Self {
        self.docker = Some(docker);
        self
    }

    /// Share an existing scratch space instead of creating one.
    pub fn scratch(mut self, scratch: Arc<TempDirGenerator>) -> Self {
        self.scratch = Some(scratch);
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn build(self) -> ImageClient {
        let config = self.config.unwrap_or_default();
        let docker = self
            .docker
            .unwrap_or_else(|| Arc::new(DockerCli::from_config(&config)));
        let scratch = self
            .scratch
            .unwrap_or_else(|| Arc::new(TempDirGenerator::from_config(&config)));

        ImageClient {
            detector: SourceDetector::new(Arc::clone(&docker)),
            docker,
            scratch,
            logger: self.logger.unwrap_or_else(|| Arc::new(NoopLogger)),
            publisher: self.publisher.unwrap_or_else(|| Arc::new(NoopPublisher)),
            config,
        }
    }
}
