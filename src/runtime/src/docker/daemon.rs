//! Docker daemon provider.

use std::sync::Arc;

use imgscope_core::error::Result;
use imgscope_core::SourceKind;

use super::{DockerApi, DockerArchiveProvider};
use crate::image::Image;
use crate::provider::Provider;
use crate::scratch::TempDirGenerator;

/// Acquires an image held by the local docker daemon.
///
/// The image is exported with `docker save` into scratch space and then
/// read as a docker archive.
pub struct DockerDaemonProvider {
    reference: String,
    scratch: Arc<TempDirGenerator>,
    docker: Arc<dyn DockerApi>,
}

impl DockerDaemonProvider {
    pub fn new(
        reference: impl Into<String>,
        scratch: Arc<TempDirGenerator>,
        docker: Arc<dyn DockerApi>,
    ) -> Self {
        Self {
            reference: reference.into(),
            scratch,
            docker,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }
}

impl std::fmt::Debug for DockerDaemonProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerDaemonProvider")
            .field("reference", &self.reference)
            .finish()
    }
}

impl Provider for DockerDaemonProvider {
    fn provide(&self) -> Result<Image> {
        let save_dir = self.scratch.new_directory("docker-daemon")?;
        let tarball = save_dir.join("image.tar");

        tracing::info!(reference = %self.reference, "Exporting image from docker daemon");
        self.docker.save(&self.reference, &tarball)?;

        let mut image =
            DockerArchiveProvider::new(&tarball, Arc::clone(&self.scratch)).provide()?;
        image.set_source(SourceKind::DockerDaemon, self.reference.clone());

        let metadata = image.metadata_mut();
        if metadata.tags.is_empty() {
            metadata.tags.push(self.reference.clone());
        }
        Ok(image)
    }
}
