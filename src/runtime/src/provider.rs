//! Provider abstraction and factory.
//!
//! Every source kind has exactly one provider; [`ImageProvider`] is the
//! closed set of them, chosen by [`ImageProvider::new`].

use std::sync::Arc;

use imgscope_core::error::{Result, ScopeError};
use imgscope_core::SourceKind;

use crate::docker::{DockerApi, DockerArchiveProvider, DockerDaemonProvider};
use crate::image::Image;
use crate::oci::{OciArchiveProvider, OciDirectoryProvider};
use crate::scratch::TempDirGenerator;

/// Acquires an image from one kind of source.
pub trait Provider {
    /// Produce an image handle. Does not read layer contents.
    fn provide(&self) -> Result<Image>;
}

/// Provider selected for a classified locator.
#[derive(Debug)]
pub enum ImageProvider {
    DockerArchive(DockerArchiveProvider),
    DockerDaemon(DockerDaemonProvider),
    OciDirectory(OciDirectoryProvider),
    OciArchive(OciArchiveProvider),
}

impl ImageProvider {
    /// Select the provider for `kind`, bound to `locator` and the shared
    /// scratch space.
    ///
    /// Performs no I/O. [`SourceKind::Unknown`] has no provider and yields
    /// [`ScopeError::Dispatch`].
    pub fn new(
        kind: SourceKind,
        locator: &str,
        scratch: &Arc<TempDirGenerator>,
        docker: &Arc<dyn DockerApi>,
    ) -> Result<Self> {
        let scratch = Arc::clone(scratch);
        let provider = match kind {
            SourceKind::DockerArchive => {
                ImageProvider::DockerArchive(DockerArchiveProvider::new(locator, scratch))
            }
            SourceKind::DockerDaemon => ImageProvider::DockerDaemon(DockerDaemonProvider::new(
                locator,
                scratch,
                Arc::clone(docker),
            )),
            SourceKind::OciDirectory => {
                ImageProvider::OciDirectory(OciDirectoryProvider::new(locator, scratch))
            }
            SourceKind::OciArchive => {
                ImageProvider::OciArchive(OciArchiveProvider::new(locator, scratch))
            }
            SourceKind::Unknown => return Err(ScopeError::Dispatch(kind)),
        };
        Ok(provider)
    }

    /// Source kind this provider serves.
    pub fn kind(&self) -> SourceKind {
        match self {
            ImageProvider::DockerArchive(_) => SourceKind::DockerArchive,
            ImageProvider::DockerDaemon(_) => SourceKind::DockerDaemon,
            ImageProvider::OciDirectory(_) => SourceKind::OciDirectory,
            ImageProvider::OciArchive(_) => SourceKind::OciArchive,
        }
    }
}

impl Provider for ImageProvider {
    fn provide(&self) -> Result<Image> {
        match self {
            ImageProvider::DockerArchive(p) => p.provide(),
            ImageProvider::DockerDaemon(p) => p.provide(),
            ImageProvider::OciDirectory(p) => p.provide(),
            ImageProvider::OciArchive(p) => p.provide(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::DockerCli;
    use std::path::Path;

    fn fixtures() -> (Arc<TempDirGenerator>, Arc<dyn DockerApi>) {
        let scratch = Arc::new(TempDirGenerator::default());
        let docker: Arc<dyn DockerApi> = Arc::new(DockerCli::new("/nonexistent/docker"));
        (scratch, docker)
    }

    #[test]
    fn test_each_known_kind_has_a_provider() {
        let (scratch, docker) = fixtures();
        for kind in SourceKind::KNOWN {
            let provider = ImageProvider::new(kind, "locator", &scratch, &docker).unwrap();
            assert_eq!(provider.kind(), kind);
        }
    }

    #[test]
    fn test_provider_is_bound_to_locator() {
        let (scratch, docker) = fixtures();

        match ImageProvider::new(SourceKind::OciDirectory, "/tmp/layout", &scratch, &docker)
            .unwrap()
        {
            ImageProvider::OciDirectory(p) => assert_eq!(p.path(), Path::new("/tmp/layout")),
            other => panic!("unexpected provider: {:?}", other),
        }

        match ImageProvider::new(SourceKind::DockerDaemon, "busybox:latest", &scratch, &docker)
            .unwrap()
        {
            ImageProvider::DockerDaemon(p) => assert_eq!(p.reference(), "busybox:latest"),
            other => panic!("unexpected provider: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_kind_is_a_dispatch_error() {
        let (scratch, docker) = fixtures();
        let err = ImageProvider::new(SourceKind::Unknown, "x", &scratch, &docker).unwrap_err();

        assert!(matches!(err, ScopeError::Dispatch(SourceKind::Unknown)));
        assert_eq!(
            err.to_string(),
            "unable to determine image source provider for 'unknown'"
        );
    }

    #[test]
    fn test_factory_issues_no_scratch() {
        let (scratch, docker) = fixtures();
        for kind in SourceKind::KNOWN {
            ImageProvider::new(kind, "locator", &scratch, &docker).unwrap();
        }
        assert_eq!(scratch.issued(), 0);
    }
}
