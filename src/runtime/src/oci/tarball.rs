//! OCI layout tarball provider.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use imgscope_core::error::Result;
use imgscope_core::SourceKind;

use crate::archive;
use crate::image::Image;
use crate::oci::OciDirectoryProvider;
use crate::provider::Provider;
use crate::scratch::TempDirGenerator;

/// Acquires images from a tarball of an OCI image layout.
///
/// The tarball is unpacked into scratch space and then read as a layout
/// directory.
#[derive(Debug, Clone)]
pub struct OciArchiveProvider {
    path: PathBuf,
    scratch: Arc<TempDirGenerator>,
}

impl OciArchiveProvider {
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

impl Provider for OciArchiveProvider {
    fn provide(&self) -> Result<Image> {
        let layout_dir = self.scratch.new_directory("oci-archive")?;
        archive::unpack_archive(&self.path, &layout_dir)?;

        let mut image =
            OciDirectoryProvider::new(&layout_dir, Arc::clone(&self.scratch)).provide()?;
        image.set_source(SourceKind::OciArchive, self.path.display().to_string());
        Ok(image)
    }
}
