//! OCI image layout support.
//!
//! Providers for images stored as an OCI image layout, either as a
//! directory or as a tarball of one.
//!
//! ```text
//! layout/
//! ├── oci-layout           (OCI layout marker)
//! ├── index.json           (Image index)
//! └── blobs/
//!     └── sha256/
//!         ├── <manifest>   (Image manifest)
//!         ├── <config>     (Image configuration)
//!         └── <layers>     (Filesystem layers)
//! ```

mod directory;
mod tarball;

pub use directory::OciDirectoryProvider;
pub use tarball::OciArchiveProvider;
