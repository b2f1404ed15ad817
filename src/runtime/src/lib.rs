//! imgscope Runtime - image acquisition.
//!
//! This module turns an image string (a daemon reference, a `docker save`
//! tarball, an OCI layout directory or archive) into an [`Image`] handle,
//! including source classification, provider dispatch, layer reading and
//! scratch-space management.

#![allow(clippy::result_large_err)]

pub mod archive;
pub mod client;
pub mod detect;
pub mod docker;
pub mod global;
pub mod image;
pub mod oci;
pub mod provider;
pub mod reference;
pub mod scratch;

// Re-export common types
pub use client::{ImageClient, ImageClientBuilder};
pub use detect::SourceDetector;
pub use docker::{DockerApi, DockerArchiveProvider, DockerCli, DockerDaemonProvider};
pub use global::{cleanup, cleanup_and_log, get_image, init, set_event_publisher, set_logger};
pub use image::{Image, ImageConfig, ImageMetadata, Layer};
pub use oci::{OciArchiveProvider, OciDirectoryProvider};
pub use provider::{ImageProvider, Provider};
pub use reference::ImageReference;
pub use scratch::TempDirGenerator;

pub use imgscope_core::{ProcessingOption, Result, ScopeConfig, ScopeError, SourceKind};

/// imgscope Runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
