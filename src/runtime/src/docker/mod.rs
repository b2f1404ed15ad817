//! Docker image sources: `docker save` tarballs and the local daemon.

mod client;
mod daemon;
mod tarball;

pub use client::{DockerApi, DockerCli};
pub use daemon::DockerDaemonProvider;
pub use tarball::DockerArchiveProvider;
