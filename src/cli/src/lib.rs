//! imgscope CLI - inspect container images from the docker daemon,
//! `docker save` tarballs and OCI layouts.

pub mod commands;
pub mod output;
