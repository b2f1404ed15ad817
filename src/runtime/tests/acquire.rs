//! End-to-end acquisition through `ImageClient` with on-disk fixtures and a
//! fake docker daemon.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use imgscope_core::event::events;
use imgscope_core::{BroadcastPublisher, ImageEvent};
use imgscope_runtime::{
    DockerApi, ImageClient, ProcessingOption, Result, ScopeError, SourceKind, TempDirGenerator,
};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

// ============================================================================
// Fixtures
// ============================================================================

fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// A `docker save` tarball of a one-layer busybox-like image.
fn docker_archive() -> Vec<u8> {
    let layer = tar_bytes(&[("bin/busybox", b"\x7fELF"), ("etc/passwd", b"root:x:0:0")]);
    let config = format!(
        r#"{{"architecture":"amd64","os":"linux","config":{{"Cmd":["sh"]}},"rootfs":{{"type":"layers","diff_ids":["sha256:{}"]}}}}"#,
        sha256_hex(&layer)
    );
    let manifest =
        r#"[{"Config":"config.json","RepoTags":["busybox:latest"],"Layers":["0/layer.tar"]}]"#;

    tar_bytes(&[
        ("manifest.json", manifest.as_bytes()),
        ("config.json", config.as_bytes()),
        ("0/layer.tar", layer.as_slice()),
    ])
}

/// An OCI layout tarball; `corrupt` replaces the layer blob's content.
fn oci_archive(corrupt: bool) -> Vec<u8> {
    let layer = tar_bytes(&[("etc/os-release", b"ID=fixture")]);
    let layer_hex = sha256_hex(&layer);
    let config = br#"{"architecture":"arm64","os":"linux","rootfs":{"type":"layers","diff_ids":[]}}"#;
    let config_hex = sha256_hex(config);
    let manifest = format!(
        r#"{{"schemaVersion":2,"config":{{"mediaType":"application/vnd.oci.image.config.v1+json","digest":"sha256:{}","size":{}}},"layers":[{{"mediaType":"application/vnd.oci.image.layer.v1.tar","digest":"sha256:{}","size":{}}}]}}"#,
        config_hex,
        config.len(),
        layer_hex,
        layer.len()
    );
    let manifest_hex = sha256_hex(manifest.as_bytes());
    let index = format!(
        r#"{{"schemaVersion":2,"manifests":[{{"mediaType":"application/vnd.oci.image.manifest.v1+json","digest":"sha256:{}","size":{},"annotations":{{"org.opencontainers.image.ref.name":"fixture:1.0"}}}}]}}"#,
        manifest_hex,
        manifest.len()
    );
    let layer_blob: &[u8] = if corrupt { b"not the layer" } else { &layer };

    tar_bytes(&[
        ("oci-layout", br#"{"imageLayoutVersion":"1.0.0"}"#),
        ("index.json", index.as_bytes()),
        (&format!("blobs/sha256/{}", manifest_hex), manifest.as_bytes()),
        (&format!("blobs/sha256/{}", config_hex), config),
        (&format!("blobs/sha256/{}", layer_hex), layer_blob),
    ])
}

/// Daemon double holding a single saved image.
struct FakeDaemon {
    reference: String,
    tarball: Vec<u8>,
    saves: Mutex<usize>,
}

impl FakeDaemon {
    fn with_busybox() -> Self {
        Self {
            reference: "docker.io/library/busybox:latest".to_string(),
            tarball: docker_archive(),
            saves: Mutex::new(0),
        }
    }
}

impl DockerApi for FakeDaemon {
    fn image_exists(&self, reference: &str) -> Result<bool> {
        Ok(reference == self.reference)
    }

    fn save(&self, reference: &str, destination: &Path) -> Result<()> {
        if reference != self.reference {
            return Err(ScopeError::Docker(format!("No such image: {}", reference)));
        }
        *self.saves.lock() += 1;
        fs::write(destination, &self.tarball)?;
        Ok(())
    }
}

struct Harness {
    _dir: TempDir,
    root: std::path::PathBuf,
    daemon: Arc<FakeDaemon>,
    scratch: Arc<TempDirGenerator>,
    publisher: BroadcastPublisher,
    client: ImageClient,
}

fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    let daemon = Arc::new(FakeDaemon::with_busybox());
    let scratch = Arc::new(TempDirGenerator::new(root.join("scratch"), "it-"));
    let publisher = BroadcastPublisher::new(64);
    let client = ImageClient::builder()
        .docker(daemon.clone())
        .scratch(Arc::clone(&scratch))
        .publisher(Arc::new(publisher.clone()))
        .build();

    Harness {
        _dir: dir,
        root,
        daemon,
        scratch,
        publisher,
        client,
    }
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<ImageEvent>) -> Vec<String> {
    std::iter::from_fn(|| rx.try_recv().ok()).map(|e| e.key).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_daemon_image_is_provided_and_read() {
    let h = harness();
    let mut rx = h.publisher.subscribe();

    let image = h.client.get_image("busybox:latest", &[]).unwrap();

    assert_eq!(image.source(), SourceKind::DockerDaemon);
    assert_eq!(image.locator(), "docker.io/library/busybox:latest");
    assert_eq!(image.metadata().tags, vec!["busybox:latest".to_string()]);
    assert!(image.is_read());
    assert!(image.find_file("bin/busybox").is_some());
    assert_eq!(*h.daemon.saves.lock(), 1);

    let keys = drain(&mut rx);
    assert!(keys.contains(&events::IMAGE_READ_COMPLETED.to_string()));
    assert_eq!(keys.last().map(String::as_str), Some(events::IMAGE_ACQUIRE_COMPLETED));
}

#[test]
fn test_oci_tarball_with_no_action_skips_read() {
    let h = harness();
    let tarball = h.root.join("image.tar");
    fs::write(&tarball, oci_archive(false)).unwrap();
    let mut rx = h.publisher.subscribe();

    let image = h
        .client
        .get_image(tarball.to_str().unwrap(), &[ProcessingOption::NoAction])
        .unwrap();

    assert_eq!(image.source(), SourceKind::OciArchive);
    assert_eq!(image.metadata().tags, vec!["fixture:1.0".to_string()]);
    assert!(!image.is_read());
    assert!(image.layers().iter().all(|l| l.content_dir.is_none()));
    // only the unpacked layout, no layer directories
    assert_eq!(h.scratch.issued(), 1);
    assert!(!drain(&mut rx).contains(&events::IMAGE_READ_STARTED.to_string()));
}

#[test]
fn test_unclassifiable_input_issues_nothing() {
    let h = harness();

    let err = h.client.get_image("not-a-real-thing", &[]).unwrap_err();

    assert!(matches!(err, ScopeError::Classification(_)));
    assert_eq!(h.scratch.issued(), 0);
    assert_eq!(*h.daemon.saves.lock(), 0);
}

#[test]
fn test_provide_failure_never_reads() {
    let h = harness();
    let bogus = h.root.join("bogus.tar");
    fs::write(&bogus, tar_bytes(&[("manifest.json", b"not json")])).unwrap();
    let mut rx = h.publisher.subscribe();

    let err = h.client.get_image(bogus.to_str().unwrap(), &[]).unwrap_err();

    assert!(matches!(err, ScopeError::Docker(_)));
    assert_eq!(
        drain(&mut rx),
        vec![events::IMAGE_ACQUIRE_STARTED, events::IMAGE_ACQUIRE_FAILED]
    );
}

#[test]
fn test_read_failure_carries_read_context() {
    let h = harness();
    let tarball = h.root.join("corrupt.tar");
    fs::write(&tarball, oci_archive(true)).unwrap();

    let err = h.client.get_image(tarball.to_str().unwrap(), &[]).unwrap_err();

    assert!(matches!(err, ScopeError::Read(_)));
    assert!(err.to_string().starts_with("could not read image: "));
    let source = std::error::Error::source(&err).unwrap();
    assert!(source.to_string().contains("Digest mismatch"));
}

#[test]
fn test_explicit_scheme_bypasses_detection() {
    let h = harness();
    let tarball = h.root.join("busybox.tar");
    fs::write(&tarball, docker_archive()).unwrap();

    let image = h
        .client
        .get_image(
            &format!("docker-archive:{}", tarball.display()),
            &[ProcessingOption::ReadImage],
        )
        .unwrap();

    assert_eq!(image.source(), SourceKind::DockerArchive);
    assert_eq!(image.layers()[0].file_count, 2);
}

#[test]
fn test_cleanup_removes_everything_issued() {
    let h = harness();
    let tarball = h.root.join("image.tar");
    fs::write(&tarball, oci_archive(false)).unwrap();

    h.client.cleanup().unwrap();

    let oci = h.client.get_image(tarball.to_str().unwrap(), &[]).unwrap();
    let daemon = h.client.get_image("busybox:latest", &[]).unwrap();
    let issued = h.scratch.issued();
    assert!(issued >= 4);
    let dirs: Vec<_> = oci
        .layers()
        .iter()
        .chain(daemon.layers())
        .filter_map(|l| l.content_dir.clone())
        .collect();
    assert!(dirs.iter().all(|d| d.exists()));

    h.client.cleanup().unwrap();

    assert_eq!(h.scratch.issued(), 0);
    assert!(dirs.iter().all(|d| !d.exists()));
    assert_eq!(fs::read_dir(h.root.join("scratch")).unwrap().count(), 0);
    h.client.cleanup().unwrap();
}
