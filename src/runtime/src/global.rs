//! Process-wide convenience API.
//!
//! A lazily initialized default context holds one scratch space and the
//! installed logger and event publisher. [`get_image`] acquires through it;
//! [`cleanup`] tears its scratch space down at shutdown.

use std::sync::{Arc, OnceLock};

use imgscope_core::error::Result;
use imgscope_core::event::{EventPublisher, NoopPublisher};
use imgscope_core::log::{Logger, NoopLogger};
use imgscope_core::{ProcessingOption, ScopeConfig};
use parking_lot::RwLock;

use crate::client::ImageClient;
use crate::docker::{DockerApi, DockerCli};
use crate::image::Image;
use crate::scratch::TempDirGenerator;

// ============================================================================
// GLOBAL DEFAULT CONTEXT
// ============================================================================

static DEFAULT_CONTEXT: OnceLock<GlobalContext> = OnceLock::new();

struct GlobalContext {
    config: ScopeConfig,
    docker: Arc<dyn DockerApi>,
    scratch: Arc<TempDirGenerator>,
    logger: RwLock<Arc<dyn Logger>>,
    publisher: RwLock<Arc<dyn EventPublisher>>,
}

impl GlobalContext {
    fn new(config: ScopeConfig) -> Self {
        Self {
            docker: Arc::new(DockerCli::from_config(&config)),
            scratch: Arc::new(TempDirGenerator::from_config(&config)),
            logger: RwLock::new(Arc::new(NoopLogger)),
            publisher: RwLock::new(Arc::new(NoopPublisher)),
            config,
        }
    }

    /// Client bound to the shared scratch space and the hooks installed now.
    fn client(&self) -> ImageClient {
        ImageClient::builder()
            .config(self.config.clone())
            .docker(Arc::clone(&self.docker))
            .scratch(Arc::clone(&self.scratch))
            .logger(self.logger.read().clone())
            .publisher(self.publisher.read().clone())
            .build()
    }
}

fn context() -> &'static GlobalContext {
    DEFAULT_CONTEXT.get_or_init(|| {
        let config = ScopeConfig::load_default().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ignoring unreadable config file, using defaults");
            ScopeConfig::default().with_env_overrides(|key| std::env::var(key).ok())
        });
        GlobalContext::new(config)
    })
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Initialize the default context with `config`.
///
/// Returns `false` if the context was already initialized (explicitly or by
/// an earlier call into this module), in which case `config` is ignored.
pub fn init(config: ScopeConfig) -> bool {
    DEFAULT_CONTEXT.set(GlobalContext::new(config)).is_ok()
}

/// Acquire an image through the default context.
///
/// See [`ImageClient::get_image`].
pub fn get_image(locator: &str, options: &[ProcessingOption]) -> Result<Image> {
    context().client().get_image(locator, options)
}

/// Replace the process-wide logger used by [`get_image`].
pub fn set_logger(logger: Arc<dyn Logger>) {
    *context().logger.write() = logger;
}

/// Replace the process-wide event publisher used by [`get_image`].
pub fn set_event_publisher(publisher: Arc<dyn EventPublisher>) {
    *context().publisher.write() = publisher;
}

/// Remove all scratch space created through [`get_image`].
///
/// Must not run concurrently with acquisitions. Images acquired earlier are
/// unusable afterwards.
pub fn cleanup() -> Result<()> {
    context().scratch.cleanup()
}

/// [`cleanup`], reporting failure through the installed logger instead of
/// returning it.
pub fn cleanup_and_log() {
    if let Err(e) = cleanup() {
        let logger = context().logger.read().clone();
        logger.error(&format!("failed to cleanup: {}", e));
    }
}
