//! Process bootstrap and the runtime context shared by every module.
//!
//! [`AppBuilder`] sets up paths and logging once per process. The resulting
//! [`AppContext`] opens the settings file; [`Core`] is then constructed from
//! those settings and handed to every client or server module.

mod clock;
mod context;
mod ui;

pub use clock::SyncClock;
pub use context::{Core, NetworkIdentity};
pub use ui::{UiBridge, UiEvent};

use paths::PathContext;
use settings::{SettingsError, SettingsStore};
use std::marker::PhantomData;
#[cfg(debug_assertions)]
use std::path::PathBuf;
use std::path::Path;
use tracing_subscriber::{
    Layer, filter::LevelFilter, filter::filter_fn, fmt, layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Process-wide infrastructure: paths, version and the log writer.
pub struct AppContext {
    pub path_context: PathContext,
    pub version: &'static str,
    /// Keeps the non-blocking log writer flushing until the process exits.
    _log_guard: tracing_appender::non_blocking::WorkerGuard,
}

impl AppContext {
    pub fn app_id(&self) -> &str {
        self.path_context.app_id()
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    pub fn path_context(&self) -> &PathContext {
        &self.path_context
    }

    /// Opens the settings file of this application, or `path` when given.
    pub fn settings_store(&self, path: Option<&Path>) -> Result<SettingsStore, SettingsError> {
        match path {
            Some(path) => SettingsStore::open(path),
            None => SettingsStore::open(self.path_context.settings_file(None)),
        }
    }
}

/// Identity of an executable.
pub trait Application: Sized + 'static {
    const APP_ID: &'static str;
    const STUDIO: &'static str = "tracer";
    const PROJECT_ID: &'static str = "scene_sync";
}

pub struct AppBuilder<A: Application> {
    context: AppContext,
    _marker: PhantomData<A>,
}

impl<A: Application> AppBuilder<A> {
    /// Creates the directory layout and installs the global subscriber
    /// (file + console, `INFO` in debug builds, `WARN` in release builds).
    pub fn new(version: &'static str) -> Result<Self, BoxError> {
        #[cfg(debug_assertions)]
        let path_context = PathContext::with_base_path(
            PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("..")
                .join("..")
                .join(".out"),
            A::STUDIO,
            A::PROJECT_ID,
            A::APP_ID,
        );
        #[cfg(not(debug_assertions))]
        let path_context = PathContext::new(A::STUDIO, A::PROJECT_ID, A::APP_ID);

        path_context.ensure_directories()?;

        let log_file_path = path_context.log_file_now();
        let log_dir = log_file_path
            .parent()
            .ok_or("log file path has no parent directory")?;
        let log_filename = log_file_path
            .file_name()
            .ok_or("log file path has no file name")?;

        let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        #[cfg(debug_assertions)]
        let level = LevelFilter::INFO;

        #[cfg(not(debug_assertions))]
        let level = LevelFilter::WARN;

        let file_layer = fmt::Layer::default()
            .with_target(false)
            .with_ansi(false)
            .with_writer(non_blocking)
            .with_filter(filter_fn(move |metadata| metadata.level() <= &level));

        let console_layer = fmt::Layer::default()
            .with_target(false)
            .with_filter(filter_fn(move |metadata| metadata.level() <= &level));

        tracing_subscriber::registry()
            .with(file_layer)
            .with(console_layer)
            .try_init()?;

        tracing::info!(app = A::APP_ID, version, log = %log_file_path.display(), "logging initialised");

        Ok(Self {
            context: AppContext {
                path_context,
                version,
                _log_guard: guard,
            },
            _marker: PhantomData,
        })
    }

    pub fn build(self) -> AppContext {
        self.context
    }
}
