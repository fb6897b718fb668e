//! Console and file logging built on `tracing`.

mod logger;
mod subscriber;
mod types;
mod utils;

pub use logger::Logger;
pub use subscriber::init_subscriber;
pub use types::{ActionEntry, ActionStatus, Log};

/// Tracing target for section headers.
pub const STAGE_TARGET: &str = "workspaced::stage";
/// Tracing target for dry-run lines.
pub const DRY_RUN_TARGET: &str = "workspaced::dry_run";

/// A [`Logger`] writing to a log file in a fresh temp dir, with a
/// thread-local subscriber so events reach that file.
///
/// Keep the guard alive for the duration of the test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};
    let tmp = tempfile::tempdir().expect("temp dir");
    let path = tmp.path().join("test.log");
    let file_layer = subscriber::FileLayer::create(&path).expect("file layer");
    let log = Logger::with_log_path(Some(path));
    let subscriber =
        tracing_subscriber::registry().with(file_layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (log, tmp, guard)
}
