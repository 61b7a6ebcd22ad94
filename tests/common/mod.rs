use once_cell::sync::Lazy;
use tempfile::TempDir;

static LOGGER: Lazy<()> = Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

/// Initialize logging once per test binary.
pub fn init() {
    Lazy::force(&LOGGER);
}

/// A scratch directory for one test database. Cleaned up on drop.
pub fn temp_dir() -> TempDir {
    init();
    tempfile::tempdir().expect("failed to create temp dir")
}
