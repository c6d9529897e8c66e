//! Shared helpers for unit tests.

use std::path::Path;
use std::sync::Mutex;

static CWD_LOCK: Mutex<()> = Mutex::new(());

/// Run `f` with the process working directory set to `dir`.
///
/// Tests that expand relative glob patterns depend on the cwd, which is
/// process-global; this serializes them on one lock and always restores the
/// previous directory.
pub fn in_dir<T>(dir: &Path, f: impl FnOnce() -> T) -> T {
    let _guard = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let old = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir).unwrap();
    let out = f();
    std::env::set_current_dir(old).unwrap();
    out
}
