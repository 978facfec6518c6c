//! Where integration tests leave their artifacts.
//!
//! Photometry tables and config files written by tests land under
//! `<workspace>/test_output/` so they survive the run for inspection.
//!
//! ```no_run
//! use test_helpers::output_path;
//!
//! let table = output_path("photometry/run_photOut.dat");
//! std::fs::write(&table, "Aperture (radius, pixels) = 3\n").unwrap();
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

/// `<workspace>/test_output`; this crate sits one level below the workspace root.
static OUTPUT_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .unwrap_or(manifest_dir)
        .join("test_output")
});

/// Path of an artifact inside the test output directory, with its parent
/// directories already created.
///
/// # Panics
/// If the directories cannot be created.
pub fn output_path<P: AsRef<Path>>(path: P) -> PathBuf {
    let full = OUTPUT_DIR.join(path);
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent).unwrap_or_else(|e| {
            panic!("cannot create test output directory {}: {e}", parent.display())
        });
    }
    full
}
