//! Unpacking of published `-sources.jar` archives.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use zip::ZipArchive;

use crate::core::errors::{CovsbomError, Result};

/// Directory of archive metadata that is never source.
pub const META_INF: &str = "META-INF";

/// Extract every entry of a zip-format archive into `destination`.
///
/// Entries whose names would escape `destination` are skipped. Returns the
/// number of files written.
pub fn unpack_source_archive(archive: &Path, destination: &Path) -> Result<usize> {
    let file = File::open(archive).map_err(|e| {
        CovsbomError::io(format!("Failed to open archive {}", archive.display()), e)
    })?;
    let mut zip = ZipArchive::new(file).map_err(|e| {
        CovsbomError::acquisition(archive.display().to_string(), format!("not a zip archive: {e}"))
    })?;

    fs::create_dir_all(destination).map_err(|e| {
        CovsbomError::io(format!("Failed to create {}", destination.display()), e)
    })?;

    let mut written = 0;
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index)?;
        let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
            warn!("Skipping unsafe entry {} in {}", entry.name(), archive.display());
            continue;
        };
        let target: PathBuf = destination.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)
            .map_err(|e| CovsbomError::io(format!("Failed to create {}", target.display()), e))?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }

    debug!("Unpacked {} file(s) from {}", written, archive.display());
    Ok(written)
}

/// Remove the `META-INF` directory from an unpacked root, if present
pub fn strip_meta_inf(root: &Path) -> Result<bool> {
    let meta = root.join(META_INF);
    if !meta.is_dir() {
        return Ok(false);
    }
    fs::remove_dir_all(&meta)
        .map_err(|e| CovsbomError::io(format!("Failed to remove {}", meta.display()), e))?;
    Ok(true)
}
