//! Output tree writes.
//!
//! Only the pipeline writes pages, and always through [`write_atomic`]: a
//! reader sees either the previous file or the complete new one.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::error::PrepareError;
use crate::plugin::PluginDescriptor;

/// Write `bytes` to `path` via a temporary file in the same directory and a
/// rename.
///
/// The temporary file is removed if any step fails.
///
/// # Errors
///
/// Returns the I/O error of the failing step.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new()
        .prefix(".quire-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_data()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create the output directory and copy plugin assets into it.
///
/// Each plugin's public folder is copied to `{output_dir}/{name}/`. A
/// declared folder that does not exist, or fails to copy, is logged and
/// skipped.
///
/// # Errors
///
/// Returns [`PrepareError`] if the output directory cannot be created.
pub fn prepare_output(output_dir: &Path, plugins: &[PluginDescriptor]) -> Result<(), PrepareError> {
    fs::create_dir_all(output_dir).map_err(|source| PrepareError {
        path: output_dir.to_path_buf(),
        source,
    })?;

    for plugin in plugins {
        let Some(folder) = &plugin.public_folder else {
            continue;
        };
        if !folder.is_dir() {
            tracing::warn!(
                plugin = %plugin.name,
                folder = %folder.display(),
                "Plugin public folder not found, skipping"
            );
            continue;
        }
        let target = output_dir.join(&plugin.name);
        match copy_dir(folder, &target) {
            Ok(count) => {
                tracing::debug!(plugin = %plugin.name, files = count, "Copied plugin assets");
            }
            Err(e) => {
                tracing::warn!(plugin = %plugin.name, error = %e, "Failed to copy plugin assets");
            }
        }
    }
    Ok(())
}

/// Recursively copy `from` into `to`. Returns the number of files copied.
fn copy_dir(from: &Path, to: &Path) -> io::Result<usize> {
    fs::create_dir_all(to)?;
    let mut count = 0;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            count += copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
            count += 1;
        }
    }
    Ok(count)
}
