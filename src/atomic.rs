//! Write-then-rename output files
//!
//! Output is first written to a temporary file next to the destination and
//! only renamed over it once writing succeeded, so a failed run never
//! leaves a truncated file at the requested path.

use std::fs::File;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::Result;

/// Create `dest` atomically from whatever `write` puts into the file
pub fn write_atomically<F>(dest: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    write(temp.as_file_mut())?;
    temp.as_file().sync_all()?;

    // Dropping `temp` on any earlier return removes the temporary file
    temp.persist(dest).map_err(|e| e.error)?;
    Ok(())
}
