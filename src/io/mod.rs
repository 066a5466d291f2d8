pub mod backend;
pub mod file_backend;
pub mod json_io;
pub mod memory_backend;

use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Replaces the file at `path` with `content` in a single rename, creating
/// missing parent directories first. Readers see the old bytes or the new
/// ones, never a mix.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".stockgrid-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    staged.write_all(content)?;
    staged.flush()?;
    staged.as_file().sync_all()?;
    staged.persist(path).map(drop).map_err(|err| err.error)
}
