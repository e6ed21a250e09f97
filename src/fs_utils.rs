use std::fs::{DirBuilder, File, OpenOptions};
use std::path::Path;

use crate::error::{CrtAuthError, Result};

/// Directories are created owner-only.
pub const DIR_MODE: u32 = 0o700;
/// Certificates are readable by everyone.
pub const CERT_FILE_MODE: u32 = 0o644;
/// Private keys are readable by their owner only.
pub const KEY_FILE_MODE: u32 = 0o600;

/// Creates `dir` and any missing parents with `mode` (Unix only). Existing directories are left
/// as they are.
pub fn ensure_dir_exists(dir: &Path, mode: u32) -> Result<()> {
    if dir.as_os_str().is_empty() || dir.is_dir() {
        return Ok(());
    }
    let mut builder = DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    builder.create(dir).map_err(|e| CrtAuthError::io(dir, e))
}

/// Opens `path` for writing, truncating it, after creating its parent directories.
///
/// On Unix the file ends up with exactly `file_mode`, whether it is new or already existed.
pub fn mkdir_and_create_file(path: &Path, dir_mode: u32, file_mode: u32) -> Result<File> {
    if let Some(parent) = path.parent() {
        ensure_dir_exists(parent, dir_mode)?;
    }
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(file_mode);
    }
    let file = options.open(path).map_err(|e| CrtAuthError::io(path, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // umask and pre-existing files
        file.set_permissions(std::fs::Permissions::from_mode(file_mode))
            .map_err(|e| CrtAuthError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = file_mode;
    Ok(file)
}
