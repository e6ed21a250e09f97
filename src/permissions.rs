//! Owner-only access for private key files.
//!
//! File creation already asks for mode `0600` on Unix, but creation flags do not touch a file
//! that existed before, and Windows ignores mode bits entirely. A [`PermissionGuard`] runs after
//! the key is written and tightens access the way the platform requires.

use std::io;
use std::path::Path;

/// Restricts a file so only its owner can read or write it.
///
/// Implementations must be idempotent.
pub trait PermissionGuard {
    fn restrict_to_owner(&self, path: &Path) -> io::Result<()>;
}

/// Sets Unix mode bits to `0600`.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnixModeGuard;

#[cfg(unix)]
impl PermissionGuard for UnixModeGuard {
    fn restrict_to_owner(&self, path: &Path) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
    }
}

/// Rewrites the ACL with `icacls`: drop explicit entries, drop inherited ones and grant full
/// control to the owner only.
#[cfg(windows)]
#[derive(Debug, Default, Clone, Copy)]
pub struct IcaclsGuard;

#[cfg(windows)]
impl IcaclsGuard {
    fn icacls(args: &[&std::ffi::OsStr]) -> io::Result<()> {
        let status = std::process::Command::new("icacls").args(args).status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("icacls exited with {status}")))
        }
    }
}

#[cfg(windows)]
impl PermissionGuard for IcaclsGuard {
    fn restrict_to_owner(&self, path: &Path) -> io::Result<()> {
        use std::ffi::OsStr;
        let path = path.as_os_str();
        Self::icacls(&[path, OsStr::new("/reset")])?;
        Self::icacls(&[
            path,
            OsStr::new("/inheritance:r"),
            OsStr::new("/grant:r"),
            OsStr::new("CREATOR OWNER:F"),
        ])
    }
}

/// Leaves the file alone, for platforms without a permission model to tighten.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGuard;

impl PermissionGuard for NoopGuard {
    fn restrict_to_owner(&self, _path: &Path) -> io::Result<()> {
        Ok(())
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        /// The guard for the platform this crate was built for.
        pub type PlatformGuard = UnixModeGuard;
    } else if #[cfg(windows)] {
        /// The guard for the platform this crate was built for.
        pub type PlatformGuard = IcaclsGuard;
    } else {
        /// The guard for the platform this crate was built for.
        pub type PlatformGuard = NoopGuard;
    }
}
