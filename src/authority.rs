use std::path::{Path, PathBuf};

use crate::cert::params::Template;
use crate::error::Result;
use crate::fs_utils::{self, DIR_MODE};
use crate::pair::Pair;
use crate::{ROOT_CERT_FILE_NAME, ROOT_KEY_FILE_NAME};

/// A certification authority stored as a certificate file and a key file in one directory.
///
/// One directory holds one authority; [`CertificateAuthority::init`] on a directory that already
/// has one overwrites it.
#[derive(Debug, Clone)]
pub struct CertificateAuthority {
    pub pair: Pair,
    /// Defaults to `root.crt`.
    pub cert_file_name: String,
    /// Defaults to `root.key`.
    pub key_file_name: String,
}

impl Default for CertificateAuthority {
    fn default() -> Self {
        Self {
            pair: Pair::default(),
            cert_file_name: ROOT_CERT_FILE_NAME.to_string(),
            key_file_name: ROOT_KEY_FILE_NAME.to_string(),
        }
    }
}

impl CertificateAuthority {
    /// An empty authority using the default file names.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cert_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.cert_file_name)
    }

    pub fn key_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.key_file_name)
    }

    /// Creates a new self-signed authority from `template` and stores it in `dir`.
    ///
    /// `dir` and its parents are created when missing. Existing files are overwritten; the key
    /// file ends up readable by its owner only. The authority's pair is replaced once the files
    /// are written.
    pub fn init(&mut self, template: &Template, dir: &Path) -> Result<()> {
        let mut pair = Pair::new_ca(template)?;
        fs_utils::ensure_dir_exists(dir, DIR_MODE)?;
        pair.self_sign()?;
        pair.write_files(&self.cert_path(dir), &self.key_path(dir))?;

        self.pair = pair;
        Ok(())
    }

    /// Loads the authority stored in `dir`, certificate first.
    ///
    /// A missing file yields `NotFound`. The authority is left untouched on any failure.
    pub fn load(&mut self, dir: &Path) -> Result<()> {
        self.pair
            .load_files(&self.cert_path(dir), &self.key_path(dir))
    }
}
