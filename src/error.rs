//! use pgcrtauth::error::CrtAuthError;

use std::path::PathBuf;

use thiserror::Error;

/// Represents errors that can occur while issuing, signing or storing certificate pairs.
///
/// Every variant carries enough context (the offending token, path or reason) for a caller to
/// report it without further lookups.
#[derive(Debug, Error)]
pub enum CrtAuthError {
    /// The key size token is not one of the supported values.
    #[error("invalid key size '{0}', expected one of P224, P256, P384, P521, 1024, 2048, 3072, 4096")]
    InvalidKeySize(String),

    /// Error during private key generation.
    #[error("failed to generate private key: {0}")]
    KeyGenerationFailed(String),

    /// The certificate template could not be turned into a descriptor.
    #[error("failed to build certificate from template: {0}")]
    TemplateError(String),

    /// The signing pair lacks a certificate or a private key.
    #[error("can't sign certificate with incomplete parent pair")]
    IncompleteParent,

    /// Building or signing the certificate failed.
    #[error("failed to create signed certificate: {0}")]
    SigningFailed(String),

    /// The freshly signed certificate could not be parsed back.
    #[error("failed to parse generated certificate: {0}")]
    CertificateParseFailed(String),

    /// A certificate or key file does not exist.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// No PEM block with the expected label was found.
    #[error("{0} block not found")]
    BlockNotFound(&'static str),

    /// PEM, DER, certificate or key content is malformed.
    #[error("failed to parse data: {0}")]
    ParseError(String),

    /// Error during data encoding.
    #[error("failed to encode data: {0}")]
    EncodingError(String),

    /// A certificate signature did not verify.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),

    /// Creating a directory, or creating or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The platform permission guard could not restrict a key file.
    #[error("failed to restrict permissions of {}: {source}", path.display())]
    PermissionGuardFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A specialized Result type for pgcrtauth operations.
pub type Result<T> = std::result::Result<T, CrtAuthError>;

impl CrtAuthError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CrtAuthError::Io {
            path: path.into(),
            source,
        }
    }

    /// Prefixes parse failures with the file they came from.
    pub(crate) fn in_file(self, path: &std::path::Path) -> Self {
        match self {
            CrtAuthError::ParseError(reason) => {
                CrtAuthError::ParseError(format!("{}: {reason}", path.display()))
            }
            other => other,
        }
    }
}

impl From<der::Error> for CrtAuthError {
    /// Converts a `der::Error` into a `CrtAuthError`.
    fn from(err: der::Error) -> Self {
        CrtAuthError::ParseError(err.to_string())
    }
}

impl From<pem::PemError> for CrtAuthError {
    fn from(err: pem::PemError) -> Self {
        CrtAuthError::ParseError(err.to_string())
    }
}
