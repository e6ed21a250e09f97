//! # pgcrtauth - Certificates for PostgreSQL servers
//!
//! pgcrtauth issues X.509 certificate and private key pairs for PostgreSQL servers, either
//! self-signed or signed by a certificate authority kept in a local directory. It is built
//! entirely with rustcrypto libraries; OpenSSL is only used to cross-check the output in tests.
//!
//! ## Supported Key Types
//!
//! - **ECDSA**: P-224, P-256, P-384 and P-521 curves (`P224`, `P256`, `P384`, `P521`)
//! - **RSA**: 1024, 2048, 3072 and 4096-bit keys (`1024`, `2048`, `3072`, `4096`)
//!
//! Keys are stored in their native PEM form: `RSA PRIVATE KEY` (PKCS#1) or `EC PRIVATE KEY`
//! (SEC1). Certificates are stored as `CERTIFICATE` blocks.
//!
//! ## Quick Start
//!
//! ### Creating a Certificate Authority
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use pgcrtauth::authority::CertificateAuthority;
//! use pgcrtauth::cert::params::Template;
//!
//! # fn main() -> Result<(), pgcrtauth::error::CrtAuthError> {
//! let template = Template::builder()
//!     .organization("Acme")
//!     .common_name("Acme DB Cluster CA")
//!     .build();
//!
//! // Writes root.crt and root.key
//! let mut ca = CertificateAuthority::new();
//! ca.init(&template, Path::new("/certs/ca"))?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Issuing a Server Certificate
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use pgcrtauth::authority::CertificateAuthority;
//! use pgcrtauth::cert::params::Template;
//! use pgcrtauth::key::KeySize;
//! use pgcrtauth::pair::Pair;
//! use pgcrtauth::{SERVER_CERT_FILE_NAME, SERVER_KEY_FILE_NAME};
//!
//! # fn main() -> Result<(), pgcrtauth::error::CrtAuthError> {
//! let mut ca = CertificateAuthority::new();
//! ca.load(Path::new("/certs/ca"))?;
//!
//! let template = Template::builder()
//!     .common_name("db1")
//!     .host_names(vec!["db1.internal".to_string(), "10.0.0.1".to_string()])
//!     .key_size(KeySize::Rsa2048)
//!     .build();
//!
//! let mut server = Pair::new_server(&template)?;
//! server.sign_with(&ca.pair)?;
//!
//! let out = Path::new("/certs/db1");
//! server.write_files(&out.join(SERVER_CERT_FILE_NAME), &out.join(SERVER_KEY_FILE_NAME))?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Self-Signed Server Certificate
//!
//! ```rust
//! use pgcrtauth::cert::params::Template;
//! use pgcrtauth::pair::Pair;
//!
//! # fn main() -> Result<(), pgcrtauth::error::CrtAuthError> {
//! let template = Template::builder()
//!     .host_names(vec!["localhost".to_string()])
//!     .build();
//!
//! let mut pair = Pair::new_server(&template)?;
//! pair.self_sign()?;
//! assert!(pair.cert.as_ref().unwrap().is_ca);
//! println!("{}", pair.cert_pem()?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`error::CrtAuthError`]:
//!
//! ```rust
//! use pgcrtauth::{error::CrtAuthError, key::KeySize};
//!
//! match "P512".parse::<KeySize>() {
//!     Ok(size) => println!("Using {size}"),
//!     Err(CrtAuthError::InvalidKeySize(token)) => println!("Unknown key size {token}"),
//!     Err(e) => println!("Other error: {e}"),
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`key`]: Key sizes, key generation, signing and key encoding
//! - [`cert`]: Certificate templates, descriptors and extensions
//! - [`issuer`]: Certificate signing
//! - [`pair`]: Certificate and key pairs, signing and file storage
//! - [`authority`]: Certificate authorities stored in a directory
//! - [`permissions`]: Owner-only access for key files
//! - [`error`]: Error types
//! - [`tbs_certificate`]: Low-level certificate structure manipulation

pub mod authority;
pub mod cert;
pub mod error;
pub mod fs_utils;
pub mod issuer;
pub mod key;
pub mod pair;
pub mod pem_utils;
pub mod permissions;
pub mod tbs_certificate;

/// File name of a certificate authority's certificate.
pub const ROOT_CERT_FILE_NAME: &str = "root.crt";
/// File name of a certificate authority's private key.
pub const ROOT_KEY_FILE_NAME: &str = "root.key";
/// File name PostgreSQL expects for the server certificate.
pub const SERVER_CERT_FILE_NAME: &str = "server.crt";
/// File name PostgreSQL expects for the server private key.
pub const SERVER_KEY_FILE_NAME: &str = "server.key";
