use std::io::Write;
use std::path::Path;

use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::params::Template;
use crate::error::{CrtAuthError, Result};
use crate::fs_utils::{self, CERT_FILE_MODE, DIR_MODE, KEY_FILE_MODE};
use crate::issuer::{Issuer, SelfIssuer};
use crate::key::{KeyPair, PublicKey};
use crate::pem_utils;
use crate::permissions::{PermissionGuard, PlatformGuard};

/// A certificate together with its private key.
///
/// Both halves are present after creation and after a successful load. A freshly created pair
/// holds an unsigned certificate; [`Pair::self_sign`] or [`Pair::sign_with`] replaces it with the
/// signed one.
#[derive(Debug, Clone, Default)]
pub struct Pair {
    pub cert: Option<Certificate>,
    pub key: Option<KeyPair>,
}

impl Pair {
    /// Creates a pair with no particular role: a new key of the template's size and an unsigned
    /// certificate built from the template.
    pub fn new(template: &Template) -> Result<Self> {
        let cert = template.to_certificate()?;
        let key = KeyPair::generate(template.key_size)?;
        Ok(Self {
            cert: Some(cert),
            key: Some(key),
        })
    }

    /// Creates a pair whose certificate may sign other certificates.
    pub fn new_ca(template: &Template) -> Result<Self> {
        let mut pair = Self::new(template)?;
        if let Some(cert) = pair.cert.as_mut() {
            cert.mark_ca();
        }
        Ok(pair)
    }

    /// Creates a pair for TLS server authentication.
    pub fn new_server(template: &Template) -> Result<Self> {
        let mut pair = Self::new(template)?;
        if let Some(cert) = pair.cert.as_mut() {
            cert.mark_server();
        }
        Ok(pair)
    }

    /// Parses a pair from a PEM certificate stream and a PEM key stream.
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self> {
        Ok(Self {
            cert: Some(Certificate::from_pem(cert_pem)?),
            key: Some(pem_utils::find_key_block(key_pem)?),
        })
    }

    /// Signs this pair's certificate with `parent`.
    ///
    /// The issuer becomes the parent's subject and the subject public key is derived from this
    /// pair's own key. The certificate is replaced only when signing succeeds.
    pub fn sign_with(&mut self, parent: &Pair) -> Result<()> {
        let (cert, key) = self.parts()?;
        let signed = parent.issue(cert, &PublicKey::from_key_pair(key))?;
        self.cert = Some(signed);
        Ok(())
    }

    /// Makes this pair a self-signed certification authority.
    ///
    /// The certificate is marked as a CA first (repeating this is harmless), then signed with
    /// the pair's own key so issuer and subject are equal.
    pub fn self_sign(&mut self) -> Result<()> {
        let (Some(cert), Some(key)) = (self.cert.as_mut(), self.key.as_ref()) else {
            return Err(CrtAuthError::IncompleteParent);
        };
        cert.mark_ca();
        let cert: &Certificate = cert;

        let issuer = SelfIssuer { cert, key };
        let signed = issuer.issue(cert, &PublicKey::from_key_pair(key))?;
        self.cert = Some(signed);
        Ok(())
    }

    /// Checks that the certificate carries a valid signature by `parent`'s key.
    pub fn verify_issued_by(&self, parent: &Pair) -> Result<()> {
        let cert = self.cert.as_ref().ok_or_else(unsigned)?;
        cert.verify_signed_by(&parent.public_key()?)
    }

    /// The public half of the pair, taken from the key when there is one.
    pub fn public_key(&self) -> Result<PublicKey> {
        match (&self.key, &self.cert) {
            (Some(key), _) => Ok(PublicKey::from_key_pair(key)),
            (None, Some(cert)) => cert.public_key(),
            (None, None) => Err(CrtAuthError::EncodingError("pair is empty".to_string())),
        }
    }

    /// The signed certificate as a `CERTIFICATE` PEM block.
    pub fn cert_pem(&self) -> Result<String> {
        self.cert.as_ref().ok_or_else(unsigned)?.to_pem()
    }

    /// The private key as an `RSA PRIVATE KEY` or `EC PRIVATE KEY` PEM block.
    pub fn key_pem(&self) -> Result<String> {
        let key = self
            .key
            .as_ref()
            .ok_or_else(|| CrtAuthError::EncodingError("pair has no private key".to_string()))?;
        Ok(pem_utils::der_to_pem(&key.to_der()?, key.pem_label()))
    }

    /// Writes the certificate and key, restricting the key with the platform's guard.
    pub fn write_files(&self, cert_path: &Path, key_path: &Path) -> Result<()> {
        self.write_files_with_guard(cert_path, key_path, &PlatformGuard::default())
    }

    /// Writes the certificate (mode `0644`) and the key (mode `0600`), creating parent
    /// directories and truncating existing files, then runs `guard` on the key file.
    ///
    /// Nothing is written when the pair cannot be encoded. Files written before an I/O failure
    /// are left in place.
    pub fn write_files_with_guard(
        &self,
        cert_path: &Path,
        key_path: &Path,
        guard: &impl PermissionGuard,
    ) -> Result<()> {
        let cert_pem = self.cert_pem()?;
        let key_pem = self.key_pem()?;

        write_file(cert_path, CERT_FILE_MODE, &cert_pem)?;
        write_file(key_path, KEY_FILE_MODE, &key_pem)?;

        guard
            .restrict_to_owner(key_path)
            .map_err(|source| CrtAuthError::PermissionGuardFailed {
                path: key_path.to_path_buf(),
                source,
            })
    }

    /// Replaces this pair with the certificate and key stored in two PEM files.
    ///
    /// The certificate is read first. The pair is left untouched unless both files parse.
    pub fn load_files(&mut self, cert_path: &Path, key_path: &Path) -> Result<()> {
        let cert = Certificate::from_pem(&read_file(cert_path)?)
            .map_err(|e| e.in_file(cert_path))?;
        let key = pem_utils::find_key_block(&read_file(key_path)?)
            .map_err(|e| e.in_file(key_path))?;

        self.cert = Some(cert);
        self.key = Some(key);
        Ok(())
    }

    fn parts(&self) -> Result<(&Certificate, &KeyPair)> {
        match (&self.cert, &self.key) {
            (Some(cert), Some(key)) => Ok((cert, key)),
            _ => Err(CrtAuthError::SigningFailed(
                "pair to be signed has no certificate or no key".to_string(),
            )),
        }
    }
}

impl Issuer for Pair {
    fn issuer_name(&self) -> Result<Name> {
        self.cert
            .as_ref()
            .ok_or(CrtAuthError::IncompleteParent)?
            .subject_name()
    }

    fn signing_key(&self) -> Result<&KeyPair> {
        match (&self.cert, &self.key) {
            (Some(_), Some(key)) => Ok(key),
            _ => Err(CrtAuthError::IncompleteParent),
        }
    }

    fn key_identifier(&self) -> Option<Vec<u8>> {
        self.cert.as_ref().and_then(|cert| cert.subject_key_id.clone())
    }
}

fn unsigned() -> CrtAuthError {
    CrtAuthError::EncodingError("pair has no certificate".to_string())
}

fn write_file(path: &Path, mode: u32, contents: &str) -> Result<()> {
    let mut file = fs_utils::mkdir_and_create_file(path, DIR_MODE, mode)?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| CrtAuthError::io(path, e))
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CrtAuthError::NotFound(path.to_path_buf()),
        _ => CrtAuthError::io(path, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::SignatureAlgorithm;
    use crate::cert::extensions::{ExtendedKeyUsageOption, KeyUsages};
    use crate::key::KeySize;

    fn template(common_name: &str, key_size: KeySize) -> Template {
        Template::builder()
            .organization("Acme")
            .common_name(common_name)
            .host_names(vec!["db1.internal".to_string(), "10.0.0.1".to_string()])
            .key_size(key_size)
            .build()
    }

    fn root(key_size: KeySize) -> Pair {
        let mut ca = Pair::new_ca(&template("Acme Root", key_size)).unwrap();
        ca.self_sign().unwrap();
        ca
    }

    #[test]
    fn test_roles() {
        let ca = Pair::new_ca(&template("ca", KeySize::P256)).unwrap();
        let ca_cert = ca.cert.as_ref().unwrap();
        assert!(ca_cert.is_ca);
        assert!(ca_cert.key_usage.contains(KeyUsages::CRLSign));
        assert!(ca_cert.ext_key_usage.is_empty());

        let server = Pair::new_server(&template("db1", KeySize::P256)).unwrap();
        let server_cert = server.cert.as_ref().unwrap();
        assert!(!server_cert.is_ca);
        assert!(server_cert.key_usage.contains(KeyUsages::KeyEncipherment));
        assert!(server_cert.key_usage.contains(KeyUsages::DigitalSignature));
        assert_eq!(server_cert.ext_key_usage, vec![ExtendedKeyUsageOption::ServerAuth]);
    }

    #[test]
    fn test_self_sign_forces_ca() {
        let mut pair = Pair::new_server(&template("db1", KeySize::P256)).unwrap();
        pair.self_sign().unwrap();

        let cert = pair.cert.as_ref().unwrap();
        assert!(cert.is_signed());
        assert!(cert.is_ca);
        assert!(cert.key_usage.contains(KeyUsages::KeyCertSign));
        assert_eq!(cert.ext_key_usage, vec![ExtendedKeyUsageOption::ServerAuth]);
        assert_eq!(cert.issuer, cert.subject);
        pair.verify_issued_by(&pair).unwrap();
    }

    #[test]
    fn test_self_sign_twice_keeps_roles() {
        let mut ca = root(KeySize::P256);
        let serial = ca.cert.as_ref().unwrap().serial_number.clone();
        ca.self_sign().unwrap();

        let cert = ca.cert.as_ref().unwrap();
        assert!(cert.is_ca);
        assert_eq!(cert.serial_number, serial);
        ca.verify_issued_by(&ca).unwrap();
    }

    #[test]
    fn test_sign_with_parent() {
        let ca = root(KeySize::P384);
        let mut server = Pair::new_server(&template("db1", KeySize::P256)).unwrap();
        server.sign_with(&ca).unwrap();

        let ca_cert = ca.cert.as_ref().unwrap();
        let cert = server.cert.as_ref().unwrap();
        assert_eq!(cert.issuer, ca_cert.subject);
        assert!(!cert.is_ca);
        assert_eq!(cert.signature_algorithm, Some(SignatureAlgorithm::Sha384WithECDSA));
        assert_eq!(cert.authority_key_id, ca_cert.subject_key_id);
        assert_eq!(
            cert.public_key().unwrap(),
            PublicKey::from_key_pair(server.key.as_ref().unwrap())
        );
        server.verify_issued_by(&ca).unwrap();

        let other = root(KeySize::P384);
        assert!(matches!(
            server.verify_issued_by(&other),
            Err(CrtAuthError::VerificationFailed(_))
        ));
    }

    #[test]
    fn test_cross_algorithm_signing() {
        let rsa_ca = root(KeySize::Rsa2048);
        let mut ec_server = Pair::new_server(&template("db1", KeySize::P256)).unwrap();
        ec_server.sign_with(&rsa_ca).unwrap();
        assert_eq!(
            ec_server.cert.as_ref().unwrap().signature_algorithm,
            Some(SignatureAlgorithm::Sha256WithRSA)
        );
        ec_server.verify_issued_by(&rsa_ca).unwrap();

        let ec_ca = root(KeySize::P224);
        let mut rsa_server = Pair::new_server(&template("db2", KeySize::Rsa1024)).unwrap();
        rsa_server.sign_with(&ec_ca).unwrap();
        assert_eq!(
            rsa_server.cert.as_ref().unwrap().signature_algorithm,
            Some(SignatureAlgorithm::Sha224WithECDSA)
        );
        rsa_server.verify_issued_by(&ec_ca).unwrap();
    }

    #[test]
    fn test_incomplete_parent() {
        let mut server = Pair::new_server(&template("db1", KeySize::P256)).unwrap();
        let before = server.cert.as_ref().unwrap().serial_number.clone();

        let mut keyless = root(KeySize::P256);
        keyless.key = None;
        assert!(matches!(
            server.sign_with(&keyless),
            Err(CrtAuthError::IncompleteParent)
        ));

        assert!(matches!(
            server.sign_with(&Pair::default()),
            Err(CrtAuthError::IncompleteParent)
        ));

        let mut certless = server.clone();
        certless.cert = None;
        assert!(matches!(
            certless.self_sign(),
            Err(CrtAuthError::IncompleteParent)
        ));

        let cert = server.cert.as_ref().unwrap();
        assert!(!cert.is_signed());
        assert_eq!(cert.serial_number, before);
    }

    #[test]
    fn test_unsigned_pair_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let pair = Pair::new_server(&template("db1", KeySize::P256)).unwrap();
        let cert_path = dir.path().join("server.crt");
        let key_path = dir.path().join("server.key");

        assert!(matches!(
            pair.write_files(&cert_path, &key_path),
            Err(CrtAuthError::EncodingError(_))
        ));
        assert!(!cert_path.exists());
        assert!(!key_path.exists());
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let ca = root(KeySize::P256);
        let mut server = Pair::new_server(&template("db1", KeySize::Rsa1024)).unwrap();
        server.sign_with(&ca).unwrap();

        let cert_path = dir.path().join("out").join("server.crt");
        let key_path = dir.path().join("out").join("server.key");
        server.write_files(&cert_path, &key_path).unwrap();

        let mut loaded = Pair::default();
        loaded.load_files(&cert_path, &key_path).unwrap();

        let original = server.cert.as_ref().unwrap();
        let reloaded = loaded.cert.as_ref().unwrap();
        assert_eq!(reloaded.serial_number, original.serial_number);
        assert_eq!(reloaded.subject, original.subject);
        assert_eq!(reloaded.validity, original.validity);
        assert_eq!(reloaded.to_der().unwrap(), original.to_der().unwrap());

        let data = b"identical input";
        assert_eq!(
            loaded.key.as_ref().unwrap().sign_data(data).unwrap(),
            server.key.as_ref().unwrap().sign_data(data).unwrap()
        );
        loaded.verify_issued_by(&ca).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ca = root(KeySize::P256);
        let cert_path = dir.path().join("root.crt");
        let key_path = dir.path().join("root.key");
        ca.write_files(&cert_path, &key_path).unwrap();
        std::fs::remove_file(&key_path).unwrap();

        let mut pair = Pair::default();
        let err = pair.load_files(&cert_path, &key_path).unwrap_err();
        assert!(matches!(err, CrtAuthError::NotFound(ref path) if *path == key_path));
        assert!(pair.cert.is_none());
        assert!(pair.key.is_none());
    }

    #[test]
    fn test_load_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("root.crt");
        let key_path = dir.path().join("root.key");
        std::fs::write(&cert_path, "not a certificate\n").unwrap();
        std::fs::write(&key_path, "").unwrap();

        let mut pair = Pair::default();
        assert!(matches!(
            pair.load_files(&cert_path, &key_path),
            Err(CrtAuthError::BlockNotFound("CERTIFICATE"))
        ));

        let ca = root(KeySize::P256);
        std::fs::write(&cert_path, ca.cert_pem().unwrap()).unwrap();
        std::fs::write(
            &key_path,
            pem_utils::der_to_pem(b"\x30\x03\x02\x01\x01", "EC PRIVATE KEY"),
        )
        .unwrap();
        let err = pair.load_files(&cert_path, &key_path).unwrap_err();
        match err {
            CrtAuthError::ParseError(reason) => {
                assert!(reason.starts_with(&key_path.display().to_string()))
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(pair.cert.is_none());
    }

    #[test]
    fn test_failing_guard() {
        struct Refuse;
        impl PermissionGuard for Refuse {
            fn restrict_to_owner(&self, _path: &Path) -> std::io::Result<()> {
                Err(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "denied",
                ))
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let ca = root(KeySize::P256);
        let key_path = dir.path().join("root.key");
        let err = ca
            .write_files_with_guard(&dir.path().join("root.crt"), &key_path, &Refuse)
            .unwrap_err();
        assert!(
            matches!(err, CrtAuthError::PermissionGuardFailed { ref path, .. } if *path == key_path)
        );
        assert!(key_path.exists());
    }
}
