use der::Encode;
use x509_cert::certificate::CertificateInner;
use x509_cert::name::Name;

use crate::cert::Certificate;
use crate::cert::extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAltName,
    SubjectKeyIdentifier,
};
use crate::cert::params::ExtensionParam;
use crate::error::{CrtAuthError, Result};
use crate::key::{KeyPair, PublicKey};
use crate::tbs_certificate::TbsCertificate;

/// Represents an entity capable of issuing certificates.
///
/// This trait provides methods to retrieve issuer details and issue certificates.
pub trait Issuer {
    /// Returns the name written into the issuer field of issued certificates.
    fn issuer_name(&self) -> Result<Name>;

    /// Returns the signing key of the issuer.
    fn signing_key(&self) -> Result<&KeyPair>;

    /// Subject key identifier of the issuer, repeated as the authority key identifier of
    /// issued certificates.
    fn key_identifier(&self) -> Option<Vec<u8>>;

    /// Signs the descriptor `cert` for `subject_key` and returns the parsed result.
    ///
    /// The descriptor's serial number, subject, validity, roles and alternative names are
    /// encoded as they are. The signature algorithm follows the issuer's key, so an RSA
    /// authority may sign an elliptic curve certificate and vice versa.
    ///
    /// # Errors
    /// * `IncompleteParent` - The issuer has no certificate or no key.
    /// * `SigningFailed` - The certificate could not be assembled or signed.
    /// * `CertificateParseFailed` - The signed certificate could not be decoded again.
    fn issue(&self, cert: &Certificate, subject_key: &PublicKey) -> Result<Certificate> {
        let signing_key = self.signing_key()?;
        let issuer = self.issuer_name()?;
        let signing_failed = |e: CrtAuthError| match e {
            CrtAuthError::SigningFailed(reason) => CrtAuthError::SigningFailed(reason),
            other => CrtAuthError::SigningFailed(other.to_string()),
        };

        let subject_public_key_info = subject_key.to_x509spki().map_err(signing_failed)?;
        let subject_key_id = if cert.is_ca {
            Some(
                SubjectKeyIdentifier::from_public_key_bits(
                    subject_public_key_info.subject_public_key.raw_bytes(),
                )
                .0,
            )
        } else {
            cert.subject_key_id.clone()
        };
        let subject = cert.subject.as_x509_name().map_err(signing_failed)?;

        let extensions = build_extensions(
            cert,
            subject_key_id,
            self.key_identifier(),
            subject.0.is_empty(),
        )
        .map_err(signing_failed)?;

        let tbs_cert = TbsCertificate {
            serial_number: cert.serial_number.clone(),
            signature_algorithm: Some(signing_key.signature_algorithm()),
            issuer,
            not_before: cert.validity.not_before,
            not_after: cert.validity.not_after,
            subject,
            subject_public_key_info,
            extensions,
        };

        let tbs_cert_inner = tbs_cert.to_tbs_certificate_inner().map_err(signing_failed)?;
        let tbs_der = tbs_cert_inner
            .to_der()
            .map_err(|e| CrtAuthError::SigningFailed(e.to_string()))?;
        let signature = signing_key.sign_data(&tbs_der).map_err(signing_failed)?;

        let cert_inner = CertificateInner {
            tbs_certificate: tbs_cert_inner,
            signature_algorithm: signing_key.signature_algorithm().into(),
            signature: der::asn1::BitString::from_bytes(&signature)
                .map_err(|e| CrtAuthError::SigningFailed(e.to_string()))?,
        };
        let der_bytes = cert_inner
            .to_der()
            .map_err(|e| CrtAuthError::SigningFailed(e.to_string()))?;

        Certificate::from_der(&der_bytes)
            .map_err(|e| CrtAuthError::CertificateParseFailed(e.to_string()))
    }
}

/// Extensions in encoding order: key usage, extended key usage, basic constraints, subject and
/// authority key identifiers, subject alternative names.
fn build_extensions(
    cert: &Certificate,
    subject_key_id: Option<Vec<u8>>,
    authority_key_id: Option<Vec<u8>>,
    empty_subject: bool,
) -> Result<Vec<ExtensionParam>> {
    let mut extensions = Vec::new();

    if !cert.key_usage.is_empty() {
        extensions.push(ExtensionParam::from_extension(
            &KeyUsage(cert.key_usage),
            true,
        )?);
    }

    if !cert.ext_key_usage.is_empty() {
        let extended_key_usage = ExtendedKeyUsage {
            usage: cert.ext_key_usage.clone(),
        };
        extensions.push(ExtensionParam::from_extension(&extended_key_usage, false)?);
    }

    if cert.basic_constraints_valid {
        let basic_constraints = BasicConstraints {
            is_ca: cert.is_ca,
            max_path_length: None,
        };
        extensions.push(ExtensionParam::from_extension(&basic_constraints, true)?);
    }

    if let Some(key_id) = subject_key_id {
        extensions.push(ExtensionParam::from_extension(
            &SubjectKeyIdentifier(key_id),
            false,
        )?);
    }

    if let Some(key_id) = authority_key_id {
        let authority_key_id = AuthorityKeyIdentifier {
            key_identifier: Some(key_id),
        };
        extensions.push(ExtensionParam::from_extension(&authority_key_id, false)?);
    }

    let san = SubjectAltName {
        dns_names: cert.dns_names.clone(),
        ip_addresses: cert.ip_addresses.clone(),
    };
    if !san.is_empty() {
        // RFC 5280 section 4.2.1.6
        extensions.push(ExtensionParam::from_extension(&san, empty_subject)?);
    }

    Ok(extensions)
}

// Helper struct for self-signed certificates
pub(crate) struct SelfIssuer<'a> {
    pub(crate) cert: &'a Certificate,
    pub(crate) key: &'a KeyPair,
}

impl Issuer for SelfIssuer<'_> {
    fn issuer_name(&self) -> Result<Name> {
        // Must encode exactly like the subject being signed.
        self.cert.subject.as_x509_name()
    }

    fn signing_key(&self) -> Result<&KeyPair> {
        Ok(self.key)
    }

    fn key_identifier(&self) -> Option<Vec<u8>> {
        None
    }
}
