pub mod extensions;
pub mod params;

use std::net::IpAddr;

use der::{Decode, Encode};
use der::flagset::FlagSet;
use x509_cert::certificate::CertificateInner;
use x509_cert::ext::pkix::KeyUsages;
use x509_cert::name::Name;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::error::{CrtAuthError, Result};
use crate::key::PublicKey;
use crate::pem_utils;
use crate::tbs_certificate::TbsCertificate;
use extensions::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, ExtendedKeyUsageOption, KeyUsage,
    SubjectAltName, SubjectKeyIdentifier, ToAndFromX509Extension,
};
use params::{DistinguishedName, Validity};

/// PEM label of an X.509 certificate.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Represents the supported signature algorithms for certificates.
///
/// This enum provides a mapping to the corresponding OIDs for each algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    /// SHA-256 with RSA encryption.
    Sha256WithRSA,
    /// SHA-224 with ECDSA, used by P-224 keys.
    Sha224WithECDSA,
    /// SHA-256 with ECDSA.
    Sha256WithECDSA,
    /// SHA-384 with ECDSA.
    Sha384WithECDSA,
    /// SHA-512 with ECDSA.
    Sha512WithECDSA,
}

const ECDSA_WITH_SHA_224: const_oid::ObjectIdentifier =
    const_oid::ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.1");

impl SignatureAlgorithm {
    pub fn oid(&self) -> const_oid::ObjectIdentifier {
        match self {
            SignatureAlgorithm::Sha256WithRSA => const_oid::db::rfc5912::SHA_256_WITH_RSA_ENCRYPTION,
            SignatureAlgorithm::Sha224WithECDSA => ECDSA_WITH_SHA_224,
            SignatureAlgorithm::Sha256WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_256,
            SignatureAlgorithm::Sha384WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_384,
            SignatureAlgorithm::Sha512WithECDSA => const_oid::db::rfc5912::ECDSA_WITH_SHA_512,
        }
    }

    /// Looks up the algorithm for an OID, `None` for algorithms this crate never signs with.
    pub fn from_oid(oid: &const_oid::ObjectIdentifier) -> Option<Self> {
        [
            SignatureAlgorithm::Sha256WithRSA,
            SignatureAlgorithm::Sha224WithECDSA,
            SignatureAlgorithm::Sha256WithECDSA,
            SignatureAlgorithm::Sha384WithECDSA,
            SignatureAlgorithm::Sha512WithECDSA,
        ]
        .into_iter()
        .find(|alg| alg.oid() == *oid)
    }
}

impl From<SignatureAlgorithm> for x509_cert::spki::AlgorithmIdentifierOwned {
    /// Converts a `SignatureAlgorithm` into an `AlgorithmIdentifierOwned`.
    ///
    /// RSA identifiers carry an explicit NULL parameter (RFC 4055), ECDSA ones none (RFC 5758).
    fn from(value: SignatureAlgorithm) -> Self {
        let parameters = match value {
            SignatureAlgorithm::Sha256WithRSA => {
                der::Any::new(der::Tag::Null, Vec::<u8>::new()).ok()
            }
            _ => None,
        };
        x509_cert::spki::AlgorithmIdentifierOwned {
            oid: value.oid(),
            parameters,
        }
    }
}

/// An X.509 certificate, either still a descriptor waiting to be signed or a signed certificate
/// decoded from DER.
///
/// The descriptor fields are public and are what signing encodes. A signed certificate also
/// keeps the DER it was decoded from, which is what gets written to disk.
#[derive(Debug, Clone)]
pub struct Certificate {
    pub serial_number: Vec<u8>,
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    pub validity: Validity,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub basic_constraints_valid: bool,
    pub is_ca: bool,
    pub key_usage: FlagSet<KeyUsages>,
    pub ext_key_usage: Vec<ExtendedKeyUsageOption>,
    pub subject_key_id: Option<Vec<u8>>,
    pub authority_key_id: Option<Vec<u8>>,
    /// Set once signed.
    pub signature_algorithm: Option<SignatureAlgorithm>,
    /// Set once signed.
    pub public_key_info: Option<SubjectPublicKeyInfoOwned>,
    raw_subject: Option<Name>,
    raw: Option<Vec<u8>>,
}

impl Certificate {
    /// Creates an unsigned descriptor; every optional field starts empty.
    pub fn new(serial_number: Vec<u8>, subject: DistinguishedName, validity: Validity) -> Self {
        Self {
            serial_number,
            subject,
            issuer: DistinguishedName::default(),
            validity,
            dns_names: Vec::new(),
            ip_addresses: Vec::new(),
            basic_constraints_valid: false,
            is_ca: false,
            key_usage: FlagSet::default(),
            ext_key_usage: Vec::new(),
            subject_key_id: None,
            authority_key_id: None,
            signature_algorithm: None,
            public_key_info: None,
            raw_subject: None,
            raw: None,
        }
    }

    /// Marks the certificate as a certification authority able to sign certificates and CRLs.
    pub fn mark_ca(&mut self) {
        self.basic_constraints_valid = true;
        self.is_ca = true;
        self.key_usage |= KeyUsages::DigitalSignature;
        self.key_usage |= KeyUsages::KeyCertSign;
        self.key_usage |= KeyUsages::CRLSign;
    }

    /// Marks the certificate for TLS server authentication.
    pub fn mark_server(&mut self) {
        self.key_usage |= KeyUsages::KeyEncipherment;
        self.key_usage |= KeyUsages::DigitalSignature;
        self.ext_key_usage.push(ExtendedKeyUsageOption::ServerAuth);
    }

    pub fn is_signed(&self) -> bool {
        self.raw.is_some()
    }

    /// The subject as an X.509 name. Decoded certificates return the exact name they were
    /// decoded with, so issuer fields of certificates they sign match byte for byte.
    pub fn subject_name(&self) -> Result<Name> {
        match &self.raw_subject {
            Some(name) => Ok(name.clone()),
            None => self.subject.as_x509_name(),
        }
    }

    /// Decodes a DER certificate into its descriptor fields.
    pub fn from_der(der_bytes: &[u8]) -> Result<Self> {
        let inner: CertificateInner = CertificateInner::from_der(der_bytes)?;
        let tbs = TbsCertificate::from_tbs_certificate_inner(inner.tbs_certificate)?;

        let mut cert = Certificate::new(
            tbs.serial_number,
            DistinguishedName::from_x509_name(&tbs.subject)?,
            Validity {
                not_before: tbs.not_before,
                not_after: tbs.not_after,
            },
        );
        cert.issuer = DistinguishedName::from_x509_name(&tbs.issuer)?;
        cert.signature_algorithm = SignatureAlgorithm::from_oid(&inner.signature_algorithm.oid);
        cert.public_key_info = Some(tbs.subject_public_key_info);
        cert.raw_subject = Some(tbs.subject);

        for ext in &tbs.extensions {
            if ext.oid == BasicConstraints::OID {
                let bc: BasicConstraints = ext.to_extension()?;
                cert.basic_constraints_valid = true;
                cert.is_ca = bc.is_ca;
            } else if ext.oid == KeyUsage::OID {
                let ku: KeyUsage = ext.to_extension()?;
                cert.key_usage = ku.0;
            } else if ext.oid == ExtendedKeyUsage::OID {
                let eku: ExtendedKeyUsage = ext.to_extension()?;
                cert.ext_key_usage = eku.usage;
            } else if ext.oid == SubjectAltName::OID {
                let san: SubjectAltName = ext.to_extension()?;
                cert.dns_names = san.dns_names;
                cert.ip_addresses = san.ip_addresses;
            } else if ext.oid == SubjectKeyIdentifier::OID {
                let skid: SubjectKeyIdentifier = ext.to_extension()?;
                cert.subject_key_id = Some(skid.0);
            } else if ext.oid == AuthorityKeyIdentifier::OID {
                let akid: AuthorityKeyIdentifier = ext.to_extension()?;
                cert.authority_key_id = akid.key_identifier;
            }
        }

        cert.raw = Some(der_bytes.to_vec());
        Ok(cert)
    }

    /// Reads the first `CERTIFICATE` block of a PEM stream.
    pub fn from_pem(pem_data: &[u8]) -> Result<Self> {
        let der_bytes = pem_utils::find_block(pem_data, &[CERTIFICATE_LABEL])?;
        Self::from_der(der_bytes.contents())
    }

    /// The DER encoding of a signed certificate.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        self.raw.clone().ok_or_else(|| {
            CrtAuthError::EncodingError("certificate has not been signed".to_string())
        })
    }

    /// The PEM encoding of a signed certificate.
    pub fn to_pem(&self) -> Result<String> {
        Ok(pem_utils::der_to_pem(&self.to_der()?, CERTIFICATE_LABEL))
    }

    /// The public key embedded in a signed certificate.
    pub fn public_key(&self) -> Result<PublicKey> {
        let spki = self.public_key_info.as_ref().ok_or_else(|| {
            CrtAuthError::EncodingError("certificate has not been signed".to_string())
        })?;
        PublicKey::from_x509spki(spki)
    }

    /// Verifies that this certificate was signed by the private half of `issuer_key`.
    pub fn verify_signed_by(&self, issuer_key: &PublicKey) -> Result<()> {
        let raw = self.to_der()?;
        let inner: CertificateInner = CertificateInner::from_der(&raw)?;
        let tbs_der = inner.tbs_certificate.to_der()?;

        let algorithm = SignatureAlgorithm::from_oid(&inner.signature_algorithm.oid);
        let expected = match issuer_key {
            PublicKey::Rsa(_) => SignatureAlgorithm::Sha256WithRSA,
            PublicKey::EcdsaP224(_) => SignatureAlgorithm::Sha224WithECDSA,
            PublicKey::EcdsaP256(_) => SignatureAlgorithm::Sha256WithECDSA,
            PublicKey::EcdsaP384(_) => SignatureAlgorithm::Sha384WithECDSA,
            PublicKey::EcdsaP521(_) => SignatureAlgorithm::Sha512WithECDSA,
        };
        if algorithm != Some(expected) {
            return Err(CrtAuthError::VerificationFailed(format!(
                "signature algorithm {} does not match the issuer key",
                inner.signature_algorithm.oid
            )));
        }

        let signature = inner.signature.as_bytes().ok_or_else(|| {
            CrtAuthError::VerificationFailed("signature has unused bits".to_string())
        })?;
        issuer_key.verify(&tbs_der, signature)
    }
}
