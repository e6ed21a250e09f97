use std::fmt;
use std::str::FromStr;

use const_oid::AssociatedOid;
use der::{Decode, Encode};
use ecdsa::signature::{SignatureEncoding, Signer, Verifier};
use p256::elliptic_curve::sec1::{FromEncodedPoint, ModulusSize, ToEncodedPoint};
use p256::elliptic_curve::{AffinePoint, CurveArithmetic, FieldBytesSize, SecretKey};
use pkcs8::DecodePublicKey;
use rand_core::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use x509_cert::spki::SubjectPublicKeyInfoOwned;

use crate::cert::SignatureAlgorithm;
use crate::error::{CrtAuthError, Result};

/// PEM label of a PKCS#1 encoded RSA private key.
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
/// PEM label of a SEC1 encoded elliptic curve private key.
pub const EC_PRIVATE_KEY_LABEL: &str = "EC PRIVATE KEY";

/// Requested key strength.
///
/// Elliptic curve sizes are named after the NIST curve, RSA sizes after the modulus length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeySize {
    P224,
    #[default]
    P256,
    P384,
    P521,
    Rsa1024,
    Rsa2048,
    Rsa3072,
    Rsa4096,
}

impl KeySize {
    /// Every supported key size, elliptic curves first.
    pub const ALL: [KeySize; 8] = [
        KeySize::P224,
        KeySize::P256,
        KeySize::P384,
        KeySize::P521,
        KeySize::Rsa1024,
        KeySize::Rsa2048,
        KeySize::Rsa3072,
        KeySize::Rsa4096,
    ];

    /// The token accepted by [`KeySize::from_str`], e.g. `"P256"` or `"2048"`.
    pub fn token(&self) -> &'static str {
        match self {
            KeySize::P224 => "P224",
            KeySize::P256 => "P256",
            KeySize::P384 => "P384",
            KeySize::P521 => "P521",
            KeySize::Rsa1024 => "1024",
            KeySize::Rsa2048 => "2048",
            KeySize::Rsa3072 => "3072",
            KeySize::Rsa4096 => "4096",
        }
    }

    /// Curve size or modulus length in bits.
    pub fn bits(&self) -> usize {
        match self {
            KeySize::P224 => 224,
            KeySize::P256 => 256,
            KeySize::P384 => 384,
            KeySize::P521 => 521,
            KeySize::Rsa1024 => 1024,
            KeySize::Rsa2048 => 2048,
            KeySize::Rsa3072 => 3072,
            KeySize::Rsa4096 => 4096,
        }
    }

    pub fn is_elliptic(&self) -> bool {
        matches!(
            self,
            KeySize::P224 | KeySize::P256 | KeySize::P384 | KeySize::P521
        )
    }
}

impl FromStr for KeySize {
    type Err = CrtAuthError;

    fn from_str(token: &str) -> Result<Self> {
        KeySize::ALL
            .into_iter()
            .find(|size| size.token() == token)
            .ok_or_else(|| CrtAuthError::InvalidKeySize(token.to_string()))
    }
}

impl fmt::Display for KeySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// A private key of one of the supported algorithms.
#[derive(Clone, Debug)]
pub enum KeyPair {
    Rsa(Box<RsaPrivateKey>),
    EcdsaP224(p224::SecretKey),
    EcdsaP256(p256::SecretKey),
    EcdsaP384(p384::SecretKey),
    EcdsaP521(p521::SecretKey),
}

impl KeyPair {
    /// Generate a fresh private key of the requested size from the OS random source.
    pub fn generate(size: KeySize) -> Result<Self> {
        let mut rng = OsRng;
        let key = match size {
            KeySize::P224 => KeyPair::EcdsaP224(p224::SecretKey::random(&mut rng)),
            KeySize::P256 => KeyPair::EcdsaP256(p256::SecretKey::random(&mut rng)),
            KeySize::P384 => KeyPair::EcdsaP384(p384::SecretKey::random(&mut rng)),
            KeySize::P521 => KeyPair::EcdsaP521(p521::SecretKey::random(&mut rng)),
            KeySize::Rsa1024 | KeySize::Rsa2048 | KeySize::Rsa3072 | KeySize::Rsa4096 => {
                Self::generate_rsa(size.bits())?
            }
        };
        Ok(key)
    }

    /// Generate an RSA key pair with the specified number of bits.
    pub fn generate_rsa(bits: usize) -> Result<Self> {
        let mut rng = OsRng;
        let private = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CrtAuthError::KeyGenerationFailed(e.to_string()))?;
        Ok(KeyPair::Rsa(Box::new(private)))
    }

    /// The algorithm certificates signed by this key are stamped with.
    pub fn signature_algorithm(&self) -> SignatureAlgorithm {
        match self {
            KeyPair::Rsa(_) => SignatureAlgorithm::Sha256WithRSA,
            KeyPair::EcdsaP224(_) => SignatureAlgorithm::Sha224WithECDSA,
            KeyPair::EcdsaP256(_) => SignatureAlgorithm::Sha256WithECDSA,
            KeyPair::EcdsaP384(_) => SignatureAlgorithm::Sha384WithECDSA,
            KeyPair::EcdsaP521(_) => SignatureAlgorithm::Sha512WithECDSA,
        }
    }

    /// Signs `data` and returns the signature as it appears in a certificate.
    ///
    /// RSA keys use PKCS#1 v1.5 with SHA-256. ECDSA keys hash with the digest matching the curve
    /// and return a DER encoded `Ecdsa-Sig-Value`.
    pub fn sign_data(&self, data: &[u8]) -> Result<Vec<u8>> {
        let failed = |e: ecdsa::Error| CrtAuthError::SigningFailed(e.to_string());
        match self {
            KeyPair::Rsa(private) => {
                let signing_key =
                    rsa::pkcs1v15::SigningKey::<Sha256>::new(private.as_ref().clone());
                let signature = signing_key.try_sign(data).map_err(failed)?;
                Ok(signature.to_vec())
            }
            KeyPair::EcdsaP224(secret) => {
                let signing_key = p224::ecdsa::SigningKey::from(secret);
                let signature: p224::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(failed)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::EcdsaP256(secret) => {
                let signing_key = p256::ecdsa::SigningKey::from(secret);
                let signature: p256::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(failed)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::EcdsaP384(secret) => {
                let signing_key = p384::ecdsa::SigningKey::from(secret);
                let signature: p384::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(failed)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
            KeyPair::EcdsaP521(secret) => {
                let signing_key =
                    p521::ecdsa::SigningKey::from_bytes(&secret.to_bytes()).map_err(failed)?;
                let signature: p521::ecdsa::Signature =
                    signing_key.try_sign(data).map_err(failed)?;
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }

    /// PEM label matching [`KeyPair::to_der`].
    pub fn pem_label(&self) -> &'static str {
        match self {
            KeyPair::Rsa(_) => RSA_PRIVATE_KEY_LABEL,
            _ => EC_PRIVATE_KEY_LABEL,
        }
    }

    /// Encodes the key in its native form: PKCS#1 for RSA, SEC1 for elliptic curves.
    pub fn to_der(&self) -> Result<Vec<u8>> {
        let encoded = match self {
            KeyPair::Rsa(private) => private
                .to_pkcs1_der()
                .map(|doc| doc.as_bytes().to_vec())
                .map_err(|e| e.to_string()),
            KeyPair::EcdsaP224(secret) => ec_private_key_der(secret),
            KeyPair::EcdsaP256(secret) => ec_private_key_der(secret),
            KeyPair::EcdsaP384(secret) => ec_private_key_der(secret),
            KeyPair::EcdsaP521(secret) => ec_private_key_der(secret),
        };
        encoded.map_err(CrtAuthError::EncodingError)
    }

    /// Decodes a key from the contents of a PEM block with the given label.
    pub fn from_der(label: &str, der: &[u8]) -> Result<Self> {
        match label {
            RSA_PRIVATE_KEY_LABEL => RsaPrivateKey::from_pkcs1_der(der)
                .map(|private| KeyPair::Rsa(Box::new(private)))
                .map_err(|e| CrtAuthError::ParseError(format!("invalid RSA private key: {e}"))),
            EC_PRIVATE_KEY_LABEL => Self::from_sec1_der(der),
            other => Err(CrtAuthError::ParseError(format!(
                "unsupported private key type '{other}'"
            ))),
        }
    }

    fn from_sec1_der(der: &[u8]) -> Result<Self> {
        let parsed = sec1::EcPrivateKey::from_der(der)?;
        let curve = parsed
            .parameters
            .and_then(|params| params.named_curve())
            .ok_or_else(|| {
                CrtAuthError::ParseError("EC private key does not name its curve".to_string())
            })?;
        let invalid = |e: p256::elliptic_curve::Error| {
            CrtAuthError::ParseError(format!("invalid EC private key: {e}"))
        };

        if curve == p224::NistP224::OID {
            p224::SecretKey::from_sec1_der(der)
                .map(KeyPair::EcdsaP224)
                .map_err(invalid)
        } else if curve == p256::NistP256::OID {
            p256::SecretKey::from_sec1_der(der)
                .map(KeyPair::EcdsaP256)
                .map_err(invalid)
        } else if curve == p384::NistP384::OID {
            p384::SecretKey::from_sec1_der(der)
                .map(KeyPair::EcdsaP384)
                .map_err(invalid)
        } else if curve == p521::NistP521::OID {
            p521::SecretKey::from_sec1_der(der)
                .map(KeyPair::EcdsaP521)
                .map_err(invalid)
        } else {
            Err(CrtAuthError::ParseError(format!(
                "unsupported elliptic curve {curve}"
            )))
        }
    }
}

/// SEC1 `ECPrivateKey` naming its curve and carrying the uncompressed public point.
///
/// OpenSSL refuses keys that leave the curve implicit.
fn ec_private_key_der<C>(secret: &SecretKey<C>) -> std::result::Result<Vec<u8>, String>
where
    C: CurveArithmetic + AssociatedOid,
    AffinePoint<C>: FromEncodedPoint<C> + ToEncodedPoint<C>,
    FieldBytesSize<C>: ModulusSize,
{
    let private_key = secret.to_bytes();
    let public_key = secret.public_key().to_encoded_point(false);
    sec1::EcPrivateKey {
        private_key: private_key.as_slice(),
        parameters: Some(sec1::EcParameters::NamedCurve(C::OID)),
        public_key: Some(public_key.as_bytes()),
    }
    .to_der()
    .map_err(|e| e.to_string())
}

/// The public half of a [`KeyPair`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublicKey {
    Rsa(RsaPublicKey),
    EcdsaP224(p224::PublicKey),
    EcdsaP256(p256::PublicKey),
    EcdsaP384(p384::PublicKey),
    EcdsaP521(p521::PublicKey),
}

impl PublicKey {
    /// Derives the public key from a private key.
    pub fn from_key_pair(key_pair: &KeyPair) -> Self {
        match key_pair {
            KeyPair::Rsa(private) => PublicKey::Rsa(RsaPublicKey::from(private.as_ref())),
            KeyPair::EcdsaP224(secret) => PublicKey::EcdsaP224(secret.public_key()),
            KeyPair::EcdsaP256(secret) => PublicKey::EcdsaP256(secret.public_key()),
            KeyPair::EcdsaP384(secret) => PublicKey::EcdsaP384(secret.public_key()),
            KeyPair::EcdsaP521(secret) => PublicKey::EcdsaP521(secret.public_key()),
        }
    }

    /// Encodes the key as a certificate `SubjectPublicKeyInfo`.
    pub fn to_x509spki(&self) -> Result<SubjectPublicKeyInfoOwned> {
        let spki = match self {
            PublicKey::Rsa(public) => SubjectPublicKeyInfoOwned::from_key(public.clone()),
            PublicKey::EcdsaP224(public) => SubjectPublicKeyInfoOwned::from_key(*public),
            PublicKey::EcdsaP256(public) => SubjectPublicKeyInfoOwned::from_key(*public),
            PublicKey::EcdsaP384(public) => SubjectPublicKeyInfoOwned::from_key(*public),
            PublicKey::EcdsaP521(public) => SubjectPublicKeyInfoOwned::from_key(*public),
        };
        spki.map_err(|e| CrtAuthError::EncodingError(e.to_string()))
    }

    /// Decodes a `SubjectPublicKeyInfo` holding an RSA or NIST curve key.
    pub fn from_x509spki(spki: &SubjectPublicKeyInfoOwned) -> Result<Self> {
        let der = spki.to_der()?;
        let invalid = |e: pkcs8::spki::Error| {
            CrtAuthError::ParseError(format!("invalid subject public key: {e}"))
        };

        if spki.algorithm.oid == const_oid::db::rfc5912::RSA_ENCRYPTION {
            return RsaPublicKey::from_public_key_der(&der)
                .map(PublicKey::Rsa)
                .map_err(invalid);
        }
        if spki.algorithm.oid != const_oid::db::rfc5912::ID_EC_PUBLIC_KEY {
            return Err(CrtAuthError::ParseError(format!(
                "unsupported public key algorithm {}",
                spki.algorithm.oid
            )));
        }

        let curve = spki
            .algorithm
            .parameters
            .as_ref()
            .and_then(|params| params.decode_as::<const_oid::ObjectIdentifier>().ok())
            .ok_or_else(|| {
                CrtAuthError::ParseError("EC public key does not name its curve".to_string())
            })?;

        if curve == p224::NistP224::OID {
            p224::PublicKey::from_public_key_der(&der)
                .map(PublicKey::EcdsaP224)
                .map_err(invalid)
        } else if curve == p256::NistP256::OID {
            p256::PublicKey::from_public_key_der(&der)
                .map(PublicKey::EcdsaP256)
                .map_err(invalid)
        } else if curve == p384::NistP384::OID {
            p384::PublicKey::from_public_key_der(&der)
                .map(PublicKey::EcdsaP384)
                .map_err(invalid)
        } else if curve == p521::NistP521::OID {
            p521::PublicKey::from_public_key_der(&der)
                .map(PublicKey::EcdsaP521)
                .map_err(invalid)
        } else {
            Err(CrtAuthError::ParseError(format!(
                "unsupported elliptic curve {curve}"
            )))
        }
    }

    /// Checks a signature produced by [`KeyPair::sign_data`] with the matching private key.
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> Result<()> {
        let rejected = |e: ecdsa::Error| CrtAuthError::VerificationFailed(e.to_string());
        match self {
            PublicKey::Rsa(public) => {
                let verifying_key = rsa::pkcs1v15::VerifyingKey::<Sha256>::new(public.clone());
                let signature =
                    rsa::pkcs1v15::Signature::try_from(signature).map_err(rejected)?;
                verifying_key.verify(data, &signature).map_err(rejected)
            }
            PublicKey::EcdsaP224(public) => {
                let verifying_key = p224::ecdsa::VerifyingKey::from(public);
                let signature = p224::ecdsa::Signature::from_der(signature).map_err(rejected)?;
                verifying_key.verify(data, &signature).map_err(rejected)
            }
            PublicKey::EcdsaP256(public) => {
                let verifying_key = p256::ecdsa::VerifyingKey::from(public);
                let signature = p256::ecdsa::Signature::from_der(signature).map_err(rejected)?;
                verifying_key.verify(data, &signature).map_err(rejected)
            }
            PublicKey::EcdsaP384(public) => {
                let verifying_key = p384::ecdsa::VerifyingKey::from(public);
                let signature = p384::ecdsa::Signature::from_der(signature).map_err(rejected)?;
                verifying_key.verify(data, &signature).map_err(rejected)
            }
            PublicKey::EcdsaP521(public) => {
                let verifying_key =
                    p521::ecdsa::VerifyingKey::from_affine(*public.as_affine()).map_err(rejected)?;
                let signature = p521::ecdsa::Signature::from_der(signature).map_err(rejected)?;
                verifying_key.verify(data, &signature).map_err(rejected)
            }
        }
    }
}
