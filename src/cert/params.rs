use std::net::IpAddr;

use bon::Builder;
use const_oid::ObjectIdentifier;
use der::asn1::SetOfVec;
use der::{Any, Tag, Tagged};
use rand_core::{OsRng, RngCore};
use time::Duration;
use time::OffsetDateTime;
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::name::{Name, RdnSequence, RelativeDistinguishedName};

use super::Certificate;
use super::extensions::ToAndFromX509Extension;
use crate::error::CrtAuthError;
use crate::key::KeySize;

/// Certificates are valid for a year unless told otherwise.
pub const DEFAULT_VALID_FOR_DAYS: u32 = 365;

/// Length of generated serial numbers in bytes.
const SERIAL_NUMBER_LEN: usize = 17;

const COMMON_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.3");
const ORGANIZATION: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.4.10");

/// The user supplied parameters a certificate is built from.
///
/// ```
/// use pgcrtauth::cert::params::Template;
/// use pgcrtauth::key::KeySize;
///
/// let template = Template::builder()
///     .organization("Acme")
///     .common_name("db1")
///     .host_names(vec!["db1.internal".to_string(), "10.0.0.1".to_string()])
///     .key_size(KeySize::P384)
///     .build();
/// assert_eq!(template.valid_for_days, 365);
/// ```
#[derive(Clone, Debug, Builder)]
pub struct Template {
    #[builder(into, default)]
    pub organization: String,
    #[builder(into, default)]
    pub common_name: String,
    /// IP address literals and DNS names, in the order they should appear.
    #[builder(default)]
    pub host_names: Vec<String>,
    #[builder(default = DEFAULT_VALID_FOR_DAYS)]
    pub valid_for_days: u32,
    #[builder(default)]
    pub key_size: KeySize,
}

impl Default for Template {
    fn default() -> Self {
        Template::builder().build()
    }
}

impl Template {
    /// Builds the unsigned certificate descriptor.
    ///
    /// The validity window starts now and lasts `valid_for_days` whole days. Each host name that
    /// parses as an IP address literal becomes an IP SAN entry, everything else a DNS entry.
    pub fn to_certificate(&self) -> Result<Certificate, CrtAuthError> {
        let serial_number = random_serial_number()?;
        let validity = Validity::starting_now(self.valid_for_days)?;
        let subject = DistinguishedName {
            common_name: self.common_name.clone(),
            organization: Some(self.organization.clone()).filter(|org| !org.is_empty()),
        };

        let mut cert = Certificate::new(serial_number, subject, validity);
        cert.basic_constraints_valid = true;
        for host in self.host_names.iter().map(|h| h.trim()).filter(|h| !h.is_empty()) {
            match host.parse::<IpAddr>() {
                Ok(ip) => cert.ip_addresses.push(ip),
                Err(_) => cert.dns_names.push(host.to_string()),
            }
        }
        Ok(cert)
    }
}

/// Draws a positive serial number from the OS random source.
///
/// The top bit is cleared so the value is positive without a DER pad byte, and the next bit is
/// set so no leading zero gets stripped; the encoding is always [`SERIAL_NUMBER_LEN`] bytes.
fn random_serial_number() -> Result<Vec<u8>, CrtAuthError> {
    let mut serial = vec![0u8; SERIAL_NUMBER_LEN];
    OsRng
        .try_fill_bytes(&mut serial)
        .map_err(|e| CrtAuthError::TemplateError(format!("serial number generation failed: {e}")))?;
    serial[0] = (serial[0] & 0x3f) | 0x40;
    Ok(serial)
}

/// Distinguished name of a certificate subject or issuer.
///
/// # Fields
/// * `common_name` - The common name (CN), omitted from the encoding when empty.
/// * `organization` - The organization (O).
#[derive(Clone, Debug, Builder, Default, PartialEq, Eq)]
pub struct DistinguishedName {
    #[builder(into, default)]
    pub common_name: String,
    #[builder(into)]
    pub organization: Option<String>,
}

impl DistinguishedName {
    /// Converts the distinguished name to an X.509-compatible format.
    ///
    /// Attributes are UTF8String values in the order O, CN.
    pub fn as_x509_name(&self) -> Result<Name, CrtAuthError> {
        let mut rdns = Vec::new();
        if let Some(organization) = self.organization.as_deref().filter(|o| !o.is_empty()) {
            rdns.push(single_attribute_rdn(ORGANIZATION, organization)?);
        }
        if !self.common_name.is_empty() {
            rdns.push(single_attribute_rdn(COMMON_NAME, &self.common_name)?);
        }
        Ok(RdnSequence(rdns))
    }

    /// Creates a `DistinguishedName` from an X.509-compatible format.
    ///
    /// Attributes other than CN and O are ignored.
    pub fn from_x509_name(x509dn: &Name) -> Result<Self, CrtAuthError> {
        let mut dn = DistinguishedName::default();
        for rdn in x509dn.0.iter() {
            for attr in rdn.0.iter() {
                if attr.oid == COMMON_NAME {
                    dn.common_name = attribute_string(&attr.value)?;
                } else if attr.oid == ORGANIZATION {
                    dn.organization = Some(attribute_string(&attr.value)?);
                }
            }
        }
        Ok(dn)
    }
}

fn single_attribute_rdn(
    oid: ObjectIdentifier,
    value: &str,
) -> Result<RelativeDistinguishedName, CrtAuthError> {
    let atv = AttributeTypeAndValue {
        oid,
        value: Any::new(Tag::Utf8String, value.as_bytes())?,
    };
    Ok(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?))
}

fn attribute_string(value: &Any) -> Result<String, CrtAuthError> {
    match value.tag() {
        Tag::Utf8String | Tag::PrintableString | Tag::Ia5String | Tag::TeletexString => {
            String::from_utf8(value.value().to_vec())
                .map_err(|e| CrtAuthError::ParseError(format!("name attribute: {e}")))
        }
        other => Err(CrtAuthError::ParseError(format!(
            "name attribute has unsupported type {other}"
        ))),
    }
}

/// Certificate validity period.
///
/// This struct represents the `notBefore` and `notAfter` fields in a certificate.
///
/// # Fields
/// * `not_before` - The start of the validity period.
/// * `not_after` - The end of the validity period.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Validity {
    pub not_before: OffsetDateTime,
    pub not_after: OffsetDateTime,
}

impl Validity {
    /// Creates a validity period of whole days starting at the current second.
    ///
    /// X.509 times have one second precision, so the start is truncated to keep the descriptor
    /// equal to what gets encoded.
    pub fn starting_now(days: u32) -> Result<Self, CrtAuthError> {
        if days == 0 {
            return Err(CrtAuthError::TemplateError(
                "validity must be at least one day".to_string(),
            ));
        }
        let not_before = OffsetDateTime::now_utc()
            .replace_nanosecond(0)
            .map_err(|e| CrtAuthError::TemplateError(e.to_string()))?;
        let not_after = not_before
            .checked_add(Duration::days(i64::from(days)))
            .filter(|end| end.year() <= 9999)
            .ok_or_else(|| {
                CrtAuthError::TemplateError(format!("validity of {days} days is out of range"))
            })?;
        Ok(Self {
            not_before,
            not_after,
        })
    }
}

/// Represents an X.509 extension.
///
/// This struct contains the OID, criticality, and value of an extension.
///
/// # Fields
/// * `oid` - The object identifier of the extension.
/// * `critical` - Indicates if the extension is critical.
/// * `value` - The DER-encoded value of the extension.
#[derive(Clone, Debug)]
pub struct ExtensionParam {
    pub oid: ObjectIdentifier,
    pub critical: bool,
    /// DER-encoded extension value
    pub value: Vec<u8>,
}

impl ExtensionParam {
    /// Creates an `ExtensionParam` from a specific extension.
    ///
    /// # Arguments
    /// * `extension` - The extension to encode.
    /// * `critical` - Indicates if the extension is critical.
    pub fn from_extension<E: ToAndFromX509Extension>(
        extension: &E,
        critical: bool,
    ) -> Result<Self, CrtAuthError> {
        Ok(Self {
            oid: E::OID,
            critical,
            value: extension.to_x509_extension_value()?,
        })
    }

    /// Decodes an `ExtensionParam` into a specific extension.
    pub fn to_extension<E: ToAndFromX509Extension>(&self) -> Result<E, CrtAuthError> {
        E::from_x509_extension_value(&self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_host_names_are_classified_in_order() {
        let template = Template::builder()
            .host_names(vec![
                "10.0.0.1".to_string(),
                "db.internal".to_string(),
                "::1".to_string(),
                " replica.internal ".to_string(),
                "".to_string(),
            ])
            .build();
        let cert = template.to_certificate().unwrap();

        assert_eq!(
            cert.ip_addresses,
            vec![
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                IpAddr::V6(Ipv6Addr::LOCALHOST)
            ]
        );
        assert_eq!(cert.dns_names, vec!["db.internal", "replica.internal"]);
    }

    #[test]
    fn test_template_defaults() {
        let template = Template::default();
        assert_eq!(template.valid_for_days, DEFAULT_VALID_FOR_DAYS);
        assert_eq!(template.key_size, KeySize::P256);
        assert!(template.host_names.is_empty());
    }

    #[test]
    fn test_descriptor_fields() {
        let template = Template::builder()
            .organization("Acme")
            .common_name("db1")
            .valid_for_days(30)
            .build();
        let cert = template.to_certificate().unwrap();

        assert_eq!(cert.subject.common_name, "db1");
        assert_eq!(cert.subject.organization.as_deref(), Some("Acme"));
        assert!(cert.basic_constraints_valid);
        assert!(!cert.is_ca);
        assert!(!cert.is_signed());
        assert_eq!(cert.validity.not_before.nanosecond(), 0);
        assert_eq!(
            cert.validity.not_after - cert.validity.not_before,
            Duration::days(30)
        );
    }

    #[test]
    fn test_serial_numbers_are_positive_and_distinct() {
        let first = random_serial_number().unwrap();
        let second = random_serial_number().unwrap();
        assert_eq!(first.len(), SERIAL_NUMBER_LEN);
        assert_eq!(first[0] & 0xc0, 0x40);
        assert_ne!(first, second);

        let encoded: x509_cert::serial_number::SerialNumber =
            x509_cert::serial_number::SerialNumber::new(&first).unwrap();
        assert_eq!(encoded.as_bytes(), first.as_slice());
    }

    #[test]
    fn test_invalid_validity() {
        let zero = Template::builder().valid_for_days(0).build();
        assert!(matches!(
            zero.to_certificate(),
            Err(CrtAuthError::TemplateError(_))
        ));

        let huge = Template::builder().valid_for_days(u32::MAX).build();
        assert!(matches!(
            huge.to_certificate(),
            Err(CrtAuthError::TemplateError(_))
        ));
    }

    #[test]
    fn test_distinguished_name_x509_round_trip() {
        let dn = DistinguishedName::builder()
            .common_name("db1")
            .organization("Acme, Inc.".to_string())
            .build();
        let name = dn.as_x509_name().unwrap();
        assert_eq!(name.0.len(), 2);
        assert_eq!(DistinguishedName::from_x509_name(&name).unwrap(), dn);

        let empty = DistinguishedName::default().as_x509_name().unwrap();
        assert!(empty.0.is_empty());
    }
}
