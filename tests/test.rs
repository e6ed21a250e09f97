mod util;

use std::net::IpAddr;

use pgcrtauth::authority::CertificateAuthority;
use pgcrtauth::cert::params::Template;
use pgcrtauth::error::CrtAuthError;
use pgcrtauth::key::{KeyPair, KeySize};
use pgcrtauth::pair::Pair;
use pgcrtauth::{ROOT_CERT_FILE_NAME, ROOT_KEY_FILE_NAME, SERVER_CERT_FILE_NAME, SERVER_KEY_FILE_NAME};

pub type Result<T> = std::result::Result<T, CrtAuthError>;

/// A CA created on disk signs a server pair that verifies against it.
#[test]
fn generate_server_cert_with_ca() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let ca = util::init_ca(dir.path(), KeySize::P256);
    let server = util::issue_server(&ca.pair, KeySize::P384);

    let ca_cert = ca.pair.cert.as_ref().unwrap();
    let cert = server.cert.as_ref().unwrap();
    assert!(ca_cert.is_ca);
    assert_eq!(ca_cert.issuer, ca_cert.subject);
    assert_eq!(cert.issuer, ca_cert.subject);
    assert!(!cert.is_ca);
    assert_eq!(cert.dns_names, vec!["server.myca.local"]);
    assert_eq!(
        cert.ip_addresses,
        vec![
            "10.0.0.1".parse::<IpAddr>().unwrap(),
            "::1".parse::<IpAddr>().unwrap()
        ]
    );
    server.verify_issued_by(&ca.pair)?;
    Ok(())
}

/// Signing against a CA loaded back from disk gives the same issuer as signing against the one
/// still in memory.
#[test]
fn sign_with_loaded_ca() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let created = util::init_ca(dir.path(), KeySize::Rsa2048);

    let mut loaded = CertificateAuthority::new();
    loaded.load(dir.path())?;
    let server = util::issue_server(&loaded.pair, KeySize::P256);

    server.verify_issued_by(&created.pair)?;
    assert_eq!(
        server.cert.as_ref().unwrap().issuer,
        created.pair.cert.as_ref().unwrap().subject
    );
    Ok(())
}

#[test]
fn init_twice_overwrites() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let first = util::init_ca(dir.path(), KeySize::P256);
    let first_pem = std::fs::read(dir.path().join(ROOT_CERT_FILE_NAME)).unwrap();
    let second = util::init_ca(dir.path(), KeySize::P256);
    let second_pem = std::fs::read(dir.path().join(ROOT_CERT_FILE_NAME)).unwrap();

    let first_cert = first.pair.cert.as_ref().unwrap();
    let second_cert = second.pair.cert.as_ref().unwrap();
    assert_ne!(first_cert.serial_number, second_cert.serial_number);
    assert_ne!(first.pair.public_key()?, second.pair.public_key()?);
    assert_ne!(first_pem, second_pem);

    let mut entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    entries.sort();
    assert_eq!(entries, vec![ROOT_CERT_FILE_NAME, ROOT_KEY_FILE_NAME]);

    let mut loaded = CertificateAuthority::new();
    loaded.load(dir.path())?;
    assert_eq!(
        loaded.pair.cert.as_ref().unwrap().serial_number,
        second_cert.serial_number
    );
    loaded.pair.verify_issued_by(&loaded.pair)?;
    Ok(())
}

#[test]
fn load_missing_key_leaves_ca_untouched() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let original = util::init_ca(dir.path(), KeySize::P256);
    std::fs::remove_file(dir.path().join(ROOT_KEY_FILE_NAME)).unwrap();

    let mut empty = CertificateAuthority::new();
    let err = empty.load(dir.path()).unwrap_err();
    assert!(
        matches!(err, CrtAuthError::NotFound(ref path) if path.ends_with(ROOT_KEY_FILE_NAME))
    );
    assert!(empty.pair.cert.is_none());
    assert!(empty.pair.key.is_none());

    let other_dir = tempfile::tempdir().unwrap();
    let mut existing = util::init_ca(other_dir.path(), KeySize::P256);
    let serial = existing.pair.cert.as_ref().unwrap().serial_number.clone();
    assert!(existing.load(dir.path()).is_err());
    assert_eq!(existing.pair.cert.as_ref().unwrap().serial_number, serial);
    assert_ne!(
        original.pair.cert.as_ref().unwrap().serial_number,
        serial
    );
    Ok(())
}

#[test]
fn load_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let mut ca = CertificateAuthority::new();
    let err = ca.load(&dir.path().join("nowhere")).unwrap_err();
    assert!(
        matches!(err, CrtAuthError::NotFound(ref path) if path.ends_with(ROOT_CERT_FILE_NAME))
    );
}

#[test]
fn server_round_trip() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let ca = util::init_ca(&dir.path().join("ca"), KeySize::P521);
    let server = util::issue_server(&ca.pair, KeySize::Rsa2048);

    let out = dir.path().join("server1");
    let cert_path = out.join(SERVER_CERT_FILE_NAME);
    let key_path = out.join(SERVER_KEY_FILE_NAME);
    server.write_files(&cert_path, &key_path)?;

    let mut loaded = Pair::default();
    loaded.load_files(&cert_path, &key_path)?;
    let original = server.cert.as_ref().unwrap();
    let reloaded = loaded.cert.as_ref().unwrap();
    assert_eq!(reloaded.serial_number, original.serial_number);
    assert_eq!(reloaded.subject, original.subject);
    assert_eq!(reloaded.validity, original.validity);
    assert_eq!(
        loaded.key.as_ref().unwrap().sign_data(b"payload")?,
        server.key.as_ref().unwrap().sign_data(b"payload")?
    );
    loaded.verify_issued_by(&ca.pair)?;
    Ok(())
}

#[cfg(unix)]
#[test]
fn file_permissions() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let ca_dir = dir.path().join("nested").join("ca");
    util::init_ca(&ca_dir, KeySize::P256);

    let mode = |name: &str| {
        std::fs::metadata(ca_dir.join(name))
            .unwrap()
            .permissions()
            .mode()
            & 0o777
    };
    assert_eq!(mode(ROOT_KEY_FILE_NAME), 0o600);
    assert_eq!(mode(ROOT_CERT_FILE_NAME), 0o644);

    // Files that already existed are reset: the key tightened, the certificate opened up.
    let key_path = ca_dir.join(ROOT_KEY_FILE_NAME);
    let cert_path = ca_dir.join(ROOT_CERT_FILE_NAME);
    std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o644)).unwrap();
    std::fs::set_permissions(&cert_path, std::fs::Permissions::from_mode(0o600)).unwrap();
    util::init_ca(&ca_dir, KeySize::P256);
    assert_eq!(mode(ROOT_KEY_FILE_NAME), 0o600);
    assert_eq!(mode(ROOT_CERT_FILE_NAME), 0o644);
    Ok(())
}

/// A CA written with the default template loads back and signs.
#[test]
fn default_ca_loads_back() -> Result<()> {
    let dir = tempfile::tempdir().unwrap();
    let mut created = CertificateAuthority::new();
    created.init(&Template::default(), dir.path())?;

    let mut loaded = CertificateAuthority::new();
    loaded.load(dir.path())?;
    assert!(matches!(loaded.pair.key, Some(KeyPair::EcdsaP256(_))));
    assert_eq!(loaded.pair.public_key()?, created.pair.public_key()?);

    let server = util::issue_server(&loaded.pair, KeySize::default());
    server.verify_issued_by(&created.pair)?;
    Ok(())
}
