#![allow(dead_code)]

use std::path::Path;

use pgcrtauth::authority::CertificateAuthority;
use pgcrtauth::cert::params::Template;
use pgcrtauth::key::KeySize;
use pgcrtauth::pair::Pair;

pub fn ca_template(key_size: KeySize) -> Template {
    Template::builder()
        .organization("myca")
        .common_name("myca.local")
        .key_size(key_size)
        .build()
}

pub fn server_template(key_size: KeySize) -> Template {
    Template::builder()
        .organization("myca")
        .common_name("server.myca.local")
        .host_names(vec![
            "server.myca.local".to_string(),
            "10.0.0.1".to_string(),
            "::1".to_string(),
        ])
        .key_size(key_size)
        .build()
}

/// Creates a certificate authority in `dir`.
pub fn init_ca(dir: &Path, key_size: KeySize) -> CertificateAuthority {
    let mut ca = CertificateAuthority::new();
    ca.init(&ca_template(key_size), dir).unwrap();
    ca
}

/// Creates a server pair signed by `ca`.
pub fn issue_server(ca: &Pair, key_size: KeySize) -> Pair {
    let mut server = Pair::new_server(&server_template(key_size)).unwrap();
    server.sign_with(ca).unwrap();
    server
}
