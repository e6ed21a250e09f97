mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use pgcrtauth::authority::CertificateAuthority;
use pgcrtauth::pair::Pair;
use pgcrtauth::{SERVER_CERT_FILE_NAME, SERVER_KEY_FILE_NAME};

fn main() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(e) = real_main() {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn real_main() -> Result<()> {
    let args = cli::Args::parse();

    match args.sub {
        cli::Cmd::Init(init) => handle_init(init),
        cli::Cmd::Generate(generate) => handle_generate(generate),
        cli::Cmd::Version => {
            println!("pgcrtauth v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn handle_init(args: cli::InitArgs) -> Result<()> {
    info!(
        "Creating a new certificate authority at {}",
        args.ca_dir.display()
    );

    let template = args.subject.to_template(Vec::new());
    let mut ca = CertificateAuthority::new();
    ca.init(&template, &args.ca_dir)
        .context("Could not create certification authority")?;

    info!("Successfully created certification authority");
    println!("- Certificate: {}", ca.cert_path(&args.ca_dir).display());
    println!("- Private key: {}", ca.key_path(&args.ca_dir).display());
    Ok(())
}

fn handle_generate(args: cli::GenerateArgs) -> Result<()> {
    let template = args.subject.to_template(args.hostnames);
    let mut pair = Pair::new_server(&template).context("Could not create cert/key pair")?;

    match &args.ca_dir {
        Some(ca_dir) if !args.self_signed => {
            info!(
                "Creating a certificate signed by the CA at {}",
                ca_dir.display()
            );
            let mut ca = CertificateAuthority::new();
            ca.load(ca_dir).with_context(|| {
                format!("Could not load CA pair from directory '{}'", ca_dir.display())
            })?;
            pair.sign_with(&ca.pair)
                .context("Could not sign certificate with CA")?;
        }
        _ => {
            info!("Creating a self-signed certificate");
            pair.self_sign()
                .context("Could not self-sign certificate")?;
        }
    }

    let cert_path = args.out_dir.join(SERVER_CERT_FILE_NAME);
    let key_path = args.out_dir.join(SERVER_KEY_FILE_NAME);
    pair.write_files(&cert_path, &key_path)
        .context("Could not write cert/key pair to files")?;

    info!("Successfully created server pair");
    println!("- Certificate: {}", cert_path.display());
    println!("- Private key: {}", key_path.display());
    Ok(())
}
