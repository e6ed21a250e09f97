use std::path::PathBuf;

use clap::{ArgGroup, Args as ClapArgs, Parser, Subcommand};
use pgcrtauth::cert::params::{DEFAULT_VALID_FOR_DAYS, Template};
use pgcrtauth::key::KeySize;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Creates certificates for standalone and clustered PostgreSQL servers"
)]
pub struct Args {
    #[command(subcommand)]
    pub sub: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Creates a new certificate authority (root.crt and root.key) in a directory.
    ///
    /// Existing root files in the directory are overwritten.
    Init(InitArgs),
    /// Generates a server certificate pair for PostgreSQL (server.crt and server.key).
    ///
    /// The pair is either signed by the authority in --ca-dir or self-signed.
    Generate(GenerateArgs),
    /// Print app name and version
    Version,
}

/// Subject and key options shared by every command that creates a pair.
#[derive(ClapArgs, Debug)]
pub struct SubjectArgs {
    /// Subject's organization name
    #[arg(short = 'O', long, default_value = "")]
    pub organization: String,

    /// Subject's common name
    #[arg(short = 'C', long, default_value = "")]
    pub common_name: String,

    /// How many days the certificate will be valid for from now on
    #[arg(short = 'V', long = "valid-for", default_value_t = DEFAULT_VALID_FOR_DAYS)]
    pub valid_for_days: u32,

    /// One of P224, P256, P384, P521 (elliptic curves) or 1024, 2048, 3072, 4096 (RSA)
    #[arg(short = 'K', long, default_value_t = KeySize::default())]
    pub key_size: KeySize,
}

impl SubjectArgs {
    pub fn to_template(&self, host_names: Vec<String>) -> Template {
        Template::builder()
            .organization(self.organization.as_str())
            .common_name(self.common_name.as_str())
            .host_names(host_names)
            .valid_for_days(self.valid_for_days)
            .key_size(self.key_size)
            .build()
    }
}

#[derive(ClapArgs, Debug)]
pub struct InitArgs {
    /// The directory in which the generated root files should be stored
    #[arg(short = 'c', long)]
    pub ca_dir: PathBuf,

    #[command(flatten)]
    pub subject: SubjectArgs,
}

#[derive(ClapArgs, Debug)]
#[command(group(ArgGroup::new("signer").required(true).args(["ca_dir", "self_signed"])))]
pub struct GenerateArgs {
    /// Comma separated IP addresses and hostnames of the server
    #[arg(short = 'H', long, required = true, value_delimiter = ',')]
    pub hostnames: Vec<String>,

    /// Directory where server.crt and server.key are stored
    #[arg(short = 'o', long)]
    pub out_dir: PathBuf,

    /// Directory containing root.crt and root.key (created with 'pgcrtauth init')
    #[arg(short = 'c', long)]
    pub ca_dir: Option<PathBuf>,

    /// Create a self-signed certificate without a CA
    #[arg(short = 's', long)]
    pub self_signed: bool,

    #[command(flatten)]
    pub subject: SubjectArgs,
}
