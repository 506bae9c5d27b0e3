use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use certgate::authority::AuthorityStore;
use certgate::config::Settings;
use certgate::error::Result;
use certgate::issuer::CertificateIssuer;
use certgate::server::{self, AppState};

/// Certificate issuance service.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Opts {
    /// YAML configuration file. Defaults apply when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let opts = Opts::parse();

    let default_level = if opts.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt::SubscriberBuilder::default()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "certgate stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(opts: Opts) -> Result<()> {
    let settings = Settings::load(opts.config.as_deref())?;
    match &opts.config {
        Some(path) => info!(config = %path.display(), "configuration loaded"),
        None => info!("no configuration file given, using defaults"),
    }

    let authorities = AuthorityStore::load(&settings.authorities)?;
    if authorities.is_empty() {
        info!("no authority configured, every certificate request will be refused");
    }

    let policy = settings.issuance_policy();
    info!(
        authorities = ?authorities.names(),
        validity_days = settings.issuance.validity_days,
        verify_csr_signature = policy.verify_csr_signature,
        "issuer ready"
    );
    let issuer = CertificateIssuer::new(Arc::new(authorities), policy);

    let keygen = settings.key_generator();
    info!(
        default_bits = keygen.default_bits(),
        passphrase_configured = keygen.has_passphrase(),
        "key generator ready"
    );

    let state = AppState {
        issuer,
        keygen,
        request_timeout: settings.server.request_timeout(),
    };
    server::serve(&settings.server, state).await
}
