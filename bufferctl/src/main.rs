//! Buffer CLI
//!
//! Command-line interface for the Buffer social media scheduling API.

use anyhow::Result;
use buffer_core::ApiError;
use bufferctl::cli::{
    generate_completion, handle_analytics, handle_auth, handle_posts, handle_profiles, Cli,
    Commands, CommandFailure, Session,
};
use bufferctl::config::{CliConfig, ConfigStore};
use bufferctl::format::{format_error, OutputFormat};
use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);

    // Until the config is resolved, errors render in the requested format or JSON
    let mut format = cli.output.map(OutputFormat::from).unwrap_or(OutputFormat::Json);

    let result = match build_session(&cli) {
        Ok(session) => {
            format = session.format;
            run(cli.command, &session).await
        }
        Err(e) => Err(e.context("Configuration error")),
    };

    if let Err(e) = result {
        report_error(&e, format);
        std::process::exit(1);
    }
}

/// Resolve configuration using priority chain: defaults → file → env → CLI args
fn build_session(cli: &Cli) -> Result<Session> {
    let store = match &cli.config {
        Some(path) => ConfigStore::new(path),
        None => ConfigStore::open_default()?,
    };

    let mut builder = CliConfig::builder()
        .with_config_file(&store, !cli.no_config)
        .with_env_overrides();

    if let Some(ref api_url) = cli.api_url {
        builder = builder.with_api_url(api_url)?;
    }
    if let Some(format) = cli.output {
        builder = builder.with_output_format(OutputFormat::from(format).as_str())?;
    }
    if let Some(timeout) = cli.timeout {
        builder = builder.with_timeout(timeout)?;
    }

    let config = builder.build()?;
    debug!("Config file: {}", store.path().display());
    debug!(
        "API URL: {}, output: {}, timeout: {}s, retries: {}",
        config.api_url, config.output_format, config.timeout, config.retries
    );

    Session::new(store, config, cli.access_token.clone())
}

async fn run(command: Commands, session: &Session) -> Result<()> {
    match command {
        Commands::Auth { command } => handle_auth(session, command).await,
        Commands::Profiles { command } => handle_profiles(session, command).await,
        Commands::Posts { command } => handle_posts(session, command).await,
        Commands::Analytics { command } => handle_analytics(session, command).await,
        Commands::Completion { shell } => {
            generate_completion(shell);
            Ok(())
        }
    }
}

/// Print a failed command to stderr: API failures as a structured report in
/// the output format, everything else as a plain error chain.
fn report_error(error: &anyhow::Error, format: OutputFormat) {
    let report = if let Some(api) = error.downcast_ref::<ApiError>() {
        Some(api.report())
    } else {
        error
            .downcast_ref::<CommandFailure>()
            .map(|failure| failure.0.clone())
    };

    match report.map(|report| format_error(&report, format)) {
        Some(Ok(rendered)) => eprintln!("{}", rendered),
        _ => eprintln!("Error: {:#}", error),
    }
}

/// Initialize logging on stderr; `RUST_LOG` takes precedence over the flags.
fn init_tracing(quiet: bool, verbose: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bufferctl={}", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();
}
