//! CLI entry point for the fl-cookies tool.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use fl_cookies::{CookieJar, CookieStore, DomainRule, MemoryCookieJar};
use tracing::{debug, info};

mod app_config;
mod cli;

use app_config::{FileConfig, VerbositySetting};
use cli::{Cli, Command};

/// Document URL used when neither `--url` nor the config file names one.
const DEFAULT_DOCUMENT_URL: &str = "https://www.freelancer.com/";

fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    let loaded_config = app_config::load_default_file_config()?;
    let config = loaded_config.config.unwrap_or_default();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config
                .verbosity
                .unwrap_or(VerbositySetting::Default)
                .filter_level(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so `get` and `dump` output stays scriptable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?cli, config_path = ?loaded_config.path, "CLI arguments parsed");

    run(cli, &config)
}

fn run(cli: Cli, config: &FileConfig) -> Result<ExitCode> {
    let domain_rule = match &config.domain_pattern {
        Some(pattern) => DomainRule::new(pattern)?,
        None => DomainRule::default(),
    };

    let url = cli
        .url
        .as_deref()
        .or(config.document_url.as_deref())
        .unwrap_or(DEFAULT_DOCUMENT_URL);
    let jar_path = cli
        .jar
        .clone()
        .or_else(|| config.jar_path.clone())
        .or_else(app_config::resolve_default_jar_path)
        .context("Unable to determine jar path (pass --jar, or set XDG_CONFIG_HOME or HOME)")?;

    let mut jar = MemoryCookieJar::for_url(url)?;
    jar.load(&jar_path)
        .with_context(|| format!("Failed to load jar file '{}'", jar_path.display()))?;
    let host = jar.host().to_string();
    let mut store = CookieStore::with_domain_rule(jar, domain_rule);

    match cli.command {
        Command::Get { key } => {
            return Ok(match store.get(&key) {
                Some(value) => {
                    println!("{value}");
                    ExitCode::SUCCESS
                }
                None => {
                    info!(key = %key, "cookie not set");
                    ExitCode::FAILURE
                }
            });
        }
        Command::Put(put) => {
            let options = put.write_options(
                config.secure.unwrap_or(false),
                config.same_site,
                || store.get_domain(&host),
            );
            store.put(&put.key, &put.value, &options);
            info!(key = %put.key, "cookie written");
        }
        Command::Remove { key, scope } => {
            let options = scope.write_options(|| store.get_domain(&host));
            store.remove(&key, &options);
            info!(key = %key, "cookie removed");
        }
        Command::Dump => {
            println!("{}", store.jar().read());
            return Ok(ExitCode::SUCCESS);
        }
        Command::Domain { host } => {
            println!("{}", store.get_domain(&host));
            return Ok(ExitCode::SUCCESS);
        }
    }

    store
        .jar()
        .save(&jar_path)
        .with_context(|| format!("Failed to save jar file '{}'", jar_path.display()))?;
    debug!(path = %jar_path.display(), "jar saved");
    Ok(ExitCode::SUCCESS)
}
