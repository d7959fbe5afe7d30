use clap::Parser;
use std::io::{self, Write};
use std::process::exit;
use tracing::error;
use tracing_subscriber::EnvFilter;

use certwatch::{
    output, resolve_hosts, CertificateCheckResult, CheckOptions, Checker, DEFAULT_HOSTS,
};

/// Checks that TLS certificates are valid and not about to expire.
///
/// Prints one colored line per host. Set RUST_LOG=debug for connection
/// details.
#[derive(Parser, Debug)]
#[command(name = "certwatch", version, author)]
struct Cli {
    /// Hosts to check, optionally with a port (example.com:8443).
    /// Defaults to github.com when none are given
    hosts: Vec<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let hosts = resolve_hosts(cli.hosts, DEFAULT_HOSTS);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match Checker::new(CheckOptions::default()) {
        Ok(checker) => {
            for host in &hosts {
                report(&mut out, &checker.check(host));
            }
        }
        Err(err) => {
            error!(error = %err, "failed to set up TLS client");
            for host in &hosts {
                report(&mut out, &CertificateCheckResult::from_error(host, &err));
            }
        }
    }
    if let Err(err) = out.flush() {
        error!(error = %err, "failed to flush output");
    }

    exit(0);
}

fn report<W: Write>(out: &mut W, result: &CertificateCheckResult) {
    if let Err(err) = output::write_report(out, result) {
        error!(host = %result.host, error = %err, "failed to write result");
    }
}
