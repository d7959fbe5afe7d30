//! Checks that the TLS certificates served by a list of hosts are valid and
//! not about to expire.
//!
//! Each host gets a single TLS handshake with certificate verification turned
//! on. The leaf certificate's `notAfter` is compared against a warning window
//! and the outcome is reported as a [`Verdict`].
//!
//! ```no_run
//! use certwatch::{check_host, CheckOptions, CheckStatus};
//!
//! let result = check_host("github.com", &CheckOptions::default());
//! if result.status() != CheckStatus::Ok {
//!     println!("{}: {}", result.host, result.detail().unwrap_or_default());
//! }
//! ```

pub mod certificate;
pub mod error;
pub mod output;
pub mod target;

use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use chrono::{DateTime, Utc};
use openssl::ssl::{HandshakeError, SslConnector, SslMethod};
use openssl::x509::{X509VerifyResult, X509};
use serde::Serialize;
use strum_macros::{Display, EnumString};
use tracing::{debug, error};

pub use certificate::{CertificateDetails, ExtensionField};
pub use error::CheckError;
pub use target::Target;

/// Hosts checked when none are given on the command line.
pub const DEFAULT_HOSTS: &[&str] = &["github.com"];

pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_WARNING_WINDOW_DAYS: i64 = 7;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Knobs for a certificate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOptions {
    /// Port used when the host argument carries none
    pub port: u16,
    /// Certificates expiring within this many days are reported as expiring
    pub warning_window_days: i64,
    /// Bound on the TCP connect and on each read/write of the handshake
    pub timeout: Duration,
    /// Attach the structured certificate dump to the result
    pub debug: bool,
}

impl Default for CheckOptions {
    fn default() -> Self {
        CheckOptions {
            port: DEFAULT_PORT,
            warning_window_days: DEFAULT_WARNING_WINDOW_DAYS,
            timeout: DEFAULT_TIMEOUT,
            debug: false,
        }
    }
}

/// Coarse classification of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckStatus {
    Ok,
    Expiring,
    Invalid,
    Error,
}

/// Outcome of checking one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    /// Verified and outside the warning window
    Ok { expires_at: DateTime<Utc> },
    /// Verified but expiring within the warning window
    Expiring {
        expires_at: DateTime<Utc>,
        remaining_secs: i64,
    },
    /// Rejected by the certificate verifier
    Invalid { reason: String },
    /// Anything else: resolution, connection, timeout, malformed certificate
    Error { message: String },
}

impl Verdict {
    pub fn status(&self) -> CheckStatus {
        match self {
            Verdict::Ok { .. } => CheckStatus::Ok,
            Verdict::Expiring { .. } => CheckStatus::Expiring,
            Verdict::Invalid { .. } => CheckStatus::Invalid,
            Verdict::Error { .. } => CheckStatus::Error,
        }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Verdict::Ok { expires_at } | Verdict::Expiring { expires_at, .. } => {
                Some(*expires_at)
            }
            _ => None,
        }
    }

    /// Remaining time for expiring certificates, the reason or error message
    /// otherwise.
    pub fn detail(&self) -> Option<String> {
        match self {
            Verdict::Ok { .. } => None,
            Verdict::Expiring { remaining_secs, .. } => Some(certificate::format_remaining(
                chrono::Duration::seconds(*remaining_secs),
            )),
            Verdict::Invalid { reason } => Some(reason.clone()),
            Verdict::Error { message } => Some(message.clone()),
        }
    }
}

/// Result of checking one host.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateCheckResult {
    pub host: String,
    #[serde(flatten)]
    pub verdict: Verdict,
    /// Structured certificate dump, only collected in debug mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<CertificateDetails>,
}

impl CertificateCheckResult {
    /// ERROR result for a host that could not be checked at all.
    pub fn from_error(host: &str, err: &CheckError) -> CertificateCheckResult {
        CertificateCheckResult {
            host: host.trim().to_string(),
            verdict: Verdict::Error {
                message: err.to_string(),
            },
            details: None,
        }
    }

    pub fn status(&self) -> CheckStatus {
        self.verdict.status()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.verdict.expires_at()
    }

    pub fn detail(&self) -> Option<String> {
        self.verdict.detail()
    }
}

/// Classifies a verified certificate by the time left before `expires_at`.
///
/// A window too large to represent covers every certificate.
pub fn classify(
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    warning_window_days: i64,
) -> Verdict {
    let remaining = expires_at - now;
    let inside_window = match chrono::Duration::try_days(warning_window_days) {
        Some(window) => remaining < window,
        None => warning_window_days > 0,
    };
    if inside_window {
        Verdict::Expiring {
            expires_at,
            remaining_secs: remaining.num_seconds(),
        }
    } else {
        Verdict::Ok { expires_at }
    }
}

/// Picks the hosts to check: the caller's when any were given, the defaults
/// otherwise.
pub fn resolve_hosts(args: Vec<String>, defaults: &[&str]) -> Vec<String> {
    if args.is_empty() {
        defaults.iter().map(|host| host.to_string()).collect()
    } else {
        args
    }
}

/// Checks one host with a fresh [`Checker`].
pub fn check_host(host: &str, options: &CheckOptions) -> CertificateCheckResult {
    match Checker::new(options.clone()) {
        Ok(checker) => checker.check(host),
        Err(err) => {
            error!(host, error = %err, "failed to set up TLS client");
            CertificateCheckResult::from_error(host, &err)
        }
    }
}

/// Reusable certificate checker.
pub struct Checker {
    connector: SslConnector,
    options: CheckOptions,
}

impl Checker {
    /// Creates a checker verifying against the platform's default trust store.
    pub fn new(options: CheckOptions) -> Result<Checker, CheckError> {
        let connector = SslConnector::builder(SslMethod::tls_client())?.build();
        Ok(Checker::with_connector(connector, options))
    }

    /// Creates a checker around a caller supplied connector, e.g. one trusting
    /// extra roots.
    pub fn with_connector(connector: SslConnector, options: CheckOptions) -> Checker {
        Checker { connector, options }
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    /// Checks one host. Never fails: every error is folded into the verdict.
    pub fn check(&self, host: &str) -> CertificateCheckResult {
        let host = host.trim();
        let (verdict, details) = match self.inspect(host) {
            Ok((expires_at, details)) => (
                classify(expires_at, Utc::now(), self.options.warning_window_days),
                details,
            ),
            Err(CheckError::Verification { reason }) => {
                debug!(host, reason = %reason, "certificate verification failed");
                (Verdict::Invalid { reason }, None)
            }
            Err(err) => {
                error!(host, error = %err, "Error occurred");
                (
                    Verdict::Error {
                        message: err.to_string(),
                    },
                    None,
                )
            }
        };

        CertificateCheckResult {
            host: host.to_string(),
            verdict,
            details,
        }
    }

    fn inspect(
        &self,
        host: &str,
    ) -> Result<(DateTime<Utc>, Option<CertificateDetails>), CheckError> {
        let target = Target::parse(host, self.options.port)?;
        let cert = self.fetch_certificate(&target)?;

        let details = if self.options.debug {
            Some(CertificateDetails::from_x509(&cert)?)
        } else {
            None
        };
        let expires_at = certificate::asn1_to_utc(cert.not_after())?;
        Ok((expires_at, details))
    }

    /// Connects, completes a verified handshake and returns the leaf
    /// certificate. The connection is closed before returning.
    pub fn fetch_certificate(&self, target: &Target) -> Result<X509, CheckError> {
        let stream = connect(target, self.options.timeout)?;
        stream.set_read_timeout(Some(self.options.timeout))?;
        stream.set_write_timeout(Some(self.options.timeout))?;

        let config = self.connector.configure()?;
        let tls = config
            .connect(&target.host, stream)
            .map_err(|e| handshake_error(e, target))?;
        debug!(
            peer = %target,
            version = tls.ssl().version_str(),
            "handshake complete"
        );

        tls.ssl()
            .peer_certificate()
            .ok_or_else(|| CheckError::CertificateError {
                reason: "server presented no certificate".to_string(),
            })
    }
}

/// Opens a TCP connection, trying each resolved address in turn.
fn connect(target: &Target, timeout: Duration) -> Result<TcpStream, CheckError> {
    let addresses: Vec<SocketAddr> = (target.host.as_str(), target.port)
        .to_socket_addrs()
        .map_err(|source| CheckError::DnsResolution {
            hostname: target.host.clone(),
            source,
        })?
        .collect();

    let mut last_error = io::Error::new(io::ErrorKind::NotFound, "no addresses found");
    if addresses.is_empty() {
        return Err(CheckError::DnsResolution {
            hostname: target.host.clone(),
            source: last_error,
        });
    }

    for address in addresses {
        debug!(peer = %target, %address, "connecting");
        match TcpStream::connect_timeout(&address, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_error = e,
        }
    }

    match last_error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Err(CheckError::Timeout {
            operation: format!("connecting to {} after {:?}", target, timeout),
        }),
        _ => Err(CheckError::ConnectionFailed {
            address: target.to_string(),
            source: last_error,
        }),
    }
}

fn handshake_error(err: HandshakeError<TcpStream>, target: &Target) -> CheckError {
    match err {
        HandshakeError::SetupFailure(stack) => stack.into(),
        HandshakeError::Failure(mid) => {
            let verify = mid.ssl().verify_result();
            if verify != X509VerifyResult::OK {
                return CheckError::Verification {
                    reason: verify.error_string().to_string(),
                };
            }
            match mid.error().io_error() {
                Some(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    CheckError::Timeout {
                        operation: format!("TLS handshake with {}", target),
                    }
                }
                _ => CheckError::HandshakeFailed {
                    details: mid.error().to_string(),
                },
            }
        }
        HandshakeError::WouldBlock(_) => CheckError::Timeout {
            operation: format!("TLS handshake with {}", target),
        },
    }
}
