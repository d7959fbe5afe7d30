//! Terminal rendering of check results.

use std::io::{self, Write};

use strum_macros::EnumIter;

use crate::{CertificateCheckResult, CheckStatus, Verdict};

/// Escape sequence that restores the default terminal color.
pub const RESET: &str = "\x1b[0m";

/// Colors used for status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Color {
    Green,
    Yellow,
    Red,
}

impl Color {
    /// ANSI escape sequence selecting this color.
    pub fn ansi_code(self) -> &'static str {
        match self {
            Color::Green => "\x1b[92m",
            Color::Yellow => "\x1b[93m",
            Color::Red => "\x1b[91m",
        }
    }
}

impl CheckStatus {
    pub fn color(self) -> Color {
        match self {
            CheckStatus::Ok => Color::Green,
            CheckStatus::Expiring | CheckStatus::Invalid => Color::Yellow,
            CheckStatus::Error => Color::Red,
        }
    }
}

/// Human readable status text, e.g. `EXPIRING IN 2 days, 0:00:00`.
pub fn status_text(verdict: &Verdict) -> String {
    match verdict {
        Verdict::Ok { .. } => "OK".to_string(),
        Verdict::Expiring { .. } => format!("EXPIRING IN {}", verdict.detail().unwrap_or_default()),
        Verdict::Invalid { reason } => format!("NOT OK {}", reason),
        Verdict::Error { message } => format!("ERROR {}", message),
    }
}

/// One colored line: `<color> <host> <status-text> <reset>`.
pub fn status_line(result: &CertificateCheckResult) -> String {
    format!(
        "{} {} {} {}",
        result.status().color().ansi_code(),
        result.host,
        status_text(&result.verdict),
        RESET
    )
}

/// Writes the debug dump (when present) followed by the status line.
pub fn write_report<W: Write>(out: &mut W, result: &CertificateCheckResult) -> io::Result<()> {
    if let Some(details) = &result.details {
        let dump = serde_json::to_string_pretty(details)?;
        writeln!(out, "{}", dump)?;
    }
    writeln!(out, "{}", status_line(result))
}
