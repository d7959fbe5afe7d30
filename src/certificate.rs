//! Structured view of a leaf certificate.
//!
//! OpenSSL gives us names, serial, version and validity; extensions are
//! enumerated from the DER encoding with `x509-parser`, since the OpenSSL
//! bindings have no generic extension iterator.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::x509::{X509NameRef, X509Ref};
use serde::{Serialize, Serializer};
use x509_parser::objects::{oid2sn, oid_registry};

use crate::error::CheckError;

const SECONDS_PER_DAY: i64 = 86_400;

/// Fields of a certificate printed by the debug dump.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateDetails {
    /// Subject attributes keyed by short name (CN, O, C, ...)
    pub subject: BTreeMap<String, String>,
    /// Issuer attributes keyed by short name
    pub issuer: BTreeMap<String, String>,
    /// Serial number in decimal
    pub serial_number: String,
    /// Raw X.509 version field (2 means v3)
    pub version: i32,
    /// Serialized as GeneralizedTime, `YYYYMMDDHHMMSSZ`
    #[serde(serialize_with = "serialize_generalized_time")]
    pub not_before: DateTime<Utc>,
    #[serde(serialize_with = "serialize_generalized_time")]
    pub not_after: DateTime<Utc>,
    /// Extensions keyed by short name, or by dotted OID when unnamed
    pub extensions: BTreeMap<String, ExtensionField>,
}

/// One raw X.509 extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtensionField {
    pub oid: String,
    pub critical: bool,
    /// Hex encoding of the extension value
    pub value: String,
}

impl CertificateDetails {
    /// Builds the structured view from a parsed certificate.
    pub fn from_x509(cert: &X509Ref) -> Result<CertificateDetails, CheckError> {
        let der = cert.to_der()?;
        Ok(CertificateDetails {
            subject: name_fields(cert.subject_name()),
            issuer: name_fields(cert.issuer_name()),
            serial_number: cert.serial_number().to_bn()?.to_dec_str()?.to_string(),
            version: cert.version(),
            not_before: asn1_to_utc(cert.not_before())?,
            not_after: asn1_to_utc(cert.not_after())?,
            extensions: extension_fields(&der)?,
        })
    }
}

fn name_fields(name: &X509NameRef) -> BTreeMap<String, String> {
    name.entries()
        .map(|entry| {
            let object = entry.object();
            let key = object
                .nid()
                .short_name()
                .map(str::to_string)
                .unwrap_or_else(|_| object.to_string());
            let value = entry
                .data()
                .as_utf8()
                .map(|s| s.to_string())
                .unwrap_or_else(|_| hex::encode(entry.data().as_slice()));
            (key, value)
        })
        .collect()
}

/// Lists the extensions of a DER encoded certificate.
pub fn extension_fields(der: &[u8]) -> Result<BTreeMap<String, ExtensionField>, CheckError> {
    let (_, cert) =
        x509_parser::parse_x509_certificate(der).map_err(|e| CheckError::CertificateError {
            reason: format!("malformed certificate: {}", e),
        })?;

    let registry = oid_registry();
    let mut fields = BTreeMap::new();
    for ext in cert.extensions() {
        let oid = ext.oid.to_id_string();
        let name = oid2sn(&ext.oid, registry)
            .map(str::to_string)
            .unwrap_or_else(|_| oid.clone());
        fields.insert(
            name,
            ExtensionField {
                oid,
                critical: ext.critical,
                value: hex::encode(ext.value),
            },
        );
    }
    Ok(fields)
}

/// Converts an ASN.1 time to a UTC timestamp.
pub fn asn1_to_utc(time: &Asn1TimeRef) -> Result<DateTime<Utc>, CheckError> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let secs = i64::from(diff.days) * SECONDS_PER_DAY + i64::from(diff.secs);
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| CheckError::CertificateError {
            reason: format!("validity timestamp out of range: {}", time),
        })
}

/// Renders a timestamp in GeneralizedTime form, `YYYYMMDDHHMMSSZ`.
pub fn generalized_time(time: &DateTime<Utc>) -> String {
    time.format("%Y%m%d%H%M%SZ").to_string()
}

/// Renders a duration as `[-]D day[s], H:MM:SS`, truncated to whole seconds.
///
/// Negative durations keep a negative day count and a positive clock part,
/// so one hour ago reads `-1 day, 23:00:00`.
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.num_seconds();
    let days = total.div_euclid(SECONDS_PER_DAY);
    let rest = total.rem_euclid(SECONDS_PER_DAY);
    let clock = format!("{}:{:02}:{:02}", rest / 3600, (rest % 3600) / 60, rest % 60);
    match days {
        0 => clock,
        1 | -1 => format!("{} day, {}", days, clock),
        _ => format!("{} days, {}", days, clock),
    }
}

fn serialize_generalized_time<S: Serializer>(
    time: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&generalized_time(time))
}
