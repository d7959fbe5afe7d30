//! A throwaway CA and a local TLS server for exercising real handshakes.

#![allow(dead_code)]

use std::net::{IpAddr, TcpListener};
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use certwatch::{CheckOptions, Checker};
use chrono::Utc;
use openssl::asn1::{Asn1Integer, Asn1Time};
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::ssl::{SslAcceptor, SslConnector, SslMethod};
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
    SubjectKeyIdentifier,
};
use openssl::x509::{X509Name, X509NameBuilder, X509};

pub const DAY: i64 = 86_400;

static SERIAL: AtomicU32 = AtomicU32::new(1);

pub struct Authority {
    pub cert: X509,
    key: PKey<Private>,
}

pub struct Leaf {
    pub cert: X509,
    pub key: PKey<Private>,
}

impl Authority {
    pub fn new() -> Authority {
        let key = new_key();
        let subject = name("certwatch test root");

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_serial_number(&next_serial()).unwrap();
        builder.set_subject_name(&subject).unwrap();
        builder.set_issuer_name(&subject).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_not_before(&time_from_now(-DAY)).unwrap();
        builder.set_not_after(&time_from_now(365 * DAY)).unwrap();
        builder
            .append_extension(BasicConstraints::new().critical().ca().build().unwrap())
            .unwrap();
        builder
            .append_extension(
                KeyUsage::new()
                    .critical()
                    .key_cert_sign()
                    .crl_sign()
                    .build()
                    .unwrap(),
            )
            .unwrap();
        let ski = SubjectKeyIdentifier::new()
            .build(&builder.x509v3_context(None, None))
            .unwrap();
        builder.append_extension(ski).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();

        Authority {
            cert: builder.build(),
            key,
        }
    }

    /// Issues a server certificate for `names` (DNS names or IP literals),
    /// valid from `not_before` to `not_after` seconds relative to now.
    pub fn issue(&self, names: &[&str], not_before: i64, not_after: i64) -> Leaf {
        let key = new_key();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_serial_number(&next_serial()).unwrap();
        builder.set_subject_name(&name("certwatch leaf")).unwrap();
        builder.set_issuer_name(self.cert.subject_name()).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_not_before(&time_from_now(not_before)).unwrap();
        builder.set_not_after(&time_from_now(not_after)).unwrap();
        builder
            .append_extension(BasicConstraints::new().build().unwrap())
            .unwrap();
        builder
            .append_extension(KeyUsage::new().digital_signature().build().unwrap())
            .unwrap();
        builder
            .append_extension(ExtendedKeyUsage::new().server_auth().build().unwrap())
            .unwrap();

        let mut san = SubjectAlternativeName::new();
        for entry in names {
            if entry.parse::<IpAddr>().is_ok() {
                san.ip(entry);
            } else {
                san.dns(entry);
            }
        }
        let san = san
            .build(&builder.x509v3_context(Some(&*self.cert), None))
            .unwrap();
        builder.append_extension(san).unwrap();

        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .build(&builder.x509v3_context(Some(&*self.cert), None))
            .unwrap();
        builder.append_extension(aki).unwrap();
        builder.sign(&self.key, MessageDigest::sha256()).unwrap();

        Leaf {
            cert: builder.build(),
            key,
        }
    }

    /// A checker that trusts this authority besides the default roots.
    pub fn checker(&self, options: CheckOptions) -> Checker {
        let mut builder = SslConnector::builder(SslMethod::tls_client()).unwrap();
        builder.cert_store_mut().add_cert(self.cert.clone()).unwrap();
        Checker::with_connector(builder.build(), options)
    }
}

/// Serves `leaf` on an ephemeral loopback port for `connections` handshakes.
pub fn serve(leaf: Leaf, connections: usize) -> u16 {
    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls()).unwrap();
    acceptor.set_private_key(&leaf.key).unwrap();
    acceptor.set_certificate(&leaf.cert).unwrap();
    acceptor.check_private_key().unwrap();
    let acceptor = acceptor.build();

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        for stream in listener.incoming().take(connections) {
            if let Ok(stream) = stream {
                // Clients that reject the certificate abort the handshake.
                let _ = acceptor.accept(stream);
            }
        }
    });
    port
}

/// Accepts one TCP connection and never answers the TLS handshake.
pub fn serve_silence(hold: Duration) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        if let Ok((stream, _)) = listener.accept() {
            thread::sleep(hold);
            drop(stream);
        }
    });
    port
}

/// A loopback port with nothing listening on it.
pub fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub fn loopback(port: u16) -> String {
    format!("127.0.0.1:{}", port)
}

fn new_key() -> PKey<Private> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn name(common_name: &str) -> X509Name {
    let mut builder = X509NameBuilder::new().unwrap();
    builder.append_entry_by_nid(Nid::COUNTRYNAME, "CL").unwrap();
    builder
        .append_entry_by_nid(Nid::ORGANIZATIONNAME, "certwatch tests")
        .unwrap();
    builder
        .append_entry_by_nid(Nid::COMMONNAME, common_name)
        .unwrap();
    builder.build()
}

fn next_serial() -> Asn1Integer {
    let serial = SERIAL.fetch_add(1, Ordering::SeqCst);
    BigNum::from_u32(serial).unwrap().to_asn1_integer().unwrap()
}

fn time_from_now(offset_secs: i64) -> Asn1Time {
    Asn1Time::from_unix(Utc::now().timestamp() + offset_secs).unwrap()
}
