//! Certificate inventory for `/certs`.
//!
//! PEM files are read on every call so the listing reflects what is on disk.
//! Only the fields shown to operators are taken from the certificate: the
//! serial number and `notAfter`.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::config::schema::CertificateConfig;

#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} contains no certificate")]
    Empty(PathBuf),

    #[error("malformed certificate: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateDetails {
    pub path: String,
    pub serial_number: String,
    pub days_until_expiration: u64,
}

/// One configured chain and its optional CA.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateSet {
    pub cert_chain: Vec<CertificateDetails>,
    pub ca_cert: Vec<CertificateDetails>,
}

pub trait CertificateProvider: Send + Sync {
    fn certificates(&self) -> Vec<CertificateSet>;
}

/// Reads the PEM files named in the configuration.
pub struct FileCertificates {
    configs: Vec<CertificateConfig>,
}

impl FileCertificates {
    pub fn new(configs: Vec<CertificateConfig>) -> Self {
        Self { configs }
    }
}

impl CertificateProvider for FileCertificates {
    fn certificates(&self) -> Vec<CertificateSet> {
        let now = Utc::now();
        self.configs
            .iter()
            .map(|config| CertificateSet {
                cert_chain: details_or_log(Path::new(&config.cert_chain), now),
                ca_cert: config
                    .ca_cert
                    .as_deref()
                    .map(|p| details_or_log(Path::new(p), now))
                    .unwrap_or_default(),
            })
            .collect()
    }
}

fn details_or_log(path: &Path, now: DateTime<Utc>) -> Vec<CertificateDetails> {
    match read_details(path, now) {
        Ok(details) => vec![details],
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Skipping unreadable certificate");
            Vec::new()
        }
    }
}

/// Details of the first certificate in a PEM file.
pub fn read_details(
    path: &Path,
    now: DateTime<Utc>,
) -> Result<CertificateDetails, CertificateError> {
    let file = File::open(path).map_err(|source| CertificateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let der = rustls_pemfile::certs(&mut reader)
        .next()
        .ok_or_else(|| CertificateError::Empty(path.to_path_buf()))?
        .map_err(|source| CertificateError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let (serial_number, not_after) = decode(der.as_ref())?;
    Ok(CertificateDetails {
        path: path.display().to_string(),
        serial_number,
        days_until_expiration: days_until(not_after, now),
    })
}

/// Serial number (lowercase hex) and `notAfter` of a DER certificate.
fn decode(der: &[u8]) -> Result<(String, DateTime<Utc>), CertificateError> {
    let (_, certificate) = X509Certificate::from_der(der)
        .map_err(|e| CertificateError::Malformed(e.to_string()))?;

    let timestamp = certificate.validity().not_after.timestamp();
    let not_after = DateTime::<Utc>::from_timestamp(timestamp, 0)
        .ok_or_else(|| CertificateError::Malformed(format!("notAfter out of range: {}", timestamp)))?;

    Ok((hex_serial(certificate.raw_serial()), not_after))
}

fn hex_serial(bytes: &[u8]) -> String {
    let trimmed = match bytes {
        [0, rest @ ..] if !rest.is_empty() => rest,
        _ => bytes,
    };
    trimmed.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Whole days left, zero once expired.
fn days_until(not_after: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((not_after - now).num_days()).unwrap_or(0)
}
