//! PEM handling - reading certificates and the private key, either from files
//! or from inline config values.

use std::path::PathBuf;

use log::debug;
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;

use crate::error::StartupError;

pub(super) fn is_inline_pem(s: &str) -> bool {
    s.trim_start().starts_with("-----BEGIN")
}

/// Returns the PEM bytes for a config value, reading the file when the value
/// is a path.
pub(super) async fn read_pem_source(source: &str) -> Result<Vec<u8>, StartupError> {
    if is_inline_pem(source) {
        return Ok(source.as_bytes().to_vec());
    }

    debug!("Reading PEM file: {source}");
    tokio::fs::read(source)
        .await
        .map_err(|e| StartupError::Read {
            path: PathBuf::from(source),
            source: e,
        })
}

/// Parses an RSA private key in PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8
/// (`PRIVATE KEY`) PEM form.
pub(super) fn parse_private_key(pem: &[u8]) -> Result<RsaPrivateKey, StartupError> {
    let pem = std::str::from_utf8(pem)
        .map_err(|e| StartupError::InvalidPrivateKey(format!("not UTF-8: {e}")))?;

    match RsaPrivateKey::from_pkcs1_pem(pem) {
        Ok(key) => Ok(key),
        Err(pkcs1_error) => RsaPrivateKey::from_pkcs8_pem(pem).map_err(|pkcs8_error| {
            StartupError::InvalidPrivateKey(format!(
                "not PKCS#1 ({pkcs1_error}) or PKCS#8 ({pkcs8_error})"
            ))
        }),
    }
}
