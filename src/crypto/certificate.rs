// Public key extraction from the leaf certificate. The certificate is only
// parsed, never verified: trust decisions are out of scope.

use std::io;

use rsa::RsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use x509_parser::certificate::X509Certificate;
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::FromDer;

/// Reads the RSA public key out of a PEM (or raw DER) X.509 certificate.
pub fn leaf_public_key(certificate: &[u8]) -> io::Result<RsaPublicKey> {
    let der = if certificate.trim_ascii_start().starts_with(b"-----BEGIN") {
        let (_, pem) = parse_x509_pem(certificate).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("invalid certificate PEM: {e}"),
            )
        })?;
        pem.contents
    } else {
        certificate.to_vec()
    };

    let (_, cert) = X509Certificate::from_der(&der).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("invalid X.509 certificate: {e}"),
        )
    })?;

    RsaPublicKey::from_public_key_der(cert.public_key().raw).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("certificate does not carry an RSA public key: {e}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use rsa::RsaPrivateKey;
    use rsa::pkcs1::DecodeRsaPrivateKey;

    use super::*;

    const LEAF_PEM: &str = include_str!("../../testdata/leaf.pem");
    const LEAF_KEY: &str = include_str!("../../testdata/leaf.key");
    const ROOT_PEM: &str = include_str!("../../testdata/root.pem");

    #[test]
    fn test_leaf_public_key_matches_private_key() {
        let public_key = leaf_public_key(LEAF_PEM.as_bytes()).unwrap();
        let private_key = RsaPrivateKey::from_pkcs1_pem(LEAF_KEY).unwrap();
        assert_eq!(public_key, private_key.to_public_key());
    }

    #[test]
    fn test_root_and_leaf_keys_differ() {
        let root = leaf_public_key(ROOT_PEM.as_bytes()).unwrap();
        let leaf = leaf_public_key(LEAF_PEM.as_bytes()).unwrap();
        assert_ne!(root, leaf);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(leaf_public_key(b"-----BEGIN CERTIFICATE-----\nnope\n").is_err());
        assert!(leaf_public_key(b"\x30\x03\x02\x01").is_err());
        assert!(leaf_public_key(b"").is_err());
    }
}
