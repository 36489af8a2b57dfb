use rsa::RsaPrivateKey;
use rsa::traits::PublicKeyParts;

use crate::crypto::{MAX_KEY_BLOB_LEN, MIN_MODULUS_LEN, leaf_public_key};
use crate::error::StartupError;

/// Certificates presented during the handshake plus the private key matching
/// the leaf certificate. Built once at startup and shared read-only.
pub struct CertificateBundle {
    root_certificate: Vec<u8>,
    leaf_certificate: Vec<u8>,
    private_key: RsaPrivateKey,
}

impl CertificateBundle {
    pub fn new(
        root_certificate: Vec<u8>,
        leaf_certificate: Vec<u8>,
        private_key: RsaPrivateKey,
    ) -> Result<Self, StartupError> {
        let modulus_len = private_key.size();
        if !(MIN_MODULUS_LEN..=MAX_KEY_BLOB_LEN).contains(&modulus_len) {
            return Err(StartupError::UnsupportedKeySize(modulus_len));
        }

        let leaf_key = leaf_public_key(&leaf_certificate)
            .map_err(|e| StartupError::InvalidCertificate(e.to_string()))?;
        if leaf_key != private_key.to_public_key() {
            return Err(StartupError::CertificateKeyMismatch);
        }

        if root_certificate.is_empty() {
            return Err(StartupError::InvalidCertificate(
                "root certificate is empty".to_string(),
            ));
        }

        Ok(Self {
            root_certificate,
            leaf_certificate,
            private_key,
        })
    }

    pub fn root_certificate(&self) -> &[u8] {
        &self.root_certificate
    }

    pub fn leaf_certificate(&self) -> &[u8] {
        &self.leaf_certificate
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }
}

impl std::fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("root_certificate_len", &self.root_certificate.len())
            .field("leaf_certificate_len", &self.leaf_certificate.len())
            .field("modulus_bits", &(self.private_key.size() * 8))
            .finish()
    }
}
