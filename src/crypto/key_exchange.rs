//! RSA PKCS#1 v1.5 transport of the 32-byte session key.
//!
//! Server-side decryption never reports failure. The output key starts out
//! random and is overwritten with the decrypted payload only when the
//! ciphertext has the modulus length, is below the modulus, unpads cleanly and
//! carries exactly 32 bytes. The checks fold into one `subtle::Choice` and the
//! private key operation always runs, so a malformed blob costs the same work
//! and produces the same shape of output as a valid one.

use rsa::hazmat::rsa_decrypt_and_check;
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeGreater};
use zeroize::{Zeroize, Zeroizing};

use super::{SESSION_KEY_LEN, SessionKey};

// 0x00 || 0x02 || at least 8 non-zero padding bytes || 0x00 || payload
const PKCS1_OVERHEAD: usize = 11;

/// Smallest modulus, in bytes, able to carry a session key.
pub const MIN_MODULUS_LEN: usize = SESSION_KEY_LEN + PKCS1_OVERHEAD;

/// Decrypts a session key blob.
///
/// Always returns a key. A blob that does not decrypt to exactly 32 bytes of
/// payload yields an unpredictable key instead of an error.
pub fn decrypt_session_key(ciphertext: &[u8], private_key: &RsaPrivateKey) -> SessionKey {
    let mut key = SessionKey::random();

    let k = private_key.size();
    let modulus = private_key.n();

    let mut input = vec![0u8; k];
    let copy_len = ciphertext.len().min(k);
    input[k - copy_len..].copy_from_slice(&ciphertext[ciphertext.len() - copy_len..]);

    let length_ok = Choice::from((ciphertext.len() == k) as u8);

    let mut c = BigUint::from_bytes_be(&input);
    let in_range = Choice::from((&c < modulus) as u8);
    c = &c % modulus;

    let (em, decrypted) = match rsa_decrypt_and_check(private_key, Some(&mut OsRng), &c) {
        Ok(mut m) => {
            let bytes = Zeroizing::new(m.to_bytes_be());
            m.zeroize();
            (left_pad(&bytes, k), Choice::from(1u8))
        }
        Err(_) => (Zeroizing::new(vec![0u8; k]), Choice::from(0u8)),
    };

    let (valid, payload_start) = unpad_session_key(&em);
    let accept = length_ok & in_range & decrypted & valid;

    let payload = &em[payload_start..payload_start + SESSION_KEY_LEN];
    for (dst, src) in key.as_mut_bytes().iter_mut().zip(payload) {
        dst.conditional_assign(src, accept);
    }

    key
}

/// Checks PKCS#1 v1.5 type 2 padding carrying exactly one session key,
/// without branching on the decrypted bytes. Returns the validity and the
/// offset the payload would start at (always in bounds).
fn unpad_session_key(em: &[u8]) -> (Choice, usize) {
    let k = em.len() as u32;

    let first_byte_is_zero = em[0].ct_eq(&0u8);
    let second_byte_is_two = em[1].ct_eq(&2u8);

    let mut looking_for_separator = Choice::from(1u8);
    let mut separator = 0u32;
    for (i, byte) in em.iter().enumerate().skip(2) {
        let is_zero = byte.ct_eq(&0u8);
        separator =
            u32::conditional_select(&separator, &(i as u32), looking_for_separator & is_zero);
        looking_for_separator &= !is_zero;
    }

    // At least 8 bytes of padding between the type byte and the separator.
    let padding_ok = separator.ct_gt(&9u32);
    let payload_len_ok = (k - separator - 1).ct_eq(&(SESSION_KEY_LEN as u32));

    let valid = first_byte_is_zero
        & second_byte_is_two
        & !looking_for_separator
        & padding_ok
        & payload_len_ok;

    (valid, em.len() - SESSION_KEY_LEN)
}

// The padded copy holds the decrypted payload and is wiped on drop.
fn left_pad(bytes: &[u8], len: usize) -> Zeroizing<Vec<u8>> {
    let mut out = Zeroizing::new(vec![0u8; len]);
    let start = len.saturating_sub(bytes.len());
    let take = bytes.len().min(len);
    out[start..].copy_from_slice(&bytes[bytes.len() - take..]);
    out
}

/// Client side: encrypts the session key to the server's public key.
pub fn encrypt_session_key(
    key: &SessionKey,
    public_key: &RsaPublicKey,
) -> Result<Vec<u8>, rsa::Error> {
    public_key.encrypt(&mut OsRng, Pkcs1v15Encrypt, key.as_bytes())
}
