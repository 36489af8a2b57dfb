//! AES-256 in 128-bit big-endian counter mode, one Record per message.
//!
//! Wire layout: `iv (16 bytes) || ciphertext (len(plaintext) bytes)`.
//! There is no authentication tag; a flipped ciphertext bit flips the same
//! plaintext bit and goes unnoticed.

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::RngCore;

use super::{RECORD_IV_LEN, SessionKey};
use crate::error::RecordError;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

fn apply_keystream(key: &SessionKey, iv: &[u8; RECORD_IV_LEN], data: &mut [u8]) {
    let mut cipher = Aes256Ctr::new(key.as_bytes().into(), iv.into());
    cipher.apply_keystream(data);
}

/// Encrypts `plaintext` under a freshly sampled IV and returns the full
/// Record, ready for a single transport write.
pub fn encrypt_record(key: &SessionKey, plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; RECORD_IV_LEN];
    rand::rng().fill_bytes(&mut iv);
    encrypt_record_with_iv(key, &iv, plaintext)
}

pub(crate) fn encrypt_record_with_iv(
    key: &SessionKey,
    iv: &[u8; RECORD_IV_LEN],
    plaintext: &[u8],
) -> Vec<u8> {
    let mut record = Vec::with_capacity(RECORD_IV_LEN + plaintext.len());
    record.extend_from_slice(iv);
    record.extend_from_slice(plaintext);
    apply_keystream(key, iv, &mut record[RECORD_IV_LEN..]);
    record
}

/// Recovers the plaintext from one Record.
pub fn decrypt_record(key: &SessionKey, record: &[u8]) -> Result<Vec<u8>, RecordError> {
    if record.len() < RECORD_IV_LEN {
        return Err(RecordError::TooShort(record.len()));
    }

    let (iv, ciphertext) = record.split_at(RECORD_IV_LEN);
    let mut iv_bytes = [0u8; RECORD_IV_LEN];
    iv_bytes.copy_from_slice(iv);

    let mut plaintext = ciphertext.to_vec();
    apply_keystream(key, &iv_bytes, &mut plaintext);
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::crypto::SESSION_KEY_LEN;

    fn test_key() -> SessionKey {
        let mut bytes = [0u8; SESSION_KEY_LEN];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        SessionKey::from_bytes(bytes)
    }

    fn from_hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_round_trip_various_lengths() {
        let key = SessionKey::random();
        for len in [0usize, 1, 15, 16, 17, 31, 1000, 4096, 8176] {
            let plaintext: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let record = encrypt_record(&key, &plaintext);
            assert_eq!(record.len(), RECORD_IV_LEN + len);
            assert_eq!(decrypt_record(&key, &record).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_known_answer() {
        let iv: [u8; RECORD_IV_LEN] = from_hex("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff")
            .try_into()
            .unwrap();
        let record = encrypt_record_with_iv(&test_key(), &iv, b"hello");
        assert_eq!(&record[..RECORD_IV_LEN], &iv);
        assert_eq!(&record[RECORD_IV_LEN..], from_hex("fa65a1e14c").as_slice());
    }

    #[test]
    fn test_counter_carries_across_128_bits() {
        // The low 64 bits of the IV overflow into the high 64 bits on the
        // second block.
        let iv: [u8; RECORD_IV_LEN] = from_hex("0000000000000000ffffffffffffffff")
            .try_into()
            .unwrap();
        let record = encrypt_record_with_iv(&test_key(), &iv, &[0u8; 48]);
        assert_eq!(
            &record[RECORD_IV_LEN..],
            from_hex(concat!(
                "a6fbdb5cfde07d1b58fd362177bcffdf",
                "511dd5ef9a682b7da49f91c86c4f7ac3",
                "40c53cef92ef2d643f638b8222db1e85"
            ))
            .as_slice()
        );
    }

    #[test]
    fn test_decrypt_is_encrypt() {
        let key = test_key();
        let iv = [9u8; RECORD_IV_LEN];
        let record = encrypt_record_with_iv(&key, &iv, b"symmetric");
        let again = encrypt_record_with_iv(&key, &iv, &record[RECORD_IV_LEN..]);
        assert_eq!(&again[RECORD_IV_LEN..], b"symmetric");
    }

    #[test]
    fn test_iv_freshness() {
        let key = SessionKey::random();
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let record = encrypt_record(&key, b"x");
            assert!(seen.insert(record[..RECORD_IV_LEN].to_vec()));
        }
    }

    #[test]
    fn test_record_too_short() {
        let key = SessionKey::random();
        for len in 0..RECORD_IV_LEN {
            let buf = vec![0u8; len];
            match decrypt_record(&key, &buf) {
                Err(RecordError::TooShort(n)) => assert_eq!(n, len),
                other => panic!("expected TooShort for {len} bytes, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_iv_only_record_is_empty_message() {
        let key = SessionKey::random();
        assert!(decrypt_record(&key, &[0u8; RECORD_IV_LEN]).unwrap().is_empty());
    }

    #[test]
    fn test_wrong_key_garbles() {
        let record = encrypt_record(&test_key(), b"attack at dawn");
        let garbled = decrypt_record(&SessionKey::random(), &record).unwrap();
        assert_eq!(garbled.len(), 14);
        assert_ne!(garbled, b"attack at dawn");
    }
}
