// Cryptographic building blocks for the handshake and the record layer.
//
// Session keys travel once per connection under the server's RSA key, then
// every application message is sealed as one AES-256-CTR Record.

mod certificate;
mod key_exchange;
mod record_cipher;
mod session_key;

pub use certificate::leaf_public_key;
pub use key_exchange::{MIN_MODULUS_LEN, decrypt_session_key, encrypt_session_key};
pub use record_cipher::{decrypt_record, encrypt_record};
pub use session_key::SessionKey;

pub const SESSION_KEY_LEN: usize = 32;
pub const RECORD_IV_LEN: usize = 16;

/// Largest session key blob accepted at handshake step 4, which is also the
/// largest admissible RSA modulus.
pub const MAX_KEY_BLOB_LEN: usize = 1024;
