use base64ct::{Base64UrlUnpadded, Encoding};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

use super::SessionError;

const NONCE_LEN: usize = 12;
const KEY_LABEL: &[u8] = b"atrium-session:v1|";

/// Derive the 32-byte cookie key from the configured secret.
pub(super) fn derive_key(secret: &str) -> [u8; 32] {
    let digest = Sha256::new()
        .chain_update(KEY_LABEL)
        .chain_update(secret.as_bytes())
        .finalize();
    let mut key = [0u8; 32];
    key.copy_from_slice(&digest);
    key
}

/// Encrypts `plaintext` bound to the cookie name (AAD).
/// Returns base64url(`nonce (12 bytes) || ciphertext`).
#[allow(deprecated)]
pub(super) fn seal(key: &[u8; 32], cookie_name: &str, plaintext: &[u8]) -> Result<String, SessionError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let payload = Payload {
        msg: plaintext,
        aad: cookie_name.as_bytes(),
    };
    let ciphertext = cipher
        .encrypt(nonce, payload)
        .map_err(|_| SessionError::Seal)?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);

    Ok(Base64UrlUnpadded::encode_string(&sealed))
}

/// Reverses [`seal`]. Any decoding or authentication failure yields `None`.
#[allow(deprecated)]
pub(super) fn unseal(key: &[u8; 32], cookie_name: &str, sealed: &str) -> Option<Vec<u8>> {
    let data = Base64UrlUnpadded::decode_vec(sealed).ok()?;
    if data.len() < NONCE_LEN {
        return None;
    }

    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let payload = Payload {
        msg: ciphertext,
        aad: cookie_name.as_bytes(),
    };

    cipher.decrypt(Nonce::from_slice(nonce_bytes), payload).ok()
}
