//! Raw (unauthenticated) XChaCha20 stream cipher, applied to every volume regardless of mode.
//!
//! This is deliberately not the AEAD construction: authentication is the MAC module's job, run
//! over the ciphertext independently, so the stream cipher here only needs `apply_keystream`.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::XChaCha20;

use crate::config::{CHACHA_NONCE_LEN, MASTER_KEY_LEN};

pub struct ChaChaStream {
    inner: XChaCha20,
}

impl ChaChaStream {
    pub fn new(key: &[u8; MASTER_KEY_LEN], nonce: &[u8; CHACHA_NONCE_LEN]) -> Self {
        Self { inner: XChaCha20::new(key.into(), nonce.into()) }
    }

    pub fn apply(&mut self, buf: &mut [u8]) {
        self.inner.apply_keystream(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_is_identity() {
        let key = [9u8; MASTER_KEY_LEN];
        let nonce = [3u8; CHACHA_NONCE_LEN];
        let plaintext = b"the quick brown fox".to_vec();

        let mut buf = plaintext.clone();
        ChaChaStream::new(&key, &nonce).apply(&mut buf);
        assert_ne!(buf, plaintext);

        ChaChaStream::new(&key, &nonce).apply(&mut buf);
        assert_eq!(buf, plaintext);
    }

    #[test]
    fn different_nonces_yield_different_ciphertext() {
        let key = [9u8; MASTER_KEY_LEN];
        let plaintext = b"same plaintext, different nonce".to_vec();

        let mut a = plaintext.clone();
        ChaChaStream::new(&key, &[1u8; CHACHA_NONCE_LEN]).apply(&mut a);
        let mut b = plaintext;
        ChaChaStream::new(&key, &[2u8; CHACHA_NONCE_LEN]).apply(&mut b);
        assert_ne!(a, b);
    }
}
