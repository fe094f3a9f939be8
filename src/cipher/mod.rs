//! The stream cipher stack (SC): always-on XChaCha20, optional Serpent-CTR inner layer, and the
//! streaming MAC (MAC), bundled behind one small surface the volume engine drives per block.

pub mod chacha;
pub mod mac;
pub mod serpent_ctr;

use chacha::ChaChaStream;
use serpent_ctr::SerpentStream;

use crate::config::{CHACHA_NONCE_LEN, MASTER_KEY_LEN, SERPENT_IV_LEN, SERPENT_KEY_LEN};

/// Owns the live cipher instances for one 60 GiB "epoch" of a stream. The volume engine
/// discards and rebuilds this every time the HKDF reader emits a fresh nonce/IV pair.
pub struct StreamCipherStack {
    chacha: ChaChaStream,
    serpent: Option<SerpentStream>,
}

impl StreamCipherStack {
    pub fn new(
        master_key: &[u8; MASTER_KEY_LEN],
        chacha_nonce: &[u8; CHACHA_NONCE_LEN],
        serpent_key: Option<&[u8; SERPENT_KEY_LEN]>,
        serpent_iv: Option<&[u8; SERPENT_IV_LEN]>,
    ) -> Self {
        let serpent = match (serpent_key, serpent_iv) {
            (Some(key), Some(iv)) => Some(SerpentStream::new(key, iv)),
            _ => None,
        };
        Self { chacha: ChaChaStream::new(master_key, chacha_nonce), serpent }
    }

    /// Encrypt direction: Serpent (if paranoid) is the inner layer on plaintext, applied
    /// before XChaCha20.
    pub fn encrypt_block(&mut self, buf: &mut [u8]) {
        if let Some(serpent) = self.serpent.as_mut() {
            serpent.apply(buf);
        }
        self.chacha.apply(buf);
    }

    /// Decrypt direction: XChaCha20 is undone first, then Serpent (if paranoid).
    pub fn decrypt_block(&mut self, buf: &mut [u8]) {
        self.chacha.apply(buf);
        if let Some(serpent) = self.serpent.as_mut() {
            serpent.apply(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_mode_roundtrip() {
        let key = [1u8; MASTER_KEY_LEN];
        let nonce = [2u8; CHACHA_NONCE_LEN];
        let plaintext = b"normal mode stream cipher stack".to_vec();

        let mut buf = plaintext.clone();
        StreamCipherStack::new(&key, &nonce, None, None).encrypt_block(&mut buf);
        assert_ne!(buf, plaintext);
        StreamCipherStack::new(&key, &nonce, None, None).decrypt_block(&mut buf);
        assert_eq!(buf, plaintext);
    }

    #[test]
    fn paranoid_mode_roundtrip() {
        let key = [1u8; MASTER_KEY_LEN];
        let nonce = [2u8; CHACHA_NONCE_LEN];
        let serpent_key = [3u8; SERPENT_KEY_LEN];
        let serpent_iv = [4u8; SERPENT_IV_LEN];
        let plaintext = b"paranoid mode stream cipher stack".to_vec();

        let mut buf = plaintext.clone();
        StreamCipherStack::new(&key, &nonce, Some(&serpent_key), Some(&serpent_iv))
            .encrypt_block(&mut buf);
        assert_ne!(buf, plaintext);
        StreamCipherStack::new(&key, &nonce, Some(&serpent_key), Some(&serpent_iv))
            .decrypt_block(&mut buf);
        assert_eq!(buf, plaintext);
    }
}
