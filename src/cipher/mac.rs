//! Streaming MAC with a runtime-selected hash family.
//!
//! Paranoid volumes use HMAC-SHA3-512; normal volumes use keyed BLAKE2b-512. Both produce a
//! 64-byte tag and are driven through the same incremental `update` calls the streaming volume
//! engine already performs per 1 MiB block (or per 128-byte frame, when RS framing is enabled).

use blake2::Blake2bMac512;
use digest::Mac as _;
use hmac::Hmac;
use sha3::Sha3_512;
use subtle::ConstantTimeEq;

use crate::config::MAC_OUTPUT_LEN;

pub enum MacState {
    Blake2b(Box<Blake2bMac512>),
    HmacSha3_512(Box<Hmac<Sha3_512>>),
}

impl MacState {
    /// `key` is the 32-byte MAC subkey read from the HKDF stream.
    pub fn new(paranoid: bool, key: &[u8]) -> Self {
        if paranoid {
            let mac = Hmac::<Sha3_512>::new_from_slice(key).expect("hmac accepts any key length");
            MacState::HmacSha3_512(Box::new(mac))
        } else {
            let mac = Blake2bMac512::new_from_slice(key).expect("blake2b mac accepts a 32-byte key");
            MacState::Blake2b(Box::new(mac))
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            MacState::Blake2b(m) => m.update(data),
            MacState::HmacSha3_512(m) => m.update(data),
        }
    }

    pub fn finalize(self) -> [u8; MAC_OUTPUT_LEN] {
        let bytes = match self {
            MacState::Blake2b(m) => m.finalize().into_bytes(),
            MacState::HmacSha3_512(m) => m.finalize().into_bytes(),
        };
        let mut out = [0u8; MAC_OUTPUT_LEN];
        out.copy_from_slice(&bytes);
        out
    }
}

/// Constant-time tag comparison.
pub fn tags_equal(a: &[u8; MAC_OUTPUT_LEN], b: &[u8; MAC_OUTPUT_LEN]) -> bool {
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_and_paranoid_produce_different_tags() {
        let key = [7u8; 32];
        let mut normal = MacState::new(false, &key);
        normal.update(b"hello");
        let mut paranoid = MacState::new(true, &key);
        paranoid.update(b"hello");
        assert_ne!(normal.finalize(), paranoid.finalize());
    }

    #[test]
    fn same_input_same_key_is_deterministic() {
        let key = [1u8; 32];
        let mut a = MacState::new(false, &key);
        a.update(b"abc");
        let mut b = MacState::new(false, &key);
        b.update(b"a");
        b.update(b"bc");
        assert_eq!(a.finalize(), b.finalize());
    }

    #[test]
    fn tag_mismatch_is_detected() {
        let tag_a = [1u8; MAC_OUTPUT_LEN];
        let mut tag_b = [1u8; MAC_OUTPUT_LEN];
        tag_b[0] = 2;
        assert!(!tags_equal(&tag_a, &tag_b));
    }
}
