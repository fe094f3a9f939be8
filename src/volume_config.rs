//! Explicit configuration surface (CFG).
//!
//! The source this crate is modeled on keeps its options as GUI-toggled process globals. Here
//! every option the engine needs crosses the boundary as one of these value objects; nothing is
//! read from ambient state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::config::{self, CHACHA_NONCE_LEN, MAC_SUBKEY_LEN, MASTER_KEY_LEN, SERPENT_IV_LEN, SERPENT_KEY_LEN};

/// Password plus the ordered list of keyfile contents, exactly as the KDF pipeline needs them.
pub struct KeyMaterial {
    pub password: SecretString,
    pub keyfiles: Vec<Vec<u8>>,
    pub keyfile_ordered: bool,
}

impl KeyMaterial {
    pub fn password_bytes(&self) -> &[u8] {
        self.password.expose_secret().as_bytes()
    }
}

/// Everything the engine needs for one encrypt or decrypt pass that isn't part of `KeyMaterial`.
pub struct VolumeConfig {
    pub paranoid: bool,
    pub full_reed_solomon: bool,
    pub deniability: bool,
    pub force_decrypt: bool,
    pub comments: Vec<u8>,
    pub key_material: KeyMaterial,
}

/// Derived key material for one pass. Zeroized on drop; never logged.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct DerivedKeys {
    pub master: [u8; MASTER_KEY_LEN],
    pub mac_subkey: [u8; MAC_SUBKEY_LEN],
    pub serpent_key: Option<[u8; SERPENT_KEY_LEN]>,
    pub chacha_nonce: [u8; CHACHA_NONCE_LEN],
    pub serpent_iv: [u8; SERPENT_IV_LEN],
}

/// Tracks plaintext bytes processed since the last nonce/IV refresh.
pub struct StreamCounters {
    pub bytes_since_refresh: u64,
    pub threshold: u64,
}

impl StreamCounters {
    pub fn new() -> Self {
        Self { bytes_since_refresh: 0, threshold: config::REFRESH_THRESHOLD }
    }

    /// Records `n` processed bytes; returns true once the threshold is crossed (and resets).
    pub fn advance(&mut self, n: u64) -> bool {
        self.bytes_since_refresh += n;
        if self.bytes_since_refresh >= self.threshold {
            self.bytes_since_refresh = 0;
            true
        } else {
            false
        }
    }
}

impl Default for StreamCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Cooperative cancellation flag, shared between the worker and whatever drives the UI.
#[derive(Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}
