//! Deniability wrapper (DEN): an outer, unauthenticated XChaCha20 layer over a whole volume,
//! keyed by an independent Argon2id derivation with its salt and nonce stored as a plaintext
//! prefix. Wrapped output is indistinguishable from random bytes without the password; the inner
//! volume's own MAC still catches tampering once unwrapped.

use std::io::{Read, Write};

use crate::cipher::chacha::ChaChaStream;
use crate::config::{self, DENIABILITY_NONCE_LEN, DENIABILITY_SALT_LEN};
use crate::error::VolumeError;
use crate::io_util::read_block;
use crate::kdf;
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use crate::volume_config::{CancelToken, StreamCounters};

fn refresh_nonce(prev: &[u8; DENIABILITY_NONCE_LEN]) -> [u8; DENIABILITY_NONCE_LEN] {
    let digest = kdf::sha3_256(prev);
    let mut out = [0u8; DENIABILITY_NONCE_LEN];
    out.copy_from_slice(&digest[..DENIABILITY_NONCE_LEN]);
    out
}

/// Wraps `reader`'s bytes (an already-complete inner volume) into `writer`, prefixed with the
/// fresh salt and nonce.
pub fn wrap(
    mut reader: impl Read,
    mut writer: impl Write,
    password: &[u8],
    total_len: u64,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<(), VolumeError> {
    let salt = kdf::random_bytes::<DENIABILITY_SALT_LEN>()?;
    let mut nonce = kdf::random_bytes::<DENIABILITY_NONCE_LEN>()?;
    writer.write_all(&salt)?;
    writer.write_all(&nonce)?;

    let key = kdf::argon2id(password, &salt, &config::ARGON2_DENIABILITY)?;
    let mut cipher = ChaChaStream::new(&key, &nonce);
    let mut counters = StreamCounters::new();
    let mut buf = vec![0u8; config::BLOCK_SIZE];
    let mut done = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(VolumeError::Cancelled);
        }
        let n = read_block(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        cipher.apply(&mut buf[..n]);
        writer.write_all(&buf[..n])?;
        done += n as u64;
        progress.on_progress(ProgressEvent { phase: Phase::Denial, bytes_done: done, bytes_total: total_len });
        if counters.advance(n as u64) {
            nonce = refresh_nonce(&nonce);
            cipher = ChaChaStream::new(&key, &nonce);
        }
    }
    Ok(())
}

/// Reverses `wrap`: reads the plaintext salt/nonce prefix from `reader`, then streams the
/// decrypted inner volume into `writer`. `ciphertext_len` is the wrapped file's total length
/// minus the 40-byte prefix, used only for progress reporting.
pub fn unwrap(
    mut reader: impl Read,
    mut writer: impl Write,
    password: &[u8],
    ciphertext_len: u64,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<(), VolumeError> {
    let mut salt = [0u8; DENIABILITY_SALT_LEN];
    reader.read_exact(&mut salt)?;
    let mut nonce = [0u8; DENIABILITY_NONCE_LEN];
    reader.read_exact(&mut nonce)?;

    let key = kdf::argon2id(password, &salt, &config::ARGON2_DENIABILITY)?;
    let mut cipher = ChaChaStream::new(&key, &nonce);
    let mut counters = StreamCounters::new();
    let mut buf = vec![0u8; config::BLOCK_SIZE];
    let mut done = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(VolumeError::Cancelled);
        }
        let n = read_block(&mut reader, &mut buf)?;
        if n == 0 {
            break;
        }
        cipher.apply(&mut buf[..n]);
        writer.write_all(&buf[..n])?;
        done += n as u64;
        progress.on_progress(ProgressEvent { phase: Phase::Denial, bytes_done: done, bytes_total: ciphertext_len });
        if counters.advance(n as u64) {
            nonce = refresh_nonce(&nonce);
            cipher = ChaChaStream::new(&key, &nonce);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use std::io::Cursor;

    #[test]
    fn wrap_then_unwrap_recovers_original_bytes() {
        let inner = b"an inner volume's worth of bytes, pretend header and ciphertext".to_vec();
        let mut wrapped = Vec::new();
        wrap(
            Cursor::new(&inner),
            &mut wrapped,
            b"password",
            inner.len() as u64,
            &mut NullProgress,
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(wrapped.len(), inner.len() + config::DENIABILITY_PREFIX_LEN);

        let mut recovered = Vec::new();
        unwrap(
            Cursor::new(&wrapped),
            &mut recovered,
            b"password",
            inner.len() as u64,
            &mut NullProgress,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(recovered, inner);
    }

    #[test]
    fn unwrap_with_wrong_password_yields_garbage_not_an_error() {
        let inner = b"sensitive".to_vec();
        let mut wrapped = Vec::new();
        wrap(Cursor::new(&inner), &mut wrapped, b"right", inner.len() as u64, &mut NullProgress, &CancelToken::new())
            .unwrap();

        let mut recovered = Vec::new();
        unwrap(Cursor::new(&wrapped), &mut recovered, b"wrong", inner.len() as u64, &mut NullProgress, &CancelToken::new())
            .unwrap();
        assert_ne!(recovered, inner);
    }
}
