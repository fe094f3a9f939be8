//! Key derivation pipeline (KEY): Argon2id, keyfile composition, the master key, and the
//! incremental HKDF-SHA3-256 subkey reader.

use argon2::{Algorithm, Argon2, Params, Version};
use digest::Mac as _;
use hmac::Hmac;
use rand::rngs::SysRng;
use rand::TryRng;
use sha3::{Digest, Sha3_256, Sha3_512};

use crate::config::{self, Argon2Profile};
use crate::error::VolumeError;

/// Fetches `N` bytes from the OS CSPRNG. An all-zero result is treated as a fatal RNG failure
/// (defence against a broken or mocked RNG silently producing predictable material).
pub fn random_bytes<const N: usize>() -> Result<[u8; N], VolumeError> {
    let mut buf = [0u8; N];
    SysRng.try_fill_bytes(&mut buf).map_err(|_| VolumeError::RngFailure)?;
    if buf.iter().all(|&b| b == 0) {
        return Err(VolumeError::RngFailure);
    }
    Ok(buf)
}

/// Runs Argon2id with the given profile (normal or paranoid). An all-zero output is treated as
/// a fatal KDF failure rather than silently proceeding with weak key material.
pub fn argon2id(
    password: &[u8],
    salt: &[u8; config::ARGON2_SALT_LEN],
    profile: &Argon2Profile,
) -> Result<[u8; config::ARGON2_KEY_LEN], VolumeError> {
    let params = Params::new(
        profile.memory_cost_kib,
        profile.time_cost,
        profile.parallelism,
        Some(config::ARGON2_KEY_LEN),
    )
    .expect("the fixed argon2 profiles in config.rs are always valid");
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut out = [0u8; config::ARGON2_KEY_LEN];
    argon2.hash_password_into(password, salt, &mut out).map_err(|_| VolumeError::KdfFailure)?;
    if out.iter().all(|&b| b == 0) {
        return Err(VolumeError::KdfFailure);
    }
    Ok(out)
}

/// Result of combining one or more keyfiles: the raw composite used to XOR into the master key,
/// and the SHA3-256 reference hash stored (RS-protected) in the header.
pub struct KeyfileComposite {
    pub composite: [u8; 32],
    pub hash_ref: [u8; 32],
}

pub(crate) fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Combines keyfile contents per §4.3: concatenated-then-hashed when ordered, XOR of per-file
/// hashes otherwise. An all-zero composite (e.g. two identical keyfiles under unordered mode)
/// is rejected unconditionally, since it can only arise from a configuration mistake and never
/// from legitimate distinct key material.
pub fn compose_keyfiles(
    keyfiles: &[Vec<u8>],
    ordered: bool,
) -> Result<KeyfileComposite, VolumeError> {
    debug_assert!(!keyfiles.is_empty());

    let composite = if ordered {
        let mut hasher = Sha3_256::new();
        for keyfile in keyfiles {
            hasher.update(keyfile);
        }
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        out
    } else {
        let mut acc = [0u8; 32];
        for keyfile in keyfiles {
            let digest = sha3_256(keyfile);
            for (a, b) in acc.iter_mut().zip(digest.iter()) {
                *a ^= b;
            }
        }
        acc
    };

    if composite.iter().all(|&b| b == 0) {
        return Err(VolumeError::DuplicateKeyfiles);
    }

    Ok(KeyfileComposite { composite, hash_ref: sha3_256(&composite) })
}

/// `master = argon2_out XOR composite` when keyfiles are in use, else `master = argon2_out`.
pub fn master_key(
    argon2_out: &[u8; config::MASTER_KEY_LEN],
    keyfile_composite: Option<&[u8; 32]>,
) -> [u8; config::MASTER_KEY_LEN] {
    let mut master = *argon2_out;
    if let Some(composite) = keyfile_composite {
        for (m, c) in master.iter_mut().zip(composite.iter()) {
            *m ^= c;
        }
    }
    master
}

/// SHA3-512(master), the reference stored in `key_hash_ref`.
pub fn key_hash_ref(master: &[u8; config::MASTER_KEY_LEN]) -> [u8; 64] {
    let mut hasher = Sha3_512::new();
    hasher.update(master);
    let digest = hasher.finalize();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

/// An incremental RFC 5869 HKDF-Expand reader over HMAC-SHA3-256.
///
/// The wire format calls for reads resumed after 60 GiB of unrelated stream processing, which a
/// one-shot `expand(len)` call cannot model without knowing the total length up front. This type
/// keeps the minimal state RFC 5869 needs to resume: the previous `T(i)` block, the block
/// counter, and any unread tail of the last block.
pub struct HkdfReader {
    prk: [u8; 32],
    counter: u8,
    prev_block: Vec<u8>,
    leftover: Vec<u8>,
}

impl HkdfReader {
    pub fn new(ikm: &[u8], salt: &[u8]) -> Self {
        let mut extract =
            Hmac::<Sha3_256>::new_from_slice(salt).expect("hmac accepts any key length");
        extract.update(ikm);
        let prk_digest = extract.finalize().into_bytes();
        let mut prk = [0u8; 32];
        prk.copy_from_slice(&prk_digest);
        Self { prk, counter: 1, prev_block: Vec::new(), leftover: Vec::new() }
    }

    fn pull_block(&mut self) {
        let mut expand =
            Hmac::<Sha3_256>::new_from_slice(&self.prk).expect("prk is exactly 32 bytes");
        expand.update(&self.prev_block);
        expand.update(&[self.counter]);
        let block = expand.finalize().into_bytes();
        self.prev_block = block.to_vec();
        self.leftover = block.to_vec();
        self.counter = self
            .counter
            .checked_add(1)
            .expect("hkdf expand exceeded 255 blocks; no realistic volume needs this much keystream");
    }

    pub fn read(&mut self, out: &mut [u8]) {
        let mut written = 0;
        while written < out.len() {
            if self.leftover.is_empty() {
                self.pull_block();
            }
            let take = out.len().saturating_sub(written).min(self.leftover.len());
            out[written..written + take].copy_from_slice(&self.leftover[..take]);
            self.leftover.drain(..take);
            written += take;
        }
    }

    pub fn read_n<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        self.read(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hkdf_reader_is_deterministic_and_stateful() {
        let mut a = HkdfReader::new(b"master key material", b"salt");
        let a1: [u8; 32] = a.read_n();
        let a2: [u8; 32] = a.read_n();

        let mut b = HkdfReader::new(b"master key material", b"salt");
        let mut combined = [0u8; 64];
        b.read(&mut combined);

        assert_eq!(&combined[..32], &a1[..]);
        assert_eq!(&combined[32..], &a2[..]);
    }

    #[test]
    fn ordered_vs_unordered_keyfile_composition_differ() {
        let keyfiles = vec![b"one".to_vec(), b"two".to_vec()];
        let ordered = compose_keyfiles(&keyfiles, true).unwrap();
        let unordered = compose_keyfiles(&keyfiles, false).unwrap();
        assert_ne!(ordered.composite, unordered.composite);
    }

    #[test]
    fn ordered_composition_is_permutation_sensitive() {
        let forward = vec![b"one".to_vec(), b"two".to_vec()];
        let reversed = vec![b"two".to_vec(), b"one".to_vec()];
        let a = compose_keyfiles(&forward, true).unwrap();
        let b = compose_keyfiles(&reversed, true).unwrap();
        assert_ne!(a.composite, b.composite);
    }

    #[test]
    fn duplicate_keyfiles_unordered_is_rejected() {
        let keyfiles = vec![b"same".to_vec(), b"same".to_vec()];
        assert!(matches!(
            compose_keyfiles(&keyfiles, false),
            Err(VolumeError::DuplicateKeyfiles)
        ));
    }

    #[test]
    fn argon2id_normal_and_paranoid_differ() {
        let salt = [1u8; config::ARGON2_SALT_LEN];
        let normal = argon2id(b"password", &salt, &config::ARGON2_NORMAL).unwrap();
        let paranoid = argon2id(b"password", &salt, &config::ARGON2_PARANOID).unwrap();
        assert_ne!(normal, paranoid);
    }
}
