//! Fixed wire-format and algorithm constants.
//!
//! Every number in this file is part of the on-disk contract: changing one changes what a
//! volume written by this crate looks like on disk, so none of these are meant to become CLI
//! flags.

/// Volume format version, written verbatim into the header's `version` field.
pub const VERSION_STRING: &str = "v1.48";

/// 1 MiB streaming block size used by VOL, FRM, and the splitter.
pub const BLOCK_SIZE: usize = 1024 * 1024;

/// Plaintext bytes processed before the stream cipher nonce/IV are refreshed from the HKDF
/// reader. 60 GiB, expressed in bytes.
pub const REFRESH_THRESHOLD: u64 = 60 * 1024 * 1024 * 1024;

/// Reed-Solomon inner-framing payload size (bytes of plaintext per frame).
pub const FRAME_PAYLOAD_LEN: usize = 128;

/// Reed-Solomon inner-framing encoded frame size (bytes written per frame).
pub const FRAME_ENCODED_LEN: usize = 136;

// --- Argon2id profiles --------------------------------------------------------------------

pub const ARGON2_SALT_LEN: usize = 16;
pub const ARGON2_KEY_LEN: usize = 32;

pub struct Argon2Profile {
    pub time_cost: u32,
    pub memory_cost_kib: u32,
    pub parallelism: u32,
}

/// `paranoid = false`: time=4, memory=1 GiB, parallelism=4.
pub const ARGON2_NORMAL: Argon2Profile =
    Argon2Profile { time_cost: 4, memory_cost_kib: 1024 * 1024, parallelism: 4 };

/// `paranoid = true`: time=8, memory=1 GiB, parallelism=8.
pub const ARGON2_PARANOID: Argon2Profile =
    Argon2Profile { time_cost: 8, memory_cost_kib: 1024 * 1024, parallelism: 8 };

/// Argon2id profile used by the deniability wrapper, independent of `paranoid` (the original
/// program always derives the outer key with the normal profile).
pub const ARGON2_DENIABILITY: Argon2Profile = ARGON2_NORMAL;

// --- Key / nonce / IV sizes ----------------------------------------------------------------

pub const MASTER_KEY_LEN: usize = 32;
pub const MAC_SUBKEY_LEN: usize = 32;
pub const SERPENT_KEY_LEN: usize = 32;
pub const CHACHA_NONCE_LEN: usize = 24;
pub const SERPENT_IV_LEN: usize = 16;
pub const HKDF_SALT_LEN: usize = 32;
pub const MAC_OUTPUT_LEN: usize = 64;

// --- Header layout -----------------------------------------------------------------------
//
// Offsets below assume a zero-length comments field (L = 0); HeaderLayout (src/header) computes
// the real offsets for a given L at runtime, since every field after `comments` shifts by 3*L.

/// RS(5,15)-encoded length of the `version` field.
pub const VERSION_FIELD_LEN: usize = 15;
/// RS(5,15)-encoded length of the `comments_len` field.
pub const COMMENTS_LEN_FIELD_LEN: usize = 15;
/// RS(5,15)-encoded length of the `flags` field.
pub const FLAGS_FIELD_LEN: usize = 15;
/// RS(16,48)-encoded length of `argon2_salt`.
pub const ARGON2_SALT_FIELD_LEN: usize = 48;
/// RS(32,96)-encoded length of `hkdf_salt`.
pub const HKDF_SALT_FIELD_LEN: usize = 96;
/// RS(16,48)-encoded length of `serpent_iv`.
pub const SERPENT_IV_FIELD_LEN: usize = 48;
/// RS(24,72)-encoded length of `chacha_nonce`.
pub const CHACHA_NONCE_FIELD_LEN: usize = 72;
/// RS(64,192)-encoded length of `key_hash_ref`.
pub const KEY_HASH_FIELD_LEN: usize = 192;
/// RS(32,96)-encoded length of `keyfile_hash_ref`.
pub const KEYFILE_HASH_FIELD_LEN: usize = 96;
/// RS(64,192)-encoded length of `auth_tag`.
pub const AUTH_TAG_FIELD_LEN: usize = 192;

/// Fixed header length with zero comment bytes (789 bytes).
pub const FIXED_HEADER_LEN: usize = VERSION_FIELD_LEN
    + COMMENTS_LEN_FIELD_LEN
    + FLAGS_FIELD_LEN
    + ARGON2_SALT_FIELD_LEN
    + HKDF_SALT_FIELD_LEN
    + SERPENT_IV_FIELD_LEN
    + CHACHA_NONCE_FIELD_LEN
    + KEY_HASH_FIELD_LEN
    + KEYFILE_HASH_FIELD_LEN
    + AUTH_TAG_FIELD_LEN;

/// Number of flag bytes in the `flags` field (before RS encoding).
pub const FLAG_BYTES: usize = 5;

pub mod flag_bit {
    pub const PARANOID: usize = 0;
    pub const KEYFILE_USED: usize = 1;
    pub const KEYFILE_ORDERED: usize = 2;
    pub const FULL_REED_SOLOMON: usize = 3;
    pub const TAIL_PADDED: usize = 4;
}

// --- Deniability wrapper -------------------------------------------------------------------

pub const DENIABILITY_SALT_LEN: usize = 16;
pub const DENIABILITY_NONCE_LEN: usize = 24;
pub const DENIABILITY_PREFIX_LEN: usize = DENIABILITY_SALT_LEN + DENIABILITY_NONCE_LEN;

// --- Archive packer -------------------------------------------------------------------------

/// Key/nonce sizes for the ephemeral XOR confusion cipher wrapping the pre-encryption ZIP temp.
pub const ARCHIVE_XOR_KEY_LEN: usize = 32;
pub const ARCHIVE_XOR_NONCE_LEN: usize = 12;

// --- Incomplete-file convention --------------------------------------------------------------

pub const INCOMPLETE_SUFFIX: &str = ".incomplete";
