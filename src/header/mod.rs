//! Volume header codec (HDR): bit-exact emit/parse of the fixed, per-field RS-protected layout.
//!
//! Field order and offsets are part of the on-disk contract: version, comments_len, comments,
//! flags, argon2_salt, hkdf_salt, serpent_iv, chacha_nonce, key_hash_ref, keyfile_hash_ref,
//! auth_tag. The three reference fields (key_hash_ref, keyfile_hash_ref, auth_tag) are written
//! as zeros on the first pass and overwritten in place once the stream and its MAC are known.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::config::{
    ARGON2_SALT_LEN, CHACHA_NONCE_LEN, FLAG_BYTES, HKDF_SALT_LEN, KEYFILE_HASH_FIELD_LEN,
    MAC_OUTPUT_LEN, SERPENT_IV_LEN, VERSION_STRING,
};
use crate::error::VolumeError;
use crate::rs::{Rate, RsSuite};

/// Byte offset of `key_hash_ref` within a header with `comments_len == L`. The engine seeks here
/// after streaming to overwrite the three reference fields.
pub const fn finalize_offset(comments_len: usize) -> u64 {
    (309 + 3 * comments_len) as u64
}

pub struct HeaderFields {
    pub version: String,
    pub comments: Vec<u8>,
    pub flags: [u8; FLAG_BYTES],
    pub argon2_salt: [u8; ARGON2_SALT_LEN],
    pub hkdf_salt: [u8; HKDF_SALT_LEN],
    pub serpent_iv: [u8; SERPENT_IV_LEN],
    pub chacha_nonce: [u8; CHACHA_NONCE_LEN],
    pub key_hash_ref: [u8; MAC_OUTPUT_LEN],
    pub keyfile_hash_ref: [u8; KEYFILE_HASH_FIELD_LEN / 3],
    pub auth_tag: [u8; MAC_OUTPUT_LEN],
    /// Set when this header was parsed under force-decrypt and at least one RS-protected field
    /// failed to decode cleanly.
    pub kept: bool,
}

impl HeaderFields {
    pub fn paranoid(&self) -> bool {
        self.flags[crate::config::flag_bit::PARANOID] != 0
    }
    pub fn keyfile_used(&self) -> bool {
        self.flags[crate::config::flag_bit::KEYFILE_USED] != 0
    }
    pub fn keyfile_ordered(&self) -> bool {
        self.flags[crate::config::flag_bit::KEYFILE_ORDERED] != 0
    }
    pub fn full_reed_solomon(&self) -> bool {
        self.flags[crate::config::flag_bit::FULL_REED_SOLOMON] != 0
    }
    pub fn tail_padded(&self) -> bool {
        self.flags[crate::config::flag_bit::TAIL_PADDED] != 0
    }
}

pub enum ParseOutcome {
    Fields(HeaderFields),
    /// The version field didn't RS-decode to something matching `v\d.\d\d`; the caller should
    /// assume this is a deniability-wrapped volume and unwrap before re-parsing.
    DeniabilitySuspected,
}

fn write_field(
    writer: &mut impl Write,
    suite: &RsSuite,
    rate: Rate,
    data: &[u8],
) -> Result<(), VolumeError> {
    writer.write_all(&suite.encode(rate, data))?;
    Ok(())
}

pub fn emit(fields: &HeaderFields, writer: &mut impl Write, suite: &RsSuite) -> Result<(), VolumeError> {
    write_field(writer, suite, Rate::R5_15, fields.version.as_bytes())?;
    write_field(writer, suite, Rate::R5_15, format!("{:05}", fields.comments.len()).as_bytes())?;
    for &byte in &fields.comments {
        write_field(writer, suite, Rate::R1_3, &[byte])?;
    }
    write_field(writer, suite, Rate::R5_15, &fields.flags)?;
    write_field(writer, suite, Rate::R16_48, &fields.argon2_salt)?;
    write_field(writer, suite, Rate::R32_96, &fields.hkdf_salt)?;
    write_field(writer, suite, Rate::R16_48, &fields.serpent_iv)?;
    write_field(writer, suite, Rate::R24_72, &fields.chacha_nonce)?;
    write_field(writer, suite, Rate::R64_192, &fields.key_hash_ref)?;
    write_field(writer, suite, Rate::R32_96, &fields.keyfile_hash_ref)?;
    write_field(writer, suite, Rate::R64_192, &fields.auth_tag)?;
    Ok(())
}

/// Seeks to `finalize_offset(comments_len)` and overwrites the three reference fields. Requires
/// a seekable sink; streaming-only sinks must buffer the whole header until the stream ends.
pub fn finalize(
    writer: &mut (impl Write + Seek),
    suite: &RsSuite,
    comments_len: usize,
    key_hash_ref: &[u8; MAC_OUTPUT_LEN],
    keyfile_hash_ref: &[u8; KEYFILE_HASH_FIELD_LEN / 3],
    auth_tag: &[u8; MAC_OUTPUT_LEN],
) -> Result<(), VolumeError> {
    writer.seek(SeekFrom::Start(finalize_offset(comments_len)))?;
    write_field(writer, suite, Rate::R64_192, key_hash_ref)?;
    write_field(writer, suite, Rate::R32_96, keyfile_hash_ref)?;
    write_field(writer, suite, Rate::R64_192, auth_tag)?;
    Ok(())
}

fn looks_like_version(bytes: &[u8]) -> bool {
    bytes.len() >= 5
        && bytes[0] == b'v'
        && bytes[1].is_ascii_digit()
        && bytes[2] == b'.'
        && bytes[3].is_ascii_digit()
        && bytes[4].is_ascii_digit()
}

fn read_field(
    reader: &mut impl Read,
    suite: &RsSuite,
    rate: Rate,
    field: &'static str,
    force_decrypt: bool,
    kept: &mut bool,
) -> Result<Vec<u8>, VolumeError> {
    let mut buf = vec![0u8; rate.n()];
    reader.read_exact(&mut buf)?;
    let decoded = suite.decode(rate, &buf);
    if !decoded.ok {
        if force_decrypt {
            *kept = true;
        } else {
            return Err(VolumeError::HeaderDamaged { field });
        }
    }
    Ok(decoded.data)
}

fn read_field_exact<const N: usize>(
    reader: &mut impl Read,
    suite: &RsSuite,
    rate: Rate,
    field: &'static str,
    force_decrypt: bool,
    kept: &mut bool,
) -> Result<[u8; N], VolumeError> {
    let data = read_field(reader, suite, rate, field, force_decrypt, kept)?;
    let mut out = [0u8; N];
    out.copy_from_slice(&data);
    Ok(out)
}

/// Parses a header from `reader`. Returns `DeniabilitySuspected` rather than an error when the
/// version field doesn't decode to something matching `v\d.\d\d` — that's the signal the caller
/// uses to fall back to unwrapping a deniability layer and retrying.
pub fn parse(
    reader: &mut impl Read,
    suite: &RsSuite,
    force_decrypt: bool,
) -> Result<ParseOutcome, VolumeError> {
    let mut version_buf = vec![0u8; Rate::R5_15.n()];
    reader.read_exact(&mut version_buf)?;
    let version_decoded = suite.decode(Rate::R5_15, &version_buf);
    if !version_decoded.ok || !looks_like_version(&version_decoded.data) {
        return Ok(ParseOutcome::DeniabilitySuspected);
    }
    let version = String::from_utf8_lossy(&version_decoded.data).into_owned();

    let mut kept = false;

    let comments_len_bytes =
        read_field(reader, suite, Rate::R5_15, "comments_len", force_decrypt, &mut kept)?;
    let comments_len = if comments_len_bytes.iter().all(u8::is_ascii_digit) {
        std::str::from_utf8(&comments_len_bytes).ok().and_then(|s| s.parse::<usize>().ok())
    } else {
        None
    };
    let comments_len = match comments_len {
        Some(len) => len,
        None if force_decrypt => {
            kept = true;
            0
        }
        None => return Err(VolumeError::HeaderDamaged { field: "comments_len" }),
    };

    let mut comments = Vec::with_capacity(comments_len);
    let mut comments_corrupted = false;
    for _ in 0..comments_len {
        let mut buf = [0u8; 3];
        reader.read_exact(&mut buf)?;
        let decoded = suite.decode(Rate::R1_3, &buf);
        comments_corrupted |= !decoded.ok;
        comments.push(decoded.data[0]);
    }
    if comments_corrupted {
        comments = b"Comments are corrupted".to_vec();
    }

    let flags_vec = read_field(reader, suite, Rate::R5_15, "flags", force_decrypt, &mut kept)?;
    let mut flags = [0u8; FLAG_BYTES];
    flags.copy_from_slice(&flags_vec);

    let argon2_salt = read_field_exact(reader, suite, Rate::R16_48, "argon2_salt", force_decrypt, &mut kept)?;
    let hkdf_salt = read_field_exact(reader, suite, Rate::R32_96, "hkdf_salt", force_decrypt, &mut kept)?;
    let serpent_iv = read_field_exact(reader, suite, Rate::R16_48, "serpent_iv", force_decrypt, &mut kept)?;
    let chacha_nonce = read_field_exact(reader, suite, Rate::R24_72, "chacha_nonce", force_decrypt, &mut kept)?;
    let key_hash_ref = read_field_exact(reader, suite, Rate::R64_192, "key_hash_ref", force_decrypt, &mut kept)?;
    let keyfile_hash_ref =
        read_field_exact(reader, suite, Rate::R32_96, "keyfile_hash_ref", force_decrypt, &mut kept)?;
    let auth_tag = read_field_exact(reader, suite, Rate::R64_192, "auth_tag", force_decrypt, &mut kept)?;

    Ok(ParseOutcome::Fields(HeaderFields {
        version,
        comments,
        flags,
        argon2_salt,
        hkdf_salt,
        serpent_iv,
        chacha_nonce,
        key_hash_ref,
        keyfile_hash_ref,
        auth_tag,
        kept,
    }))
}

pub fn current_version() -> String {
    VERSION_STRING.to_string()
}
