//! The volume engine (VOL): drives HEADER -> STREAM -> FINALIZE for both directions, and the
//! decrypt side's RETRY_REPAIR and deniability-fallback branches.
//!
//! The MAC always runs over the stream cipher's output, never over the Reed-Solomon framing: on
//! encrypt that's the ciphertext before it gets split into 128-byte RS frames; on decrypt it's
//! the 128-byte payload a frame decodes (or fast-strips) back to, before XChaCha20 undoes it.
//! RS framing is purely an on-disk redundancy layer wrapped around that same byte stream.

use std::io::{Cursor, Read, Seek, SeekFrom, Write};

use subtle::ConstantTimeEq;

use crate::cipher::mac::{tags_equal, MacState};
use crate::cipher::StreamCipherStack;
use crate::config::{self, flag_bit, FLAG_BYTES};
use crate::deniability;
use crate::error::VolumeError;
use crate::frame::{self, FULL_ENCODED_BLOCK_LEN};
use crate::header::{self, HeaderFields, ParseOutcome};
use crate::io_util::read_block;
use crate::kdf;
use crate::progress::{Phase, ProgressEvent, ProgressSink};
use crate::rs::RsSuite;
use crate::volume_config::{CancelToken, DerivedKeys, StreamCounters, VolumeConfig};

/// Encrypts `total_len` bytes of plaintext from `input` into `output` as one complete volume
/// (header, streamed ciphertext, finalized reference fields). Does not rename or otherwise manage
/// `.incomplete` files; that's the caller's job once this returns `Ok`.
pub fn encrypt(
    mut input: impl Read,
    mut output: impl Write + Seek,
    total_len: u64,
    config: &VolumeConfig,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<(), VolumeError> {
    let suite = RsSuite::new();

    let argon2_salt = kdf::random_bytes::<{ config::ARGON2_SALT_LEN }>()?;
    let hkdf_salt = kdf::random_bytes::<{ config::HKDF_SALT_LEN }>()?;
    let serpent_iv = kdf::random_bytes::<{ config::SERPENT_IV_LEN }>()?;
    let chacha_nonce = kdf::random_bytes::<{ config::CHACHA_NONCE_LEN }>()?;

    let profile = if config.paranoid { &config::ARGON2_PARANOID } else { &config::ARGON2_NORMAL };
    let argon2_out = kdf::argon2id(config.key_material.password_bytes(), &argon2_salt, profile)?;

    let keyfile_composite = if !config.key_material.keyfiles.is_empty() {
        Some(kdf::compose_keyfiles(&config.key_material.keyfiles, config.key_material.keyfile_ordered)?)
    } else {
        None
    };
    let master = kdf::master_key(&argon2_out, keyfile_composite.as_ref().map(|c| &c.composite));
    let key_hash_ref = kdf::key_hash_ref(&master);
    let keyfile_hash_ref = keyfile_composite.as_ref().map(|c| c.hash_ref).unwrap_or([0u8; 32]);

    let mut hkdf = kdf::HkdfReader::new(&master, &hkdf_salt);
    let mac_subkey = hkdf.read_n();
    let serpent_key_bytes = hkdf.read_n();
    let serpent_key = config.paranoid.then_some(serpent_key_bytes);

    let keys = DerivedKeys {
        master,
        mac_subkey,
        serpent_key,
        chacha_nonce,
        serpent_iv,
    };

    let mut flags = [0u8; FLAG_BYTES];
    flags[flag_bit::PARANOID] = config.paranoid as u8;
    flags[flag_bit::KEYFILE_USED] = keyfile_composite.is_some() as u8;
    flags[flag_bit::KEYFILE_ORDERED] = config.key_material.keyfile_ordered as u8;
    flags[flag_bit::FULL_REED_SOLOMON] = config.full_reed_solomon as u8;
    flags[flag_bit::TAIL_PADDED] = frame::tail_padded_flag(total_len) as u8;

    let header_fields = HeaderFields {
        version: header::current_version(),
        comments: config.comments.clone(),
        flags,
        argon2_salt,
        hkdf_salt,
        serpent_iv: keys.serpent_iv,
        chacha_nonce: keys.chacha_nonce,
        key_hash_ref: [0u8; config::MAC_OUTPUT_LEN],
        keyfile_hash_ref: [0u8; 32],
        auth_tag: [0u8; config::MAC_OUTPUT_LEN],
        kept: false,
    };
    header::emit(&header_fields, &mut output, &suite)?;

    let mut stream = StreamCipherStack::new(
        &keys.master,
        &keys.chacha_nonce,
        keys.serpent_key.as_ref(),
        config.paranoid.then_some(&keys.serpent_iv),
    );
    let mut mac = MacState::new(config.paranoid, &keys.mac_subkey);
    let mut counters = StreamCounters::new();
    let mut buf = vec![0u8; config::BLOCK_SIZE];
    let mut done = 0u64;

    loop {
        if cancel.is_cancelled() {
            return Err(VolumeError::Cancelled);
        }
        let n = read_block(&mut input, &mut buf)?;
        if n == 0 {
            break;
        }
        let block = &mut buf[..n];
        stream.encrypt_block(block);
        mac.update(block);

        if config.full_reed_solomon {
            let full_block = n == config::BLOCK_SIZE;
            let encoded = frame::encode_block(block, &suite, full_block);
            output.write_all(&encoded)?;
        } else {
            output.write_all(block)?;
        }

        done += n as u64;
        progress.on_progress(ProgressEvent { phase: Phase::Encrypt, bytes_done: done, bytes_total: total_len });

        if counters.advance(n as u64) {
            let next_nonce = hkdf.read_n();
            let next_iv = hkdf.read_n();
            stream = StreamCipherStack::new(
                &keys.master,
                &next_nonce,
                keys.serpent_key.as_ref(),
                config.paranoid.then_some(&next_iv),
            );
        }
    }

    let auth_tag = mac.finalize();
    header::finalize(&mut output, &suite, config.comments.len(), &key_hash_ref, &keyfile_hash_ref, &auth_tag)?;
    Ok(())
}

/// Outcome of a successful decrypt pass.
#[derive(Debug)]
pub struct DecryptOutcome {
    /// Set when force-decrypt downgraded a fatal condition (header damage, MAC mismatch,
    /// irrecoverable RS repair failure) to a warning; the output was still written best-effort.
    pub kept: bool,
}

/// Decrypts a complete volume stream from `input` into `output`. `total_len` is the total byte
/// length of `input` (header + ciphertext), used for progress reporting and to size the
/// deniability-unwrap buffer if needed.
pub fn decrypt(
    mut input: impl Read + Seek + 'static,
    mut output: impl Write,
    total_len: u64,
    config: &VolumeConfig,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<DecryptOutcome, VolumeError> {
    let suite = RsSuite::new();

    input.seek(SeekFrom::Start(0))?;
    let (header_fields, mut source, stream_len): (HeaderFields, Box<dyn ReadSeek>, u64) =
        match header::parse(&mut input, &suite, config.force_decrypt)? {
            ParseOutcome::Fields(fields) => {
                input.seek(SeekFrom::Start(0))?;
                (fields, Box::new(input), total_len)
            }
            ParseOutcome::DeniabilitySuspected => {
                input.seek(SeekFrom::Start(0))?;
                let ciphertext_len = total_len - config::DENIABILITY_PREFIX_LEN as u64;
                let mut unwrapped = Vec::with_capacity(ciphertext_len as usize);
                deniability::unwrap(
                    &mut input,
                    &mut unwrapped,
                    config.key_material.password_bytes(),
                    ciphertext_len,
                    progress,
                    cancel,
                )?;
                let unwrapped_len = unwrapped.len() as u64;
                let mut cursor = Cursor::new(unwrapped);
                let fields = match header::parse(&mut cursor, &suite, config.force_decrypt)? {
                    ParseOutcome::Fields(fields) => fields,
                    ParseOutcome::DeniabilitySuspected => {
                        return Err(VolumeError::HeaderDamaged { field: "version" })
                    }
                };
                cursor.seek(SeekFrom::Start(0))?;
                (fields, Box::new(cursor), unwrapped_len)
            }
        };

    let profile = if header_fields.paranoid() { &config::ARGON2_PARANOID } else { &config::ARGON2_NORMAL };
    let argon2_out =
        kdf::argon2id(config.key_material.password_bytes(), &header_fields.argon2_salt, profile)?;

    let keyfile_composite = if header_fields.keyfile_used() {
        if config.key_material.keyfiles.is_empty() {
            None
        } else {
            Some(kdf::compose_keyfiles(
                &config.key_material.keyfiles,
                header_fields.keyfile_ordered(),
            )?)
        }
    } else {
        None
    };
    let master = kdf::master_key(&argon2_out, keyfile_composite.as_ref().map(|c| &c.composite));

    let key_hash_ref = kdf::key_hash_ref(&master);
    let key_ok = tags_equal(&key_hash_ref, &header_fields.key_hash_ref);
    let keyfile_ok = match &keyfile_composite {
        Some(c) => bool::from(c.hash_ref.ct_eq(&header_fields.keyfile_hash_ref)),
        None => true,
    };

    let mut kept = header_fields.kept;

    if !key_ok {
        let err = VolumeError::BadPassword;
        if config.force_decrypt && err.is_downgradable() {
            kept = true;
        } else {
            return Err(err);
        }
    }
    if header_fields.keyfile_used() && !keyfile_ok {
        let err = VolumeError::BadKeyfile { ordering_sensitive: header_fields.keyfile_ordered() };
        if config.force_decrypt && err.is_downgradable() {
            kept = true;
        } else {
            return Err(err);
        }
    }

    let (mac_subkey, serpent_key_bytes): ([u8; config::MAC_SUBKEY_LEN], [u8; config::SERPENT_KEY_LEN]) = {
        let mut hkdf = kdf::HkdfReader::new(&master, &header_fields.hkdf_salt);
        (hkdf.read_n(), hkdf.read_n())
    };
    let serpent_key = header_fields.paranoid().then_some(serpent_key_bytes);

    let stream_start = source.stream_position()?;
    let stream_total = stream_len.saturating_sub(stream_start);
    let reedsolo = header_fields.full_reed_solomon();
    let mut fast_decode = true;
    let mut final_bytes: Vec<u8>;

    loop {
        source.seek(SeekFrom::Start(stream_start))?;
        let make_hkdf = || {
            let mut hkdf = kdf::HkdfReader::new(&master, &header_fields.hkdf_salt);
            let _subkey: [u8; config::MAC_SUBKEY_LEN] = hkdf.read_n();
            let _serpent: [u8; config::SERPENT_KEY_LEN] = hkdf.read_n();
            hkdf
        };
        let mut hkdf = make_hkdf();

        let mut stream = StreamCipherStack::new(
            &master,
            &header_fields.chacha_nonce,
            serpent_key.as_ref(),
            header_fields.paranoid().then_some(&header_fields.serpent_iv),
        );
        let mut mac = MacState::new(header_fields.paranoid(), &mac_subkey);
        let mut counters = StreamCounters::new();

        let read_size = if reedsolo { FULL_ENCODED_BLOCK_LEN } else { config::BLOCK_SIZE };
        let mut buf = vec![0u8; read_size];
        let mut done = 0u64;
        let mut irrecoverable = false;
        final_bytes = Vec::new();

        loop {
            if cancel.is_cancelled() {
                return Err(VolumeError::Cancelled);
            }
            let n = read_block(&mut source, &mut buf)?;
            if n == 0 {
                break;
            }
            let chunk = &buf[..n];
            // A short read is always the final one, but a full-looking final block (the
            // RS-framed, padded tail landing exactly on `FULL_ENCODED_BLOCK_LEN`) reads back as a
            // full read too, so "last" is determined from the known ciphertext length instead.
            let is_last_read = done + n as u64 >= stream_total;

            let mut plaintext;
            if reedsolo {
                let decoded = frame::decode_block(chunk, &suite, fast_decode, is_last_read, header_fields.tail_padded());
                if !decoded.ok && !fast_decode {
                    irrecoverable = true;
                }
                mac.update(&decoded.payload);
                plaintext = decoded.payload;
            } else {
                mac.update(chunk);
                plaintext = chunk.to_vec();
            }

            stream.decrypt_block(&mut plaintext);
            final_bytes.extend_from_slice(&plaintext);

            done += n as u64;
            progress.on_progress(ProgressEvent {
                phase: if fast_decode { Phase::Decrypt } else { Phase::Repair },
                bytes_done: done,
                bytes_total: stream_total,
            });

            if counters.advance(plaintext.len() as u64) {
                let next_nonce = hkdf.read_n();
                let next_iv = hkdf.read_n();
                stream = StreamCipherStack::new(
                    &master,
                    &next_nonce,
                    serpent_key.as_ref(),
                    header_fields.paranoid().then_some(&next_iv),
                );
            }
        }

        if irrecoverable {
            let err = VolumeError::Irrecoverable;
            if config.force_decrypt && err.is_downgradable() {
                kept = true;
            } else {
                return Err(err);
            }
        }

        let auth_tag = mac.finalize();
        if tags_equal(&auth_tag, &header_fields.auth_tag) {
            break;
        }

        if reedsolo && fast_decode {
            fast_decode = false;
            continue;
        }

        let err = VolumeError::Modified;
        if config.force_decrypt && err.is_downgradable() {
            kept = true;
            break;
        }
        return Err(err);
    }

    output.write_all(&final_bytes)?;
    Ok(DecryptOutcome { kept })
}

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgress;
    use crate::volume_config::KeyMaterial;
    use secrecy::SecretString;

    fn config(paranoid: bool, full_reed_solomon: bool, password: &str) -> VolumeConfig {
        VolumeConfig {
            paranoid,
            full_reed_solomon,
            deniability: false,
            force_decrypt: false,
            comments: Vec::new(),
            key_material: KeyMaterial {
                password: SecretString::from(password.to_string()),
                keyfiles: Vec::new(),
                keyfile_ordered: false,
            },
        }
    }

    fn roundtrip(plaintext: &[u8], paranoid: bool, full_reed_solomon: bool) -> Vec<u8> {
        let cfg = config(paranoid, full_reed_solomon, "correct horse battery staple");
        let mut encrypted = Cursor::new(Vec::new());
        encrypt(
            Cursor::new(plaintext.to_vec()),
            &mut encrypted,
            plaintext.len() as u64,
            &cfg,
            &mut NullProgress,
            &CancelToken::new(),
        )
        .unwrap();

        let total_len = encrypted.get_ref().len() as u64;
        let mut decrypted = Vec::new();
        let outcome = decrypt(
            Cursor::new(encrypted.into_inner()),
            &mut decrypted,
            total_len,
            &cfg,
            &mut NullProgress,
            &CancelToken::new(),
        )
        .unwrap();
        assert!(!outcome.kept);
        decrypted
    }

    #[test]
    fn tiny_plaintext_roundtrips_in_normal_mode() {
        let plaintext = b"hello volume".to_vec();
        assert_eq!(roundtrip(&plaintext, false, false), plaintext);
    }

    #[test]
    fn tiny_plaintext_roundtrips_in_paranoid_mode() {
        let plaintext = b"paranoid hello".to_vec();
        assert_eq!(roundtrip(&plaintext, true, false), plaintext);
    }

    #[test]
    fn multi_block_plaintext_roundtrips() {
        let plaintext: Vec<u8> = (0..(config::BLOCK_SIZE * 2 + 777)).map(|i| (i % 251) as u8).collect();
        assert_eq!(roundtrip(&plaintext, false, false), plaintext);
    }

    #[test]
    fn reed_solomon_framed_roundtrip_on_a_block_aligned_size() {
        let plaintext = vec![0x5Au8; config::BLOCK_SIZE];
        assert_eq!(roundtrip(&plaintext, false, true), plaintext);
    }

    #[test]
    fn reed_solomon_framed_roundtrip_on_a_short_size() {
        let plaintext = b"short reed-solomon framed volume".to_vec();
        assert_eq!(roundtrip(&plaintext, true, true), plaintext);
    }

    #[test]
    fn reed_solomon_framed_roundtrip_on_the_ambiguous_full_looking_tail() {
        let plaintext = vec![0x77u8; config::BLOCK_SIZE - 5];
        assert_eq!(roundtrip(&plaintext, false, true), plaintext);
    }

    #[test]
    fn wrong_password_is_rejected_before_any_output_is_trusted() {
        let cfg = config(false, false, "right password");
        let plaintext = b"secret contents".to_vec();
        let mut encrypted = Cursor::new(Vec::new());
        encrypt(Cursor::new(plaintext.clone()), &mut encrypted, plaintext.len() as u64, &cfg, &mut NullProgress, &CancelToken::new())
            .unwrap();

        let wrong_cfg = config(false, false, "wrong password");
        let total_len = encrypted.get_ref().len() as u64;
        let mut decrypted = Vec::new();
        let err = decrypt(Cursor::new(encrypted.into_inner()), &mut decrypted, total_len, &wrong_cfg, &mut NullProgress, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, VolumeError::BadPassword));
    }

    #[test]
    fn a_single_flipped_byte_is_transparently_repaired_under_reed_solomon_framing() {
        let cfg = config(false, true, "repair me");
        let plaintext: Vec<u8> = (0..(config::BLOCK_SIZE + 4000)).map(|i| (i % 200) as u8).collect();
        let mut encrypted = Cursor::new(Vec::new());
        encrypt(Cursor::new(plaintext.clone()), &mut encrypted, plaintext.len() as u64, &cfg, &mut NullProgress, &CancelToken::new())
            .unwrap();

        let mut bytes = encrypted.into_inner();
        // Flip one bit deep in the ciphertext stream (past the header), inside a single RS frame;
        // RS(128,136) tolerates up to 4 byte errors per frame.
        let flip_at = bytes.len() / 2;
        bytes[flip_at] ^= 0x01;

        let total_len = bytes.len() as u64;
        let mut decrypted = Vec::new();
        let outcome = decrypt(Cursor::new(bytes), &mut decrypted, total_len, &cfg, &mut NullProgress, &CancelToken::new()).unwrap();
        assert!(!outcome.kept);
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn duplicate_keyfiles_abort_before_header_is_written() {
        let cfg = VolumeConfig {
            paranoid: false,
            full_reed_solomon: false,
            deniability: false,
            force_decrypt: false,
            comments: Vec::new(),
            key_material: KeyMaterial {
                password: SecretString::from("pw".to_string()),
                keyfiles: vec![b"same".to_vec(), b"same".to_vec()],
                keyfile_ordered: false,
            },
        };
        let plaintext = b"never written".to_vec();
        let mut encrypted = Cursor::new(Vec::new());
        let err = encrypt(Cursor::new(plaintext), &mut encrypted, 14, &cfg, &mut NullProgress, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, VolumeError::DuplicateKeyfiles));
        assert!(encrypted.into_inner().is_empty());
    }
}
