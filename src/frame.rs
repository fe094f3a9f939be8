//! RS inner framing (FRM): chops a stream cipher block into 128-byte frames, RS(128,136)-encodes
//! each one, and handles the PKCS#7-style tail padding needed when a block doesn't end on a
//! clean 128-byte boundary.
//!
//! The encode side mirrors the volume engine's 1 MiB read loop directly: a block shorter than
//! `BLOCK_SIZE` can only be the final block of the stream (the reader only returns a short read
//! at EOF), so "pad the tail" and "is this the final block" are the same condition. The decode
//! side has to recover that same fact from the ciphertext alone, which is ambiguous in exactly
//! one case — see `decode_block` below — and that's what `tail_padded` in the header resolves.

use crate::config::{BLOCK_SIZE, FRAME_ENCODED_LEN, FRAME_PAYLOAD_LEN};
use crate::rs::{Decoded, Rate, RsSuite};

/// Size, in encoded bytes, of one full `BLOCK_SIZE` plaintext block once every 128-byte chunk
/// has been expanded to 136 bytes: `8192 * 136`.
pub const FULL_ENCODED_BLOCK_LEN: usize = (BLOCK_SIZE / FRAME_PAYLOAD_LEN) * FRAME_ENCODED_LEN;

fn pad_tail(data: &[u8]) -> [u8; FRAME_PAYLOAD_LEN] {
    debug_assert!(data.len() < FRAME_PAYLOAD_LEN);
    let pad_len = (FRAME_PAYLOAD_LEN - data.len()) as u8;
    let mut out = [pad_len; FRAME_PAYLOAD_LEN];
    out[..data.len()].copy_from_slice(data);
    out
}

fn unpad_tail(frame: &[u8; FRAME_PAYLOAD_LEN]) -> &[u8] {
    let pad_len = frame[FRAME_PAYLOAD_LEN - 1] as usize;
    let keep = FRAME_PAYLOAD_LEN.saturating_sub(pad_len);
    &frame[..keep]
}

/// Whether a plaintext length of exactly `total` bytes triggers the ambiguous "full-looking
/// final block" case that needs the `tail_padded` header flag to disambiguate at decode time.
pub fn tail_padded_flag(total_plaintext_len: u64) -> bool {
    let block = BLOCK_SIZE as u64;
    let payload = FRAME_PAYLOAD_LEN as u64;
    let remainder = total_plaintext_len % block;
    remainder != 0 && remainder >= block - payload
}

/// Encodes one plaintext block (already stream-ciphered) into its RS(128,136) frame sequence.
/// `full_block` is true when this is a complete, non-final `BLOCK_SIZE`-byte read; a short read
/// (necessarily the final block, since the reader only returns less than `BLOCK_SIZE` at EOF)
/// gets its remainder PKCS#7-padded into one extra frame, even if the remainder is itself an
/// exact multiple of 128 (then the padded frame is a full 128-byte pad block).
pub fn encode_block(payload: &[u8], suite: &RsSuite, full_block: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len().div_ceil(FRAME_PAYLOAD_LEN) * FRAME_ENCODED_LEN);
    let mut offset = 0;
    while payload.len() - offset >= FRAME_PAYLOAD_LEN {
        out.extend(suite.encode(Rate::R128_136, &payload[offset..offset + FRAME_PAYLOAD_LEN]));
        offset += FRAME_PAYLOAD_LEN;
    }
    if !full_block {
        let tail = pad_tail(&payload[offset..]);
        out.extend(suite.encode(Rate::R128_136, &tail));
    }
    out
}

pub struct DecodedBlock {
    pub payload: Vec<u8>,
    pub ok: bool,
}

/// Decodes one ciphertext block's frame sequence back into plaintext bytes.
///
/// `is_last_read` must be true only for the final read of the whole ciphertext stream. Two
/// cases need the tail unpadded:
/// - `encoded_block.len() < FULL_ENCODED_BLOCK_LEN`: this can only be the genuinely short final
///   block, so its last frame is always padded and always gets unpadded.
/// - `encoded_block.len() == FULL_ENCODED_BLOCK_LEN` and it is the last read: this looks
///   identical to an ordinary full block, so the `tail_padded` header flag is the only way to
///   know whether its last frame is real data or a pad block.
pub fn decode_block(
    encoded_block: &[u8],
    suite: &RsSuite,
    fast_decode: bool,
    is_last_read: bool,
    tail_padded: bool,
) -> DecodedBlock {
    let frame_count = encoded_block.len() / FRAME_ENCODED_LEN;
    let mut payload = Vec::with_capacity(frame_count * FRAME_PAYLOAD_LEN);
    let mut ok = true;

    let short_final_block = is_last_read && encoded_block.len() < FULL_ENCODED_BLOCK_LEN;
    let full_looking_final_block =
        is_last_read && encoded_block.len() == FULL_ENCODED_BLOCK_LEN && tail_padded;
    let unpad_last_frame = short_final_block || full_looking_final_block;

    for (i, chunk) in encoded_block.chunks_exact(FRAME_ENCODED_LEN).enumerate() {
        let mut frame = [0u8; FRAME_PAYLOAD_LEN];
        if fast_decode {
            frame.copy_from_slice(&RsSuite::fast_decode_frame(chunk));
        } else {
            let Decoded { data, ok: frame_ok } = suite.decode(Rate::R128_136, chunk);
            ok &= frame_ok;
            frame.copy_from_slice(&data);
        }

        if i + 1 == frame_count && unpad_last_frame {
            payload.extend_from_slice(unpad_tail(&frame));
        } else {
            payload.extend_from_slice(&frame);
        }
    }

    DecodedBlock { payload, ok }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_block_has_no_padding() {
        let suite = RsSuite::new();
        let payload = vec![0xABu8; BLOCK_SIZE];
        let encoded = encode_block(&payload, &suite, true);
        assert_eq!(encoded.len(), FULL_ENCODED_BLOCK_LEN);

        let decoded = decode_block(&encoded, &suite, false, true, false);
        assert!(decoded.ok);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn short_block_is_padded_and_unpadded() {
        let suite = RsSuite::new();
        let payload = vec![0x11u8; 127];
        let encoded = encode_block(&payload, &suite, false);
        assert_eq!(encoded.len(), FRAME_ENCODED_LEN);

        let decoded = decode_block(&encoded, &suite, false, true, false);
        assert!(decoded.ok);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn exactly_128_aligned_short_block_still_gets_a_pad_frame() {
        let suite = RsSuite::new();
        let payload = vec![0x22u8; 256];
        let encoded = encode_block(&payload, &suite, false);
        // 2 real frames + 1 full pad frame.
        assert_eq!(encoded.len(), 3 * FRAME_ENCODED_LEN);

        let decoded = decode_block(&encoded, &suite, false, true, false);
        assert!(decoded.ok);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn full_looking_final_block_needs_the_tail_padded_flag() {
        let suite = RsSuite::new();
        // A block one frame short of full, so padding brings it back up to the full encoded
        // size; tail_padded=true is required to know the last frame must be unpadded.
        let payload = vec![0x33u8; BLOCK_SIZE - FRAME_PAYLOAD_LEN + 5];
        let encoded = encode_block(&payload, &suite, false);
        assert_eq!(encoded.len(), FULL_ENCODED_BLOCK_LEN);
        assert!(tail_padded_flag(payload.len() as u64));

        let decoded = decode_block(&encoded, &suite, false, true, true);
        assert!(decoded.ok);
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn fast_decode_skips_repair_but_still_unpads() {
        let suite = RsSuite::new();
        let payload = vec![0x44u8; 10];
        let encoded = encode_block(&payload, &suite, false);
        let decoded = decode_block(&encoded, &suite, true, true, false);
        assert_eq!(decoded.payload, payload);
    }
}
