//! Systematic byte-shard Reed-Solomon codec over GF(256).
//!
//! Each configured `(k, n)` rate treats every one of the `k` input bytes as its own one-byte
//! data shard and produces `n - k` one-byte parity shards; `encode` concatenates all `n` shards
//! in order, so output byte `i` is exactly share `i`'s datum. This gives the header fields and
//! the inner framing the same codec with a single, trivial shard layout (shard size is always
//! one byte), at the cost of needing a distinct encoder instance per rate.

use reed_solomon_erasure::galois_8::ReedSolomon as RsEncoder;

use crate::config::{FRAME_ENCODED_LEN, FRAME_PAYLOAD_LEN};

/// One of the seven fixed `(k, n)` rates used across the header fields and the inner frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rate {
    R1_3,
    R5_15,
    R16_48,
    R24_72,
    R32_96,
    R64_192,
    R128_136,
}

impl Rate {
    pub const fn k(self) -> usize {
        match self {
            Rate::R1_3 => 1,
            Rate::R5_15 => 5,
            Rate::R16_48 => 16,
            Rate::R24_72 => 24,
            Rate::R32_96 => 32,
            Rate::R64_192 => 64,
            Rate::R128_136 => FRAME_PAYLOAD_LEN,
        }
    }

    pub const fn n(self) -> usize {
        match self {
            Rate::R1_3 => 3,
            Rate::R5_15 => 15,
            Rate::R16_48 => 48,
            Rate::R24_72 => 72,
            Rate::R32_96 => 96,
            Rate::R64_192 => 192,
            Rate::R128_136 => FRAME_ENCODED_LEN,
        }
    }
}

/// Result of a decode attempt: the systematic (first `k` bytes) payload, plus whether
/// reconstruction actually succeeded. Callers in force-decrypt mode may use `data` even when
/// `ok` is false.
pub struct Decoded {
    pub data: Vec<u8>,
    pub ok: bool,
}

/// Holds one precomputed encoder per rate so hot paths (the inner frame loop runs once per
/// 128 bytes of the whole stream) don't rebuild GF(256) tables per call.
pub struct RsSuite {
    r1_3: RsEncoder,
    r5_15: RsEncoder,
    r16_48: RsEncoder,
    r24_72: RsEncoder,
    r32_96: RsEncoder,
    r64_192: RsEncoder,
    r128_136: RsEncoder,
}

impl RsSuite {
    pub fn new() -> Self {
        let build = |rate: Rate| {
            RsEncoder::new(rate.k(), rate.n() - rate.k())
                .unwrap_or_else(|e| panic!("invalid reed-solomon rate {:?}: {e}", rate))
        };
        Self {
            r1_3: build(Rate::R1_3),
            r5_15: build(Rate::R5_15),
            r16_48: build(Rate::R16_48),
            r24_72: build(Rate::R24_72),
            r32_96: build(Rate::R32_96),
            r64_192: build(Rate::R64_192),
            r128_136: build(Rate::R128_136),
        }
    }

    fn encoder(&self, rate: Rate) -> &RsEncoder {
        match rate {
            Rate::R1_3 => &self.r1_3,
            Rate::R5_15 => &self.r5_15,
            Rate::R16_48 => &self.r16_48,
            Rate::R24_72 => &self.r24_72,
            Rate::R32_96 => &self.r32_96,
            Rate::R64_192 => &self.r64_192,
            Rate::R128_136 => &self.r128_136,
        }
    }

    /// Encodes exactly `rate.k()` bytes into `rate.n()` bytes.
    pub fn encode(&self, rate: Rate, data: &[u8]) -> Vec<u8> {
        assert_eq!(data.len(), rate.k(), "reed-solomon encode expects exactly k bytes");
        let mut shards: Vec<Vec<u8>> = data.iter().map(|&b| vec![b]).collect();
        shards.resize(rate.n(), vec![0u8]);
        self.encoder(rate).encode(&mut shards).expect("shard count matches configured rate");
        shards.into_iter().map(|s| s[0]).collect()
    }

    /// Decodes exactly `rate.n()` bytes, returning the systematic `rate.k()`-byte prefix.
    ///
    /// On reconstruction failure, `Decoded.ok` is false but `Decoded.data` still holds
    /// whatever systematic bytes were present in the input (the force-decrypt contract).
    pub fn decode(&self, rate: Rate, encoded: &[u8]) -> Decoded {
        assert_eq!(encoded.len(), rate.n(), "reed-solomon decode expects exactly n bytes");
        let prefix: Vec<u8> = encoded[..rate.k()].to_vec();

        let mut shards: Vec<Option<Vec<u8>>> =
            encoded.iter().map(|&b| Some(vec![b])).collect();
        match self.encoder(rate).reconstruct(&mut shards) {
            Ok(()) => {
                let data: Vec<u8> =
                    shards[..rate.k()].iter().map(|s| s.as_ref().unwrap()[0]).collect();
                Decoded { data, ok: true }
            }
            Err(_) => Decoded { data: prefix, ok: false },
        }
    }

    /// Bypasses real decoding for the (128,136) inner-framing rate: returns the first 128 bytes
    /// unchanged. Used on the first ("fast") decrypt pass.
    pub fn fast_decode_frame(encoded: &[u8]) -> Vec<u8> {
        debug_assert_eq!(encoded.len(), FRAME_ENCODED_LEN);
        encoded[..FRAME_PAYLOAD_LEN].to_vec()
    }
}

impl Default for RsSuite {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_all_rates() {
        let suite = RsSuite::new();
        for rate in [
            Rate::R1_3,
            Rate::R5_15,
            Rate::R16_48,
            Rate::R24_72,
            Rate::R32_96,
            Rate::R64_192,
            Rate::R128_136,
        ] {
            let data: Vec<u8> = (0..rate.k()).map(|i| (i * 7 + 3) as u8).collect();
            let encoded = suite.encode(rate, &data);
            assert_eq!(encoded.len(), rate.n());
            let decoded = suite.decode(rate, &encoded);
            assert!(decoded.ok);
            assert_eq!(decoded.data, data);
        }
    }

    #[test]
    fn frame_rate_tolerates_four_byte_errors_but_not_five() {
        let suite = RsSuite::new();
        let data: Vec<u8> = (0..128u16).map(|i| i as u8).collect();
        let encoded = suite.encode(Rate::R128_136, &data);

        let mut corrupted = encoded.clone();
        for i in 0..4 {
            corrupted[i] = corrupted[i].wrapping_add(1);
        }
        let decoded = suite.decode(Rate::R128_136, &corrupted);
        assert!(decoded.ok);
        assert_eq!(decoded.data, data);

        let mut over_corrupted = encoded;
        for i in 0..5 {
            over_corrupted[i] = over_corrupted[i].wrapping_add(1);
        }
        let decoded = suite.decode(Rate::R128_136, &over_corrupted);
        assert!(!decoded.ok || decoded.data != data);
    }

    #[test]
    fn fast_decode_bypasses_repair() {
        let suite = RsSuite::new();
        let data: Vec<u8> = (0..128u16).map(|i| i as u8).collect();
        let encoded = suite.encode(Rate::R128_136, &data);
        assert_eq!(RsSuite::fast_decode_frame(&encoded), data);
    }
}
