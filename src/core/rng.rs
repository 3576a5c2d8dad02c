//! Seeded Randomness
//!
//! Xorshift128+ seeded through SplitMix64. The initial loot layout is drawn
//! from it on the hub and again on every client, so the draw order is part
//! of the protocol: changing it breaks replicas.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Xorshift128+ generator.
///
/// The same seed yields the same stream everywhere:
///
/// ```
/// use train_heist::core::rng::DeterministicRng;
///
/// let mut hub = DeterministicRng::new(7);
/// let mut client = DeterministicRng::new(7);
/// assert_eq!(hub.next_int(3), client.next_int(3));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl DeterministicRng {
    /// Seed a generator.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state = [splitmix64(&mut s), splitmix64(&mut s)];
        // All-zero state would only ever produce zeros
        if state == [0, 0] {
            Self { state: [1, 1] }
        } else {
            Self { state }
        }
    }

    /// Next raw 64-bit output.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let [s0, mut s1] = self.state;
        let out = s0.wrapping_add(s1);
        s1 ^= s0;
        self.state = [s0.rotate_left(24) ^ s1 ^ (s1 << 16), s1.rotate_left(37)];
        out
    }

    /// Uniform-ish value in `0..bound`; 0 when `bound` is 0.
    #[inline]
    pub fn next_int(&mut self, bound: u32) -> u32 {
        match u64::from(bound) {
            0 => 0,
            b => (self.next_u64() % b) as u32,
        }
    }

    /// True about once in `n` calls.
    #[inline]
    pub fn one_in(&mut self, n: u32) -> bool {
        self.next_int(n) == 0
    }

    /// A random element of `items`.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        let len = u32::try_from(items.len()).ok()?;
        if len == 0 {
            return None;
        }
        items.get(self.next_int(len) as usize)
    }
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

/// One SplitMix64 step; expands a seed into generator state.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Seed for game number `game_number` of a hub started with `base_seed`.
///
/// Distinct per game, reproducible per hub.
pub fn derive_game_seed(base_seed: u64, game_number: u64) -> u64 {
    let digest = Sha256::new()
        .chain_update(b"TRAIN_HEIST_SEED_V1")
        .chain_update(base_seed.to_le_bytes())
        .chain_update(game_number.to_le_bytes())
        .finalize();

    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(head)
}

// =============================================================================
// TESTS
// =============================================================================
