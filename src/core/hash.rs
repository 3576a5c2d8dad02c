//! State Digests
//!
//! SHA-256 over the replicated parts of a game. Hub and clients feed the
//! same fields in the same order, so equal digests mean equal games.

use sha2::{Digest, Sha256};

/// A 32-byte state digest.
pub type StateHash = [u8; 32];

/// Domain tag for game-state digests.
const GAME_STATE_DOMAIN: &[u8] = b"TRAIN_HEIST_STATE_V1";

/// Incremental digest builder.
///
/// Integers are fed little-endian at fixed width; `usize` is widened to
/// 64 bits so 32- and 64-bit builds agree.
pub struct StateHasher {
    inner: Sha256,
}

macro_rules! feed_le {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Feed a `", stringify!($ty), "`.")]
            #[inline]
            pub fn $name(&mut self, value: $ty) {
                self.inner.update(value.to_le_bytes());
            }
        )*
    };
}

impl StateHasher {
    /// Start a digest tagged with `domain`.
    pub fn new(domain: &[u8]) -> Self {
        Self { inner: Sha256::new_with_prefix(domain) }
    }

    /// Start a game-state digest.
    pub fn for_game_state() -> Self {
        Self::new(GAME_STATE_DOMAIN)
    }

    feed_le!(update_u8: u8, update_u32: u32, update_u64: u64);

    /// Feed raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Feed a `usize` as a `u64`.
    #[inline]
    pub fn update_usize(&mut self, value: usize) {
        self.update_u64(value as u64);
    }

    /// Feed a string, prefixed with its length so neighbours can't blur.
    pub fn update_str(&mut self, value: &str) {
        self.update_usize(value.len());
        self.update_bytes(value.as_bytes());
    }

    /// Finish.
    pub fn finalize(self) -> StateHash {
        self.inner.finalize().into()
    }
}

/// Digest a game of `width` cars seeded with `seed`; `add_state` feeds the rest.
pub fn compute_state_hash<F>(width: usize, seed: u64, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_game_state();
    hasher.update_usize(width);
    hasher.update_u64(seed);
    add_state(&mut hasher);
    hasher.finalize()
}
