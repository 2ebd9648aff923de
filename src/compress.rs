use byteorder::{ByteOrder, LittleEndian};
use once_cell::sync::Lazy;

use crate::{CVWords, Flags, BLOCK_LEN};

/// IV is the initialization vector shared with SHA-256. It seeds the default hash mode and the
/// third quarter of every compression state.
pub const IV: CVWords = [
    0x6A09E667, 0xBB67AE85, 0x3C6EF372, 0xA54FF53A, 0x510E527F, 0x9B05688C, 0x1F83D9AB, 0x5BE0CD19,
];

/// MSG_PERMUTATION re-indexes the message words between two consecutive rounds.
pub const MSG_PERMUTATION: [usize; 16] = [2, 6, 3, 10, 7, 0, 4, 13, 1, 11, 12, 5, 9, 14, 15, 8];

const ROUNDS: usize = 7;

// Row r holds, for each message slot, the index of the original word used in round r.
static MSG_SCHEDULE: Lazy<[[usize; 16]; ROUNDS]> = Lazy::new(|| {
    let mut schedule = [[0; 16]; ROUNDS];
    (0..16).for_each(|i| schedule[0][i] = i);
    (1..ROUNDS).for_each(|r| {
        (0..16).for_each(|i| schedule[r][i] = schedule[r - 1][MSG_PERMUTATION[i]]);
    });
    schedule
});

/// Compressor represents the round function applied to a 16-word compression state.
///
/// Implementations only differ in how they walk the message words; the state setup and the
/// finishing xor are shared by [`compress`](Compressor::compress) and
/// [`compress_xof`](Compressor::compress_xof). A vectorized backend would plug in here.
pub trait Compressor: Copy + Default + Send + Sync {
    /// rounds runs all 7 rounds over state, reading the block words m.
    fn rounds(&self, state: &mut [u32; 16], m: &[u32; 16]);

    /// compress returns the chaining value produced by one block.
    fn compress(
        &self,
        cv: &CVWords,
        block: &[u8; BLOCK_LEN],
        block_len: u8,
        counter: u64,
        flags: Flags,
    ) -> CVWords {
        let state = compress_pre(self, cv, block, block_len, counter, flags);
        let mut out = [0; 8];
        (0..8).for_each(|i| out[i] = state[i] ^ state[i + 8]);
        out
    }

    /// compress_xof returns the full 64-byte block of extendable output for one counter value.
    fn compress_xof(
        &self,
        cv: &CVWords,
        block: &[u8; BLOCK_LEN],
        block_len: u8,
        counter: u64,
        flags: Flags,
    ) -> [u8; BLOCK_LEN] {
        let mut state = compress_pre(self, cv, block, block_len, counter, flags);
        (0..8).for_each(|i| {
            state[i] ^= state[i + 8];
            state[i + 8] ^= cv[i];
        });
        let mut out = [0; BLOCK_LEN];
        LittleEndian::write_u32_into(&state, &mut out);
        out
    }
}

fn compress_pre<C: Compressor>(
    c: &C,
    cv: &CVWords,
    block: &[u8; BLOCK_LEN],
    block_len: u8,
    counter: u64,
    flags: Flags,
) -> [u32; 16] {
    let mut m = [0u32; 16];
    LittleEndian::read_u32_into(block, &mut m);

    let mut state = [0u32; 16];
    state[0..8].copy_from_slice(cv);
    state[8..12].copy_from_slice(&IV[0..4]);
    state[12] = counter as u32;
    state[13] = (counter >> 32) as u32;
    state[14] = block_len as u32;
    state[15] = flags.bits() as u32;

    c.rounds(&mut state, &m);
    state
}

#[inline(always)]
fn g(state: &mut [u32; 16], a: usize, b: usize, c: usize, d: usize, x: u32, y: u32) {
    state[a] = state[a].wrapping_add(state[b]).wrapping_add(x);
    state[d] = (state[d] ^ state[a]).rotate_right(16);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] = (state[b] ^ state[c]).rotate_right(12);
    state[a] = state[a].wrapping_add(state[b]).wrapping_add(y);
    state[d] = (state[d] ^ state[a]).rotate_right(8);
    state[c] = state[c].wrapping_add(state[d]);
    state[b] = (state[b] ^ state[c]).rotate_right(7);
}

// One round: mix the columns, then the diagonals. word(i) yields the i-th message word of the
// round.
#[inline(always)]
fn round(state: &mut [u32; 16], word: impl Fn(usize) -> u32) {
    g(state, 0, 4, 8, 12, word(0), word(1));
    g(state, 1, 5, 9, 13, word(2), word(3));
    g(state, 2, 6, 10, 14, word(4), word(5));
    g(state, 3, 7, 11, 15, word(6), word(7));

    g(state, 0, 5, 10, 15, word(8), word(9));
    g(state, 1, 6, 11, 12, word(10), word(11));
    g(state, 2, 7, 8, 13, word(12), word(13));
    g(state, 3, 4, 9, 14, word(14), word(15));
}

/// Reference permutes a copy of the message words after every round.
#[derive(Clone, Copy, Debug, Default)]
pub struct Reference;

impl Compressor for Reference {
    fn rounds(&self, state: &mut [u32; 16], m: &[u32; 16]) {
        let mut m = *m;
        for r in 0..ROUNDS {
            round(state, |i| m[i]);
            if r + 1 < ROUNDS {
                let prev = m;
                (0..16).for_each(|i| m[i] = prev[MSG_PERMUTATION[i]]);
            }
        }
    }
}

/// Portable reads the message words through a precomputed schedule, so the words are never
/// moved. It is the default compressor of [`Hasher`](crate::Hasher).
#[derive(Clone, Copy, Debug, Default)]
pub struct Portable;

impl Compressor for Portable {
    fn rounds(&self, state: &mut [u32; 16], m: &[u32; 16]) {
        for s in MSG_SCHEDULE.iter() {
            round(state, |i| m[s[i]]);
        }
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn schedule() {
        let expected: [[usize; 16]; ROUNDS] = [
            [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
            [2, 6, 3, 10, 7, 0, 4, 13, 1, 11, 12, 5, 9, 14, 15, 8],
            [3, 4, 10, 12, 13, 2, 7, 14, 6, 5, 9, 0, 11, 15, 8, 1],
            [10, 7, 12, 9, 14, 3, 13, 15, 4, 0, 11, 2, 5, 8, 1, 6],
            [12, 13, 9, 11, 15, 10, 14, 8, 7, 2, 5, 3, 0, 1, 6, 4],
            [9, 14, 11, 5, 8, 12, 15, 1, 13, 3, 0, 10, 2, 6, 4, 7],
            [11, 15, 5, 0, 1, 9, 8, 6, 14, 10, 2, 12, 3, 4, 7, 13],
        ];
        assert_eq!(*MSG_SCHEDULE, expected);
    }

    #[test]
    fn compression() {
        (0..1000).for_each(|_| {
            let mut block = [0u8; BLOCK_LEN];
            block.iter_mut().for_each(|b| *b = rand::random());
            let cv: CVWords = rand::random();
            let block_len = rand::random::<u8>() % (BLOCK_LEN as u8 + 1);
            let counter = rand::random::<u64>();
            let flags = Flags::from_bits_truncate(rand::random());

            assert_eq!(
                Reference.compress(&cv, &block, block_len, counter, flags),
                Portable.compress(&cv, &block, block_len, counter, flags),
                "reference and portable chaining values are different"
            );
            assert_eq!(
                Reference.compress_xof(&cv, &block, block_len, counter, flags),
                Portable.compress_xof(&cv, &block, block_len, counter, flags),
                "reference and portable xof blocks are different"
            );
        });
    }

    #[test]
    fn xof_prefix_is_chaining_value() {
        let block = [0x5a; BLOCK_LEN];
        let flags = Flags::CHUNK_START | Flags::CHUNK_END;
        let cv = Portable.compress(&IV, &block, 64, 3, flags);
        let wide = Portable.compress_xof(&IV, &block, 64, 3, flags);

        let mut cv_bytes = [0u8; 32];
        LittleEndian::write_u32_into(&cv, &mut cv_bytes);
        assert_eq!(&wide[..32], &cv_bytes);
    }

    #[test]
    fn empty_message() {
        // The empty message is a single empty block, compressed as a root chunk.
        let flags = Flags::CHUNK_START | Flags::CHUNK_END | Flags::ROOT;
        let wide = Portable.compress_xof(&IV, &[0; BLOCK_LEN], 0, 0, flags);
        assert_eq!(
            hex::encode(&wide[..32]),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }
}
