use anyhow::{Context, Result};
use arrayvec::ArrayVec;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::io;

use crate::chunk::ChunkState;
use crate::compress::{Compressor, Portable, IV};
use crate::join::{Join, SerialJoin};
use crate::output::{Output, OutputReader};
use crate::{CVBytes, CVWords, Flags, CHUNK_LEN, KEY_LEN, MAX_DEPTH, OUT_LEN};

/// Mode selects the root key and mode flags of a [`Hasher`].
#[derive(Clone, Copy, Debug)]
pub enum Mode<'a> {
    /// Plain hashing, keyed with the IV.
    Hash,
    /// Keyed hashing with a caller-supplied 32-byte key.
    Keyed(&'a [u8; KEY_LEN]),
    /// Key derivation: the context is hashed into the key used for the key material.
    DeriveKey(&'a [u8]),
}

/// Hasher is an incremental BLAKE3 hasher.
///
/// Input is hashed in 1024-byte chunks. The chaining values of complete subtrees wait on a
/// stack until their right sibling is done; after N complete chunks the stack holds one entry
/// per bit set in N, like the carries of a binary counter. Finalizing does not consume the
/// hasher, so it can keep absorbing input afterwards.
#[derive(Clone)]
pub struct Hasher<C: Compressor = Portable> {
    c: C,
    key: CVWords,
    chunk: ChunkState<C>,
    cv_stack: ArrayVec<CVBytes, { MAX_DEPTH + 1 }>,
}

impl Hasher {
    /// new returns a hasher for the default hash mode.
    pub fn new() -> Self {
        Self::with_mode(Portable, Mode::Hash)
    }

    /// new_keyed returns a hasher for the keyed hash mode.
    pub fn new_keyed(key: &[u8; KEY_LEN]) -> Self {
        Self::with_mode(Portable, Mode::Keyed(key))
    }

    /// new_derive_key returns a hasher for the key derivation mode. The context string should be
    /// hardcoded, globally unique and application-specific.
    pub fn new_derive_key(context: &str) -> Self {
        Self::with_mode(Portable, Mode::DeriveKey(context.as_bytes()))
    }

    /// new_derive_key_raw is [`new_derive_key`](Hasher::new_derive_key) for a context which is
    /// not valid UTF-8.
    pub fn new_derive_key_raw(context: &[u8]) -> Self {
        Self::with_mode(Portable, Mode::DeriveKey(context))
    }
}

impl<C: Compressor> Hasher<C> {
    fn new_internal(c: C, key: &CVWords, flags: Flags) -> Self {
        Self {
            c,
            key: *key,
            chunk: ChunkState::new(c, key, 0, flags),
            cv_stack: ArrayVec::new(),
        }
    }

    /// with_mode returns a hasher running on compressor c in the given mode.
    pub fn with_mode(c: C, mode: Mode<'_>) -> Self {
        match mode {
            Mode::Hash => Self::new_internal(c, &IV, Flags::empty()),
            Mode::Keyed(key) => {
                let mut key_words = [0; 8];
                LittleEndian::read_u32_into(key, &mut key_words);
                Self::new_internal(c, &key_words, Flags::KEYED_HASH)
            }
            Mode::DeriveKey(context) => {
                let mut context_hasher = Self::new_internal(c, &IV, Flags::DERIVE_KEY_CONTEXT);
                context_hasher.update(context);
                let context_key = context_hasher.finalize();
                let mut key_words = [0; 8];
                LittleEndian::read_u32_into(&context_key, &mut key_words);
                Self::new_internal(c, &key_words, Flags::DERIVE_KEY_MATERIAL)
            }
        }
    }

    /// reset returns the hasher to its initial state, keeping its key and mode.
    pub fn reset(&mut self) -> &mut Self {
        self.chunk.reset(&self.key, 0);
        self.cv_stack.clear();
        self
    }

    /// count returns the number of input bytes hashed since construction or the last reset.
    pub fn count(&self) -> u64 {
        self.chunk.chunk_counter * CHUNK_LEN as u64 + self.chunk.len() as u64
    }

    // merge_cv_stack merges the top of the stack into parent nodes until it holds exactly one
    // entry per bit set in total_chunks, the number of chunks already pushed.
    //
    // A CV is only merged once its right sibling has been pushed, so the chunk or subtree pushed
    // last is never merged here. It may still turn out to be the root's child, which only
    // finalize can combine.
    fn merge_cv_stack(&mut self, total_chunks: u64) {
        let post_merge_stack_len = total_chunks.count_ones() as usize;
        while self.cv_stack.len() > post_merge_stack_len {
            let right_child = self.cv_stack[self.cv_stack.len() - 1];
            let left_child = self.cv_stack[self.cv_stack.len() - 2];
            let parent =
                Output::parent(self.c, &left_child, &right_child, &self.key, self.chunk.flags);
            self.cv_stack.pop();
            self.cv_stack.pop();
            self.cv_stack.push(parent.chaining_value());
        }
    }

    // push_cv pushes the CV of the subtree starting at chunk chunk_counter, after performing the
    // merges owed by the chunk_counter chunks before it.
    fn push_cv(&mut self, new_cv: &CVBytes, chunk_counter: u64) {
        self.merge_cv_stack(chunk_counter);
        // Overflowing the stack takes more than 2^64 bytes of input.
        self.cv_stack.push(*new_cv);
    }

    /// update absorbs input. Any split of the input across calls gives the same hash.
    pub fn update(&mut self, input: &[u8]) -> &mut Self {
        self.update_with_join::<SerialJoin>(input)
    }

    /// update_rayon is [`update`](Hasher::update), but hashes large inputs on the rayon thread
    /// pool. The output is identical; only inputs of at least a few chunks benefit.
    #[cfg(feature = "rayon")]
    pub fn update_rayon(&mut self, input: &[u8]) -> &mut Self {
        self.update_with_join::<crate::join::RayonJoin>(input)
    }

    pub(crate) fn update_with_join<J: Join>(&mut self, mut input: &[u8]) -> &mut Self {
        // Top off the chunk in progress. If it fills up and more input follows, it is complete.
        if self.chunk.len() > 0 {
            let want = CHUNK_LEN - self.chunk.len();
            let take = want.min(input.len());
            self.chunk.update(&input[..take]);
            input = &input[take..];
            if input.is_empty() {
                return self;
            }
            let chunk_cv = self.chunk.output().chaining_value();
            let chunk_counter = self.chunk.chunk_counter;
            self.push_cv(&chunk_cv, chunk_counter);
            self.chunk.reset(&self.key, chunk_counter + 1);
        }

        // Hash whole subtrees directly while more than one chunk of input is left. Each subtree
        // is a power of two chunks and must start at a multiple of its own size, so that it is
        // a subtree of the final tree and not a cut across two of them.
        while input.len() > CHUNK_LEN {
            debug_assert_eq!(self.chunk.len(), 0);
            let mut subtree_len = largest_power_of_two_leq(input.len());
            let count_so_far = self.chunk.chunk_counter * CHUNK_LEN as u64;
            while (subtree_len as u64 - 1) & count_so_far != 0 {
                subtree_len /= 2;
            }
            let subtree_chunks = (subtree_len / CHUNK_LEN) as u64;
            let chunk_counter = self.chunk.chunk_counter;

            if subtree_len <= CHUNK_LEN {
                debug_assert_eq!(subtree_len, CHUNK_LEN);
                let mut chunk = ChunkState::new(self.c, &self.key, chunk_counter, self.chunk.flags);
                chunk.update(&input[..subtree_len]);
                self.push_cv(&chunk.output().chaining_value(), chunk_counter);
            } else {
                let (left_cv, right_cv) = compress_subtree_to_parent_node::<J, C>(
                    self.c,
                    &input[..subtree_len],
                    &self.key,
                    chunk_counter,
                    self.chunk.flags,
                );
                self.push_cv(&left_cv, chunk_counter);
                self.push_cv(&right_cv, chunk_counter + subtree_chunks / 2);
            }
            self.chunk.chunk_counter += subtree_chunks;
            input = &input[subtree_len..];
        }

        // The rest, at most one chunk, waits in the chunk state. It may still grow.
        if !input.is_empty() {
            self.chunk.update(input);
            self.merge_cv_stack(self.chunk.chunk_counter);
        }
        self
    }

    fn final_output(&self) -> Output<C> {
        if self.cv_stack.is_empty() {
            return self.chunk.output();
        }

        // Fold the stack from the top down. The newest entries are the smallest subtrees, so
        // each result is the right child of the next entry below it.
        let mut output;
        let mut num_cvs_remaining = self.cv_stack.len();
        if self.chunk.len() > 0 {
            output = self.chunk.output();
        } else {
            debug_assert!(self.cv_stack.len() >= 2);
            output = Output::parent(
                self.c,
                &self.cv_stack[num_cvs_remaining - 2],
                &self.cv_stack[num_cvs_remaining - 1],
                &self.key,
                self.chunk.flags,
            );
            num_cvs_remaining -= 2;
        }
        while num_cvs_remaining > 0 {
            output = Output::parent(
                self.c,
                &self.cv_stack[num_cvs_remaining - 1],
                &output.chaining_value(),
                &self.key,
                self.chunk.flags,
            );
            num_cvs_remaining -= 1;
        }
        output
    }

    /// finalize returns the 32-byte hash of the input so far.
    pub fn finalize(&self) -> [u8; OUT_LEN] {
        let mut out = [0; OUT_LEN];
        self.finalize_into(&mut out);
        out
    }

    /// finalize_into fills out with the start of the output stream. A 32-byte out holds the
    /// regular hash; longer outputs extend it.
    pub fn finalize_into(&self, out: &mut [u8]) {
        self.finalize_seek(0, out)
    }

    /// finalize_seek fills out with the output stream starting at byte position seek.
    pub fn finalize_seek(&self, seek: u64, out: &mut [u8]) {
        if out.is_empty() {
            return;
        }
        self.final_output().root_bytes(seek, out);
    }

    /// finalize_xof returns a reader over the whole output stream.
    pub fn finalize_xof(&self) -> OutputReader<C> {
        OutputReader::new(self.final_output())
    }

    /// finalize_vec returns the first out_len bytes of the output stream in a new vector.
    pub fn finalize_vec(&self, out_len: usize) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.try_reserve_exact(out_len)
            .with_context(|| format!("allocating {} bytes of hash output", out_len))?;
        out.resize(out_len, 0);
        self.finalize_into(&mut out);
        Ok(out)
    }

    /// sum appends the 32-byte hash of the input so far to iin and returns the result.
    pub fn sum(&self, mut iin: Vec<u8>) -> Result<Vec<u8>> {
        iin.try_reserve(OUT_LEN)
            .context("growing buffer for hash output")?;
        iin.extend_from_slice(&self.finalize());
        Ok(iin)
    }

    #[cfg(test)]
    pub(crate) fn stack_len(&self) -> usize {
        self.cv_stack.len()
    }
}

// The root children of a subtree of more than one chunk. The left subtree is the largest
// power of two chunks that leaves at least one byte to the right.
fn compress_subtree_to_parent_node<J: Join, C: Compressor>(
    c: C,
    input: &[u8],
    key: &CVWords,
    chunk_counter: u64,
    flags: Flags,
) -> (CVBytes, CVBytes) {
    debug_assert!(input.len() > CHUNK_LEN);
    let left_len = left_len(input.len());
    let (left, right) = input.split_at(left_len);
    let right_chunk_counter = chunk_counter + (left_len / CHUNK_LEN) as u64;
    J::join(
        || compress_subtree::<J, C>(c, left, key, chunk_counter, flags),
        || compress_subtree::<J, C>(c, right, key, right_chunk_counter, flags),
    )
}

// The chaining value of a non-root subtree.
fn compress_subtree<J: Join, C: Compressor>(
    c: C,
    input: &[u8],
    key: &CVWords,
    chunk_counter: u64,
    flags: Flags,
) -> CVBytes {
    if input.len() <= CHUNK_LEN {
        let mut chunk = ChunkState::new(c, key, chunk_counter, flags);
        chunk.update(input);
        return chunk.output().chaining_value();
    }
    let (left_cv, right_cv) =
        compress_subtree_to_parent_node::<J, C>(c, input, key, chunk_counter, flags);
    Output::parent(c, &left_cv, &right_cv, key, flags).chaining_value()
}

fn largest_power_of_two_leq(n: usize) -> usize {
    ((n / 2) + 1).next_power_of_two()
}

fn left_len(content_len: usize) -> usize {
    debug_assert!(content_len > CHUNK_LEN);
    // Keep at least one byte for the right side.
    let full_chunks = (content_len - 1) / CHUNK_LEN;
    largest_power_of_two_leq(full_chunks) * CHUNK_LEN
}

impl<C: Compressor> Default for Hasher<C> {
    fn default() -> Self {
        Self::with_mode(C::default(), Mode::Hash)
    }
}

// Don't derive(Debug), the key and the stack may be secret.
impl<C: Compressor> fmt::Debug for Hasher<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Hasher")
            .field("flags", &self.chunk.flags)
            .field("count", &self.count())
            .field("cv_stack_len", &self.cv_stack.len())
            .finish()
    }
}

impl<C: Compressor> io::Write for Hasher<C> {
    fn write(&mut self, input: &[u8]) -> io::Result<usize> {
        self.update(input);
        Ok(input.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(feature = "zeroize")]
impl<C: Compressor> zeroize::Zeroize for Hasher<C> {
    fn zeroize(&mut self) {
        use zeroize::Zeroize;

        self.key.zeroize();
        self.chunk.zeroize();
        self.cv_stack.iter_mut().for_each(|cv| cv.zeroize());
        self.cv_stack.clear();
    }
}
