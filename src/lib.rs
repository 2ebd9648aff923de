#![warn(missing_docs)]
//! A Rust implementation of the BLAKE3 incremental tree hash.
//!
//! Input is split into 1024-byte chunks which form the leaves of a binary tree. The [`Hasher`]
//! streams through the input keeping only a stack of subtree chaining values, so the digest does
//! not depend on how the input is split across [`Hasher::update`] calls. The root of the tree
//! yields an extendable, seekable output stream; a regular digest is its first 32 bytes.
//!
//! # Example
//! ```
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!   let mut h = b3hash::Hasher::new();
//!   h.update(b"hello ").update(b"world");
//!   println!("Result: {}", hex::encode(h.finalize()));
//!
//!   let mut stream = [0u8; 100];
//!   h.finalize_seek(1 << 20, &mut stream);
//!
//!   let digest = h.sum(vec![])?;
//!   assert_eq!(digest, b3hash::hash(b"hello world"));
//!
//!   Ok(())
//! }
//! ```
//!
//! The `rayon` feature adds [`Hasher::update_rayon`], which hashes large inputs on several
//! threads with byte-identical output. The `zeroize` feature implements `zeroize::Zeroize` for
//! [`Hasher`].

/// `compress` holds the compression function and the rounds it is built from.
pub mod compress;
/// `hasher` is the incremental tree hasher.
pub mod hasher;
/// `output` produces root bytes and the extendable output stream.
pub mod output;

mod chunk;
mod join;
mod traits;


pub use crate::compress::{Compressor, Portable, Reference};
pub use crate::hasher::{Hasher, Mode};
pub use crate::output::OutputReader;

/// The BLAKE3 version tracked by this implementation.
pub const VERSION: &str = "1.5.0";

/// The size in bytes of a default digest.
pub const OUT_LEN: usize = 32;

/// The size in bytes of a key.
pub const KEY_LEN: usize = 32;

/// The size in bytes of a compression block.
pub const BLOCK_LEN: usize = 64;

/// The size in bytes of a chunk, the leaf of the hash tree.
pub const CHUNK_LEN: usize = 1024;

/// The maximum depth of the hash tree. 2^54 chunks of 1024 bytes cover 2^64 bytes.
pub const MAX_DEPTH: usize = 54;

/// Eight 32-bit words of a chaining value or key.
pub type CVWords = [u32; 8];

/// The serialized, little-endian form of [`CVWords`].
pub type CVBytes = [u8; OUT_LEN];

bitflags::bitflags! {
    /// Flags domain-separates every compression by its role in the tree and by the hash mode.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Flags: u8 {
        /// First block of a chunk.
        const CHUNK_START = 1 << 0;
        /// Last block of a chunk.
        const CHUNK_END = 1 << 1;
        /// Combination of two child chaining values.
        const PARENT = 1 << 2;
        /// The node whose output is emitted. Only applied at output time.
        const ROOT = 1 << 3;
        /// Keyed hash mode.
        const KEYED_HASH = 1 << 4;
        /// Hashing the context string of key derivation.
        const DERIVE_KEY_CONTEXT = 1 << 5;
        /// Hashing the key material of key derivation.
        const DERIVE_KEY_MATERIAL = 1 << 6;
    }
}

/// hash returns the 32-byte BLAKE3 digest of input.
pub fn hash(input: &[u8]) -> [u8; OUT_LEN] {
    Hasher::new().update(input).finalize()
}

/// keyed_hash returns the 32-byte keyed BLAKE3 digest of input, usable as a MAC.
pub fn keyed_hash(key: &[u8; KEY_LEN], input: &[u8]) -> [u8; OUT_LEN] {
    Hasher::new_keyed(key).update(input).finalize()
}

/// derive_key derives a 32-byte key from key_material, domain-separated by context.
///
/// The context should be a hardcoded, globally unique, application-specific string.
pub fn derive_key(context: &str, key_material: &[u8]) -> [u8; OUT_LEN] {
    Hasher::new_derive_key(context)
        .update(key_material)
        .finalize()
}
