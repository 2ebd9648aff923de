use std::cmp;
use std::fmt;

use crate::compress::Compressor;
use crate::output::Output;
use crate::{CVWords, Flags, BLOCK_LEN, CHUNK_LEN};

// ChunkState accumulates the blocks of one chunk. The last block is kept in buf until the
// chunk is known to be over, because only then can it carry CHUNK_END.
#[derive(Clone)]
pub(crate) struct ChunkState<C: Compressor> {
    c: C,
    cv: CVWords,
    pub(crate) chunk_counter: u64,
    buf: [u8; BLOCK_LEN],
    buf_len: u8,
    blocks_compressed: u8,
    pub(crate) flags: Flags,
}

impl<C: Compressor> ChunkState<C> {
    pub(crate) fn new(c: C, key: &CVWords, chunk_counter: u64, flags: Flags) -> Self {
        Self {
            c,
            cv: *key,
            chunk_counter,
            buf: [0; BLOCK_LEN],
            buf_len: 0,
            blocks_compressed: 0,
            flags,
        }
    }

    // reset starts chunk_counter over from the root key, keeping the mode flags.
    pub(crate) fn reset(&mut self, key: &CVWords, chunk_counter: u64) {
        self.cv = *key;
        self.chunk_counter = chunk_counter;
        self.buf = [0; BLOCK_LEN];
        self.buf_len = 0;
        self.blocks_compressed = 0;
    }

    pub(crate) fn len(&self) -> usize {
        BLOCK_LEN * self.blocks_compressed as usize + self.buf_len as usize
    }

    fn fill_buf(&mut self, input: &mut &[u8]) {
        let want = BLOCK_LEN - self.buf_len as usize;
        let take = cmp::min(want, input.len());
        self.buf[self.buf_len as usize..][..take].copy_from_slice(&input[..take]);
        self.buf_len += take as u8;
        *input = &input[take..];
    }

    fn start_flag(&self) -> Flags {
        if self.blocks_compressed == 0 {
            Flags::CHUNK_START
        } else {
            Flags::empty()
        }
    }

    fn compress_block(&mut self, block: &[u8; BLOCK_LEN]) {
        let block_flags = self.flags | self.start_flag();
        self.cv = self.c.compress(
            &self.cv,
            block,
            BLOCK_LEN as u8,
            self.chunk_counter,
            block_flags,
        );
        self.blocks_compressed += 1;
    }

    // update absorbs input, which must fit in what is left of the chunk.
    pub(crate) fn update(&mut self, mut input: &[u8]) -> &mut Self {
        debug_assert!(self.len() + input.len() <= CHUNK_LEN);

        if self.buf_len > 0 {
            self.fill_buf(&mut input);
            if !input.is_empty() {
                debug_assert_eq!(self.buf_len as usize, BLOCK_LEN);
                let block = self.buf;
                self.compress_block(&block);
                self.buf_len = 0;
                self.buf = [0; BLOCK_LEN];
            }
        }

        while input.len() > BLOCK_LEN {
            debug_assert_eq!(self.buf_len, 0);
            let mut block = [0; BLOCK_LEN];
            block.copy_from_slice(&input[..BLOCK_LEN]);
            self.compress_block(&block);
            input = &input[BLOCK_LEN..];
        }

        self.fill_buf(&mut input);
        debug_assert!(input.is_empty());
        debug_assert!(self.len() <= CHUNK_LEN);
        self
    }

    pub(crate) fn output(&self) -> Output<C> {
        let block_flags = self.flags | self.start_flag() | Flags::CHUNK_END;
        Output {
            c: self.c,
            input_cv: self.cv,
            block: self.buf,
            block_len: self.buf_len,
            counter: self.chunk_counter,
            flags: block_flags,
        }
    }
}

// Don't derive(Debug), the chaining value and buffer may be secret.
impl<C: Compressor> fmt::Debug for ChunkState<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ChunkState")
            .field("len", &self.len())
            .field("chunk_counter", &self.chunk_counter)
            .field("flags", &self.flags)
            .finish()
    }
}

#[cfg(feature = "zeroize")]
impl<C: Compressor> zeroize::Zeroize for ChunkState<C> {
    fn zeroize(&mut self) {
        use zeroize::Zeroize;

        self.cv.zeroize();
        self.chunk_counter.zeroize();
        self.buf.zeroize();
        self.buf_len.zeroize();
        self.blocks_compressed.zeroize();
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::compress::{Portable, IV};

    fn input(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn len_tracks_input() {
        let mut chunk = ChunkState::new(Portable, &IV, 0, Flags::empty());
        assert_eq!(chunk.len(), 0);

        for (step, total) in [(1, 1), (63, 64), (1, 65), (959, CHUNK_LEN)] {
            chunk.update(&input(step));
            assert_eq!(chunk.len(), total, "unexpected len after {} bytes", step);
        }
    }

    #[test]
    fn full_block_stays_buffered() {
        let mut chunk = ChunkState::new(Portable, &IV, 0, Flags::empty());
        chunk.update(&input(BLOCK_LEN));
        assert_eq!(chunk.blocks_compressed, 0);
        assert_eq!(chunk.buf_len as usize, BLOCK_LEN);

        let output = chunk.output();
        assert_eq!(output.flags, Flags::CHUNK_START | Flags::CHUNK_END);
        assert_eq!(output.block_len as usize, BLOCK_LEN);
    }

    #[test]
    fn last_block_of_full_chunk() {
        let mut chunk = ChunkState::new(Portable, &IV, 7, Flags::KEYED_HASH);
        chunk.update(&input(CHUNK_LEN));
        assert_eq!(chunk.blocks_compressed, 15);

        let output = chunk.output();
        assert_eq!(output.flags, Flags::KEYED_HASH | Flags::CHUNK_END);
        assert_eq!(output.counter, 7);
        assert_eq!(&output.block[..], &input(CHUNK_LEN)[CHUNK_LEN - BLOCK_LEN..]);
    }

    #[test]
    fn split_updates() {
        let data = input(CHUNK_LEN);
        let mut whole = ChunkState::new(Portable, &IV, 3, Flags::empty());
        whole.update(&data);
        let expected = whole.output().chaining_value();

        for split in [0, 1, 63, 64, 65, 500, 1023, 1024] {
            let mut chunk = ChunkState::new(Portable, &IV, 3, Flags::empty());
            chunk.update(&data[..split]).update(&data[split..]);
            assert_eq!(
                chunk.output().chaining_value(),
                expected,
                "split at {} changed the chunk cv",
                split
            );
        }
    }

    #[test]
    fn reset() {
        let mut chunk = ChunkState::new(Portable, &IV, 0, Flags::empty());
        chunk.update(&input(700));
        chunk.reset(&IV, 4);
        assert_eq!(chunk.len(), 0);
        assert_eq!(chunk.chunk_counter, 4);

        let fresh = ChunkState::new(Portable, &IV, 4, Flags::empty());
        assert_eq!(
            chunk.output().chaining_value(),
            fresh.output().chaining_value()
        );
    }
}
