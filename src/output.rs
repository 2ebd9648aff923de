use byteorder::{ByteOrder, LittleEndian};
use std::cmp;
use std::fmt;
use std::io;

use crate::compress::Compressor;
use crate::{CVBytes, CVWords, Flags, BLOCK_LEN, OUT_LEN};

// Output is the last compression of a node, held back until we know whether the node is the
// root. A chunk's output covers its final block; a parent's output covers its two child CVs.
#[derive(Clone)]
pub(crate) struct Output<C: Compressor> {
    pub(crate) c: C,
    pub(crate) input_cv: CVWords,
    pub(crate) block: [u8; BLOCK_LEN],
    pub(crate) block_len: u8,
    pub(crate) counter: u64,
    pub(crate) flags: Flags,
}

impl<C: Compressor> Output<C> {
    pub(crate) fn parent(
        c: C,
        left_child: &CVBytes,
        right_child: &CVBytes,
        key: &CVWords,
        flags: Flags,
    ) -> Self {
        let mut block = [0; BLOCK_LEN];
        block[..OUT_LEN].copy_from_slice(left_child);
        block[OUT_LEN..].copy_from_slice(right_child);
        Self {
            c,
            input_cv: *key,
            block,
            block_len: BLOCK_LEN as u8,
            counter: 0,
            flags: flags | Flags::PARENT,
        }
    }

    pub(crate) fn chaining_value(&self) -> CVBytes {
        let cv = self.c.compress(
            &self.input_cv,
            &self.block,
            self.block_len,
            self.counter,
            self.flags,
        );
        let mut out = [0; OUT_LEN];
        LittleEndian::write_u32_into(&cv, &mut out);
        out
    }

    // root_output_block returns output block number counter of the root stream.
    pub(crate) fn root_output_block(&self, counter: u64) -> [u8; BLOCK_LEN] {
        self.c.compress_xof(
            &self.input_cv,
            &self.block,
            self.block_len,
            counter,
            self.flags | Flags::ROOT,
        )
    }

    // root_bytes fills out with the root stream starting at byte position seek.
    pub(crate) fn root_bytes(&self, seek: u64, mut out: &mut [u8]) {
        if out.is_empty() {
            return;
        }
        let mut counter = seek / BLOCK_LEN as u64;
        let offset_within_block = (seek % BLOCK_LEN as u64) as usize;

        if offset_within_block > 0 {
            let block = self.root_output_block(counter);
            let take = cmp::min(out.len(), BLOCK_LEN - offset_within_block);
            out[..take].copy_from_slice(&block[offset_within_block..][..take]);
            out = &mut out[take..];
            counter += 1;
        }

        let mut whole_blocks = out.chunks_exact_mut(BLOCK_LEN);
        for dst in &mut whole_blocks {
            dst.copy_from_slice(&self.root_output_block(counter));
            counter += 1;
        }

        let tail = whole_blocks.into_remainder();
        if !tail.is_empty() {
            let len = tail.len();
            tail.copy_from_slice(&self.root_output_block(counter)[..len]);
        }
    }
}

/// OutputReader streams the extendable output of a finalized [`Hasher`](crate::Hasher).
///
/// The stream is addressed by byte position and can be read from any point with
/// [`set_position`](OutputReader::set_position). Output bytes are not buffered, so reading in
/// multiples of 64 bytes avoids recomputing blocks.
///
/// The maximum output size is 2<sup>64</sup>-1 bytes. Reading past it is unspecified.
#[derive(Clone)]
pub struct OutputReader<C: Compressor = crate::Portable> {
    inner: Output<C>,
    position: u64,
}

impl<C: Compressor> OutputReader<C> {
    pub(crate) fn new(inner: Output<C>) -> Self {
        Self { inner, position: 0 }
    }

    /// fill writes buf.len() output bytes into buf and advances the position past them.
    pub fn fill(&mut self, buf: &mut [u8]) {
        self.inner.root_bytes(self.position, buf);
        self.position = self.position.wrapping_add(buf.len() as u64);
    }

    /// position returns the current byte position in the output stream.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// set_position moves to a byte position in the output stream.
    pub fn set_position(&mut self, position: u64) {
        self.position = position;
    }
}

// Don't derive(Debug), the state may be secret.
impl<C: Compressor> fmt::Debug for OutputReader<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("OutputReader")
            .field("position", &self.position)
            .finish()
    }
}

impl<C: Compressor> io::Read for OutputReader<C> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill(buf);
        Ok(buf.len())
    }
}

impl<C: Compressor> io::Seek for OutputReader<C> {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(x) => x as i128,
            io::SeekFrom::Current(x) => self.position as i128 + x as i128,
            io::SeekFrom::End(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "seek from end not supported",
                ));
            }
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start",
            ));
        }
        self.position = cmp::min(target, u64::MAX as i128) as u64;
        Ok(self.position)
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::compress::{Portable, IV};
    use std::io::{Read, Seek, SeekFrom};

    fn root() -> Output<Portable> {
        let mut block = [0; BLOCK_LEN];
        block[..3].copy_from_slice(b"abc");
        Output {
            c: Portable,
            input_cv: IV,
            block,
            block_len: 3,
            counter: 0,
            flags: Flags::CHUNK_START | Flags::CHUNK_END,
        }
    }

    #[test]
    fn root_bytes_blocks() {
        let output = root();
        let mut stream = [0u8; 4 * BLOCK_LEN];
        output.root_bytes(0, &mut stream);

        stream
            .chunks_exact(BLOCK_LEN)
            .enumerate()
            .for_each(|(i, block)| {
                assert_eq!(block, &output.root_output_block(i as u64)[..], "block {}", i);
            });
        assert_eq!(
            hex::encode(&stream[..OUT_LEN]),
            "6437b3ac38465133ffb63b75273a8db548c558465d79db03fd359c6cd5bd9d85"
        );
    }

    #[test]
    fn root_bytes_seek() {
        let output = root();
        let mut stream = [0u8; 1000];
        output.root_bytes(0, &mut stream);

        for seek in [0usize, 1, 63, 64, 65, 127, 128, 500, 999] {
            for len in [0usize, 1, 2, 63, 64, 65, 129] {
                let len = cmp::min(len, stream.len() - seek);
                let mut out = vec![0u8; len];
                output.root_bytes(seek as u64, &mut out);
                assert_eq!(&out[..], &stream[seek..seek + len], "seek {} len {}", seek, len);
            }
        }
    }

    #[test]
    fn chaining_value_is_not_root() {
        let output = root();
        let mut root_bytes = [0u8; OUT_LEN];
        output.root_bytes(0, &mut root_bytes);
        assert_ne!(output.chaining_value(), root_bytes);
    }

    #[test]
    fn reader() -> io::Result<()> {
        let output = root();
        let mut stream = [0u8; 300];
        output.root_bytes(0, &mut stream);

        let mut reader = OutputReader::new(output);
        let mut buf = [0u8; 100];
        reader.read_exact(&mut buf[..7])?;
        reader.fill(&mut buf[7..100]);
        assert_eq!(&buf[..], &stream[..100]);
        assert_eq!(reader.position(), 100);

        reader.set_position(250);
        reader.fill(&mut buf[..50]);
        assert_eq!(&buf[..50], &stream[250..300]);

        assert_eq!(reader.seek(SeekFrom::Current(-290))?, 10);
        reader.read_exact(&mut buf[..20])?;
        assert_eq!(&buf[..20], &stream[10..30]);

        assert_eq!(reader.seek(SeekFrom::Start(64))?, 64);
        assert!(reader.seek(SeekFrom::Current(-65)).is_err());
        assert!(reader.seek(SeekFrom::End(0)).is_err());
        assert_eq!(reader.position(), 64);

        Ok(())
    }
}
