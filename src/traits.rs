//! Implementations of the [`digest`](https://crates.io/crates/digest) traits, which make
//! [`Hasher`] usable wherever a `digest::Digest`, `digest::Mac` or extendable-output function is
//! expected.

use digest::{
    crypto_common::{BlockSizeUser, KeySizeUser},
    typenum::{U32, U64},
    ExtendableOutput, ExtendableOutputReset, FixedOutput, FixedOutputReset, HashMarker, Key,
    KeyInit, MacMarker, Output, OutputSizeUser, Reset, Update, XofReader,
};

use crate::compress::Compressor;
use crate::{Hasher, Mode, OutputReader, KEY_LEN};

impl<C: Compressor> HashMarker for Hasher<C> {}

impl<C: Compressor> MacMarker for Hasher<C> {}

impl<C: Compressor> Update for Hasher<C> {
    fn update(&mut self, data: &[u8]) {
        self.update(data);
    }
}

impl<C: Compressor> Reset for Hasher<C> {
    fn reset(&mut self) {
        self.reset();
    }
}

impl<C: Compressor> OutputSizeUser for Hasher<C> {
    type OutputSize = U32;
}

impl<C: Compressor> BlockSizeUser for Hasher<C> {
    type BlockSize = U64;
}

impl<C: Compressor> KeySizeUser for Hasher<C> {
    type KeySize = U32;
}

impl<C: Compressor> KeyInit for Hasher<C> {
    fn new(key: &Key<Self>) -> Self {
        let mut k = [0u8; KEY_LEN];
        k.copy_from_slice(key);
        Self::with_mode(C::default(), Mode::Keyed(&k))
    }
}

impl<C: Compressor> FixedOutput for Hasher<C> {
    fn finalize_into(self, out: &mut Output<Self>) {
        Hasher::finalize_into(&self, out);
    }
}

impl<C: Compressor> FixedOutputReset for Hasher<C> {
    fn finalize_into_reset(&mut self, out: &mut Output<Self>) {
        Hasher::finalize_into(self, out);
        self.reset();
    }
}

impl<C: Compressor> ExtendableOutput for Hasher<C> {
    type Reader = OutputReader<C>;

    fn finalize_xof(self) -> Self::Reader {
        Hasher::finalize_xof(&self)
    }
}

impl<C: Compressor> ExtendableOutputReset for Hasher<C> {
    fn finalize_xof_reset(&mut self) -> Self::Reader {
        let reader = Hasher::finalize_xof(self);
        self.reset();
        reader
    }
}

impl<C: Compressor> XofReader for OutputReader<C> {
    fn read(&mut self, buffer: &mut [u8]) {
        self.fill(buffer);
    }
}
