use b3hash::{compress::IV, Compressor, Flags, Portable, Reference, BLOCK_LEN};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::Rng;

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut rnd = rand::thread_rng();
    let mut block = [0u8; BLOCK_LEN];
    for i in block.iter_mut() {
        *i = rnd.gen();
    }
    let flags = Flags::CHUNK_START | Flags::CHUNK_END;

    c.bench_function("compress reference", |b| {
        b.iter(|| Reference.compress(black_box(&IV), black_box(&block), 64, 0, flags))
    });
    c.bench_function("compress portable", |b| {
        b.iter(|| Portable.compress(black_box(&IV), black_box(&block), 64, 0, flags))
    });
    c.bench_function("compress xof portable", |b| {
        b.iter(|| Portable.compress_xof(black_box(&IV), black_box(&block), 64, 0, flags))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
