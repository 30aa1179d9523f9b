use blockcache::{store::memory, Cache, Config, BLOCK_SIZE};
use criterion::{criterion_group, criterion_main, Criterion};
use prometheus_client::registry::Registry;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    hint::black_box,
    num::NonZeroUsize,
    time::{Duration, Instant},
};

const CAPACITY: usize = 1024;
const OPERATIONS: usize = 10_000;

/// Workloads expressed as the number of distinct blocks touched. A working set at or below the
/// capacity only hits after warmup, a larger one forces steady eviction.
const WORKING_SETS: [u64; 3] = [256, 1024, 4096];

fn bench_workload(c: &mut Criterion) {
    for working_set in WORKING_SETS {
        for write_ratio in [0.0, 0.5] {
            let label = format!(
                "{}/working_set={working_set} write_ratio={write_ratio}",
                module_path!()
            );
            c.bench_function(&label, |b| {
                b.iter_custom(|iters| {
                    let mut rng = StdRng::seed_from_u64(0);
                    let mut total = Duration::ZERO;
                    for _ in 0..iters {
                        let store = memory::Store::filled(working_set as usize, 0x00);
                        let mut registry = Registry::default();
                        let cfg = Config {
                            capacity: NonZeroUsize::new(CAPACITY).unwrap(),
                        };
                        let mut cache = Cache::init(store, cfg, &mut registry).unwrap();
                        let mut buf = [0u8; BLOCK_SIZE];

                        let start = Instant::now();
                        for _ in 0..OPERATIONS {
                            let block = rng.gen_range(0..working_set);
                            if rng.gen_bool(write_ratio) {
                                cache.write(block, &buf).unwrap();
                            } else {
                                cache.read(block, &mut buf).unwrap();
                            }
                            black_box(&buf);
                        }
                        total += start.elapsed();
                    }
                    total
                });
            });
        }
    }
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = bench_workload
}
criterion_main!(benches);
