//! Exercise a write-back block cache backed by a file.
//!
//! The demo opens (or creates) a file-backed store, places a [blockcache::Cache] in front of it,
//! and runs four access patterns against the cache, logging statistics after each:
//!
//! 1. Sequential: write 10 blocks, then read them back.
//! 2. Random: write-then-read 20 random blocks out of the first 100.
//! 3. Eviction: write more blocks than the cache can hold, then read back the earliest ones.
//! 4. Flush: write 5 blocks, flush, then read them back.
//!
//! # Usage
//!
//! ```sh
//! cargo run --release --bin blockcache-demo -- --disk /tmp/simulated_disk.bin --capacity 1024 --metrics
//! ```

use blockcache::{
    store::{file, metered, Store},
    Cache, Config, Error, BLOCK_SIZE,
};
use clap::{value_parser, Arg, ArgAction, Command};
use prometheus_client::{encoding::text::encode, registry::Registry};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{num::NonZeroUsize, process::exit};
use tracing::{error, info, warn, Level};

const PATTERN_A: u8 = 0xAA;
const PATTERN_B: u8 = 0xBB;
const PATTERN_C: u8 = 0xCC;

/// Blocks touched by the sequential pattern.
const SEQUENTIAL_BLOCKS: u64 = 10;

/// Iterations of the random pattern.
const RANDOM_ITERATIONS: usize = 20;

/// Range of block ids drawn by the random pattern.
const RANDOM_RANGE: u64 = 100;

/// Blocks written beyond capacity by the eviction pattern.
const EVICTION_OVERFLOW: u64 = 10;

/// Evicted blocks read back by the eviction pattern.
const EVICTION_READBACK: u64 = 5;

/// Blocks touched by the flush pattern.
const FLUSH_BLOCKS: u64 = 5;

/// Check that every byte of `buf` equals `pattern`.
fn verify(block: u64, buf: &[u8], pattern: u8) -> bool {
    if let Some(pos) = buf.iter().position(|&b| b != pattern) {
        warn!(block, pos, found = buf[pos], expected = pattern, "data mismatch");
        return false;
    }
    true
}

fn sequential<S: Store>(cache: &mut Cache<S>) -> Result<(), Error> {
    let mut buf = [0u8; BLOCK_SIZE];
    for block in 0..SEQUENTIAL_BLOCKS {
        cache.write(block, &[PATTERN_A; BLOCK_SIZE])?;
        info!(block, "written block");
    }
    for block in 0..SEQUENTIAL_BLOCKS {
        cache.read(block, &mut buf)?;
        if verify(block, &buf, PATTERN_A) {
            info!(block, "verified block");
        }
    }
    Ok(())
}

fn random<S: Store>(cache: &mut Cache<S>, rng: &mut StdRng) -> Result<(), Error> {
    let mut buf = [0u8; BLOCK_SIZE];
    for _ in 0..RANDOM_ITERATIONS {
        let block = rng.gen_range(0..RANDOM_RANGE);
        if let Err(err) = cache.write(block, &[PATTERN_B; BLOCK_SIZE]) {
            warn!(block, ?err, "failed to write random block");
            continue;
        }
        if let Err(err) = cache.read(block, &mut buf) {
            warn!(block, ?err, "failed to read random block");
            continue;
        }
        if verify(block, &buf, PATTERN_B) {
            info!(block, "verified random block");
        }
    }
    Ok(())
}

fn eviction<S: Store>(cache: &mut Cache<S>) -> Result<(), Error> {
    let total = cache.capacity() as u64 + EVICTION_OVERFLOW;
    info!(total, capacity = cache.capacity(), "writing more blocks than capacity");
    for block in 0..total {
        cache.write(block, &[PATTERN_C; BLOCK_SIZE])?;
    }

    let mut buf = [0u8; BLOCK_SIZE];
    for block in 0..EVICTION_READBACK {
        cache.read(block, &mut buf)?;
        if verify(block, &buf, PATTERN_C) {
            info!(block, "verified evicted block");
        }
    }
    Ok(())
}

fn flush<S: Store>(cache: &mut Cache<S>) -> Result<(), Error> {
    for block in 0..FLUSH_BLOCKS {
        cache.write(block, &[PATTERN_A; BLOCK_SIZE])?;
    }
    cache.flush()?;
    info!(dirty = cache.dirty(), "flushed cache");

    let mut buf = [0u8; BLOCK_SIZE];
    for block in 0..FLUSH_BLOCKS {
        cache.read(block, &mut buf)?;
        if verify(block, &buf, PATTERN_A) {
            info!(block, "verified block after flush");
        }
    }
    Ok(())
}

/// Log the outcome of a pattern along with the statistics so far.
fn report<S: Store>(pattern: &str, result: Result<(), Error>, cache: &Cache<S>) {
    if let Err(err) = result {
        error!(pattern, ?err, "pattern failed");
    }
    let stats = cache.stats();
    info!(
        pattern,
        hits = stats.hits,
        misses = stats.misses,
        "pattern complete"
    );
}

fn main() {
    // Parse arguments
    let matches = Command::new("blockcache-demo")
        .about("exercise a write-back block cache backed by a file")
        .arg(
            Arg::new("disk")
                .long("disk")
                .required(false)
                .default_value(file::DEFAULT_PATH)
                .value_parser(value_parser!(String)),
        )
        .arg(
            Arg::new("capacity")
                .long("capacity")
                .required(false)
                .value_parser(value_parser!(NonZeroUsize)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .required(false)
                .value_parser(value_parser!(u64)),
        )
        .arg(Arg::new("json").long("json").action(ArgAction::SetTrue))
        .arg(Arg::new("metrics").long("metrics").action(ArgAction::SetTrue))
        .get_matches();

    // Create logger
    if matches.get_flag("json") {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(Level::INFO)
            .with_line_number(true)
            .with_file(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_max_level(Level::INFO).init();
    }

    // Open store
    let mut registry = Registry::default();
    let path = matches.get_one::<String>("disk").unwrap();
    let store = match file::Store::open(file::Config::new(path)) {
        Ok(store) => store,
        Err(err) => {
            error!(?err, "failed to open store");
            exit(1);
        }
    };
    let store = metered::Store::new(store, &mut registry);

    // Initialize cache
    let capacity = matches
        .get_one::<NonZeroUsize>("capacity")
        .copied()
        .unwrap_or(Config::default().capacity);
    let mut cache = match Cache::init(
        store,
        Config { capacity },
        registry.sub_registry_with_prefix("cache"),
    ) {
        Ok(cache) => cache,
        Err(err) => {
            error!(?err, "failed to initialize cache");
            exit(1);
        }
    };
    let mut rng = match matches.get_one::<u64>("seed") {
        Some(seed) => StdRng::seed_from_u64(*seed),
        None => StdRng::from_entropy(),
    };
    info!(?path, capacity = capacity.get(), "initialized cache");

    // Run patterns
    report("sequential", sequential(&mut cache), &cache);
    report("random", random(&mut cache, &mut rng), &cache);
    report("eviction", eviction(&mut cache), &cache);
    report("flush", flush(&mut cache), &cache);

    // Report
    let stats = cache.stats();
    info!(
        hits = stats.hits,
        misses = stats.misses,
        hit_rate = %format!("{:.2}%", stats.hit_rate().unwrap_or(0.0) * 100.0),
        "final statistics"
    );
    if let Err(err) = cache.close() {
        error!(?err, "failed to flush cache on close");
    }
    if matches.get_flag("metrics") {
        let mut buffer = String::new();
        encode(&mut buffer, &registry).expect("Could not encode metrics");
        println!("{buffer}");
    }
}
