use crate::{Block, Error, BLOCK_SIZE};
use prometheus_client::{metrics::counter::Counter, registry::Registry};
use std::sync::Arc;

pub struct Metrics {
    pub reads: Counter,
    pub read_bytes: Counter,
    pub writes: Counter,
    pub write_bytes: Counter,
}

impl Metrics {
    /// Initialize the `Metrics` struct and register the metrics in the provided registry.
    fn new(registry: &mut Registry) -> Self {
        let metrics = Self {
            reads: Counter::default(),
            read_bytes: Counter::default(),
            writes: Counter::default(),
            write_bytes: Counter::default(),
        };

        registry.register(
            "store_reads",
            "Total number of block reads",
            metrics.reads.clone(),
        );
        registry.register(
            "store_read_bytes",
            "Total amount of data read from the store",
            metrics.read_bytes.clone(),
        );
        registry.register(
            "store_writes",
            "Total number of block writes",
            metrics.writes.clone(),
        );
        registry.register(
            "store_write_bytes",
            "Total amount of data written to the store",
            metrics.write_bytes.clone(),
        );

        metrics
    }
}

/// A wrapper around a [super::Store] implementation that counts successful operations.
pub struct Store<S> {
    inner: S,
    metrics: Arc<Metrics>,
}

impl<S> Store<S> {
    pub fn new(inner: S, registry: &mut Registry) -> Self {
        Self {
            inner,
            metrics: Metrics::new(registry).into(),
        }
    }

    /// Shared handle to the counters, usable after the store is moved into a [crate::Cache].
    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: super::Store> super::Store for Store<S> {
    fn read(&mut self, block: u64, buf: &mut Block) -> Result<(), Error> {
        self.inner.read(block, buf)?;
        self.metrics.reads.inc();
        self.metrics.read_bytes.inc_by(BLOCK_SIZE as u64);
        Ok(())
    }

    fn write(&mut self, block: u64, buf: &Block) -> Result<(), Error> {
        self.inner.write(block, buf)?;
        self.metrics.writes.inc();
        self.metrics.write_bytes.inc_by(BLOCK_SIZE as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{memory::Store as MemoryStore, tests::run_store_tests, Store as _};
    use prometheus_client::encoding::text::encode;

    #[test]
    fn test_metered_store() {
        let mut registry = Registry::default();
        let store = Store::new(MemoryStore::default(), &mut registry);
        run_store_tests(store);
    }

    #[test]
    fn test_metered_store_metrics() {
        let mut registry = Registry::default();
        let mut store = Store::new(MemoryStore::default(), &mut registry);
        let metrics = store.metrics();

        // Write a block
        store.write(0, &[0xAA; BLOCK_SIZE]).unwrap();
        assert_eq!(metrics.writes.get(), 1);
        assert_eq!(metrics.write_bytes.get(), BLOCK_SIZE as u64);

        // Read it back
        let mut buf = [0u8; BLOCK_SIZE];
        store.read(0, &mut buf).unwrap();
        assert_eq!(metrics.reads.get(), 1);
        assert_eq!(metrics.read_bytes.get(), BLOCK_SIZE as u64);

        // Failed operations are not counted
        assert!(store.read(9, &mut buf).is_err());
        assert_eq!(metrics.reads.get(), 1);

        // Counters are exported
        let mut buffer = String::new();
        encode(&mut buffer, &registry).unwrap();
        assert!(buffer.contains("store_reads_total 1"));
        assert!(buffer.contains("store_writes_total 1"));
        assert!(buffer.contains(&format!("store_write_bytes_total {BLOCK_SIZE}")));
        assert_eq!(store.inner().blocks(), 1);
    }
}
