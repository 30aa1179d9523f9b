use crate::{Block, Error};
use std::{
    io::Error as IoError,
    sync::{Arc, Mutex},
};
use tracing::debug;

/// Which operations a [Faults] rule applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    /// Every block.
    All,
    /// A single block.
    Block(u64),
}

impl Target {
    fn matches(&self, block: u64) -> bool {
        match self {
            Target::All => true,
            Target::Block(target) => *target == block,
        }
    }
}

#[derive(Default)]
struct Rules {
    reads: Option<Target>,
    writes: Option<Target>,
    injected: u64,
}

/// Shared switchboard controlling which operations of a [Store] fail.
///
/// Clones refer to the same rules, so a handle kept outside a [crate::Cache] can flip faults on
/// and off while the cache owns the store.
#[derive(Clone, Default)]
pub struct Faults {
    rules: Arc<Mutex<Rules>>,
}

impl Faults {
    /// Fail reads of `target` until cleared.
    pub fn fail_reads(&self, target: Target) {
        self.rules.lock().unwrap().reads = Some(target);
    }

    /// Fail writes of `target` until cleared.
    pub fn fail_writes(&self, target: Target) {
        self.rules.lock().unwrap().writes = Some(target);
    }

    /// Stop injecting faults.
    pub fn clear(&self) {
        let mut rules = self.rules.lock().unwrap();
        rules.reads = None;
        rules.writes = None;
    }

    /// Number of operations failed so far.
    pub fn injected(&self) -> u64 {
        self.rules.lock().unwrap().injected
    }

    fn check(&self, block: u64, write: bool) -> bool {
        let mut rules = self.rules.lock().unwrap();
        let rule = if write { rules.writes } else { rules.reads };
        let fail = rule.is_some_and(|target| target.matches(block));
        if fail {
            rules.injected += 1;
        }
        fail
    }
}

/// A wrapper around a [super::Store] implementation that fails operations on demand.
pub struct Store<S> {
    inner: S,
    faults: Faults,
}

impl<S> Store<S> {
    pub fn new(inner: S, faults: Faults) -> Self {
        Self { inner, faults }
    }
}

impl<S: super::Store> super::Store for Store<S> {
    fn read(&mut self, block: u64, buf: &mut Block) -> Result<(), Error> {
        if self.faults.check(block, false) {
            debug!(block, "injecting read fault");
            return Err(Error::ReadFailed(block, IoError::other("injected fault")));
        }
        self.inner.read(block, buf)
    }

    fn write(&mut self, block: u64, buf: &Block) -> Result<(), Error> {
        if self.faults.check(block, true) {
            debug!(block, "injecting write fault");
            return Err(Error::WriteFailed(block, IoError::other("injected fault")));
        }
        self.inner.write(block, buf)
    }
}
