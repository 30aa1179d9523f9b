//! Implementations of the [Store] trait that can back a [crate::Cache].

use crate::{Block, Error, BLOCK_SIZE};

pub mod faulty;
pub mod file;
pub mod memory;
pub mod metered;

/// Block-addressable persistent medium behind a [crate::Cache].
///
/// Block `n` lives at byte offset `n * BLOCK_SIZE`. Operations either transfer a whole block or
/// fail; there is no partial I/O.
pub trait Store {
    /// Read `block` into `buf`.
    fn read(&mut self, block: u64, buf: &mut Block) -> Result<(), Error>;

    /// Write `buf` to `block`.
    fn write(&mut self, block: u64, buf: &Block) -> Result<(), Error>;
}

/// Byte offset of `block` within a store.
pub(crate) fn offset(block: u64) -> Result<u64, Error> {
    block
        .checked_mul(BLOCK_SIZE as u64)
        .ok_or(Error::OffsetOverflow(block))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Exercise the contract every [Store] must honor.
    pub(crate) fn run_store_tests<S: Store>(mut store: S) {
        // Reading past the end fails
        let mut buf = [0u8; BLOCK_SIZE];
        assert!(matches!(
            store.read(0, &mut buf),
            Err(Error::ReadFailed(0, _))
        ));

        // Write and read back
        store.write(0, &[0xAA; BLOCK_SIZE]).unwrap();
        store.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0xAA; BLOCK_SIZE]);

        // Writing past the end extends the store with zeros
        store.write(3, &[0xCC; BLOCK_SIZE]).unwrap();
        store.read(1, &mut buf).unwrap();
        assert_eq!(buf, [0u8; BLOCK_SIZE]);
        store.read(3, &mut buf).unwrap();
        assert_eq!(buf, [0xCC; BLOCK_SIZE]);
        assert!(store.read(4, &mut buf).is_err());

        // Overwrite leaves neighbors untouched
        store.write(1, &[0x11; BLOCK_SIZE]).unwrap();
        store.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0xAA; BLOCK_SIZE]);
        store.read(1, &mut buf).unwrap();
        assert_eq!(buf, [0x11; BLOCK_SIZE]);

        // Offsets that cannot be represented are rejected
        assert!(matches!(
            store.write(u64::MAX, &[0u8; BLOCK_SIZE]),
            Err(Error::OffsetOverflow(u64::MAX))
        ));
        assert!(matches!(
            store.read(u64::MAX, &mut buf),
            Err(Error::OffsetOverflow(u64::MAX))
        ));
    }

    #[test]
    fn test_offset() {
        assert_eq!(offset(0).unwrap(), 0);
        assert_eq!(offset(3).unwrap(), 3 * BLOCK_SIZE as u64);
        assert!(matches!(
            offset(u64::MAX / 2),
            Err(Error::OffsetOverflow(_))
        ));
    }
}
