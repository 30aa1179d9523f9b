use super::offset;
use crate::{Block, Error, BLOCK_SIZE};
use std::{
    io::{Error as IoError, ErrorKind},
    sync::{Arc, Mutex},
};

/// In-memory [super::Store] that mimics a file: a contiguous byte image that grows (zero-filled)
/// when written past its end and refuses reads that are not fully inside it.
///
/// Clones share the same contents, so a test can keep a handle to inspect what a
/// [crate::Cache] persisted.
#[derive(Clone, Default)]
pub struct Store {
    content: Arc<Mutex<Vec<u8>>>,
}

impl Store {
    /// Create a store whose first `blocks` blocks are all filled with `fill`.
    pub fn filled(blocks: usize, fill: u8) -> Self {
        Self {
            content: Arc::new(Mutex::new(vec![fill; blocks * BLOCK_SIZE])),
        }
    }

    /// Number of whole blocks currently held.
    pub fn blocks(&self) -> u64 {
        (self.content.lock().unwrap().len() / BLOCK_SIZE) as u64
    }

    /// Copy of `block`, if it lies fully inside the store.
    pub fn block(&self, block: u64) -> Option<Block> {
        let range = range(block).ok()?;
        let content = self.content.lock().unwrap();
        let bytes = content.get(range)?;
        bytes.try_into().ok()
    }
}

/// Byte range occupied by `block`.
fn range(block: u64) -> Result<std::ops::Range<usize>, Error> {
    let start = usize::try_from(offset(block)?).map_err(|_| Error::OffsetOverflow(block))?;
    let end = start
        .checked_add(BLOCK_SIZE)
        .ok_or(Error::OffsetOverflow(block))?;
    Ok(start..end)
}

impl super::Store for Store {
    fn read(&mut self, block: u64, buf: &mut Block) -> Result<(), Error> {
        let range = range(block)?;
        let content = self.content.lock().unwrap();
        let bytes = content
            .get(range)
            .ok_or_else(|| Error::ReadFailed(block, ErrorKind::UnexpectedEof.into()))?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    fn write(&mut self, block: u64, buf: &Block) -> Result<(), Error> {
        let range = range(block)?;
        let mut content = self.content.lock().unwrap();
        if content.len() < range.end {
            let additional = range.end - content.len();
            content.try_reserve(additional).map_err(|err| {
                Error::WriteFailed(block, IoError::new(ErrorKind::OutOfMemory, err))
            })?;
            content.resize(range.end, 0);
        }
        content[range].copy_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{tests::run_store_tests, Store as _};

    #[test]
    fn test_memory_store() {
        run_store_tests(Store::default());
    }

    #[test]
    fn test_clones_share_content() {
        let store = Store::filled(2, 0x00);
        assert_eq!(store.blocks(), 2);

        let mut writer = store.clone();
        writer.write(1, &[0x42; BLOCK_SIZE]).unwrap();
        assert_eq!(store.block(1).unwrap(), [0x42; BLOCK_SIZE]);
        assert_eq!(store.block(0).unwrap(), [0x00; BLOCK_SIZE]);
        assert!(store.block(2).is_none());

        writer.write(4, &[0x01; BLOCK_SIZE]).unwrap();
        assert_eq!(store.blocks(), 5);
        assert_eq!(store.block(3).unwrap(), [0x00; BLOCK_SIZE]);
    }
}
