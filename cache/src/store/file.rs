use super::offset;
use crate::{Block, Error};
use std::{
    fs::{File, OpenOptions},
    path::PathBuf,
};
use tracing::debug;

/// Default location of the file backing a [Store].
pub const DEFAULT_PATH: &str = "simulated_disk.bin";

/// Configuration for a file-backed [Store].
#[derive(Clone, Debug)]
pub struct Config {
    /// The file holding the blocks. Created if missing, never truncated.
    pub path: PathBuf,
}

impl Config {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_PATH)
    }
}

/// [super::Store] that keeps blocks in a single file using positional I/O.
///
/// Reading a block that is not fully inside the file fails. Writing past the end of the file
/// extends it (any gap reads back as zeros).
pub struct Store {
    file: File,
    cfg: Config,
}

impl Store {
    /// Open (or create) the file described by `cfg`.
    pub fn open(cfg: Config) -> Result<Self, Error> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&cfg.path)
            .map_err(|e| Error::StoreOpenFailed(cfg.path.clone(), e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::StoreOpenFailed(cfg.path.clone(), e))?
            .len();
        debug!(path = ?cfg.path, len, "opened store");
        Ok(Self { file, cfg })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &PathBuf {
        &self.cfg.path
    }
}

impl super::Store for Store {
    fn read(&mut self, block: u64, buf: &mut Block) -> Result<(), Error> {
        let offset = offset(block)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file
                .read_exact_at(buf, offset)
                .map_err(|e| Error::ReadFailed(block, e))?;
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut read = 0;
            while read < buf.len() {
                let n = self
                    .file
                    .seek_read(&mut buf[read..], offset + read as u64)
                    .map_err(|e| Error::ReadFailed(block, e))?;
                if n == 0 {
                    return Err(Error::ReadFailed(
                        block,
                        std::io::ErrorKind::UnexpectedEof.into(),
                    ));
                }
                read += n;
            }
        }
        Ok(())
    }

    fn write(&mut self, block: u64, buf: &Block) -> Result<(), Error> {
        let offset = offset(block)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file
                .write_all_at(buf, offset)
                .map_err(|e| Error::WriteFailed(block, e))?;
        }
        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            let mut written = 0;
            while written < buf.len() {
                written += self
                    .file
                    .seek_write(&buf[written..], offset + written as u64)
                    .map_err(|e| Error::WriteFailed(block, e))?;
            }
        }
        Ok(())
    }
}
