use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::error::{StorageError, StorageResult};
use super::{PAGE_SIZE, PageId};

/// One backing file viewed as a sequence of `PAGE_SIZE` pages.
///
/// All access goes through an internal mutex so a `PagedFile` can be shared
/// between the buffer pool and the heap file that owns it.
pub struct PagedFile {
    path: PathBuf,
    file: Mutex<File>,
}

impl PagedFile {
    /// Open a paged file, creating an empty one (and its parent directories) if missing
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current file length in bytes
    pub fn len(&self) -> StorageResult<u64> {
        Ok(self.lock().metadata()?.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of pages, counting a trailing partial page
    pub fn num_pages(&self) -> StorageResult<usize> {
        Ok(self.len()?.div_ceil(PAGE_SIZE as u64) as usize)
    }

    /// Read exactly one page into `buffer`
    pub fn read_page(&self, page: PageId, buffer: &mut [u8]) -> StorageResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let mut file = self.lock();
        file.seek(SeekFrom::Start(page.offset()))?;

        let mut filled = 0;
        while filled < PAGE_SIZE {
            match file.read(&mut buffer[filled..]) {
                Ok(0) => {
                    return Err(StorageError::ShortRead {
                        page,
                        missing: PAGE_SIZE - filled,
                    });
                }
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }

        Ok(())
    }

    /// Overwrite one page in place, or append it when it is the page right after the last one
    pub fn write_page(&self, page: PageId, buffer: &[u8]) -> StorageResult<()> {
        if buffer.len() != PAGE_SIZE {
            return Err(StorageError::InvalidPageSize {
                expected: PAGE_SIZE,
                actual: buffer.len(),
            });
        }

        let mut file = self.lock();
        let num_pages = file.metadata()?.len().div_ceil(PAGE_SIZE as u64) as usize;
        if page.page_number > num_pages {
            return Err(StorageError::PageOutOfRange { page, num_pages });
        }

        file.seek(SeekFrom::Start(page.offset()))?;
        file.write_all(buffer)?;
        // Synchronous page writes are the only durability guarantee
        file.sync_data()?;

        Ok(())
    }
}
