//! Block I/O over page files.
//!
//! A page file is an ordered sequence of fixed-size pages addressed by a
//! zero-based page index. This crate does nothing clever: it creates,
//! opens, grows, and destroys page files and moves whole pages between
//! disk and caller-supplied buffers. Caching, pinning, and replacement
//! live one layer up in the `buffer` crate.

#[cfg(test)]
mod tests;

use common::{DbError, DbResult, PageNum};
use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

/// Fixed page size in bytes; every on-disk structure is expressed in
/// multiples of this.
pub const PAGE_SIZE: usize = 4096;

/// An open page file. Closing is dropping; the destructor releases the
/// underlying descriptor.
#[derive(Debug)]
pub struct PageFile {
    path: PathBuf,
    file: File,
    total_pages: u32,
}

impl PageFile {
    /// Create a new page file containing a single zero-filled page.
    /// An existing file at the path is truncated.
    pub fn create(path: impl AsRef<Path>) -> DbResult<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;
        file.write_all(&[0u8; PAGE_SIZE])?;
        file.flush()?;
        Ok(())
    }

    /// Open an existing page file.
    ///
    /// # Errors
    ///
    /// Returns `DbError::FileNotFound` if there is no file at the path.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DbError::FileNotFound(path.clone()),
                _ => DbError::Io(e),
            })?;

        let len = file.metadata()?.len();
        let total_pages = (len / PAGE_SIZE as u64) as u32;

        Ok(Self {
            path,
            file,
            total_pages,
        })
    }

    /// Remove the page file from disk.
    pub fn destroy(path: impl AsRef<Path>) -> DbResult<()> {
        let path = path.as_ref();
        fs::remove_file(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => DbError::FileNotFound(path.to_path_buf()),
            _ => DbError::Io(e),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of pages currently allocated in the file.
    pub fn total_pages(&self) -> u32 {
        self.total_pages
    }

    /// Read page `page` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::ReadNonExistingPage` if the index is past the end
    /// of the file.
    pub fn read_block(&mut self, page: PageNum, buf: &mut [u8; PAGE_SIZE]) -> DbResult<()> {
        if page >= self.total_pages {
            return Err(DbError::ReadNonExistingPage {
                page,
                total: self.total_pages,
            });
        }
        self.file
            .seek(SeekFrom::Start(page as u64 * PAGE_SIZE as u64))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Write `buf` to page `page`, which must already be allocated.
    ///
    /// # Errors
    ///
    /// Returns `DbError::WriteFailed` if the index is past the end of the
    /// file; grow with `append_empty_block` or `ensure_capacity` first.
    pub fn write_block(&mut self, page: PageNum, buf: &[u8; PAGE_SIZE]) -> DbResult<()> {
        if page >= self.total_pages {
            return Err(DbError::WriteFailed {
                page,
                total: self.total_pages,
            });
        }
        self.file
            .seek(SeekFrom::Start(page as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(buf)?;
        self.file.flush()?;
        Ok(())
    }

    /// Append one zero-filled page and return its index.
    pub fn append_empty_block(&mut self) -> DbResult<PageNum> {
        let page = self.total_pages;
        self.file
            .seek(SeekFrom::Start(page as u64 * PAGE_SIZE as u64))?;
        self.file.write_all(&[0u8; PAGE_SIZE])?;
        self.file.flush()?;
        self.total_pages += 1;
        Ok(page)
    }

    /// Grow the file until it holds at least `pages` pages.
    pub fn ensure_capacity(&mut self, pages: u32) -> DbResult<()> {
        while self.total_pages < pages {
            self.append_empty_block()?;
        }
        Ok(())
    }
}
