//! # Pager
//!
//! The pager owns the database file and is the only component that touches
//! it. It memory-maps the file, grows it one page at a time, and exchanges
//! whole pages with the layers above.
//!
//! ## Page Buffers
//!
//! [`read_page`](Pager::read_page) returns an owned [`MemPage`] holding a
//! copy of the page bytes. Callers mutate the copy freely and persist it
//! with [`write_page`](Pager::write_page); dropping the buffer releases it.
//! Handing out copies instead of mmap borrows lets the B-tree engine keep a
//! parent page in hand while it reads, splits, and rewrites children, with
//! no aliasing of the mapping to reason about.
//!
//! ## Page-Size Negotiation
//!
//! A pager starts with no page size. [`set_page_size`](Pager::set_page_size)
//! must be called before any page access: with the default size for a fresh
//! file, or with the header's stored size for an existing one. The pager
//! itself never interprets the file header beyond handing out its raw bytes
//! via [`read_header`](Pager::read_header).
//!
//! ## Growth
//!
//! [`allocate_page`](Pager::allocate_page) extends the file by one page with
//! `set_len` (the new tail reads back as zeroes) and remaps. Requiring
//! `&mut self` for growth means no page borrow can outlive a remap.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use memmap2::MmapMut;

use crate::errors::{DbError, Result};

use super::header::{FILE_HEADER_SIZE, MAX_PAGE_SIZE, MIN_PAGE_SIZE};

/// An owned copy of one page, tagged with its 1-based page number.
#[derive(Debug, Clone)]
pub struct MemPage {
    npage: u32,
    data: Box<[u8]>,
}

impl MemPage {
    pub fn npage(&self) -> u32 {
        self.npage
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

#[derive(Debug)]
pub struct Pager {
    file: File,
    /// Absent while the file is empty; mapping a zero-length file is invalid.
    mmap: Option<MmapMut>,
    page_size: u32,
    n_pages: u32,
}

impl Pager {
    /// Opens the database file for reading and writing, creating it if it
    /// does not exist. The header is not interpreted here.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let len = file.metadata()?.len();

        // SAFETY: map_mut is unsafe because the mapping would alias external
        // modifications of the file. The pager opens the file read-write for
        // its own exclusive use, the mapping never outlives the Pager, and
        // all access goes through bounds-checked page offsets.
        let mmap = if len > 0 {
            Some(unsafe { MmapMut::map_mut(&file)? })
        } else {
            None
        };

        Ok(Self {
            file,
            mmap,
            page_size: 0,
            n_pages: 0,
        })
    }

    /// True while the underlying file holds no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_none()
    }

    /// Sets the page size and derives the page count from the file length.
    /// Must be called before any page access, and must match the header's
    /// stored size on a non-empty file.
    pub fn set_page_size(&mut self, size: u32) -> Result<()> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&size) || !size.is_power_of_two() {
            return Err(DbError::Misuse("unsupported page size"));
        }
        self.page_size = size;
        let len = self.mmap.as_ref().map_or(0, |m| m.len() as u64);
        self.n_pages = (len / size as u64) as u32;
        Ok(())
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn n_pages(&self) -> u32 {
        self.n_pages
    }

    /// Reads the raw 100-byte file header without creating a page view.
    pub fn read_header(&self, out: &mut [u8; FILE_HEADER_SIZE]) -> Result<()> {
        let map = self
            .mmap
            .as_ref()
            .filter(|m| m.len() >= FILE_HEADER_SIZE)
            .ok_or_else(|| {
                DbError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "file shorter than the 100-byte header",
                ))
            })?;
        out.copy_from_slice(&map[..FILE_HEADER_SIZE]);
        Ok(())
    }

    /// Extends the file by one zero-filled page and returns its page number.
    pub fn allocate_page(&mut self) -> Result<u32> {
        if self.page_size == 0 {
            return Err(DbError::Misuse("page size not set"));
        }
        let npage = self.n_pages.checked_add(1).ok_or(DbError::OutOfMemory)?;

        if let Some(map) = &self.mmap {
            map.flush()?;
        }
        let new_len = npage as u64 * self.page_size as u64;
        self.file.set_len(new_len)?;

        // SAFETY: the file was just extended to new_len, and the previous
        // mapping (if any) is dropped by the assignment. No MemPage aliases
        // the mapping, so remapping invalidates nothing.
        self.mmap = Some(unsafe { MmapMut::map_mut(&self.file)? });
        self.n_pages = npage;
        Ok(npage)
    }

    /// Returns an owned copy of page `npage`.
    pub fn read_page(&self, npage: u32) -> Result<MemPage> {
        self.check_bounds(npage)?;
        let map = self.mmap.as_ref().expect("pages exist, mapping present");
        let page_size = self.page_size as usize;
        let offset = (npage - 1) as usize * page_size;

        let mut data = vec![0u8; page_size].into_boxed_slice();
        data.copy_from_slice(&map[offset..offset + page_size]);
        Ok(MemPage { npage, data })
    }

    /// Writes the buffer back at its page offset.
    pub fn write_page(&mut self, page: &MemPage) -> Result<()> {
        self.check_bounds(page.npage)?;
        let map = self.mmap.as_mut().expect("pages exist, mapping present");
        let page_size = self.page_size as usize;
        let offset = (page.npage - 1) as usize * page_size;

        map[offset..offset + page_size].copy_from_slice(&page.data);
        Ok(())
    }

    /// Flushes the mapping to disk.
    pub fn sync(&self) -> Result<()> {
        if let Some(map) = &self.mmap {
            map.flush()?;
        }
        Ok(())
    }

    /// Flushes and releases the file.
    pub fn close(self) -> Result<()> {
        self.sync()
    }

    fn check_bounds(&self, npage: u32) -> Result<()> {
        if npage < 1 || npage > self.n_pages {
            return Err(DbError::PageOutOfBounds {
                npage,
                n_pages: self.n_pages,
            });
        }
        Ok(())
    }
}
