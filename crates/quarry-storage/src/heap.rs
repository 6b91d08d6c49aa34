//! Paged heap files.
//!
//! A heap file is an unordered sequence of fixed-size pages; page `i` lives
//! at byte offset `i * page_size`. Records are appended to a tail page that
//! is written out whenever it fills up or the file is flushed. Reads go
//! through a cursor that walks pages in order and slots within each page.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use quarry_common::{PageId, QuarryError, QuarryResult, RecordLocation};

use crate::page::Page;
use crate::record::Record;
use crate::schema::Schema;

/// Exact statistics gathered while loading a table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableStats {
    /// Number of tuples.
    pub tuples: u64,
    /// Distinct values per attribute, in schema order.
    pub distinct: Vec<u64>,
}

#[derive(Debug, Default)]
struct Cursor {
    page_id: u32,
    slot: usize,
    page: Option<Page>,
}

/// A heap file of fixed-size pages.
#[derive(Debug)]
pub struct HeapFile {
    path: PathBuf,
    file: File,
    page_size: usize,
    page_count: u32,
    tail: Option<(PageId, Page)>,
    tail_dirty: bool,
    writable: bool,
    cursor: Cursor,
}

impl HeapFile {
    /// Creates (or truncates) a heap file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be created.
    pub fn create(path: impl AsRef<Path>, page_size: usize) -> QuarryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        debug!(path = %path.display(), "created heap file");
        Ok(Self::with_file(path, file, page_size, 0, true))
    }

    /// Opens an existing heap file for reading. The file is reopened for
    /// writing on the first [`append`](Self::append).
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or its length is not a whole
    /// number of pages.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> QuarryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let len = file.metadata()?.len();
        let page_size_u64 = page_size as u64;
        if page_size == 0 || len % page_size_u64 != 0 {
            return Err(QuarryError::corruption(format!(
                "{} is {len} bytes, not a multiple of the {page_size} byte page size",
                path.display()
            )));
        }
        let page_count = u32::try_from(len / page_size_u64).map_err(|_| {
            QuarryError::corruption(format!("{} has too many pages", path.display()))
        })?;
        Ok(Self::with_file(path, file, page_size, page_count, false))
    }

    fn with_file(
        path: PathBuf,
        file: File,
        page_size: usize,
        page_count: u32,
        writable: bool,
    ) -> Self {
        Self {
            path,
            file,
            page_size,
            page_count,
            tail: None,
            tail_dirty: false,
            writable,
            cursor: Cursor::default(),
        }
    }

    fn ensure_writable(&mut self) -> QuarryResult<()> {
        if !self.writable {
            self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;
            self.writable = true;
            debug!(path = %self.path.display(), "reopened heap file for writing");
        }
        Ok(())
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages, including an unflushed tail page.
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Appends a record and returns where it was placed.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::RecordTooLarge`] for records that cannot fit
    /// in an empty page, or an I/O error when a full page cannot be written.
    pub fn append(&mut self, record: &Record) -> QuarryResult<RecordLocation> {
        let capacity = Page::max_record_size(self.page_size);
        if record.len() > capacity {
            return Err(QuarryError::RecordTooLarge {
                size: record.len(),
                capacity,
            });
        }

        self.ensure_writable()?;
        if self.tail.is_none() {
            self.tail = Some(self.open_tail()?);
        }
        let full = match &mut self.tail {
            Some((_, page)) => !page.append(record),
            None => return Err(QuarryError::internal("heap tail page missing")),
        };
        if full {
            self.flush()?;
            let next = PageId::new(self.page_count);
            self.page_count += 1;
            let mut page = Page::new(self.page_size);
            page.append(record);
            self.tail = Some((next, page));
        }
        self.tail_dirty = true;

        match &self.tail {
            Some((id, page)) => Ok(RecordLocation::new(*id, to_u32(page.len() - 1))),
            None => Err(QuarryError::internal("heap tail page missing")),
        }
    }

    /// Picks the page new records go to: the last page on disk, or a fresh
    /// page when the file is empty.
    fn open_tail(&mut self) -> QuarryResult<(PageId, Page)> {
        if self.page_count == 0 {
            self.page_count = 1;
            return Ok((PageId::FIRST, Page::new(self.page_size)));
        }
        let last = PageId::new(self.page_count - 1);
        let page = self.read_page(last)?;
        Ok((last, page))
    }

    /// Writes the tail page if it has unflushed records.
    ///
    /// # Errors
    ///
    /// Fails if the page cannot be written.
    pub fn flush(&mut self) -> QuarryResult<()> {
        if !self.tail_dirty {
            return Ok(());
        }
        if let Some((id, page)) = &self.tail {
            let bytes = page.to_bytes();
            self.file
                .seek(SeekFrom::Start(id.as_u64() * self.page_size as u64))?;
            self.file.write_all(&bytes)?;
        }
        self.tail_dirty = false;
        Ok(())
    }

    /// Flushes the tail page and syncs the file to disk.
    ///
    /// # Errors
    ///
    /// Fails if the flush or sync fails.
    pub fn finish(&mut self) -> QuarryResult<()> {
        self.flush()?;
        if self.writable {
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Reads a page by id.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::PageOutOfBounds`] for ids past the end of the
    /// file, or a corruption error if the page does not decode.
    pub fn get_page(&mut self, id: PageId) -> QuarryResult<Page> {
        if let Some((tail_id, page)) = &self.tail {
            if *tail_id == id {
                return Ok(page.clone());
            }
        }
        self.read_page(id)
    }

    fn read_page(&mut self, id: PageId) -> QuarryResult<Page> {
        if id.as_u32() >= self.page_count {
            return Err(QuarryError::PageOutOfBounds {
                page_id: i64::from(id.as_u32()),
                page_count: u64::from(self.page_count),
            });
        }
        let mut buf = vec![0u8; self.page_size];
        self.file
            .seek(SeekFrom::Start(id.as_u64() * self.page_size as u64))?;
        self.file.read_exact(&mut buf)?;
        Page::from_bytes(Bytes::from(buf), self.page_size)
    }

    /// Fetches the record at a location.
    ///
    /// # Errors
    ///
    /// Fails if the page is out of bounds or the slot does not exist.
    pub fn fetch(&mut self, location: RecordLocation) -> QuarryResult<Record> {
        let page = self.get_page(location.page)?;
        page.get(location.offset as usize).cloned().ok_or_else(|| {
            QuarryError::corruption(format!(
                "slot {} missing from heap page {} of {}",
                location.offset,
                location.page,
                self.path.display()
            ))
        })
    }

    /// Rewinds the sequential cursor to the first record.
    pub fn move_first(&mut self) {
        self.cursor = Cursor::default();
    }

    /// Returns the next record in page-then-slot order together with its
    /// location, or `None` once the file is exhausted.
    ///
    /// # Errors
    ///
    /// Fails if a page cannot be read.
    pub fn get_next(&mut self) -> QuarryResult<Option<(Record, RecordLocation)>> {
        loop {
            if self.cursor.page.is_none() {
                if self.cursor.page_id >= self.page_count {
                    return Ok(None);
                }
                let page = self.get_page(PageId::new(self.cursor.page_id))?;
                self.cursor.page = Some(page);
                self.cursor.slot = 0;
            }
            if let Some(page) = &self.cursor.page {
                if let Some(record) = page.get(self.cursor.slot) {
                    let location =
                        RecordLocation::new(PageId::new(self.cursor.page_id), to_u32(self.cursor.slot));
                    self.cursor.slot += 1;
                    return Ok(Some((record.clone(), location)));
                }
            }
            self.cursor.page = None;
            self.cursor.page_id += 1;
        }
    }

    /// Appends every line of a `|`-delimited text file and returns exact
    /// statistics for the loaded rows.
    ///
    /// Blank lines are skipped. The tail page is flushed before returning.
    ///
    /// # Errors
    ///
    /// Fails on unreadable input, malformed lines (reported with their line
    /// number), and write failures.
    pub fn load_text(&mut self, schema: &Schema, text: impl AsRef<Path>) -> QuarryResult<TableStats> {
        let text = text.as_ref();
        let reader = BufReader::new(File::open(text)?);
        let mut distinct: Vec<HashSet<Vec<u8>>> = vec![HashSet::new(); schema.len()];
        let mut tuples = 0u64;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = Record::parse_line(&line, schema).map_err(|e| {
                QuarryError::invalid_argument(format!(
                    "{}:{}: {e}",
                    text.display(),
                    line_no + 1
                ))
            })?;
            for (i, seen) in distinct.iter_mut().enumerate() {
                if let Some(bytes) = record.attribute_bytes(i) {
                    if !seen.contains(bytes) {
                        seen.insert(bytes.to_vec());
                    }
                }
            }
            self.append(&record)?;
            tuples += 1;
        }
        self.finish()?;

        let stats = TableStats {
            tuples,
            distinct: distinct.iter().map(|s| s.len() as u64).collect(),
        };
        info!(
            path = %self.path.display(),
            tuples,
            pages = self.page_count,
            "loaded heap file"
        );
        Ok(stats)
    }
}

fn to_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}
