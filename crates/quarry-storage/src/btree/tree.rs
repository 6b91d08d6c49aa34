//! Index build and disk traversal.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use quarry_common::{QuarryError, QuarryResult, RecordLocation, StorageConfig};

use super::page::{IndexMeta, IndexPage};
use crate::catalog::Catalog;
use crate::heap::HeapFile;
use crate::schema::DataType;

/// A read-only B+-tree index file.
///
/// Lookups take `&self`; the file handle sits behind a mutex because every
/// page read seeks.
#[derive(Debug)]
pub struct BTreeIndex {
    path: PathBuf,
    file: Mutex<File>,
    page_size: usize,
    meta: IndexMeta,
}

impl BTreeIndex {
    /// Builds an index on `table.attribute` by scanning the table's heap
    /// file, writes it to `path`, and registers it with the catalog.
    ///
    /// The catalog is only updated once the index file is complete.
    ///
    /// # Errors
    ///
    /// Fails on unknown tables or attributes, non-integer attributes
    /// ([`QuarryError::UnsupportedIndex`]), invalid storage settings, and
    /// I/O errors.
    pub fn build(
        catalog: &Catalog,
        table: &str,
        attribute: &str,
        path: impl AsRef<Path>,
        config: &StorageConfig,
    ) -> QuarryResult<Self> {
        let schema = catalog.resolve_schema(table)?;
        let position = schema.resolve(attribute)?;
        let data_type = schema
            .attribute(position)
            .map(|a| a.data_type)
            .ok_or_else(|| QuarryError::attribute_not_found(attribute))?;
        if data_type != DataType::Integer {
            return Err(QuarryError::UnsupportedIndex {
                table: table.to_string(),
                attribute: attribute.to_string(),
                data_type: data_type.to_string(),
            });
        }

        let mut heap = HeapFile::open(catalog.resolve_data_file(table)?, config.page_size)?;
        heap.move_first();
        let mut entries = Vec::new();
        while let Some((record, location)) = heap.get_next()? {
            entries.push((record.int(position)?, location));
        }
        debug!(table, attribute, entries = entries.len(), "collected index entries");

        let index = Self::bulk_load(path, entries, config)?;
        catalog.register_index(table, attribute, &index.path)?;
        info!(
            table,
            attribute,
            path = %index.path.display(),
            pages = index.meta.tree_pages,
            "built index"
        );
        Ok(index)
    }

    /// Writes an index over arbitrary `(key, location)` entries.
    ///
    /// Entries are sorted by key; ties keep their input order.
    ///
    /// # Errors
    ///
    /// Fails on invalid storage settings or I/O errors.
    pub fn bulk_load(
        path: impl AsRef<Path>,
        mut entries: Vec<(i32, RecordLocation)>,
        config: &StorageConfig,
    ) -> QuarryResult<Self> {
        config.validate()?;
        let fanout = config.index_fanout;
        entries.sort_by_key(|(key, _)| *key);

        let mut pages: Vec<IndexPage> = Vec::new();
        // (page id, minimum key of its subtree)
        let mut level: Vec<(i32, i32)> = Vec::new();

        if entries.is_empty() {
            pages.push(IndexPage::leaf(0));
            level.push((0, 0));
        }
        for chunk in entries.chunks(fanout) {
            let mut leaf = IndexPage::leaf(to_page_id(pages.len())?);
            for (key, location) in chunk {
                leaf.push_entry(*key, *location);
            }
            level.push((leaf.page_id, chunk[0].0));
            pages.push(leaf);
        }
        let leaf_count = pages.len();

        while level.len() > 1 {
            let mut parents = Vec::with_capacity(level.len().div_ceil(fanout));
            for group in level.chunks(fanout) {
                let children: Vec<i32> = group.iter().map(|(id, _)| *id).collect();
                let separators: Vec<i32> = group[1..].iter().map(|(_, min)| *min).collect();
                let parent = IndexPage::internal(to_page_id(pages.len())?, &children, &separators);
                parents.push((parent.page_id, group[0].1));
                pages.push(parent);
            }
            level = parents;
        }

        let meta = IndexMeta {
            root: level[0].0,
            tree_pages: to_page_id(pages.len())?,
            leaf_count: to_page_id(leaf_count)?,
            entry_count: i32::try_from(entries.len()).map_err(|_| {
                QuarryError::invalid_argument("too many entries for one index")
            })?,
            fanout: to_page_id(fanout)?,
        };

        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;
        let page_size = config.index_page_size;
        file.write_all(&meta.encode(page_size)?)?;
        for page in &pages {
            file.write_all(&page.encode(page_size)?)?;
        }
        file.sync_all()?;
        debug!(
            path = %path.display(),
            root = meta.root,
            leaves = meta.leaf_count,
            pages = meta.tree_pages,
            "wrote index file"
        );

        Ok(Self {
            path,
            file: Mutex::new(file),
            page_size,
            meta,
        })
    }

    /// Reopens an index file, reading the root from its metadata page.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or its metadata does not match its
    /// length.
    pub fn open(path: impl AsRef<Path>, page_size: usize) -> QuarryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let len = file.metadata()?.len();
        if page_size == 0 || len % page_size as u64 != 0 {
            return Err(QuarryError::corruption(format!(
                "{} is {len} bytes, not a multiple of the {page_size} byte index page size",
                path.display()
            )));
        }
        let mut buf = vec![0u8; page_size];
        file.read_exact(&mut buf)?;
        let meta = IndexMeta::decode(&buf)?;
        let slots = len / page_size as u64;
        if slots != u64::try_from(meta.tree_pages).unwrap_or(0) + 1 {
            return Err(QuarryError::corruption(format!(
                "{} has {slots} page slots, metadata expects {}",
                path.display(),
                meta.tree_pages + 1
            )));
        }
        debug!(path = %path.display(), root = meta.root, "opened index");
        Ok(Self {
            path,
            file: Mutex::new(file),
            page_size,
            meta,
        })
    }

    /// Path of the index file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persisted metadata.
    pub fn meta(&self) -> IndexMeta {
        self.meta
    }

    /// Root tree page id.
    pub fn root(&self) -> i32 {
        self.meta.root
    }

    /// Number of tree pages, excluding the metadata page.
    pub fn page_count(&self) -> usize {
        usize::try_from(self.meta.tree_pages).unwrap_or(0)
    }

    /// Number of leaf pages.
    pub fn leaf_count(&self) -> usize {
        usize::try_from(self.meta.leaf_count).unwrap_or(0)
    }

    /// Number of indexed entries.
    pub fn entry_count(&self) -> usize {
        usize::try_from(self.meta.entry_count).unwrap_or(0)
    }

    /// Reads and decodes tree page `id`.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::PageOutOfBounds`] for ids outside the tree,
    /// and a corruption error if the page does not decode.
    pub fn read_page(&self, id: i32) -> QuarryResult<IndexPage> {
        if id < 0 || id >= self.meta.tree_pages {
            return Err(QuarryError::PageOutOfBounds {
                page_id: i64::from(id),
                page_count: u64::try_from(self.meta.tree_pages).unwrap_or(0),
            });
        }
        let mut buf = vec![0u8; self.page_size];
        {
            let mut file = self.file.lock();
            let slot = u64::try_from(id).unwrap_or(0) + 1;
            file.seek(SeekFrom::Start(slot * self.page_size as u64))?;
            file.read_exact(&mut buf)?;
        }
        let page = IndexPage::decode(&buf)?;
        if page.page_id != id {
            return Err(QuarryError::corruption(format!(
                "index slot for page {id} holds page {}",
                page.page_id
            )));
        }
        Ok(page)
    }

    /// Point lookup. Returns the first exact match in the leaf the key
    /// routes to, or `None`.
    ///
    /// # Errors
    ///
    /// Fails if a page on the path cannot be read.
    pub fn find(&self, key: i32) -> QuarryResult<Option<RecordLocation>> {
        let leaf = self.descend(|separator| key >= separator)?;
        match leaf.keys.iter().position(|&k| k == key) {
            Some(i) => leaf.location(i).map(Some),
            None => Ok(None),
        }
    }

    /// Locations of every key in `[lo, hi]`, in key order.
    ///
    /// # Errors
    ///
    /// Fails if a page on the path cannot be read.
    pub fn range(&self, lo: i32, hi: i32) -> QuarryResult<Vec<RecordLocation>> {
        let mut out = Vec::new();
        if lo > hi {
            return Ok(out);
        }
        let mut leaf = self.descend(|separator| lo > separator)?;
        loop {
            for (i, &key) in leaf.keys.iter().enumerate() {
                if key > hi {
                    return Ok(out);
                }
                if key >= lo {
                    out.push(leaf.location(i)?);
                }
            }
            let next = leaf.page_id + 1;
            if next >= self.meta.leaf_count {
                return Ok(out);
            }
            leaf = self.read_page(next)?;
        }
    }

    /// Locations of every entry equal to `key`.
    ///
    /// # Errors
    ///
    /// Fails if a page on the path cannot be read.
    pub fn find_all(&self, key: i32) -> QuarryResult<Vec<RecordLocation>> {
        self.range(key, key)
    }

    /// Walks from the root to a leaf, moving right past every separator for
    /// which `go_right` holds.
    fn descend(&self, go_right: impl Fn(i32) -> bool) -> QuarryResult<IndexPage> {
        let mut id = self.meta.root;
        for _ in 0..=self.meta.tree_pages {
            let page = self.read_page(id)?;
            if page.is_leaf() {
                return Ok(page);
            }
            let i = page.keys.iter().take_while(|&&k| go_right(k)).count();
            id = page.pointers.get(i).copied().unwrap_or(page.last_pointer);
        }
        Err(QuarryError::corruption(format!(
            "{} has a cycle in its tree pages",
            self.path.display()
        )))
    }
}

fn to_page_id(n: usize) -> QuarryResult<i32> {
    i32::try_from(n).map_err(|_| QuarryError::invalid_argument("index exceeds i32 page ids"))
}
