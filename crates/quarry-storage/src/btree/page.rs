//! On-disk index page encoding.
//!
//! Every page is a run of little-endian `i32` fields padded with zeros to the
//! index page size:
//!
//! ```text
//! tree page: | kind | page_id | last_ptr | num_keys | entries ... | last_ptr |
//!   leaf entry:     | key | heap_page | slot |
//!   internal entry: | key | child |
//!
//! meta page: | 2 | magic | version | root | tree_pages | leaves | entries | fanout |
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use quarry_common::{
    QuarryError, QuarryResult, RecordLocation, INDEX_FIELD_SIZE, INDEX_HEADER_FIELDS,
    INTERNAL_ENTRY_FIELDS, LEAF_ENTRY_FIELDS,
};

const META_KIND: i32 = 2;
const META_MAGIC: i32 = 0x5142_5449; // "QBTI"
const META_VERSION: i32 = 1;
const META_FIELDS: usize = 8;

/// Kind of a tree page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum IndexPageKind {
    /// Separator keys and child pointers.
    Internal = 0,
    /// Keys and heap locations.
    Leaf = 1,
}

impl IndexPageKind {
    /// Decodes the kind field of a tree page.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Internal),
            1 => Some(Self::Leaf),
            _ => None,
        }
    }

    /// Encoded value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// One decoded tree page.
///
/// For internal pages `pointers[i]` is the child left of `keys[i]` and
/// `last_pointer` is the rightmost child, so a page with `n` keys has `n + 1`
/// children. For leaves `pointers[i]` and `offsets[i]` locate the tuple
/// holding `keys[i]` and `last_pointer` is `-1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPage {
    /// Page kind.
    pub kind: IndexPageKind,
    /// Tree page id.
    pub page_id: i32,
    /// Rightmost child, or `-1` on leaves.
    pub last_pointer: i32,
    /// Keys in ascending order.
    pub keys: Vec<i32>,
    /// Child ids (internal) or heap page numbers (leaf).
    pub pointers: Vec<i32>,
    /// In-page record slots; empty on internal pages.
    pub offsets: Vec<i32>,
}

impl IndexPage {
    /// Creates an empty leaf.
    pub fn leaf(page_id: i32) -> Self {
        Self {
            kind: IndexPageKind::Leaf,
            page_id,
            last_pointer: -1,
            keys: Vec::new(),
            pointers: Vec::new(),
            offsets: Vec::new(),
        }
    }

    /// Creates an internal page over `children`, using `separators[j - 1]`
    /// as the separator in front of `children[j]`.
    pub(crate) fn internal(page_id: i32, children: &[i32], separators: &[i32]) -> Self {
        let (last, rest) = children.split_last().map_or((-1, &[][..]), |(l, r)| (*l, r));
        Self {
            kind: IndexPageKind::Internal,
            page_id,
            last_pointer: last,
            keys: separators.to_vec(),
            pointers: rest.to_vec(),
            offsets: Vec::new(),
        }
    }

    /// Returns true for leaf pages.
    pub fn is_leaf(&self) -> bool {
        self.kind == IndexPageKind::Leaf
    }

    /// Number of keys on the page.
    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    /// Children of an internal page, left to right.
    pub fn children(&self) -> Vec<i32> {
        if self.is_leaf() {
            return Vec::new();
        }
        let mut children = self.pointers.clone();
        children.push(self.last_pointer);
        children
    }

    /// Adds a leaf entry.
    pub(crate) fn push_entry(&mut self, key: i32, location: RecordLocation) {
        self.keys.push(key);
        self.pointers
            .push(i32::try_from(location.page.as_u32()).unwrap_or(i32::MAX));
        self.offsets
            .push(i32::try_from(location.offset).unwrap_or(i32::MAX));
    }

    /// Heap location of leaf entry `i`.
    ///
    /// # Errors
    ///
    /// Fails on internal pages, out-of-range entries, and negative fields.
    pub fn location(&self, i: usize) -> QuarryResult<RecordLocation> {
        match (self.is_leaf(), self.pointers.get(i), self.offsets.get(i)) {
            (true, Some(&page), Some(&offset)) => {
                let page = u32::try_from(page).map_err(|_| self.corrupt("negative heap page"))?;
                let offset =
                    u32::try_from(offset).map_err(|_| self.corrupt("negative record slot"))?;
                Ok(RecordLocation::new(page.into(), offset))
            }
            _ => Err(self.corrupt(&format!("no leaf entry {i}"))),
        }
    }

    fn corrupt(&self, what: &str) -> QuarryError {
        QuarryError::corruption(format!("index page {}: {what}", self.page_id))
    }

    /// Bytes needed to encode this page.
    pub fn encoded_len(&self) -> usize {
        let per_entry = if self.is_leaf() {
            LEAF_ENTRY_FIELDS
        } else {
            INTERNAL_ENTRY_FIELDS
        };
        (INDEX_HEADER_FIELDS + self.keys.len() * per_entry + 1) * INDEX_FIELD_SIZE
    }

    /// Encodes the page into exactly `page_size` bytes.
    ///
    /// # Errors
    ///
    /// Fails if the page does not fit.
    pub fn encode(&self, page_size: usize) -> QuarryResult<Bytes> {
        if self.encoded_len() > page_size {
            return Err(QuarryError::RecordTooLarge {
                size: self.encoded_len(),
                capacity: page_size,
            });
        }
        let mut buf = BytesMut::with_capacity(page_size);
        buf.put_i32_le(self.kind.as_i32());
        buf.put_i32_le(self.page_id);
        buf.put_i32_le(self.last_pointer);
        buf.put_i32_le(i32::try_from(self.keys.len()).unwrap_or(i32::MAX));
        for (i, key) in self.keys.iter().enumerate() {
            buf.put_i32_le(*key);
            buf.put_i32_le(self.pointers[i]);
            if self.is_leaf() {
                buf.put_i32_le(self.offsets[i]);
            }
        }
        buf.put_i32_le(self.last_pointer);
        buf.resize(page_size, 0);
        Ok(buf.freeze())
    }

    /// Decodes a tree page.
    ///
    /// # Errors
    ///
    /// Returns a corruption error for unknown kinds or truncated entries.
    pub fn decode(mut data: &[u8]) -> QuarryResult<Self> {
        if data.len() < INDEX_HEADER_FIELDS * INDEX_FIELD_SIZE {
            return Err(QuarryError::corruption("index page shorter than its header"));
        }
        let kind = data.get_i32_le();
        let page_id = data.get_i32_le();
        let kind = IndexPageKind::from_i32(kind).ok_or_else(|| {
            QuarryError::corruption(format!("index page {page_id} has unknown kind {kind}"))
        })?;
        let last_pointer = data.get_i32_le();
        let num_keys = usize::try_from(data.get_i32_le()).map_err(|_| {
            QuarryError::corruption(format!("index page {page_id} has a negative key count"))
        })?;

        let per_entry = match kind {
            IndexPageKind::Leaf => LEAF_ENTRY_FIELDS,
            IndexPageKind::Internal => INTERNAL_ENTRY_FIELDS,
        };
        let needed = num_keys
            .saturating_mul(per_entry * INDEX_FIELD_SIZE)
            .saturating_add(INDEX_FIELD_SIZE);
        if data.remaining() < needed {
            return Err(QuarryError::corruption(format!(
                "index page {page_id} claims {num_keys} keys but is too short"
            )));
        }

        let mut page = Self {
            kind,
            page_id,
            last_pointer,
            keys: Vec::with_capacity(num_keys),
            pointers: Vec::with_capacity(num_keys),
            offsets: Vec::new(),
        };
        for _ in 0..num_keys {
            page.keys.push(data.get_i32_le());
            page.pointers.push(data.get_i32_le());
            if kind == IndexPageKind::Leaf {
                page.offsets.push(data.get_i32_le());
            }
        }
        if data.get_i32_le() != last_pointer {
            return Err(QuarryError::corruption(format!(
                "index page {page_id} has mismatched trailing pointer"
            )));
        }
        Ok(page)
    }
}

/// Contents of the metadata page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMeta {
    /// Root tree page id.
    pub root: i32,
    /// Number of tree pages (excluding the metadata page).
    pub tree_pages: i32,
    /// Number of leaves; leaves are tree pages `0..leaf_count`.
    pub leaf_count: i32,
    /// Number of indexed entries.
    pub entry_count: i32,
    /// Maximum entries per leaf and children per internal page.
    pub fanout: i32,
}

impl IndexMeta {
    pub(crate) fn encode(&self, page_size: usize) -> QuarryResult<Bytes> {
        if META_FIELDS * INDEX_FIELD_SIZE > page_size {
            return Err(QuarryError::invalid_argument(format!(
                "index page size {page_size} cannot hold the metadata page"
            )));
        }
        let mut buf = BytesMut::with_capacity(page_size);
        for field in [
            META_KIND,
            META_MAGIC,
            META_VERSION,
            self.root,
            self.tree_pages,
            self.leaf_count,
            self.entry_count,
            self.fanout,
        ] {
            buf.put_i32_le(field);
        }
        buf.resize(page_size, 0);
        Ok(buf.freeze())
    }

    pub(crate) fn decode(mut data: &[u8]) -> QuarryResult<Self> {
        if data.len() < META_FIELDS * INDEX_FIELD_SIZE {
            return Err(QuarryError::corruption("index metadata page truncated"));
        }
        let (kind, magic, version) = (data.get_i32_le(), data.get_i32_le(), data.get_i32_le());
        if kind != META_KIND || magic != META_MAGIC {
            return Err(QuarryError::corruption("not a quarry index file"));
        }
        if version != META_VERSION {
            return Err(QuarryError::corruption(format!(
                "unsupported index version {version}"
            )));
        }
        let meta = Self {
            root: data.get_i32_le(),
            tree_pages: data.get_i32_le(),
            leaf_count: data.get_i32_le(),
            entry_count: data.get_i32_le(),
            fanout: data.get_i32_le(),
        };
        if meta.tree_pages < 1
            || meta.leaf_count < 1
            || meta.leaf_count > meta.tree_pages
            || !(0..meta.tree_pages).contains(&meta.root)
        {
            return Err(QuarryError::corruption(format!(
                "inconsistent index metadata {meta:?}"
            )));
        }
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_common::{index_page_bytes, PageId};

    #[test]
    fn test_leaf_round_trip() {
        let mut leaf = IndexPage::leaf(3);
        leaf.push_entry(5, RecordLocation::new(PageId::new(2), 7));
        leaf.push_entry(9, RecordLocation::new(PageId::new(4), 0));

        let bytes = leaf.encode(128).unwrap();
        assert_eq!(bytes.len(), 128);
        let decoded = IndexPage::decode(&bytes).unwrap();
        assert_eq!(decoded, leaf);
        assert_eq!(decoded.location(0).unwrap(), RecordLocation::new(PageId::new(2), 7));
        assert!(decoded.location(2).is_err());
    }

    #[test]
    fn test_internal_layout() {
        let page = IndexPage::internal(10, &[0, 1, 2], &[40, 80]);
        assert_eq!(page.num_keys(), 2);
        assert_eq!(page.children(), vec![0, 1, 2]);
        assert_eq!(page.last_pointer, 2);

        let bytes = page.encode(64).unwrap();
        let fields: Vec<i32> = bytes
            .chunks(4)
            .take(9)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(fields, vec![0, 10, 2, 2, 40, 0, 80, 1, 2]);
        assert_eq!(IndexPage::decode(&bytes).unwrap(), page);
    }

    #[test]
    fn test_full_page_fits_page_bytes() {
        let mut leaf = IndexPage::leaf(0);
        for k in 0..100 {
            leaf.push_entry(k, RecordLocation::new(PageId::new(0), 0));
        }
        assert_eq!(leaf.encoded_len(), index_page_bytes(100));
        assert!(leaf.encode(index_page_bytes(100)).is_ok());
        assert!(leaf.encode(index_page_bytes(100) - 4).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(IndexPage::decode(&[0u8; 8]).is_err());
        let mut bad = vec![0u8; 64];
        bad[0] = 7;
        assert!(IndexPage::decode(&bad).is_err());
        let mut short = vec![0u8; 64];
        short[0] = 1;
        short[12] = 50;
        assert!(IndexPage::decode(&short).is_err());
    }

    #[test]
    fn test_meta_round_trip() {
        let meta = IndexMeta {
            root: 4,
            tree_pages: 5,
            leaf_count: 3,
            entry_count: 250,
            fanout: 100,
        };
        let bytes = meta.encode(64).unwrap();
        assert_eq!(IndexMeta::decode(&bytes).unwrap(), meta);
        assert!(IndexMeta::decode(&[0u8; 64]).is_err());
        assert!(IndexPage::decode(&bytes).is_err());
    }
}
