//! B+tree node layout over buffer-pool pages.
//!
//! Every node occupies exactly one extent: a fixed header, then a packed
//! key array, then a packed element array. Elements are child extent ids
//! in internal nodes and values in leaves. Slot geometry is computed once
//! at node creation and persisted in the header.

use oak_buffer::{BufferHandle, BufferPool};
use oak_common::{ExtentId, FixedCodec, OakError, Result};
use std::marker::PhantomData;

/// Node kind stored in the page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeKind {
    /// Keys are separators; elements are child extent ids.
    Internal = 0,
    /// Keys and values form parallel sorted arrays.
    Leaf = 1,
}

impl NodeKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(NodeKind::Internal),
            1 => Some(NodeKind::Leaf),
            _ => None,
        }
    }
}

/// Header at the start of every index page.
///
/// Layout (40 bytes):
/// - kind: 1 byte
/// - reserved: 3 bytes
/// - num_elements: 4 bytes
/// - max_elements: 4 bytes
/// - key_size: 4 bytes
/// - element_size: 4 bytes
/// - key_start: 4 bytes
/// - element_start: 4 bytes
/// - reserved: 4 bytes
/// - next: 8 bytes (next leaf in key order; invalid for internal nodes)
#[derive(Debug, Clone, Copy)]
pub struct NodeHeader {
    /// Whether the page holds an internal node or a leaf.
    pub kind: NodeKind,
    /// Current population: key/value pairs in a leaf, populated
    /// separator keys in an internal node (which routes one more child
    /// than it has keys).
    pub num_elements: u32,
    /// Slot capacity derived from the extent size at creation.
    pub max_elements: u32,
    /// Encoded key size in bytes.
    pub key_size: u32,
    /// Encoded element size in bytes (child id or value).
    pub element_size: u32,
    /// Byte offset of the key array.
    pub key_start: u32,
    /// Byte offset of the element array.
    pub element_start: u32,
    /// Next leaf in the forward chain.
    pub next: ExtentId,
}

impl NodeHeader {
    /// Size of the node header in bytes.
    pub const SIZE: usize = 40;

    /// Serializes the header to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.kind as u8;
        buf[4..8].copy_from_slice(&self.num_elements.to_le_bytes());
        buf[8..12].copy_from_slice(&self.max_elements.to_le_bytes());
        buf[12..16].copy_from_slice(&self.key_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.element_size.to_le_bytes());
        buf[20..24].copy_from_slice(&self.key_start.to_le_bytes());
        buf[24..28].copy_from_slice(&self.element_start.to_le_bytes());
        buf[32..40].copy_from_slice(&self.next.0.to_le_bytes());
        buf
    }

    /// Deserializes the header from page bytes. Returns None for an
    /// unrecognized kind byte.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        let kind = NodeKind::from_u8(buf[0])?;
        Some(Self {
            kind,
            num_elements: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            max_elements: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            key_size: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]),
            element_size: u32::from_le_bytes([buf[16], buf[17], buf[18], buf[19]]),
            key_start: u32::from_le_bytes([buf[20], buf[21], buf[22], buf[23]]),
            element_start: u32::from_le_bytes([buf[24], buf[25], buf[26], buf[27]]),
            next: ExtentId(u64::from_le_bytes([
                buf[32], buf[33], buf[34], buf[35], buf[36], buf[37], buf[38], buf[39],
            ])),
        })
    }
}

/// Slot geometry for a page: capacity and array offsets.
///
/// `key_start` is pushed past the header to a key-size boundary;
/// `element_start` is the key array end rounded up to an element-size
/// multiple. The capacity formula reserves one key and one element of
/// slack so both roundings always fit.
pub(crate) fn page_layout(
    extent_size: usize,
    key_size: usize,
    element_size: usize,
) -> (u32, u32, u32) {
    let available = extent_size - NodeHeader::SIZE - key_size - element_size;
    let max_elements = available / (key_size + element_size);

    let key_start = NodeHeader::SIZE.max(key_size);
    let key_end = key_start + key_size * max_elements;
    let element_start = key_end.div_ceil(element_size) * element_size;

    debug_assert!(element_start + element_size * max_elements <= extent_size);
    debug_assert!(max_elements >= 3, "extent too small for index pages");

    (max_elements as u32, key_start as u32, element_start as u32)
}

/// A loaded B+tree node: a pinned page plus its cached header.
///
/// Mutations go through the typed slot accessors and keep the in-page
/// header in sync. `unload` forwards the dirty flag to the pool and
/// unpins; `destroy` unpins and releases the extent. A node dropped
/// without either (an abandoned error path) unpins itself.
pub(crate) struct Node<'a, K, V> {
    pool: &'a BufferPool,
    handle: BufferHandle<'a>,
    header: NodeHeader,
    dirty: bool,
    finished: bool,
    _types: PhantomData<(K, V)>,
}

impl<'a, K, V> std::fmt::Debug for Node<'a, K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("extent_id", &self.handle.extent_id())
            .field("header", &self.header)
            .field("dirty", &self.dirty)
            .field("finished", &self.finished)
            .finish()
    }
}

impl<'a, K: FixedCodec + Ord, V: FixedCodec> Node<'a, K, V> {
    /// Element size for a node kind: child ids for internal nodes,
    /// values for leaves.
    fn element_size_for(kind: NodeKind) -> usize {
        match kind {
            NodeKind::Internal => ExtentId::SIZE,
            NodeKind::Leaf => V::SIZE,
        }
    }

    /// Allocates and initializes a fresh node, pinned with count 1.
    pub fn create(pool: &'a BufferPool, kind: NodeKind) -> Result<Self> {
        let handle = pool.alloc()?;
        let element_size = Self::element_size_for(kind);
        let (max_elements, key_start, element_start) =
            page_layout(pool.extent_size(), K::SIZE, element_size);

        let header = NodeHeader {
            kind,
            num_elements: 0,
            max_elements,
            key_size: K::SIZE as u32,
            element_size: element_size as u32,
            key_start,
            element_start,
            next: ExtentId::INVALID,
        };

        {
            let mut data = handle.data_mut();
            data[..NodeHeader::SIZE].copy_from_slice(&header.to_bytes());
            if kind == NodeKind::Internal {
                // Child slots start at the invalid sentinel; the slot
                // rule depends on it to bound its scan.
                let start = element_start as usize;
                let end = start + element_size * max_elements as usize;
                data[start..end].fill(0xFF);
            }
        }

        Ok(Self {
            pool,
            handle,
            header,
            dirty: true,
            finished: false,
            _types: PhantomData,
        })
    }

    /// Pins an existing node and validates its header against the
    /// caller's key and value types.
    pub fn load(pool: &'a BufferPool, extent_id: ExtentId) -> Result<Self> {
        let handle = pool.pin(extent_id)?;

        let corrupted = |reason: &str| OakError::CorruptedPage {
            extent_id: extent_id.0,
            reason: reason.to_string(),
        };

        let header = {
            let data = handle.data();
            NodeHeader::from_bytes(&data[..NodeHeader::SIZE])
        };
        let header = match header {
            Some(header) => header,
            None => {
                pool.unpin(extent_id)?;
                return Err(corrupted("unknown node kind"));
            }
        };

        // The node drops (and unpins) on any validation failure below.
        let node = Self {
            pool,
            handle,
            header,
            dirty: false,
            finished: false,
            _types: PhantomData,
        };

        if node.header.key_size as usize != K::SIZE {
            return Err(corrupted("key size mismatch"));
        }
        if node.header.element_size as usize != Self::element_size_for(node.header.kind) {
            return Err(corrupted("element size mismatch"));
        }

        Ok(node)
    }

    /// Marks the page dirty in the pool when modified, then unpins.
    pub fn unload(mut self) -> Result<()> {
        if self.dirty {
            self.pool.mark_dirty(self.extent_id())?;
        }
        self.finished = true;
        self.pool.unpin(self.extent_id())
    }

    /// Unpins and releases the node's extent for reuse.
    pub fn destroy(mut self) -> Result<()> {
        self.finished = true;
        let extent_id = self.extent_id();
        self.pool.unpin(extent_id)?;
        self.pool.release(extent_id)
    }

    /// Returns the extent backing this node.
    #[inline]
    pub fn extent_id(&self) -> ExtentId {
        self.handle.extent_id()
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.header.kind
    }

    #[inline]
    pub fn num_elements(&self) -> usize {
        self.header.num_elements as usize
    }

    #[inline]
    pub fn max_elements(&self) -> usize {
        self.header.max_elements as usize
    }

    /// A full node must split before it can take another element.
    ///
    /// A leaf fills every slot pair; an internal node runs out one key
    /// earlier, since its `num_elements` keys route `num_elements + 1`
    /// children and the child array holds `max_elements` slots.
    #[inline]
    pub fn is_full(&self) -> bool {
        match self.kind() {
            NodeKind::Leaf => self.num_elements() == self.max_elements(),
            NodeKind::Internal => self.num_elements() + 1 == self.max_elements(),
        }
    }

    /// An underfull node triggers rebalancing in its parent.
    #[inline]
    pub fn is_underfull(&self) -> bool {
        self.num_elements() < self.max_elements().div_ceil(2)
    }

    /// Next leaf in the forward chain.
    #[inline]
    pub fn next(&self) -> ExtentId {
        self.header.next
    }

    pub fn set_next(&mut self, next: ExtentId) {
        self.header.next = next;
        self.write_header();
    }

    pub fn set_num_elements(&mut self, num: usize) {
        self.header.num_elements = num as u32;
        self.write_header();
    }

    fn write_header(&mut self) {
        let bytes = self.header.to_bytes();
        self.handle.data_mut()[..NodeHeader::SIZE].copy_from_slice(&bytes);
        self.dirty = true;
    }

    #[inline]
    fn key_offset(&self, idx: usize) -> usize {
        self.header.key_start as usize + idx * K::SIZE
    }

    #[inline]
    fn element_offset(&self, idx: usize) -> usize {
        self.header.element_start as usize + idx * self.header.element_size as usize
    }

    /// Reads the key at slot `idx`.
    pub fn key(&self, idx: usize) -> K {
        debug_assert!(idx < self.max_elements());
        let off = self.key_offset(idx);
        K::decode(&self.handle.data()[off..off + K::SIZE])
    }

    /// Writes the key at slot `idx`.
    pub fn set_key(&mut self, idx: usize, key: &K) {
        debug_assert!(idx < self.max_elements());
        let off = self.key_offset(idx);
        key.encode(&mut self.handle.data_mut()[off..off + K::SIZE]);
        self.dirty = true;
    }

    /// Reads the child id at slot `idx` (internal nodes).
    pub fn child(&self, idx: usize) -> ExtentId {
        debug_assert_eq!(self.kind(), NodeKind::Internal);
        let off = self.element_offset(idx);
        ExtentId::decode(&self.handle.data()[off..off + ExtentId::SIZE])
    }

    /// Writes the child id at slot `idx` (internal nodes).
    pub fn set_child(&mut self, idx: usize, child: ExtentId) {
        debug_assert_eq!(self.kind(), NodeKind::Internal);
        let off = self.element_offset(idx);
        child.encode(&mut self.handle.data_mut()[off..off + ExtentId::SIZE]);
        self.dirty = true;
    }

    /// Reads the value at slot `idx` (leaves).
    pub fn value(&self, idx: usize) -> V {
        debug_assert_eq!(self.kind(), NodeKind::Leaf);
        let off = self.element_offset(idx);
        V::decode(&self.handle.data()[off..off + V::SIZE])
    }

    /// Writes the value at slot `idx` (leaves).
    pub fn set_value(&mut self, idx: usize, value: &V) {
        debug_assert_eq!(self.kind(), NodeKind::Leaf);
        let off = self.element_offset(idx);
        value.encode(&mut self.handle.data_mut()[off..off + V::SIZE]);
        self.dirty = true;
    }

    // ------------------------------------------------------------------
    // Slot rules
    // ------------------------------------------------------------------

    /// Child slot for `key` in an internal node.
    ///
    /// Advances while the slot to the right exists and `key` is at least
    /// the separator, so a key equal to a separator descends into the
    /// right subtree.
    pub fn internal_slot(&self, key: &K) -> usize {
        debug_assert_eq!(self.kind(), NodeKind::Internal);
        let max = self.max_elements();
        let mut i = 0;
        while i + 1 < max && self.child(i + 1).is_valid() && *key >= self.key(i) {
            i += 1;
        }
        i
    }

    /// Lower-bound slot for `key` in a leaf: the smallest index whose key
    /// is not less than `key`, or `num_elements` past the end.
    pub fn leaf_slot(&self, key: &K) -> usize {
        debug_assert_eq!(self.kind(), NodeKind::Leaf);
        let mut lo = 0;
        let mut hi = self.num_elements();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key(mid) < *key {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    // ------------------------------------------------------------------
    // Leaf mutations
    // ------------------------------------------------------------------

    /// Shift-inserts a key/value pair at `idx`. The leaf must not be full.
    pub fn leaf_insert_at(&mut self, idx: usize, key: &K, value: &V) {
        debug_assert_eq!(self.kind(), NodeKind::Leaf);
        debug_assert!(!self.is_full());
        let num = self.num_elements();
        debug_assert!(idx <= num);
        let vs = V::SIZE;
        {
            let mut data = self.handle.data_mut();
            let ko = self.header.key_start as usize;
            let eo = self.header.element_start as usize;
            data.copy_within(ko + idx * K::SIZE..ko + num * K::SIZE, ko + (idx + 1) * K::SIZE);
            data.copy_within(eo + idx * vs..eo + num * vs, eo + (idx + 1) * vs);
            key.encode(&mut data[ko + idx * K::SIZE..ko + (idx + 1) * K::SIZE]);
            value.encode(&mut data[eo + idx * vs..eo + (idx + 1) * vs]);
        }
        self.set_num_elements(num + 1);
    }

    /// Shift-removes the pair at `idx`.
    pub fn leaf_remove_at(&mut self, idx: usize) {
        debug_assert_eq!(self.kind(), NodeKind::Leaf);
        let num = self.num_elements();
        debug_assert!(idx < num);
        let vs = V::SIZE;
        {
            let mut data = self.handle.data_mut();
            let ko = self.header.key_start as usize;
            let eo = self.header.element_start as usize;
            data.copy_within(ko + (idx + 1) * K::SIZE..ko + num * K::SIZE, ko + idx * K::SIZE);
            data.copy_within(eo + (idx + 1) * vs..eo + num * vs, eo + idx * vs);
        }
        self.set_num_elements(num - 1);
    }

    // ------------------------------------------------------------------
    // Internal mutations
    // ------------------------------------------------------------------

    /// Splices a separator and its right child after slot `slot`.
    ///
    /// Keys shift right from `slot`, children from `slot + 1`; then
    /// `keys[slot] = sep` and `children[slot + 1] = child`. The node must
    /// not be full.
    pub fn internal_insert_at(&mut self, slot: usize, sep: &K, child: ExtentId) {
        debug_assert_eq!(self.kind(), NodeKind::Internal);
        debug_assert!(!self.is_full());
        let num = self.num_elements();
        debug_assert!(slot <= num);
        {
            let mut data = self.handle.data_mut();
            let ko = self.header.key_start as usize;
            let eo = self.header.element_start as usize;
            let es = ExtentId::SIZE;
            // num keys route num + 1 children.
            data.copy_within(ko + slot * K::SIZE..ko + num * K::SIZE, ko + (slot + 1) * K::SIZE);
            data.copy_within(eo + (slot + 1) * es..eo + (num + 1) * es, eo + (slot + 2) * es);
            sep.encode(&mut data[ko + slot * K::SIZE..ko + (slot + 1) * K::SIZE]);
            child.encode(&mut data[eo + (slot + 1) * es..eo + (slot + 2) * es]);
        }
        self.set_num_elements(num + 1);
    }

    /// Removes the separator at `sep_idx` and the child to its right.
    pub fn internal_remove_entry(&mut self, sep_idx: usize) {
        debug_assert_eq!(self.kind(), NodeKind::Internal);
        let num = self.num_elements();
        debug_assert!(sep_idx < num);
        {
            let mut data = self.handle.data_mut();
            let ko = self.header.key_start as usize;
            let eo = self.header.element_start as usize;
            let es = ExtentId::SIZE;
            data.copy_within(
                ko + (sep_idx + 1) * K::SIZE..ko + num * K::SIZE,
                ko + sep_idx * K::SIZE,
            );
            data.copy_within(
                eo + (sep_idx + 2) * es..eo + (num + 1) * es,
                eo + (sep_idx + 1) * es,
            );
        }
        self.set_num_elements(num - 1);
        // The vacated last child slot must read as invalid again.
        self.set_child(num, ExtentId::INVALID);
    }

    /// Removes the leftmost child and the first separator.
    pub fn internal_remove_first(&mut self) {
        debug_assert_eq!(self.kind(), NodeKind::Internal);
        let num = self.num_elements();
        debug_assert!(num >= 1);
        {
            let mut data = self.handle.data_mut();
            let ko = self.header.key_start as usize;
            let eo = self.header.element_start as usize;
            let es = ExtentId::SIZE;
            data.copy_within(ko + K::SIZE..ko + num * K::SIZE, ko);
            data.copy_within(eo + es..eo + (num + 1) * es, eo);
        }
        self.set_num_elements(num - 1);
        self.set_child(num, ExtentId::INVALID);
    }

    /// Prepends a child and a separator bounding the old first child.
    pub fn internal_insert_front(&mut self, child: ExtentId, sep: &K) {
        debug_assert_eq!(self.kind(), NodeKind::Internal);
        debug_assert!(!self.is_full());
        let num = self.num_elements();
        {
            let mut data = self.handle.data_mut();
            let ko = self.header.key_start as usize;
            let eo = self.header.element_start as usize;
            let es = ExtentId::SIZE;
            data.copy_within(ko..ko + num * K::SIZE, ko + K::SIZE);
            data.copy_within(eo..eo + (num + 1) * es, eo + es);
            sep.encode(&mut data[ko..ko + K::SIZE]);
            child.encode(&mut data[eo..eo + es]);
        }
        self.set_num_elements(num + 1);
    }

    // ------------------------------------------------------------------
    // Splits
    // ------------------------------------------------------------------

    /// Splits a full leaf at pivot `ceil(max/2)`.
    ///
    /// The upper half moves to a fresh sibling that is spliced into the
    /// leaf chain. Returns the separator (the sibling's first key) and
    /// the sibling's extent id; the sibling is unloaded before returning.
    pub fn split_leaf(&mut self) -> Result<(K, ExtentId)> {
        debug_assert_eq!(self.kind(), NodeKind::Leaf);
        let num = self.num_elements();
        let pivot = self.max_elements().div_ceil(2);
        let moved = num - pivot;

        let mut sibling = Node::<K, V>::create(self.pool, NodeKind::Leaf)?;
        {
            let src = self.handle.data();
            let mut dst = sibling.handle.data_mut();
            let sk = self.header.key_start as usize;
            let se = self.header.element_start as usize;
            let dk = sibling.header.key_start as usize;
            let de = sibling.header.element_start as usize;
            dst[dk..dk + moved * K::SIZE]
                .copy_from_slice(&src[sk + pivot * K::SIZE..sk + num * K::SIZE]);
            dst[de..de + moved * V::SIZE]
                .copy_from_slice(&src[se + pivot * V::SIZE..se + num * V::SIZE]);
        }
        sibling.set_num_elements(moved);
        sibling.set_next(self.next());

        let sibling_id = sibling.extent_id();
        let separator = sibling.key(0);
        sibling.unload()?;

        self.set_num_elements(pivot);
        self.set_next(sibling_id);

        Ok((separator, sibling_id))
    }

    /// Splits a full internal node at child pivot `ceil(max/2)`.
    ///
    /// Children and keys from the pivot on move to a fresh sibling; the
    /// promoted separator is the key that bounded the pivot child from
    /// below, which leaves the tree (it survives only in the parent).
    pub fn split_internal(&mut self) -> Result<(K, ExtentId)> {
        debug_assert_eq!(self.kind(), NodeKind::Internal);
        let num = self.num_elements();
        let children = num + 1;
        let pivot = self.max_elements().div_ceil(2);
        let moved_children = children - pivot;

        let mut sibling = Node::<K, V>::create(self.pool, NodeKind::Internal)?;
        {
            let src = self.handle.data();
            let mut dst = sibling.handle.data_mut();
            let sk = self.header.key_start as usize;
            let se = self.header.element_start as usize;
            let dk = sibling.header.key_start as usize;
            let de = sibling.header.element_start as usize;
            let es = ExtentId::SIZE;
            // The moved children carry one key fewer.
            dst[dk..dk + (moved_children - 1) * K::SIZE]
                .copy_from_slice(&src[sk + pivot * K::SIZE..sk + num * K::SIZE]);
            dst[de..de + moved_children * es]
                .copy_from_slice(&src[se + pivot * es..se + children * es]);
        }
        sibling.set_num_elements(moved_children - 1);

        let sibling_id = sibling.extent_id();
        sibling.unload()?;

        let separator = self.key(pivot - 1);
        self.set_num_elements(pivot - 1);
        for i in pivot..children {
            self.set_child(i, ExtentId::INVALID);
        }

        Ok((separator, sibling_id))
    }

    // ------------------------------------------------------------------
    // Merges
    // ------------------------------------------------------------------

    /// Whether this node can absorb its right sibling in one page.
    ///
    /// An internal merge also pulls the parent separator down as a
    /// bridging key, and the combined child slots may not exceed the
    /// page.
    pub fn can_absorb(&self, right: &Node<'a, K, V>) -> bool {
        let combined = self.num_elements() + right.num_elements();
        match self.kind() {
            NodeKind::Leaf => combined <= self.max_elements(),
            NodeKind::Internal => combined + 2 <= self.max_elements(),
        }
    }

    /// Absorbs all pairs of the right leaf sibling and takes over its
    /// forward link. The caller destroys `right` afterwards.
    pub fn merge_leaf_from(&mut self, right: &Node<'a, K, V>) {
        debug_assert_eq!(self.kind(), NodeKind::Leaf);
        debug_assert_eq!(right.kind(), NodeKind::Leaf);
        let num = self.num_elements();
        let rnum = right.num_elements();
        debug_assert!(num + rnum <= self.max_elements());
        {
            let src = right.handle.data();
            let mut dst = self.handle.data_mut();
            let sk = right.header.key_start as usize;
            let se = right.header.element_start as usize;
            let dk = self.header.key_start as usize;
            let de = self.header.element_start as usize;
            dst[dk + num * K::SIZE..dk + (num + rnum) * K::SIZE]
                .copy_from_slice(&src[sk..sk + rnum * K::SIZE]);
            dst[de + num * V::SIZE..de + (num + rnum) * V::SIZE]
                .copy_from_slice(&src[se..se + rnum * V::SIZE]);
        }
        self.set_num_elements(num + rnum);
        self.set_next(right.next());
    }

    /// Absorbs the right internal sibling. The parent separator between
    /// the two nodes comes down as the bridging key between this node's
    /// last child and the sibling's first. The caller destroys `right`.
    pub fn merge_internal_from(&mut self, right: &Node<'a, K, V>, bridge: &K) {
        debug_assert_eq!(self.kind(), NodeKind::Internal);
        debug_assert_eq!(right.kind(), NodeKind::Internal);
        let num = self.num_elements();
        let rnum = right.num_elements();
        debug_assert!(self.can_absorb(right));

        // The bridge lands in the first free key slot; the sibling's
        // children follow this node's last child.
        self.set_key(num, bridge);
        {
            let src = right.handle.data();
            let mut dst = self.handle.data_mut();
            let sk = right.header.key_start as usize;
            let se = right.header.element_start as usize;
            let dk = self.header.key_start as usize;
            let de = self.header.element_start as usize;
            let es = ExtentId::SIZE;
            dst[dk + (num + 1) * K::SIZE..dk + (num + 1 + rnum) * K::SIZE]
                .copy_from_slice(&src[sk..sk + rnum * K::SIZE]);
            dst[de + (num + 1) * es..de + (num + rnum + 2) * es]
                .copy_from_slice(&src[se..se + (rnum + 1) * es]);
        }
        self.set_num_elements(num + rnum + 1);
    }
}

impl<K, V> Drop for Node<'_, K, V> {
    fn drop(&mut self) {
        if !self.finished {
            let extent_id = self.handle.extent_id();
            if self.dirty {
                let _ = self.pool.mark_dirty(extent_id);
            }
            let _ = self.pool.unpin(extent_id);
        }
    }
}
