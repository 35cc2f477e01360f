//! Page-resident B+tree over the buffer pool.

use crate::iter::Iter;
use crate::node::{Node, NodeKind};
use log::{debug, trace};
use oak_buffer::BufferPool;
use oak_common::{ExtentId, FixedCodec, OakError, Result};
use std::marker::PhantomData;

/// What a recursive removal reports to its parent.
struct RemoveOutcome<K, V> {
    /// The removed value, or None when the key was absent.
    removed: Option<V>,
    /// Whether the minimum key of the visited subtree changed.
    min_changed: bool,
    /// The new minimum when it changed (None for an emptied node).
    new_min: Option<K>,
    /// Whether the visited child dropped below half occupancy.
    underfull: bool,
}

/// A B+tree index keyed by a fixed-size ordered type.
///
/// The tree is identified by the extent id of its root node; `insert`
/// and `remove` may replace that id as the tree grows from or shrinks
/// toward the root. The handle also tracks the current height.
pub struct BTree<'a, K, V> {
    pool: &'a BufferPool,
    root: ExtentId,
    height: u32,
    _types: PhantomData<(K, V)>,
}

impl<'a, K, V> std::fmt::Debug for BTree<'a, K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BTree")
            .field("root", &self.root)
            .field("height", &self.height)
            .finish()
    }
}

impl<'a, K: FixedCodec + Ord, V: FixedCodec> BTree<'a, K, V> {
    /// Creates a new empty tree whose root is a fresh leaf.
    pub fn create(pool: &'a BufferPool) -> Result<Self> {
        let root = Node::<K, V>::create(pool, NodeKind::Leaf)?;
        let root_id = root.extent_id();
        root.unload()?;

        Ok(Self {
            pool,
            root: root_id,
            height: 1,
            _types: PhantomData,
        })
    }

    /// Opens an existing tree rooted at `root`.
    ///
    /// Walks the leftmost spine to validate every level against the
    /// caller's key/value types and to recover the height.
    pub fn open(pool: &'a BufferPool, root: ExtentId) -> Result<Self> {
        let mut height = 1;
        let mut current = root;
        loop {
            let node = Node::<K, V>::load(pool, current)?;
            match node.kind() {
                NodeKind::Leaf => {
                    node.unload()?;
                    break;
                }
                NodeKind::Internal => {
                    let child = node.child(0);
                    node.unload()?;
                    if !child.is_valid() {
                        return Err(OakError::CorruptedPage {
                            extent_id: current.0,
                            reason: "internal node without children".to_string(),
                        });
                    }
                    current = child;
                    height += 1;
                }
            }
        }

        Ok(Self {
            pool,
            root,
            height,
            _types: PhantomData,
        })
    }

    /// Returns the extent id of the current root node.
    pub fn root(&self) -> ExtentId {
        self.root
    }

    /// Returns the tree height (1 = the root is a leaf).
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the buffer pool backing this tree.
    pub fn pool(&self) -> &'a BufferPool {
        self.pool
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Point lookup. A missing key is `Ok(None)`.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let root = Node::<K, V>::load(self.pool, self.root)?;
        self.get_rec(root, key)
    }

    fn get_rec(&self, node: Node<'a, K, V>, key: &K) -> Result<Option<V>> {
        match node.kind() {
            NodeKind::Internal => {
                let slot = node.internal_slot(key);
                let child_id = node.child(slot);
                if !child_id.is_valid() {
                    // An empty internal node holds nothing.
                    node.unload()?;
                    return Ok(None);
                }
                let child = Node::<K, V>::load(self.pool, child_id)?;
                let result = self.get_rec(child, key);
                node.unload()?;
                result
            }
            NodeKind::Leaf => {
                let idx = node.leaf_slot(key);
                let found = if idx < node.num_elements() && node.key(idx) == *key {
                    Some(node.value(idx))
                } else {
                    None
                };
                node.unload()?;
                Ok(found)
            }
        }
    }

    // ------------------------------------------------------------------
    // Insert
    // ------------------------------------------------------------------

    /// Inserts a key/value pair.
    ///
    /// Inserting an existing key replaces its value in place. A full
    /// root is split first, growing the tree by one level; the descent
    /// then splits any full child before stepping into it, so the leaf
    /// insertion never runs out of space.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        let mut root = Node::<K, V>::load(self.pool, self.root)?;

        if root.is_full() {
            let (separator, sibling) = match root.kind() {
                NodeKind::Leaf => root.split_leaf()?,
                NodeKind::Internal => root.split_internal()?,
            };

            let mut new_root = Node::<K, V>::create(self.pool, NodeKind::Internal)?;
            new_root.set_child(0, self.root);
            new_root.set_child(1, sibling);
            new_root.set_key(0, &separator);
            new_root.set_num_elements(1);

            root.unload()?;
            self.root = new_root.extent_id();
            self.height += 1;
            debug!("root split, height now {}", self.height);
            root = new_root;
        }

        self.insert_non_full(root, key, value)
    }

    /// Descends from a non-full node to the leaf, splitting full
    /// children in place along the way.
    fn insert_non_full(&self, mut node: Node<'a, K, V>, key: K, value: V) -> Result<()> {
        loop {
            if node.kind() == NodeKind::Leaf {
                let idx = node.leaf_slot(&key);
                if idx < node.num_elements() && node.key(idx) == key {
                    node.set_value(idx, &value);
                } else {
                    node.leaf_insert_at(idx, &key, &value);
                }
                return node.unload();
            }

            let mut slot = node.internal_slot(&key);
            let child_id = node.child(slot);
            if !child_id.is_valid() {
                let err = OakError::CorruptedPage {
                    extent_id: node.extent_id().0,
                    reason: "descent slot has no child".to_string(),
                };
                node.unload()?;
                return Err(err);
            }

            let mut child = Node::<K, V>::load(self.pool, child_id)?;
            if child.is_full() {
                let (separator, sibling) = match child.kind() {
                    NodeKind::Leaf => child.split_leaf()?,
                    NodeKind::Internal => child.split_internal()?,
                };
                trace!("split {child_id}, sibling {sibling}");
                node.internal_insert_at(slot, &separator, sibling);

                if key >= separator {
                    child.unload()?;
                    slot += 1;
                    child = Node::<K, V>::load(self.pool, node.child(slot))?;
                }
            }

            node.unload()?;
            node = child;
        }
    }

    // ------------------------------------------------------------------
    // Remove
    // ------------------------------------------------------------------

    /// Removes a key and returns its value; a missing key is `Ok(None)`.
    ///
    /// Separator keys are refreshed when a subtree minimum changes,
    /// underfull children are merged (or, when a merge would overflow,
    /// refilled from a sibling), and an internal root reduced to a
    /// single child is replaced by that child.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        let root = Node::<K, V>::load(self.pool, self.root)?;
        let outcome = self.remove_rec(root, key)?;

        if outcome.removed.is_some() {
            self.collapse_root()?;
        }
        Ok(outcome.removed)
    }

    /// Replaces an internal root holding a single child with that child
    /// until the root is a leaf or has at least two children.
    fn collapse_root(&mut self) -> Result<()> {
        loop {
            let root = Node::<K, V>::load(self.pool, self.root)?;
            // Zero separator keys leave exactly one child.
            if root.kind() == NodeKind::Internal && root.num_elements() == 0 {
                let only_child = root.child(0);
                root.destroy()?;
                self.root = only_child;
                self.height -= 1;
                debug!("root collapsed, height now {}", self.height);
            } else {
                return root.unload();
            }
        }
    }

    fn remove_rec(&self, mut node: Node<'a, K, V>, key: &K) -> Result<RemoveOutcome<K, V>> {
        if node.kind() == NodeKind::Leaf {
            let idx = node.leaf_slot(key);
            if idx >= node.num_elements() || node.key(idx) != *key {
                node.unload()?;
                return Ok(RemoveOutcome {
                    removed: None,
                    min_changed: false,
                    new_min: None,
                    underfull: false,
                });
            }

            let value = node.value(idx);
            node.leaf_remove_at(idx);
            let outcome = RemoveOutcome {
                removed: Some(value),
                min_changed: idx == 0,
                new_min: (node.num_elements() > 0).then(|| node.key(0)),
                underfull: node.is_underfull(),
            };
            node.unload()?;
            return Ok(outcome);
        }

        let slot = node.internal_slot(key);
        let child_id = node.child(slot);
        if !child_id.is_valid() {
            node.unload()?;
            return Ok(RemoveOutcome {
                removed: None,
                min_changed: false,
                new_min: None,
                underfull: false,
            });
        }

        let child = Node::<K, V>::load(self.pool, child_id)?;
        let out = self.remove_rec(child, key)?;

        if out.removed.is_none() {
            node.unload()?;
            return Ok(out);
        }

        // The child's minimum bounds it in this node's separator array.
        if out.min_changed && slot > 0 {
            if let Some(min) = &out.new_min {
                node.set_key(slot - 1, min);
            }
        }

        if out.underfull {
            self.rebalance(&mut node, slot)?;
        }

        let min_changed = out.min_changed && slot == 0;
        let outcome = RemoveOutcome {
            removed: out.removed,
            min_changed,
            new_min: if min_changed { out.new_min } else { None },
            underfull: node.is_underfull(),
        };
        node.unload()?;
        Ok(outcome)
    }

    /// Restores the occupancy invariant for the child at `slot`.
    ///
    /// The right sibling is preferred; only the rightmost child pairs
    /// with its left neighbor. Siblings whose combined population fits
    /// one node are merged; otherwise one entry moves through the parent
    /// separator.
    fn rebalance(&self, parent: &mut Node<'a, K, V>, slot: usize) -> Result<()> {
        let num = parent.num_elements();
        if num == 0 {
            // A root mid-collapse has no sibling to pair with.
            return Ok(());
        }

        // num keys route children 0..=num; the rightmost child has no
        // right sibling.
        let left_slot = if slot < num { slot } else { slot - 1 };
        let sep_idx = left_slot;

        let mut left = Node::<K, V>::load(self.pool, parent.child(left_slot))?;
        let mut right = Node::<K, V>::load(self.pool, parent.child(left_slot + 1))?;

        if left.can_absorb(&right) {
            trace!(
                "merging {} into {}",
                right.extent_id(),
                left.extent_id()
            );
            match left.kind() {
                NodeKind::Leaf => left.merge_leaf_from(&right),
                NodeKind::Internal => {
                    let bridge = parent.key(sep_idx);
                    left.merge_internal_from(&right, &bridge);
                }
            }
            right.destroy()?;
            parent.internal_remove_entry(sep_idx);
            left.unload()
        } else if left_slot == slot {
            // Refill the underfull left child from the right sibling.
            trace!(
                "borrowing from {} into {}",
                right.extent_id(),
                left.extent_id()
            );
            match left.kind() {
                NodeKind::Leaf => {
                    let key = right.key(0);
                    let value = right.value(0);
                    left.leaf_insert_at(left.num_elements(), &key, &value);
                    right.leaf_remove_at(0);
                    parent.set_key(sep_idx, &right.key(0));
                }
                NodeKind::Internal => {
                    let bridge = parent.key(sep_idx);
                    let new_sep = right.key(0);
                    let donated = right.child(0);
                    let num_left = left.num_elements();
                    left.set_key(num_left, &bridge);
                    left.set_child(num_left + 1, donated);
                    left.set_num_elements(num_left + 1);
                    right.internal_remove_first();
                    parent.set_key(sep_idx, &new_sep);
                }
            }
            right.unload()?;
            left.unload()
        } else {
            // Refill the underfull right child from the left sibling.
            trace!(
                "borrowing from {} into {}",
                left.extent_id(),
                right.extent_id()
            );
            match left.kind() {
                NodeKind::Leaf => {
                    let last = left.num_elements() - 1;
                    let key = left.key(last);
                    let value = left.value(last);
                    right.leaf_insert_at(0, &key, &value);
                    left.leaf_remove_at(last);
                    parent.set_key(sep_idx, &key);
                }
                NodeKind::Internal => {
                    let bridge = parent.key(sep_idx);
                    let num_left = left.num_elements();
                    let donated = left.child(num_left);
                    let new_sep = left.key(num_left - 1);
                    right.internal_insert_front(donated, &bridge);
                    left.set_num_elements(num_left - 1);
                    left.set_child(num_left, ExtentId::INVALID);
                    parent.set_key(sep_idx, &new_sep);
                }
            }
            right.unload()?;
            left.unload()
        }
    }

    // ------------------------------------------------------------------
    // Iteration and teardown
    // ------------------------------------------------------------------

    /// Forward iterator over all pairs in ascending key order.
    ///
    /// The iterator pins one leaf at a time and follows the leaf chain;
    /// mutating the tree while an iterator is live is not supported.
    pub fn iter(&self) -> Result<Iter<'a, K, V>> {
        Iter::new(self.pool, self.root)
    }

    /// Destroys the tree, releasing every reachable node's extent.
    pub fn destroy(self) -> Result<()> {
        self.destroy_rec(self.root)
    }

    fn destroy_rec(&self, extent_id: ExtentId) -> Result<()> {
        let node = Node::<K, V>::load(self.pool, extent_id)?;
        let children: Vec<ExtentId> = match node.kind() {
            NodeKind::Internal => (0..=node.num_elements())
                .map(|i| node.child(i))
                .filter(|child| child.is_valid())
                .collect(),
            NodeKind::Leaf => Vec::new(),
        };
        node.destroy()?;
        for child in children {
            self.destroy_rec(child)?;
        }
        Ok(())
    }
}
