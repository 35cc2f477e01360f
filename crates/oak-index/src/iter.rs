//! Forward iteration over the leaf chain.

use crate::node::{Node, NodeKind};
use oak_buffer::BufferPool;
use oak_common::{ExtentId, FixedCodec, Result};

/// Forward iterator over a tree's key/value pairs in ascending order.
///
/// Holds at most one leaf pinned at a time; stepping past the end of
/// the current leaf unpins it and follows its forward link. The
/// iterator reflects the tree as it was when constructed and is not
/// restartable; the current leaf is unpinned when the iterator drops.
pub struct Iter<'a, K, V> {
    pool: &'a BufferPool,
    leaf: Option<Node<'a, K, V>>,
    idx: usize,
}

impl<'a, K: FixedCodec + Ord, V: FixedCodec> Iter<'a, K, V> {
    /// Descends to the leftmost leaf, pinning one node at a time.
    pub(crate) fn new(pool: &'a BufferPool, root: ExtentId) -> Result<Self> {
        let mut node = Node::<K, V>::load(pool, root)?;
        loop {
            match node.kind() {
                NodeKind::Leaf => {
                    return Ok(Self {
                        pool,
                        leaf: Some(node),
                        idx: 0,
                    });
                }
                NodeKind::Internal => {
                    let child_id = node.child(0);
                    if !child_id.is_valid() {
                        node.unload()?;
                        return Ok(Self {
                            pool,
                            leaf: None,
                            idx: 0,
                        });
                    }
                    let child = Node::<K, V>::load(pool, child_id)?;
                    node.unload()?;
                    node = child;
                }
            }
        }
    }
}

impl<K: FixedCodec + Ord, V: FixedCodec> Iterator for Iter<'_, K, V> {
    type Item = Result<(K, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.leaf.as_ref()?;

            if self.idx < leaf.num_elements() {
                let item = (leaf.key(self.idx), leaf.value(self.idx));
                self.idx += 1;
                return Some(Ok(item));
            }

            // Advance to the next leaf, unpinning the exhausted one.
            let next_id = leaf.next();
            let exhausted = self.leaf.take().expect("leaf checked above");
            if let Err(e) = exhausted.unload() {
                return Some(Err(e));
            }
            if !next_id.is_valid() {
                return None;
            }
            match Node::<K, V>::load(self.pool, next_id) {
                Ok(node) => {
                    self.leaf = Some(node);
                    self.idx = 0;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::tree::BTree;
    use oak_buffer::{BufferPool, BufferPoolConfig};
    use oak_common::StorageConfig;
    use oak_store::ExtentStore;
    use tempfile::tempdir;

    fn create_test_pool() -> (BufferPool, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = ExtentStore::create(
            dir.path().join("test.db"),
            StorageConfig::new(1),
            true,
        )
        .unwrap();
        (
            BufferPool::new(store, BufferPoolConfig { num_frames: 128 }),
            dir,
        )
    }

    #[test]
    fn test_iterate_empty_tree() {
        let (pool, _dir) = create_test_pool();

        let tree = BTree::<i64, u64>::create(&pool).unwrap();
        assert_eq!(tree.iter().unwrap().count(), 0);
        assert_eq!(pool.stats().pinned_frames, 0);
    }

    #[test]
    fn test_iterate_single_leaf() {
        let (pool, _dir) = create_test_pool();

        let mut tree = BTree::<i64, u64>::create(&pool).unwrap();
        for key in [3i64, 1, 2] {
            tree.insert(key, key as u64 * 10).unwrap();
        }

        let items: Vec<_> = tree.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(items, vec![(1, 10), (2, 20), (3, 30)]);
    }

    #[test]
    fn test_iterate_across_leaves_in_order() {
        let (pool, _dir) = create_test_pool();

        let mut tree = BTree::<i64, u64>::create(&pool).unwrap();
        for key in (0..1000i64).rev() {
            tree.insert(key, key as u64).unwrap();
        }
        assert!(tree.height() > 1);

        let mut expected = 0i64;
        for item in tree.iter().unwrap() {
            let (key, value) = item.unwrap();
            assert_eq!(key, expected);
            assert_eq!(value, expected as u64);
            expected += 1;
        }
        assert_eq!(expected, 1000);
        assert_eq!(pool.stats().pinned_frames, 0);
    }

    #[test]
    fn test_iterator_pins_at_most_one_leaf() {
        let (pool, _dir) = create_test_pool();

        let mut tree = BTree::<i64, u64>::create(&pool).unwrap();
        for key in 0..500i64 {
            tree.insert(key, key as u64).unwrap();
        }

        let mut iter = tree.iter().unwrap();
        for _ in 0..100 {
            iter.next().unwrap().unwrap();
            assert!(pool.stats().pinned_frames <= 1);
        }
    }

    #[test]
    fn test_dropped_iterator_unpins() {
        let (pool, _dir) = create_test_pool();

        let mut tree = BTree::<i64, u64>::create(&pool).unwrap();
        for key in 0..100i64 {
            tree.insert(key, key as u64).unwrap();
        }

        {
            let mut iter = tree.iter().unwrap();
            iter.next().unwrap().unwrap();
            assert_eq!(pool.stats().pinned_frames, 1);
            // Dropped mid-scan.
        }
        assert_eq!(pool.stats().pinned_frames, 0);
    }
}
