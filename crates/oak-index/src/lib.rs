//! Page-resident B+tree index for OakDB.
//!
//! Tree nodes live directly inside buffer-pool pages: a fixed header
//! followed by a packed key array and a packed element array (child
//! extent ids in internal nodes, values in leaves). Traversal pins
//! nodes on descent and unpins on ascent; edits mark pages dirty so the
//! pool writes them back. Leaves are chained by extent id for forward
//! range scans.
//!
//! Keys and values are fixed-size types implementing
//! [`oak_common::FixedCodec`]; keys must also be `Ord`.

mod iter;
mod node;
mod tree;

pub use iter::Iter;
pub use node::{NodeHeader, NodeKind};
pub use tree::BTree;
