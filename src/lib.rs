//! # radix-rs
//!
//! An immutable, persistent radix tree (compressed trie) keyed by raw byte
//! sequences.
//!
//! The tree behaves like an ordered map. Compared to a hash map it adds
//! prefix-scoped lookups and ordered iteration; compared to a plain ordered
//! map it adds persistence: every mutation goes through a copy-on-write
//! transaction that produces a new tree sharing all unmodified subtrees with
//! the previous version. A committed tree is never mutated again, so any
//! number of readers can traverse it from any thread without coordination.
//!
//! ## Example
//!
//! ```rust
//! use radix_rs::RadixTree;
//!
//! let tree: RadixTree<u64> = RadixTree::new();
//! let (tree, _) = tree.insert(b"hello", 1);
//!
//! // Batch mutations through a transaction.
//! let mut txn = tree.txn();
//! txn.insert(b"world", 2);
//! txn.insert(b"worlds", 3);
//! let (tree2, mutated) = txn.commit();
//! assert!(mutated);
//!
//! // The original snapshot is untouched.
//! assert_eq!(tree.len(), 1);
//! assert_eq!(tree2.get(b"world"), Some(&2));
//! ```

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::sync::Arc;

// =============================================================================
// Node structure
// =============================================================================

/// A key/value pair stored at a node. The key is kept in full so traversals
/// can report it without reconstructing it from the path.
struct Leaf<V> {
    key: Vec<u8>,
    value: V,
}

impl<V> Leaf<V> {
    #[inline]
    fn entry(&self) -> (&[u8], &V) {
        (&self.key, &self.value)
    }
}

/// An outgoing edge. `label` always equals the first prefix byte of the
/// child it points to.
struct Edge<V> {
    label: u8,
    node: Arc<Node<V>>,
}

impl<V> Clone for Edge<V> {
    fn clone(&self) -> Self {
        Edge {
            label: self.label,
            node: Arc::clone(&self.node),
        }
    }
}

/// A node in the radix tree.
///
/// Nodes reachable from a committed [`RadixTree`] are immutable. A
/// transaction mutates only detached copies it has allocated itself and not
/// yet shared.
pub struct Node<V> {
    /// Value stored at this node, if any.
    leaf: Option<Arc<Leaf<V>>>,
    /// Bytes consumed by the edge leading here (empty only at the root).
    prefix: Vec<u8>,
    /// Outgoing edges, sorted ascending by label, labels unique.
    edges: Vec<Edge<V>>,
}

impl<V> Clone for Node<V> {
    /// A clone is a detached copy: it shares the leaf and the children, but
    /// owns its prefix and edge storage, so edge writes on the clone can
    /// never be seen through the source node.
    fn clone(&self) -> Self {
        Node {
            leaf: self.leaf.clone(),
            prefix: self.prefix.clone(),
            edges: self.edges.clone(),
        }
    }
}

impl<V> Node<V> {
    fn empty() -> Self {
        Node {
            leaf: None,
            prefix: Vec::new(),
            edges: Vec::new(),
        }
    }

    fn new_leaf(prefix: &[u8], leaf: Arc<Leaf<V>>) -> Self {
        Node {
            leaf: Some(leaf),
            prefix: prefix.to_vec(),
            edges: Vec::new(),
        }
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.leaf.is_some()
    }

    /// Number of keys stored in this subtree.
    fn subtree_len(&self) -> usize {
        let mut n = usize::from(self.is_leaf());
        for e in &self.edges {
            n += e.node.subtree_len();
        }
        n
    }

    // =========================================================================
    // Edge table
    // =========================================================================

    /// Binary search for an exact label match.
    #[inline]
    fn get_edge(&self, label: u8) -> Option<(usize, &Node<V>)> {
        match self.edges.binary_search_by_key(&label, |e| e.label) {
            Ok(idx) => Some((idx, self.edges[idx].node.as_ref())),
            Err(_) => None,
        }
    }

    /// Smallest edge whose label is `>= label`.
    #[inline]
    fn get_lower_bound_edge(&self, label: u8) -> Option<(usize, &Node<V>)> {
        let idx = match self.edges.binary_search_by_key(&label, |e| e.label) {
            Ok(idx) | Err(idx) => idx,
        };
        self.edges.get(idx).map(|e| (idx, e.node.as_ref()))
    }

    /// Insert preserving sort order. The caller guarantees no edge with this
    /// label exists; use `replace_edge` to overwrite one.
    fn add_edge(&mut self, e: Edge<V>) {
        let idx = match self.edges.binary_search_by_key(&e.label, |edge| edge.label) {
            Ok(idx) | Err(idx) => idx,
        };
        self.edges.insert(idx, e);
    }

    /// Overwrite the child at an existing label.
    fn replace_edge(&mut self, e: Edge<V>) {
        match self.edges.binary_search_by_key(&e.label, |edge| edge.label) {
            Ok(idx) => self.edges[idx].node = e.node,
            Err(_) => panic!("replacing missing edge"),
        }
    }

    /// Remove the edge with the given label, if present.
    fn del_edge(&mut self, label: u8) {
        if let Ok(idx) = self.edges.binary_search_by_key(&label, |e| e.label) {
            self.edges.remove(idx);
        }
    }

    // =========================================================================
    // Point queries
    // =========================================================================

    /// Look up `key` in the subtree rooted at this node.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        let mut curr = self;
        let mut search = key;
        loop {
            if search.is_empty() {
                return curr.leaf.as_ref().map(|l| &l.value);
            }
            let (_, child) = curr.get_edge(search[0])?;
            if !search.starts_with(&child.prefix) {
                return None;
            }
            search = &search[child.prefix.len()..];
            curr = child;
        }
    }

    /// Smallest key in this subtree.
    pub fn minimum(&self) -> Option<(&[u8], &V)> {
        let mut curr = self;
        loop {
            if let Some(leaf) = &curr.leaf {
                return Some(leaf.entry());
            }
            match curr.edges.first() {
                Some(e) => curr = e.node.as_ref(),
                None => return None,
            }
        }
    }

    /// Largest key in this subtree. A leaf at an inner node is never the
    /// maximum, because the keys of its children extend it.
    pub fn maximum(&self) -> Option<(&[u8], &V)> {
        let mut curr = self;
        loop {
            if let Some(e) = curr.edges.last() {
                curr = e.node.as_ref();
                continue;
            }
            return curr.leaf.as_ref().map(|l| l.entry());
        }
    }

    /// Among all stored keys that are a prefix of `query`, the longest.
    pub fn longest_prefix(&self, query: &[u8]) -> Option<(&[u8], &V)> {
        let mut last = None;
        let mut curr = self;
        let mut search = query;
        loop {
            if let Some(leaf) = &curr.leaf {
                last = Some(leaf);
            }
            if search.is_empty() {
                break;
            }
            match curr.get_edge(search[0]) {
                Some((_, child)) if search.starts_with(&child.prefix) => {
                    search = &search[child.prefix.len()..];
                    curr = child;
                }
                _ => break,
            }
        }
        last.map(|l| l.entry())
    }

    // =========================================================================
    // Walks
    // =========================================================================

    /// Pre-order walk in ascending key order. The callback returns `true` to
    /// stop the walk.
    pub fn walk<F>(&self, mut f: F)
    where
        F: FnMut(&[u8], &V) -> bool,
    {
        recursive_walk(self, &mut f);
    }

    /// Mirrored pre-order walk: each node still visits its own leaf first,
    /// then recurses into its children in descending label order.
    pub fn walk_backwards<F>(&self, mut f: F)
    where
        F: FnMut(&[u8], &V) -> bool,
    {
        reverse_recursive_walk(self, &mut f);
    }

    /// Walk every key that starts with `prefix`, in ascending order.
    pub fn walk_prefix<F>(&self, prefix: &[u8], mut f: F)
    where
        F: FnMut(&[u8], &V) -> bool,
    {
        let mut curr = self;
        let mut search = prefix;
        loop {
            if search.is_empty() {
                recursive_walk(curr, &mut f);
                return;
            }
            let Some((_, child)) = curr.get_edge(search[0]) else {
                return;
            };
            if search.starts_with(&child.prefix) {
                search = &search[child.prefix.len()..];
                curr = child;
            } else if child.prefix.starts_with(search) {
                // The prefix ends inside this edge; the child's subtree is
                // exactly the matching set.
                recursive_walk(child, &mut f);
                return;
            } else {
                return;
            }
        }
    }

    /// Walk the keys *above* `path`: every stored key that is a prefix of
    /// it, shortest first. Where `walk_prefix` visits the entries under a
    /// prefix, this visits the entries along the way to it.
    pub fn walk_path<F>(&self, path: &[u8], mut f: F)
    where
        F: FnMut(&[u8], &V) -> bool,
    {
        let mut curr = self;
        let mut search = path;
        loop {
            if let Some(leaf) = &curr.leaf {
                if f(&leaf.key, &leaf.value) {
                    return;
                }
            }
            if search.is_empty() {
                return;
            }
            let Some((_, child)) = curr.get_edge(search[0]) else {
                return;
            };
            if !search.starts_with(&child.prefix) {
                return;
            }
            search = &search[child.prefix.len()..];
            curr = child;
        }
    }

    /// Forward iterator over this subtree.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter::new(self)
    }

    /// Backwards iterator over this subtree.
    pub fn reverse_iter(&self) -> ReverseIter<'_, V> {
        ReverseIter::new(self)
    }
}

/// Pre-order walk of a subtree. Returns `true` if the walk was aborted.
fn recursive_walk<V, F>(n: &Node<V>, f: &mut F) -> bool
where
    F: FnMut(&[u8], &V) -> bool,
{
    if let Some(leaf) = &n.leaf {
        if f(&leaf.key, &leaf.value) {
            return true;
        }
    }
    n.edges.iter().any(|e| recursive_walk(&e.node, f))
}

fn reverse_recursive_walk<V, F>(n: &Node<V>, f: &mut F) -> bool
where
    F: FnMut(&[u8], &V) -> bool,
{
    if let Some(leaf) = &n.leaf {
        if f(&leaf.key, &leaf.value) {
            return true;
        }
    }
    n.edges.iter().rev().any(|e| reverse_recursive_walk(&e.node, f))
}

// =============================================================================
// Tree
// =============================================================================

/// An immutable radix tree.
///
/// Mutating operations return a new tree and leave `self` untouched; the two
/// versions share every subtree off the mutated path. `clone` is O(1) (it
/// bumps the root refcount). For batched mutations open a [`Txn`] with
/// [`RadixTree::txn`] instead of chaining the per-operation conveniences.
pub struct RadixTree<V> {
    root: Arc<Node<V>>,
    size: usize,
}

impl<V> RadixTree<V> {
    /// An empty tree.
    pub fn new() -> Self {
        RadixTree {
            root: Arc::new(Node::empty()),
            size: 0,
        }
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The root node, for richer read-only queries (walks, seeks, min/max).
    pub fn root(&self) -> &Node<V> {
        &self.root
    }

    pub fn get(&self, key: &[u8]) -> Option<&V> {
        self.root.get(key)
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Forward iterator over the whole tree.
    pub fn iter(&self) -> Iter<'_, V> {
        self.root.iter()
    }

    /// Start a transaction. Any number of transactions may be derived from
    /// the same tree and progress independently; each commits to its own new
    /// root and none observes the others.
    pub fn txn(&self) -> Txn<V> {
        Txn {
            root: Arc::clone(&self.root),
            orig: Arc::clone(&self.root),
            size: self.size,
        }
    }

    /// Delete every key starting with `prefix`, returning the new tree and
    /// whether the prefix matched anything.
    pub fn delete_prefix(&self, prefix: &[u8]) -> (Self, bool) {
        let mut txn = self.txn();
        let ok = txn.delete_prefix(prefix);
        let (tree, _) = txn.commit();
        (tree, ok)
    }
}

impl<V: Clone> RadixTree<V> {
    /// Insert or update `key`, returning the new tree and the previous value
    /// if the key was already present.
    pub fn insert(&self, key: &[u8], value: V) -> (Self, Option<V>) {
        let mut txn = self.txn();
        let old = txn.insert(key, value);
        let (tree, _) = txn.commit();
        (tree, old)
    }

    /// Delete `key`, returning the new tree and the removed value if the key
    /// was present.
    pub fn delete(&self, key: &[u8]) -> (Self, Option<V>) {
        let mut txn = self.txn();
        let old = txn.delete(key);
        let (tree, _) = txn.commit();
        (tree, old)
    }
}

impl<V> Default for RadixTree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for RadixTree<V> {
    fn clone(&self) -> Self {
        RadixTree {
            root: Arc::clone(&self.root),
            size: self.size,
        }
    }
}

impl<V: std::fmt::Debug> std::fmt::Debug for RadixTree<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// A transaction on a [`RadixTree`].
///
/// A transaction path-copies nodes as it mutates and produces a new tree
/// when committed; the tree it was started from never changes. It is
/// single-owner: mutation requires `&mut self`. Dropping a transaction
/// without committing abandons it at no cost.
pub struct Txn<V> {
    /// Working root, replaced by every successful mutation.
    root: Arc<Node<V>>,
    /// Root the transaction started from.
    orig: Arc<Node<V>>,
    size: usize,
}

impl<V> Txn<V> {
    /// Look up `key` in the transaction's current state.
    pub fn get(&self, key: &[u8]) -> Option<&V> {
        self.root.get(key)
    }

    /// Number of keys in the transaction's current state.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The working root. Holding it borrows the transaction, so it cannot be
    /// kept across later mutations.
    pub fn root(&self) -> &Node<V> {
        &self.root
    }

    /// Finalize into a new tree. The flag reports whether the transaction
    /// mutated anything relative to its starting point.
    pub fn commit(self) -> (RadixTree<V>, bool) {
        let mutated = !Arc::ptr_eq(&self.root, &self.orig);
        (
            RadixTree {
                root: self.root,
                size: self.size,
            },
            mutated,
        )
    }

    /// Delete every key starting with `prefix`. Reports whether the prefix
    /// matched a subtree.
    pub fn delete_prefix(&mut self, prefix: &[u8]) -> bool {
        match Self::delete_prefix_rec(&self.root, prefix, true) {
            Some((new_root, removed)) => {
                self.root = Arc::new(new_root);
                self.size -= removed;
                true
            }
            None => false,
        }
    }

    fn delete_prefix_rec(n: &Node<V>, search: &[u8], is_root: bool) -> Option<(Node<V>, usize)> {
        // The prefix ends here (or inside the edge that led here): the whole
        // subtree goes.
        if search.is_empty() {
            let removed = n.subtree_len();
            let mut nc = n.clone();
            nc.leaf = None;
            nc.edges.clear();
            return Some((nc, removed));
        }

        let (idx, child) = n.get_edge(search[0])?;
        // Accept the edge if either byte sequence is a prefix of the other;
        // the second test covers prefixes that end in the middle of an edge.
        if !child.prefix.starts_with(search) && !search.starts_with(&child.prefix) {
            return None;
        }
        let rest = if child.prefix.len() > search.len() {
            &[][..]
        } else {
            &search[child.prefix.len()..]
        };
        let (new_child, removed) = Self::delete_prefix_rec(child, rest, false)?;

        let mut nc = n.clone();
        if new_child.leaf.is_none() && new_child.edges.is_empty() {
            nc.del_edge(search[0]);
            if !is_root && nc.edges.len() == 1 && !nc.is_leaf() {
                Self::merge_child(&mut nc);
            }
        } else {
            nc.edges[idx].node = Arc::new(new_child);
        }
        Some((nc, removed))
    }

    /// Collapse a node with its sole child: absorb the child's prefix, leaf
    /// and edges. Only called for a non-root node with exactly one edge and
    /// no leaf. The child's edge storage is cloned, never aliased.
    fn merge_child(n: &mut Node<V>) {
        debug_assert!(!n.is_leaf() && n.edges.len() == 1);
        let child = n.edges.pop().expect("merge_child on node without edges").node;
        n.prefix.extend_from_slice(&child.prefix);
        n.leaf = child.leaf.clone();
        n.edges = child.edges.clone();
    }
}

impl<V: Clone> Txn<V> {
    /// Insert or update `key`, returning the previous value if any.
    pub fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        let leaf = Arc::new(Leaf {
            key: key.to_vec(),
            value,
        });
        let (new_root, old) = Self::insert_rec(&self.root, key, leaf);
        self.root = Arc::new(new_root);
        if old.is_none() {
            self.size += 1;
        }
        old
    }

    fn insert_rec(n: &Node<V>, search: &[u8], leaf: Arc<Leaf<V>>) -> (Node<V>, Option<V>) {
        // Key exhausted: the value lands at this node.
        if search.is_empty() {
            let old = n.leaf.as_ref().map(|l| l.value.clone());
            let mut nc = n.clone();
            nc.leaf = Some(leaf);
            return (nc, old);
        }

        // No edge: hang a fresh leaf node off this one.
        let Some((idx, child)) = n.get_edge(search[0]) else {
            let mut nc = n.clone();
            nc.add_edge(Edge {
                label: search[0],
                node: Arc::new(Node::new_leaf(search, leaf)),
            });
            return (nc, None);
        };

        // The child's prefix matches in full: descend past it.
        let common = longest_common_prefix(search, &child.prefix);
        if common == child.prefix.len() {
            let (new_child, old) = Self::insert_rec(child, &search[common..], leaf);
            let mut nc = n.clone();
            nc.edges[idx].node = Arc::new(new_child);
            return (nc, old);
        }

        // Partial overlap: split the edge at the common prefix.
        let mut nc = n.clone();
        let mut split = Node {
            leaf: None,
            prefix: search[..common].to_vec(),
            edges: Vec::new(),
        };

        // Re-attach the existing child with its prefix shortened.
        let mut mod_child = child.clone();
        mod_child.prefix = child.prefix[common..].to_vec();
        split.add_edge(Edge {
            label: mod_child.prefix[0],
            node: Arc::new(mod_child),
        });

        // The new key either ends at the split node or continues below it.
        let rest = &search[common..];
        if rest.is_empty() {
            split.leaf = Some(leaf);
        } else {
            split.add_edge(Edge {
                label: rest[0],
                node: Arc::new(Node::new_leaf(rest, leaf)),
            });
        }

        nc.replace_edge(Edge {
            label: search[0],
            node: Arc::new(split),
        });
        (nc, None)
    }

    /// Delete `key`, returning its value if it was present.
    pub fn delete(&mut self, key: &[u8]) -> Option<V> {
        let (new_root, old_leaf) = Self::delete_rec(&self.root, key, true)?;
        self.root = Arc::new(new_root);
        self.size -= 1;
        Some(old_leaf.value.clone())
    }

    fn delete_rec(
        n: &Node<V>,
        search: &[u8],
        is_root: bool,
    ) -> Option<(Node<V>, Arc<Leaf<V>>)> {
        // Key exhausted: remove the leaf here. The original leaf is captured
        // before anything changes so the caller gets the old value back.
        if search.is_empty() {
            let old_leaf = n.leaf.clone()?;
            let mut nc = n.clone();
            nc.leaf = None;

            // A non-root node left with a single edge and no leaf collapses
            // into its child.
            if !is_root && nc.edges.len() == 1 {
                Self::merge_child(&mut nc);
            }
            return Some((nc, old_leaf));
        }

        let (idx, child) = n.get_edge(search[0])?;
        if !search.starts_with(&child.prefix) {
            return None;
        }
        let (new_child, old_leaf) = Self::delete_rec(child, &search[child.prefix.len()..], false)?;

        let mut nc = n.clone();
        if new_child.leaf.is_none() && new_child.edges.is_empty() {
            // The child became empty: drop the edge entirely.
            nc.del_edge(search[0]);
            if !is_root && nc.edges.len() == 1 && !nc.is_leaf() {
                Self::merge_child(&mut nc);
            }
        } else {
            nc.edges[idx].node = Arc::new(new_child);
        }
        Some((nc, old_leaf))
    }
}

// =============================================================================
// Forward iterator
// =============================================================================

/// A partially visited node on the iterator stack.
struct IterFrame<'a, V> {
    node: &'a Node<V>,
    /// Next edge to descend into.
    next_edge: usize,
    /// Whether this node's own leaf is still to be emitted.
    leaf_pending: bool,
}

/// Stateful forward cursor yielding entries in ascending key order.
///
/// Obtained from [`Node::iter`] or [`RadixTree::iter`]; may be repositioned
/// with [`Iter::seek_prefix`] or [`Iter::seek_lower_bound`] before
/// consuming.
pub struct Iter<'a, V> {
    root: &'a Node<V>,
    stack: Vec<IterFrame<'a, V>>,
}

impl<'a, V> Iter<'a, V> {
    fn new(root: &'a Node<V>) -> Self {
        Iter {
            root,
            stack: vec![IterFrame {
                node: root,
                next_edge: 0,
                leaf_pending: true,
            }],
        }
    }

    /// Reposition at the subtree of keys starting with `prefix`. If no such
    /// subtree exists the iterator is exhausted.
    pub fn seek_prefix(&mut self, prefix: &[u8]) {
        self.stack.clear();
        let mut curr = self.root;
        let mut search = prefix;
        loop {
            if search.is_empty() {
                self.stack.push(IterFrame {
                    node: curr,
                    next_edge: 0,
                    leaf_pending: true,
                });
                return;
            }
            let Some((_, child)) = curr.get_edge(search[0]) else {
                return;
            };
            if search.starts_with(&child.prefix) {
                search = &search[child.prefix.len()..];
                curr = child;
            } else if child.prefix.starts_with(search) {
                // The prefix ends inside this edge; the child's subtree is
                // exactly the matching set.
                self.stack.push(IterFrame {
                    node: child,
                    next_edge: 0,
                    leaf_pending: true,
                });
                return;
            } else {
                return;
            }
        }
    }

    /// Reposition so that the next item is the smallest key `>= key`.
    pub fn seek_lower_bound(&mut self, key: &[u8]) {
        self.stack.clear();
        let mut node = self.root;
        let mut search = key;

        loop {
            // Compare the node's prefix against the same-length slice of the
            // remaining key.
            let prefix = node.prefix.as_slice();
            let cmp = if prefix.len() < search.len() {
                prefix.cmp(&search[..prefix.len()])
            } else {
                prefix.cmp(search)
            };

            match cmp {
                Ordering::Greater => {
                    // The whole subtree sorts after the key, so its smallest
                    // leaf is the bound. No further bound checks apply on
                    // the way down.
                    self.push_minimum(node);
                    return;
                }
                Ordering::Less => {
                    // The whole subtree sorts before the key.
                    return;
                }
                Ordering::Equal => {}
            }

            // Exact hit on a stored key.
            if let Some(leaf) = &node.leaf {
                if leaf.key.as_slice() == key {
                    self.stack.push(IterFrame {
                        node,
                        next_edge: 0,
                        leaf_pending: true,
                    });
                    return;
                }
            }

            // The prefix cannot be longer than the remaining key here, or
            // the comparison above would have been Greater.
            search = &search[prefix.len()..];
            if search.is_empty() {
                // Key consumed without an exact match: everything below this
                // node is strictly greater.
                self.push_minimum(node);
                return;
            }

            let Some((idx, child)) = node.get_lower_bound_edge(search[0]) else {
                return;
            };
            // Any strictly higher sibling subtree is a future candidate.
            if idx + 1 < node.edges.len() {
                self.stack.push(IterFrame {
                    node,
                    next_edge: idx + 1,
                    leaf_pending: false,
                });
            }
            node = child;
        }
    }

    /// Stack the path to the smallest leaf of `node`'s subtree.
    fn push_minimum(&mut self, mut node: &'a Node<V>) {
        loop {
            if node.is_leaf() {
                self.stack.push(IterFrame {
                    node,
                    next_edge: 0,
                    leaf_pending: true,
                });
                return;
            }
            if node.edges.len() > 1 {
                self.stack.push(IterFrame {
                    node,
                    next_edge: 1,
                    leaf_pending: false,
                });
            }
            match node.edges.first() {
                Some(e) => node = e.node.as_ref(),
                None => return,
            }
        }
    }
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a [u8], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.pop()?;

            if frame.leaf_pending {
                if let Some(leaf) = &frame.node.leaf {
                    self.stack.push(IterFrame {
                        node: frame.node,
                        next_edge: frame.next_edge,
                        leaf_pending: false,
                    });
                    return Some(leaf.entry());
                }
            }

            if frame.next_edge < frame.node.edges.len() {
                self.stack.push(IterFrame {
                    node: frame.node,
                    next_edge: frame.next_edge + 1,
                    leaf_pending: false,
                });
                let child = frame.node.edges[frame.next_edge].node.as_ref();
                self.stack.push(IterFrame {
                    node: child,
                    next_edge: 0,
                    leaf_pending: true,
                });
            }
        }
    }
}

// =============================================================================
// Reverse iterator
// =============================================================================

struct ReverseFrame<'a, V> {
    node: &'a Node<V>,
    /// Number of edges not yet visited; the next child is `remaining - 1`.
    remaining: usize,
    /// Whether this node's own leaf is still to be emitted. In reverse
    /// order the leaf comes after all of the node's children.
    leaf_pending: bool,
}

/// Stateful backwards cursor yielding entries in descending key order.
pub struct ReverseIter<'a, V> {
    root: &'a Node<V>,
    stack: Vec<ReverseFrame<'a, V>>,
}

impl<'a, V> ReverseIter<'a, V> {
    fn new(root: &'a Node<V>) -> Self {
        ReverseIter {
            root,
            stack: vec![ReverseFrame {
                node: root,
                remaining: root.edges.len(),
                leaf_pending: true,
            }],
        }
    }

    /// Reposition at the subtree of keys starting with `prefix`. If no such
    /// subtree exists the iterator is exhausted.
    pub fn seek_prefix(&mut self, prefix: &[u8]) {
        self.stack.clear();
        let mut curr = self.root;
        let mut search = prefix;
        loop {
            if search.is_empty() {
                self.stack.push(ReverseFrame {
                    node: curr,
                    remaining: curr.edges.len(),
                    leaf_pending: true,
                });
                return;
            }
            let Some((_, child)) = curr.get_edge(search[0]) else {
                return;
            };
            if search.starts_with(&child.prefix) {
                search = &search[child.prefix.len()..];
                curr = child;
            } else if child.prefix.starts_with(search) {
                self.stack.push(ReverseFrame {
                    node: child,
                    remaining: child.edges.len(),
                    leaf_pending: true,
                });
                return;
            } else {
                return;
            }
        }
    }

    /// Reposition so that the next item is the largest key `<= key`.
    pub fn seek_reverse_lower_bound(&mut self, key: &[u8]) {
        self.stack.clear();
        let mut node = self.root;
        let mut search = key;

        loop {
            let prefix = node.prefix.as_slice();
            let cmp = if prefix.len() < search.len() {
                prefix.cmp(&search[..prefix.len()])
            } else {
                prefix.cmp(search)
            };

            match cmp {
                Ordering::Less => {
                    // The whole subtree sorts before the key, so its largest
                    // leaf is the bound.
                    self.stack.push(ReverseFrame {
                        node,
                        remaining: node.edges.len(),
                        leaf_pending: true,
                    });
                    return;
                }
                Ordering::Greater => {
                    // Everything in this subtree sorts after the key.
                    return;
                }
                Ordering::Equal => {}
            }

            if let Some(leaf) = &node.leaf {
                if leaf.key.as_slice() == key {
                    // Exact hit. The node's children all sort after the key,
                    // so only the leaf itself is scheduled.
                    self.stack.push(ReverseFrame {
                        node,
                        remaining: 0,
                        leaf_pending: true,
                    });
                    return;
                }
                // A shorter leaf on the path sorts before the key; keep it
                // as the fallback bound behind any closer candidates pushed
                // after it.
                self.stack.push(ReverseFrame {
                    node,
                    remaining: 0,
                    leaf_pending: true,
                });
            }

            search = &search[prefix.len()..];
            if search.is_empty() {
                // Key consumed without an exact match: all children sort
                // after it, so whatever is already stacked is the answer.
                return;
            }

            match node.get_lower_bound_edge(search[0]) {
                Some((idx, child)) => {
                    // Strictly lower sibling subtrees all qualify.
                    if idx > 0 {
                        self.stack.push(ReverseFrame {
                            node,
                            remaining: idx,
                            leaf_pending: false,
                        });
                    }
                    node = child;
                }
                None => {
                    // Every edge label sorts below the key byte, so the
                    // whole fan-out qualifies.
                    self.stack.push(ReverseFrame {
                        node,
                        remaining: node.edges.len(),
                        leaf_pending: false,
                    });
                    return;
                }
            }
        }
    }
}

impl<'a, V> Iterator for ReverseIter<'a, V> {
    type Item = (&'a [u8], &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.pop()?;

            if frame.remaining > 0 {
                let idx = frame.remaining - 1;
                self.stack.push(ReverseFrame {
                    node: frame.node,
                    remaining: idx,
                    leaf_pending: frame.leaf_pending,
                });
                let child = frame.node.edges[idx].node.as_ref();
                self.stack.push(ReverseFrame {
                    node: child,
                    remaining: child.edges.len(),
                    leaf_pending: true,
                });
                continue;
            }

            if frame.leaf_pending {
                if let Some(leaf) = &frame.node.leaf {
                    return Some(leaf.entry());
                }
            }
        }
    }
}

// =============================================================================
// Utilities
// =============================================================================

/// Number of bytes two byte strings share at the front.
#[inline]
fn longest_common_prefix(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}


#[cfg(test)]
mod proptests;
