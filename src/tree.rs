//! keyed forest storage and structural editing
//!
//! A [Tree] owns a mapping from keys to nodes, where each node links to its
//! parent, its first child and its next sibling by key. There is deliberately
//! no previous-sibling or last-child link: operations that need one (inserting
//! before a node, appending to a child list) locate it by scanning the sibling
//! chain, and that cost model is part of the contract.
//!
//! Multiple roots are first class: the roots form a sibling chain starting at
//! `head`, so a tree is really a forest.
//!
//! All cross-references are keys resolved through the mapping on each access,
//! never addresses into it, so clones are deep copies and rehashing can never
//! invalidate a link.
//!
//! [Tree]: struct.Tree.html
use fnv::FnvHashMap;
use smallvec::SmallVec;
use std::fmt::{self, Debug};
use std::hash::Hash;
use tracing::error;

/// Payload stored in a [Tree].
///
/// Items carry their own key; the tree never synthesizes one. Two distinct
/// items must never share a key within one tree.
///
/// [Tree]: struct.Tree.html
pub trait TreeItem: Clone + PartialEq + Debug {
    type Key: Copy + Eq + Ord + Hash + Debug;

    fn key(&self) -> Self::Key;
}

/// Internal storage record linking an item into the forest.
#[derive(Debug, Clone)]
pub(crate) struct Node<T: TreeItem> {
    pub(crate) item: T,
    pub(crate) parent: Option<T::Key>,
    pub(crate) first_child: Option<T::Key>,
    pub(crate) next_sibling: Option<T::Key>,
}

/// A forest of uniquely keyed items.
#[derive(Debug, Clone)]
pub struct Tree<T: TreeItem> {
    pub(crate) nodes: FnvHashMap<T::Key, Node<T>>,
    pub(crate) head: Option<T::Key>,
}

impl<T: TreeItem> Default for Tree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TreeItem> From<T> for Tree<T> {
    fn from(item: T) -> Self {
        let mut tree = Self::new();
        tree.insert(item);
        tree
    }
}

impl<T: TreeItem> Tree<T> {
    pub fn new() -> Self {
        Self {
            nodes: FnvHashMap::default(),
            head: None,
        }
    }

    /// number of items in the forest
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// drop every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.head = None;
    }

    pub fn contains(&self, key: T::Key) -> bool {
        self.nodes.contains_key(&key)
    }

    /// item for a key, or None if there is no such node
    pub fn at(&self, key: T::Key) -> Option<&T> {
        self.nodes.get(&key).map(|n| &n.item)
    }

    /// Mutable access to the item for a key.
    ///
    /// The caller must not change the item's key through this reference; the
    /// mapping is keyed by it.
    pub fn at_mut(&mut self, key: T::Key) -> Option<&mut T> {
        self.nodes.get_mut(&key).map(|n| &mut n.item)
    }

    /// first root, or None for an empty forest
    pub fn get_head(&self) -> Option<&T> {
        self.head.map(|k| &self.nodes[&k].item)
    }

    pub fn head_key(&self) -> Option<T::Key> {
        self.head
    }

    /// all roots, in root order
    pub fn get_heads(&self) -> Vec<&T> {
        let mut out = Vec::new();
        let mut cur = self.head;
        while let Some(k) = cur {
            let n = &self.nodes[&k];
            out.push(&n.item);
            cur = n.next_sibling;
        }
        out
    }

    pub fn parent_key(&self, key: T::Key) -> Option<T::Key> {
        self.nodes.get(&key).and_then(|n| n.parent)
    }

    pub fn parent(&self, key: T::Key) -> Option<&T> {
        self.parent_key(key).map(|k| &self.nodes[&k].item)
    }

    pub fn first_child_key(&self, key: T::Key) -> Option<T::Key> {
        self.nodes.get(&key).and_then(|n| n.first_child)
    }

    pub fn first_child(&self, key: T::Key) -> Option<&T> {
        self.first_child_key(key).map(|k| &self.nodes[&k].item)
    }

    pub fn next_sibling_key(&self, key: T::Key) -> Option<T::Key> {
        self.nodes.get(&key).and_then(|n| n.next_sibling)
    }

    pub fn next_sibling(&self, key: T::Key) -> Option<&T> {
        self.next_sibling_key(key).map(|k| &self.nodes[&k].item)
    }

    /// Previous sibling of a node.
    ///
    /// There is no back-link, so this scans the sibling chain from the front:
    /// O(number of preceding siblings).
    pub fn previous_sibling_key(&self, key: T::Key) -> Option<T::Key> {
        let n = self.nodes.get(&key)?;
        let mut cur = match n.parent {
            Some(p) => self.nodes[&p].first_child,
            None => self.head,
        };
        while let Some(c) = cur {
            let next = self.nodes[&c].next_sibling;
            if next == Some(key) {
                return Some(c);
            }
            cur = next;
        }
        None
    }

    pub fn previous_sibling(&self, key: T::Key) -> Option<&T> {
        self.previous_sibling_key(key).map(|k| &self.nodes[&k].item)
    }

    /// all children of a node as an ordered list
    pub fn children(&self, key: T::Key) -> Vec<&T> {
        let mut out = Vec::new();
        let mut cur = self.first_child_key(key);
        while let Some(c) = cur {
            let n = &self.nodes[&c];
            out.push(&n.item);
            cur = n.next_sibling;
        }
        out
    }

    pub fn number_of_children(&self, key: T::Key) -> usize {
        let mut count = 0;
        let mut cur = self.first_child_key(key);
        while let Some(c) = cur {
            count += 1;
            cur = self.nodes[&c].next_sibling;
        }
        count
    }

    /// number of other nodes sharing this node's sibling chain
    pub fn number_of_siblings(&self, key: T::Key) -> usize {
        let n = match self.nodes.get(&key) {
            Some(n) => n,
            None => return 0,
        };
        let mut count = 0;
        let mut cur = match n.parent {
            Some(p) => self.nodes[&p].first_child,
            None => self.head,
        };
        while let Some(c) = cur {
            count += 1;
            cur = self.nodes[&c].next_sibling;
        }
        count - 1
    }

    /// distance to the root, walking the parent chain; roots have depth 0
    pub fn depth(&self, key: T::Key) -> Option<usize> {
        let mut n = self.nodes.get(&key)?;
        let mut depth = 0;
        while let Some(p) = n.parent {
            depth += 1;
            n = &self.nodes[&p];
        }
        Some(depth)
    }

    /// Whether `key` lies in the subtree rooted at `ancestor` (inclusive).
    ///
    /// Walks the subtree, so this also answers correctly for keys that are
    /// not in this tree at all. O(subtree size) worst case.
    pub fn is_in_subtree(&self, ancestor: T::Key, key: T::Key) -> bool {
        if !self.nodes.contains_key(&ancestor) {
            return false;
        }
        let mut stack = vec![ancestor];
        while let Some(k) = stack.pop() {
            if k == key {
                return true;
            }
            let mut c = self.nodes[&k].first_child;
            while let Some(ck) = c {
                stack.push(ck);
                c = self.nodes[&ck].next_sibling;
            }
        }
        false
    }

    /// Whether any key of `other`'s subtree at `other_key` already exists in
    /// this tree. This is the precondition check of the subtree copy family.
    pub fn subtree_in_tree(&self, other: &Tree<T>, other_key: T::Key) -> bool {
        if !other.contains(other_key) {
            return false;
        }
        other
            .subtree_keys(other_key)
            .iter()
            .any(|k| self.nodes.contains_key(k))
    }

    /// Add `item` as the new first root.
    ///
    /// Panics if the item's key is already present anywhere in the tree.
    pub fn insert(&mut self, item: T) {
        let head = self.head;
        let key = self.alloc(item, None, head);
        self.head = Some(key);
    }

    /// Add `item` as the new last root, scanning the root chain to find the
    /// end. Panics on a duplicate key.
    pub fn insert_last(&mut self, item: T) {
        match self.last_root_key() {
            None => self.insert(item),
            Some(last) => {
                let key = self.alloc(item, None, None);
                self.node_mut(last).next_sibling = Some(key);
            }
        }
    }

    /// Place `item` immediately before `sibling` in its sibling chain.
    ///
    /// Locating the previous sibling scans from the front of the chain.
    /// Panics if `sibling` is absent or the item's key is already present.
    pub fn insert_before(&mut self, sibling: T::Key, item: T) {
        let n = self.expect_node(sibling, "insert_before");
        let parent = n.parent;
        let prev = self.previous_sibling_key(sibling);
        let key = self.alloc(item, parent, Some(sibling));
        match prev {
            Some(p) => self.node_mut(p).next_sibling = Some(key),
            None => match parent {
                Some(par) => self.node_mut(par).first_child = Some(key),
                None => self.head = Some(key),
            },
        }
    }

    /// Place `item` immediately after `sibling` in its sibling chain. O(1).
    ///
    /// Panics if `sibling` is absent or the item's key is already present.
    pub fn insert_after(&mut self, sibling: T::Key, item: T) {
        let n = self.expect_node(sibling, "insert_after");
        let parent = n.parent;
        let next = n.next_sibling;
        let key = self.alloc(item, parent, next);
        self.node_mut(sibling).next_sibling = Some(key);
    }

    /// Attach `item` as the new last child of `parent`.
    ///
    /// Panics if `parent` is absent or the item's key is already present.
    pub fn append_child(&mut self, parent: T::Key, item: T) {
        self.expect_node(parent, "append_child");
        let last = self.last_child_key(parent);
        let key = self.alloc(item, Some(parent), None);
        match last {
            Some(l) => self.node_mut(l).next_sibling = Some(key),
            None => self.node_mut(parent).first_child = Some(key),
        }
    }

    /// Attach a whole ordered batch of children in one pass, tracking the
    /// running last-child pointer instead of rescanning per item.
    pub fn append_children(&mut self, parent: T::Key, items: impl IntoIterator<Item = T>) {
        self.expect_node(parent, "append_children");
        let mut last = self.last_child_key(parent);
        for item in items {
            let key = self.alloc(item, Some(parent), None);
            match last {
                Some(l) => self.node_mut(l).next_sibling = Some(key),
                None => self.node_mut(parent).first_child = Some(key),
            }
            last = Some(key);
        }
    }

    /// Substitute `item` for the node at `key`, in place: same parent, same
    /// children, same sibling position. Every neighbor link is repointed at
    /// the new key, including the head.
    ///
    /// Panics if `key` is absent, or if the new key is already taken by a
    /// different node.
    pub fn replace(&mut self, key: T::Key, item: T) {
        self.expect_node(key, "replace");
        let new_key = item.key();
        if new_key == key {
            self.node_mut(key).item = item;
            return;
        }
        assert!(
            !self.nodes.contains_key(&new_key),
            "replace: key {:?} already present",
            new_key
        );
        let prev = self.previous_sibling_key(key);
        let old = self.nodes.remove(&key).unwrap();
        let first_child = old.first_child;
        self.nodes.insert(
            new_key,
            Node {
                item,
                parent: old.parent,
                first_child: old.first_child,
                next_sibling: old.next_sibling,
            },
        );
        match prev {
            Some(p) => self.node_mut(p).next_sibling = Some(new_key),
            None => match old.parent {
                Some(par) => self.node_mut(par).first_child = Some(new_key),
                None => self.head = Some(new_key),
            },
        }
        let mut cur = first_child;
        while let Some(c) = cur {
            let n = self.node_mut(c);
            n.parent = Some(new_key);
            cur = n.next_sibling;
        }
    }

    /// Destroy the node at `key` and its entire subtree, re-linking the
    /// previous sibling (or the parent's first-child link, or the head) to
    /// the former next sibling. Panics if `key` is absent.
    pub fn erase(&mut self, key: T::Key) {
        self.expect_node(key, "erase");
        let prev = self.previous_sibling_key(key);
        let parent = self.nodes[&key].parent;
        let next = self.nodes[&key].next_sibling;
        for k in self.subtree_keys(key) {
            self.nodes.remove(&k);
        }
        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => match parent {
                Some(par) => self.node_mut(par).first_child = next,
                None => self.head = next,
            },
        }
    }

    /// Destroy only the descendants of `key`, leaving it childless.
    /// Panics if `key` is absent.
    pub fn erase_children(&mut self, key: T::Key) {
        self.expect_node(key, "erase_children");
        let mut cur = self.nodes[&key].first_child;
        while let Some(c) = cur {
            cur = self.nodes[&c].next_sibling;
            for k in self.subtree_keys(c) {
                self.nodes.remove(&k);
            }
        }
        self.node_mut(key).first_child = None;
    }

    /// Turn every child of `key` into a sibling of `key`, spliced between
    /// `key` and its former next sibling in original order. Exactly
    /// `number_of_children(key)` parent links change; `key` ends childless.
    /// Panics if `key` is absent.
    pub fn flatten(&mut self, key: T::Key) {
        self.expect_node(key, "flatten");
        let children = self.child_keys(key);
        if children.is_empty() {
            return;
        }
        let parent = self.nodes[&key].parent;
        let old_next = self.nodes[&key].next_sibling;
        for &c in children.iter() {
            self.node_mut(c).parent = parent;
        }
        self.node_mut(*children.last().unwrap()).next_sibling = old_next;
        let n = self.node_mut(key);
        n.next_sibling = Some(children[0]);
        n.first_child = None;
    }

    /// Move the entire child list of `src`, in order, to the tail of `dst`'s
    /// child list. `src` ends childless.
    ///
    /// Panics if either key is absent, if they are equal, or if `dst` is one
    /// of `src`'s children (the move would detach `dst` from the forest).
    pub fn reparent(&mut self, dst: T::Key, src: T::Key) {
        self.expect_node(dst, "reparent");
        self.expect_node(src, "reparent");
        assert!(dst != src, "reparent: dst and src are the same node {:?}", dst);
        let moved = self.child_keys(src);
        if moved.is_empty() {
            return;
        }
        assert!(
            moved.iter().all(|&c| c != dst),
            "reparent: dst {:?} is a child of src {:?}",
            dst,
            src
        );
        let src_first = self.nodes[&src].first_child;
        let last_dst = self.last_child_key(dst);
        for &c in moved.iter() {
            self.node_mut(c).parent = Some(dst);
        }
        match last_dst {
            Some(l) => self.node_mut(l).next_sibling = src_first,
            None => self.node_mut(dst).first_child = src_first,
        }
        self.node_mut(src).first_child = None;
    }

    /// Copy every root of `other` whose key is absent from this tree, with
    /// its whole subtree, as a new trailing root of this tree.
    ///
    /// Merging a tree into itself is unrepresentable here: `self` is borrowed
    /// mutably while `other` is borrowed shared, so they cannot alias.
    /// Panics if a copied subtree contains a key already present.
    pub fn merge(&mut self, other: &Tree<T>) {
        let mut cur = other.head;
        while let Some(root) = cur {
            cur = other.nodes[&root].next_sibling;
            if self.nodes.contains_key(&root) {
                continue;
            }
            self.copy_nodes(other, root);
            self.splice_as_last_root(root);
        }
    }

    /// Copy `other_key`'s subtree from `other` and attach it as the new last
    /// child of `parent`.
    ///
    /// Panics if `parent` is absent, `other_key` is absent from `other`, or
    /// any copied key already exists here (check with [subtree_in_tree]).
    ///
    /// [subtree_in_tree]: #method.subtree_in_tree
    pub fn append_child_subtree(&mut self, parent: T::Key, other: &Tree<T>, other_key: T::Key) {
        self.expect_node(parent, "append_child_subtree");
        other.expect_node(other_key, "append_child_subtree (other)");
        let last = self.last_child_key(parent);
        self.copy_nodes(other, other_key);
        let n = self.node_mut(other_key);
        n.parent = Some(parent);
        match last {
            Some(l) => self.node_mut(l).next_sibling = Some(other_key),
            None => self.node_mut(parent).first_child = Some(other_key),
        }
    }

    /// Copy `other_key`'s subtree from `other` and splice it immediately
    /// before `sibling`. Same contract as [append_child_subtree].
    ///
    /// [append_child_subtree]: #method.append_child_subtree
    pub fn insert_subtree(&mut self, sibling: T::Key, other: &Tree<T>, other_key: T::Key) {
        self.expect_node(sibling, "insert_subtree");
        other.expect_node(other_key, "insert_subtree (other)");
        let parent = self.nodes[&sibling].parent;
        let prev = self.previous_sibling_key(sibling);
        self.copy_nodes(other, other_key);
        let n = self.node_mut(other_key);
        n.parent = parent;
        n.next_sibling = Some(sibling);
        match prev {
            Some(p) => self.node_mut(p).next_sibling = Some(other_key),
            None => match parent {
                Some(par) => self.node_mut(par).first_child = Some(other_key),
                None => self.head = Some(other_key),
            },
        }
    }

    /// Copy `other_key`'s subtree from `other` and splice it immediately
    /// after `sibling`. Same contract as [append_child_subtree].
    ///
    /// [append_child_subtree]: #method.append_child_subtree
    pub fn insert_subtree_after(&mut self, sibling: T::Key, other: &Tree<T>, other_key: T::Key) {
        self.expect_node(sibling, "insert_subtree_after");
        other.expect_node(other_key, "insert_subtree_after (other)");
        let parent = self.nodes[&sibling].parent;
        let next = self.nodes[&sibling].next_sibling;
        self.copy_nodes(other, other_key);
        let n = self.node_mut(other_key);
        n.parent = parent;
        n.next_sibling = next;
        self.node_mut(sibling).next_sibling = Some(other_key);
    }

    /// Replace the whole subtree at `key` with a copy of `other_key`'s
    /// subtree from `other`, at the same position.
    ///
    /// The old subtree is destroyed first, so replacing a subtree with an
    /// edited copy of itself (same keys) is legal; copied keys colliding with
    /// *surviving* nodes panic.
    pub fn replace_subtree(&mut self, key: T::Key, other: &Tree<T>, other_key: T::Key) {
        self.expect_node(key, "replace_subtree");
        other.expect_node(other_key, "replace_subtree (other)");
        let prev = self.previous_sibling_key(key);
        let parent = self.nodes[&key].parent;
        let next = self.nodes[&key].next_sibling;
        for k in self.subtree_keys(key) {
            self.nodes.remove(&k);
        }
        self.copy_nodes(other, other_key);
        let n = self.node_mut(other_key);
        n.parent = parent;
        n.next_sibling = next;
        match prev {
            Some(p) => self.node_mut(p).next_sibling = Some(other_key),
            None => match parent {
                Some(par) => self.node_mut(par).first_child = Some(other_key),
                None => self.head = Some(other_key),
            },
        }
    }

    /// Check the forest invariants, returning a description of each
    /// violation found. An empty result means the tree is sound.
    pub fn check_invariants(&self) -> Vec<String> {
        let mut msgs = Vec::new();
        let mut seen = fnv::FnvHashSet::default();
        let mut stack: Vec<T::Key> = Vec::new();
        if let Some(h) = self.head {
            stack.push(h);
        }
        while let Some(k) = stack.pop() {
            if !seen.insert(k) {
                msgs.push(format!("key {:?} reachable more than once", k));
                continue;
            }
            let n = match self.nodes.get(&k) {
                Some(n) => n,
                None => {
                    msgs.push(format!("link to missing key {:?}", k));
                    continue;
                }
            };
            if let Some(next) = n.next_sibling {
                stack.push(next);
            }
            if let Some(fc) = n.first_child {
                stack.push(fc);
            }
            // parent back-links of the whole child chain, bounded in case the
            // chain itself is cyclic
            let mut c = n.first_child;
            let mut steps = 0;
            while let Some(ck) = c {
                steps += 1;
                if steps > self.nodes.len() {
                    msgs.push(format!("cyclic child chain under {:?}", k));
                    break;
                }
                match self.nodes.get(&ck) {
                    Some(cn) => {
                        if cn.parent != Some(k) {
                            msgs.push(format!(
                                "child {:?} of {:?} has parent link {:?}",
                                ck, k, cn.parent
                            ));
                        }
                        c = cn.next_sibling;
                    }
                    None => {
                        msgs.push(format!("child link to missing key {:?}", ck));
                        break;
                    }
                }
            }
        }
        if seen.len() != self.nodes.len() {
            msgs.push(format!(
                "{} nodes stored but {} reachable from head",
                self.nodes.len(),
                seen.len()
            ));
        }
        msgs
    }

    /// Panics with a report if any forest invariant is violated.
    pub fn assert_invariants(&self) {
        let msgs = self.check_invariants();
        if !msgs.is_empty() {
            for msg in msgs.iter() {
                error!("invariant failed: {}", msg);
            }
            panic!("assert_invariants failed: {}", msgs.join(", "));
        }
    }

    /// keys of the subtree rooted at `key`, root first, unspecified order
    /// below that
    pub(crate) fn subtree_keys(&self, key: T::Key) -> Vec<T::Key> {
        let mut out = Vec::new();
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            out.push(k);
            let mut c = self.nodes[&k].first_child;
            while let Some(ck) = c {
                stack.push(ck);
                c = self.nodes[&ck].next_sibling;
            }
        }
        out
    }

    pub(crate) fn child_keys(&self, key: T::Key) -> SmallVec<[T::Key; 8]> {
        let mut out = SmallVec::new();
        let mut cur = self.first_child_key(key);
        while let Some(c) = cur {
            out.push(c);
            cur = self.nodes[&c].next_sibling;
        }
        out
    }

    fn last_child_key(&self, key: T::Key) -> Option<T::Key> {
        let mut last = None;
        let mut cur = self.first_child_key(key);
        while let Some(c) = cur {
            last = Some(c);
            cur = self.nodes[&c].next_sibling;
        }
        last
    }

    fn last_root_key(&self) -> Option<T::Key> {
        let mut last = None;
        let mut cur = self.head;
        while let Some(k) = cur {
            last = Some(k);
            cur = self.nodes[&k].next_sibling;
        }
        last
    }

    fn node_mut(&mut self, key: T::Key) -> &mut Node<T> {
        self.nodes.get_mut(&key).unwrap()
    }

    fn expect_node(&self, key: T::Key, op: &str) -> &Node<T> {
        match self.nodes.get(&key) {
            Some(n) => n,
            None => panic!("{}: no node with key {:?}", op, key),
        }
    }

    /// Create a node for `item`, panicking if its key is already taken.
    fn alloc(&mut self, item: T, parent: Option<T::Key>, next_sibling: Option<T::Key>) -> T::Key {
        let key = item.key();
        assert!(
            !self.nodes.contains_key(&key),
            "duplicate key {:?}",
            key
        );
        self.nodes.insert(
            key,
            Node {
                item,
                parent,
                first_child: None,
                next_sibling,
            },
        );
        key
    }

    /// Copy the subtree of `other` at `root` into this tree's node map.
    ///
    /// Keys and inner links are preserved verbatim; the copied root's parent
    /// and next-sibling links are cleared for the caller to splice. Panics if
    /// any copied key already exists here.
    fn copy_nodes(&mut self, other: &Tree<T>, root: T::Key) {
        for k in other.subtree_keys(root) {
            assert!(
                !self.nodes.contains_key(&k),
                "subtree copy: key {:?} already present in destination",
                k
            );
            let on = &other.nodes[&k];
            let mut n = Node {
                item: on.item.clone(),
                parent: on.parent,
                first_child: on.first_child,
                next_sibling: on.next_sibling,
            };
            if k == root {
                n.parent = None;
                n.next_sibling = None;
            }
            self.nodes.insert(k, n);
        }
    }

    fn splice_as_last_root(&mut self, key: T::Key) {
        match self.last_root_key() {
            Some(l) if l != key => self.node_mut(l).next_sibling = Some(key),
            Some(_) => {}
            None => self.head = Some(key),
        }
    }
}

/// Deep structural equality: same roots in the same order, recursively the
/// same items and the same shape. A forest is fully determined by its
/// pre-order item sequence together with each node's child count.
impl<T: TreeItem> PartialEq for Tree<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.nodes.len() != other.nodes.len() {
            return false;
        }
        let mut a = self.pre_order();
        let mut b = other.pre_order();
        loop {
            match (a.next(), b.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) => {
                    if x != y
                        || self.number_of_children(x.key()) != other.number_of_children(y.key())
                    {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }
}

/// Indented dump, one item per line, children indented below their parent.
impl<T: TreeItem> fmt::Display for Tree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack: Vec<(T::Key, usize)> = Vec::new();
        let mut roots: Vec<T::Key> = Vec::new();
        let mut cur = self.head;
        while let Some(k) = cur {
            roots.push(k);
            cur = self.nodes[&k].next_sibling;
        }
        for &r in roots.iter().rev() {
            stack.push((r, 0));
        }
        while let Some((k, depth)) = stack.pop() {
            let n = &self.nodes[&k];
            writeln!(f, "{:indent$}{:?}", "", n.item, indent = depth * 2)?;
            let children = self.child_keys(k);
            for &c in children.iter().rev() {
                stack.push((c, depth + 1));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(u32);

    impl TreeItem for Item {
        type Key = u32;

        fn key(&self) -> u32 {
            self.0
        }
    }

    fn keys_in_order(tree: &Tree<Item>) -> Vec<u32> {
        tree.pre_order().map(|i| i.0).collect()
    }

    /// A -> [B -> [D], C]
    fn sample() -> Tree<Item> {
        let mut t = Tree::from(Item(1));
        t.append_child(1, Item(2));
        t.append_child(1, Item(3));
        t.append_child(2, Item(4));
        t.assert_invariants();
        t
    }

    #[test]
    fn insert_makes_new_first_root() {
        let mut t = Tree::new();
        t.insert(Item(1));
        t.insert(Item(2));
        assert_eq!(t.get_head().unwrap().0, 2);
        assert_eq!(keys_in_order(&t), vec![2, 1]);
    }

    #[test]
    fn insert_last_appends_root() {
        let mut t = Tree::from(Item(1));
        t.insert_last(Item(2));
        t.insert_last(Item(3));
        assert_eq!(keys_in_order(&t), vec![1, 2, 3]);
        t.assert_invariants();
    }

    #[test]
    #[should_panic(expected = "duplicate key")]
    fn duplicate_key_is_fatal() {
        let mut t = Tree::from(Item(1));
        t.append_child(1, Item(1));
    }

    #[test]
    fn sibling_insertion_order() {
        let mut t = sample();
        t.insert_before(2, Item(10));
        t.insert_after(2, Item(11));
        assert_eq!(
            t.children(1).iter().map(|i| i.0).collect::<Vec<_>>(),
            vec![10, 2, 11, 3]
        );
        t.assert_invariants();
    }

    #[test]
    fn append_children_batch() {
        let mut t = Tree::from(Item(1));
        t.append_child(1, Item(2));
        t.append_children(1, vec![Item(3), Item(4), Item(5)]);
        assert_eq!(
            t.children(1).iter().map(|i| i.0).collect::<Vec<_>>(),
            vec![2, 3, 4, 5]
        );
        t.assert_invariants();
    }

    #[test]
    fn erase_removes_subtree_only() {
        // A -> [B -> [D], C]; erase(B) yields A -> [C]
        let mut t = sample();
        t.erase(2);
        assert_eq!(t.size(), 2);
        assert_eq!(keys_in_order(&t), vec![1, 3]);
        t.assert_invariants();
    }

    #[test]
    fn erase_head_moves_head() {
        let mut t = sample();
        t.insert_last(Item(9));
        t.erase(1);
        assert_eq!(t.get_head().unwrap().0, 9);
        t.assert_invariants();
    }

    #[test]
    fn erase_children_keeps_node() {
        let mut t = sample();
        t.erase_children(1);
        assert_eq!(t.size(), 1);
        assert_eq!(t.number_of_children(1), 0);
        t.assert_invariants();
    }

    #[test]
    fn replace_rewires_all_neighbors() {
        let mut t = sample();
        t.replace(2, Item(20));
        assert_eq!(keys_in_order(&t), vec![1, 20, 4, 3]);
        assert_eq!(t.parent_key(4), Some(20));
        assert_eq!(t.next_sibling_key(20), Some(3));
        t.assert_invariants();
    }

    #[test]
    fn replace_head_updates_head() {
        let mut t = sample();
        t.replace(1, Item(100));
        assert_eq!(t.get_head().unwrap().0, 100);
        t.assert_invariants();
    }

    #[test]
    fn flatten_splices_children_in_order() {
        let mut t = Tree::from(Item(1));
        t.append_children(1, vec![Item(2), Item(3)]);
        t.append_children(2, vec![Item(4), Item(5)]);
        let before = t.number_of_children(2);
        t.flatten(2);
        assert_eq!(before, 2);
        assert_eq!(t.number_of_children(2), 0);
        assert_eq!(
            t.children(1).iter().map(|i| i.0).collect::<Vec<_>>(),
            vec![2, 4, 5, 3]
        );
        t.assert_invariants();
    }

    #[test]
    fn flatten_root_promotes_children_to_roots() {
        let mut t = sample();
        t.flatten(1);
        assert_eq!(keys_in_order(&t), vec![1, 2, 4, 3]);
        assert_eq!(t.parent_key(2), None);
        assert_eq!(t.parent_key(4), Some(2));
        t.assert_invariants();
    }

    #[test]
    fn reparent_moves_whole_child_list() {
        let mut t = Tree::from(Item(1));
        t.append_children(1, vec![Item(2), Item(3)]);
        t.append_children(3, vec![Item(4), Item(5)]);
        t.reparent(2, 3);
        assert_eq!(t.number_of_children(3), 0);
        assert_eq!(
            t.children(2).iter().map(|i| i.0).collect::<Vec<_>>(),
            vec![4, 5]
        );
        assert_eq!(t.parent_key(4), Some(2));
        t.assert_invariants();
    }

    #[test]
    fn merge_copies_missing_roots() {
        // t1 = {A -> [B]}, t2 = {C -> [D, E]}
        let mut t1 = Tree::from(Item(1));
        t1.append_child(1, Item(2));
        let mut t2 = Tree::from(Item(3));
        t2.append_children(3, vec![Item(4), Item(5)]);
        t1.merge(&t2);
        assert_eq!(keys_in_order(&t1), vec![1, 2, 3, 4, 5]);
        assert_eq!(t1.get_heads().len(), 2);
        t1.assert_invariants();
        // roots already present are skipped
        let before = t1.clone();
        t1.merge(&t2);
        assert_eq!(t1, before);
    }

    #[test]
    fn subtree_copy_into_other_tree() {
        let src = sample();
        let mut dst = Tree::from(Item(10));
        dst.append_child_subtree(10, &src, 2);
        assert_eq!(keys_in_order(&dst), vec![10, 2, 4]);
        assert_eq!(dst.parent_key(2), Some(10));
        dst.assert_invariants();
        assert!(dst.subtree_in_tree(&src, 2));
        assert!(!dst.subtree_in_tree(&src, 3));
    }

    #[test]
    fn replace_subtree_with_edited_copy_of_itself() {
        let mut t = sample();
        let copy = {
            let mut c = Tree::new();
            c.insert(Item(2));
            c.append_child(2, Item(4));
            c.append_child(2, Item(5));
            c
        };
        t.replace_subtree(2, &copy, 2);
        assert_eq!(keys_in_order(&t), vec![1, 2, 4, 5, 3]);
        t.assert_invariants();
    }

    #[test]
    #[should_panic(expected = "already present")]
    fn subtree_copy_key_collision_is_fatal() {
        let src = sample();
        let mut dst = Tree::from(Item(2));
        dst.append_child_subtree(2, &src, 2);
    }

    #[test]
    fn relationship_queries() {
        let t = sample();
        assert_eq!(t.parent_key(4), Some(2));
        assert_eq!(t.previous_sibling_key(3), Some(2));
        assert_eq!(t.previous_sibling_key(2), None);
        assert_eq!(t.depth(4), Some(2));
        assert_eq!(t.depth(1), Some(0));
        assert_eq!(t.depth(99), None);
        assert_eq!(t.number_of_siblings(2), 1);
        assert!(t.is_in_subtree(1, 4));
        assert!(!t.is_in_subtree(2, 3));
        assert!(t.at(99).is_none());
    }

    #[test]
    fn structural_equality() {
        let a = sample();
        let mut b = sample();
        assert_eq!(a, b);
        // same items, different shape
        b.flatten(2);
        assert_ne!(a, b);
    }

    #[quickcheck]
    fn size_matches_fast_count(slots: Vec<u8>) -> bool {
        // grow a forest from arbitrary attachment choices
        let mut t: Tree<Item> = Tree::new();
        let mut inserted: Vec<u32> = Vec::new();
        for (i, &slot) in slots.iter().enumerate() {
            let key = i as u32;
            let choice = slot as usize % (inserted.len() + 1);
            if choice == 0 {
                t.insert_last(Item(key));
            } else {
                t.append_child(inserted[choice - 1], Item(key));
            }
            inserted.push(key);
        }
        t.assert_invariants();
        t.size() == t.fast().count() && t.pre_order().count() == t.size()
    }

    #[test]
    fn display_is_depth_prefixed() {
        let t = sample();
        let dump = format!("{}", t);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Item(1)"));
        assert!(lines[1].starts_with("  Item(2)"));
        assert!(lines[2].starts_with("    Item(4)"));
        assert!(lines[3].starts_with("  Item(3)"));
    }
}
