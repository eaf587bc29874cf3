//! traversal engines over decay forests
//!
//! Five cursor flavors share one storage, each with its own "first" and
//! "next" rule and its own ordering and cost contract:
//!
//! - **pre-order**: parents before children, the default order; O(1)
//!   amortized per step. Equality and serialization are defined over it.
//! - **post-order**: children fully visited before their parent. Stepping to
//!   the next sibling re-descends to its leftmost leaf, so a full traversal
//!   costs more than O(n); this is deliberate and downstream round-trip
//!   determinism is defined in terms of exactly this order.
//! - **sibling**: one sibling chain only.
//! - **fast**: the backing map in unspecified order, for bulk scans.
//! - **leaf**: like fast, skipping nodes that have children.
//!
//! The stepping rules live on [Tree], so read-only cursors and the
//! `for_each_*_mut` family traverse with identical logic. All flavors
//! implement [Cursor], which makes them mutually constructible when
//! positioned at the same key.
//!
//! [Tree]: ../tree/struct.Tree.html
//! [Cursor]: trait.Cursor.html
use crate::tree::{Node, Tree, TreeItem};
use std::collections::hash_map;

impl<T: TreeItem> Tree<T> {
    /// Pre-order successor: first child, else next sibling, else the next
    /// sibling of the nearest ancestor that has one.
    pub fn next_pre_order(&self, key: T::Key) -> Option<T::Key> {
        let n = self.nodes.get(&key)?;
        if let Some(c) = n.first_child {
            return Some(c);
        }
        let mut cur = key;
        loop {
            let n = &self.nodes[&cur];
            if let Some(s) = n.next_sibling {
                return Some(s);
            }
            match n.parent {
                Some(p) => cur = p,
                None => return None,
            }
        }
    }

    /// Deepest first-child descendant of `key`, O(depth).
    pub fn leftmost_leaf(&self, key: T::Key) -> Option<T::Key> {
        let mut n = self.nodes.get(&key)?;
        let mut k = key;
        while let Some(c) = n.first_child {
            k = c;
            n = &self.nodes[&c];
        }
        Some(k)
    }

    /// First key in post-order: the leftmost leaf of the first root.
    pub fn first_post_order(&self) -> Option<T::Key> {
        self.head.and_then(|h| self.leftmost_leaf(h))
    }

    /// Post-order successor: the leftmost leaf of the next sibling, else the
    /// parent.
    pub fn next_post_order(&self, key: T::Key) -> Option<T::Key> {
        let n = self.nodes.get(&key)?;
        if let Some(s) = n.next_sibling {
            return self.leftmost_leaf(s);
        }
        n.parent
    }

    /// Iterate the whole forest in pre-order.
    pub fn pre_order(&self) -> PreOrderIter<'_, T> {
        PreOrderIter {
            tree: self,
            cur: self.head,
        }
    }

    /// Iterate the whole forest in post-order.
    pub fn post_order(&self) -> PostOrderIter<'_, T> {
        PostOrderIter {
            tree: self,
            cur: self.first_post_order(),
        }
    }

    /// Iterate the sibling chain starting at `key` (inclusive).
    pub fn siblings(&self, key: T::Key) -> SiblingIter<'_, T> {
        SiblingIter::at(self, key)
    }

    /// Iterate the backing map in unspecified order.
    pub fn fast(&self) -> FastIter<'_, T> {
        let mut inner = self.nodes.values();
        let cur = inner.next();
        FastIter {
            tree: self,
            inner,
            cur,
        }
    }

    /// Iterate childless nodes in unspecified order.
    pub fn leaves(&self) -> LeafIter<'_, T> {
        let mut it = LeafIter {
            tree: self,
            inner: self.nodes.values(),
            cur: None,
        };
        it.cur = LeafIter::scan(&mut it);
        it
    }

    /// Pre-order traversal with mutable item access.
    ///
    /// The callback gets the items only, so the shape cannot change under the
    /// traversal; it must not change an item's key.
    pub fn for_each_pre_order_mut(&mut self, mut f: impl FnMut(&mut T)) {
        let mut cur = self.head;
        while let Some(k) = cur {
            let next = self.next_pre_order(k);
            f(&mut self.nodes.get_mut(&k).unwrap().item);
            cur = next;
        }
    }

    /// Post-order traversal with mutable item access. Same contract as
    /// [for_each_pre_order_mut].
    ///
    /// [for_each_pre_order_mut]: #method.for_each_pre_order_mut
    pub fn for_each_post_order_mut(&mut self, mut f: impl FnMut(&mut T)) {
        let mut cur = self.first_post_order();
        while let Some(k) = cur {
            let next = self.next_post_order(k);
            f(&mut self.nodes.get_mut(&k).unwrap().item);
            cur = next;
        }
    }

    /// Sibling-chain traversal from `key` with mutable item access.
    pub fn for_each_sibling_mut(&mut self, key: T::Key, mut f: impl FnMut(&mut T)) {
        let mut cur = if self.contains(key) { Some(key) } else { None };
        while let Some(k) = cur {
            let next = self.next_sibling_key(k);
            f(&mut self.nodes.get_mut(&k).unwrap().item);
            cur = next;
        }
    }

    /// Unordered traversal with mutable item access.
    pub fn for_each_fast_mut(&mut self, mut f: impl FnMut(&mut T)) {
        for n in self.nodes.values_mut() {
            f(&mut n.item);
        }
    }

    /// Unordered traversal of childless nodes with mutable item access.
    pub fn for_each_leaf_mut(&mut self, mut f: impl FnMut(&mut T)) {
        for n in self.nodes.values_mut() {
            if n.first_child.is_none() {
                f(&mut n.item);
            }
        }
    }
}

/// Common surface of the five cursor flavors.
///
/// `at` positions a fresh cursor of any flavor at a key, so a cursor of one
/// flavor can be rebuilt as any other at the same position:
/// `PostOrderIter::at(c.tree(), k)` for a pre-order cursor `c` at `k`.
pub trait Cursor<'a, T: TreeItem + 'a>: Iterator<Item = &'a T> + Sized {
    /// A cursor positioned at `key`; exhausted if `key` is absent.
    fn at(tree: &'a Tree<T>, key: T::Key) -> Self;

    /// Key of the item the next call to `next` will yield.
    fn key(&self) -> Option<T::Key>;

    fn tree(&self) -> &'a Tree<T>;
}

/// Default iteration order: parents before children.
pub struct PreOrderIter<'a, T: TreeItem> {
    tree: &'a Tree<T>,
    cur: Option<T::Key>,
}

impl<'a, T: TreeItem> Iterator for PreOrderIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let k = self.cur?;
        self.cur = self.tree.next_pre_order(k);
        Some(&self.tree.nodes[&k].item)
    }
}

impl<'a, T: TreeItem> Cursor<'a, T> for PreOrderIter<'a, T> {
    fn at(tree: &'a Tree<T>, key: T::Key) -> Self {
        let cur = if tree.contains(key) { Some(key) } else { None };
        Self { tree, cur }
    }

    fn key(&self) -> Option<T::Key> {
        self.cur
    }

    fn tree(&self) -> &'a Tree<T> {
        self.tree
    }
}

/// Children before parents.
pub struct PostOrderIter<'a, T: TreeItem> {
    tree: &'a Tree<T>,
    cur: Option<T::Key>,
}

impl<'a, T: TreeItem> Iterator for PostOrderIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let k = self.cur?;
        self.cur = self.tree.next_post_order(k);
        Some(&self.tree.nodes[&k].item)
    }
}

impl<'a, T: TreeItem> Cursor<'a, T> for PostOrderIter<'a, T> {
    fn at(tree: &'a Tree<T>, key: T::Key) -> Self {
        let cur = if tree.contains(key) { Some(key) } else { None };
        Self { tree, cur }
    }

    fn key(&self) -> Option<T::Key> {
        self.cur
    }

    fn tree(&self) -> &'a Tree<T> {
        self.tree
    }
}

/// One sibling chain.
pub struct SiblingIter<'a, T: TreeItem> {
    tree: &'a Tree<T>,
    cur: Option<T::Key>,
}

impl<'a, T: TreeItem> SiblingIter<'a, T> {
    /// A sibling cursor with no anchor, already exhausted.
    pub fn detached(tree: &'a Tree<T>) -> Self {
        Self { tree, cur: None }
    }
}

impl<'a, T: TreeItem> Iterator for SiblingIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let k = self.cur?;
        self.cur = self.tree.next_sibling_key(k);
        Some(&self.tree.nodes[&k].item)
    }
}

impl<'a, T: TreeItem> Cursor<'a, T> for SiblingIter<'a, T> {
    fn at(tree: &'a Tree<T>, key: T::Key) -> Self {
        let cur = if tree.contains(key) { Some(key) } else { None };
        Self { tree, cur }
    }

    fn key(&self) -> Option<T::Key> {
        self.cur
    }

    fn tree(&self) -> &'a Tree<T> {
        self.tree
    }
}

/// The backing map in unspecified order.
pub struct FastIter<'a, T: TreeItem> {
    tree: &'a Tree<T>,
    inner: hash_map::Values<'a, T::Key, Node<T>>,
    cur: Option<&'a Node<T>>,
}

impl<'a, T: TreeItem> Iterator for FastIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let n = self.cur?;
        self.cur = self.inner.next();
        Some(&n.item)
    }
}

impl<'a, T: TreeItem> Cursor<'a, T> for FastIter<'a, T> {
    /// Positioning is a scan: the map has no positional access, so this
    /// advances a fresh map iterator until it meets `key`. O(n) worst case.
    fn at(tree: &'a Tree<T>, key: T::Key) -> Self {
        let mut inner = tree.nodes.values();
        let cur = loop {
            match inner.next() {
                Some(n) if n.item.key() == key => break Some(n),
                Some(_) => continue,
                None => break None,
            }
        };
        Self { tree, inner, cur }
    }

    fn key(&self) -> Option<T::Key> {
        self.cur.map(|n| n.item.key())
    }

    fn tree(&self) -> &'a Tree<T> {
        self.tree
    }
}

/// Childless nodes in unspecified order.
pub struct LeafIter<'a, T: TreeItem> {
    tree: &'a Tree<T>,
    inner: hash_map::Values<'a, T::Key, Node<T>>,
    cur: Option<&'a Node<T>>,
}

impl<'a, T: TreeItem> LeafIter<'a, T> {
    /// next childless node of the underlying map iterator
    fn scan(&mut self) -> Option<&'a Node<T>> {
        loop {
            match self.inner.next() {
                Some(n) if n.first_child.is_none() => return Some(n),
                Some(_) => continue,
                None => return None,
            }
        }
    }
}

impl<'a, T: TreeItem> Iterator for LeafIter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let n = self.cur?;
        self.cur = self.scan();
        Some(&n.item)
    }
}

impl<'a, T: TreeItem> Cursor<'a, T> for LeafIter<'a, T> {
    /// Positions at `key` if it is a leaf, otherwise at the next leaf the
    /// scan meets after it.
    fn at(tree: &'a Tree<T>, key: T::Key) -> Self {
        let mut it = LeafIter {
            tree,
            inner: tree.nodes.values(),
            cur: None,
        };
        it.cur = loop {
            match it.inner.next() {
                Some(n) if n.item.key() == key => {
                    if n.first_child.is_none() {
                        break Some(n);
                    } else {
                        break LeafIter::scan(&mut it);
                    }
                }
                Some(_) => continue,
                None => break None,
            }
        };
        it
    }

    fn key(&self) -> Option<T::Key> {
        self.cur.map(|n| n.item.key())
    }

    fn tree(&self) -> &'a Tree<T> {
        self.tree
    }
}
