//! An ordered key-value map backed by an AVL tree.

// Conventions used in comments:
// - The balance factor of a node `x`, written `b(x)`, is the height of `x`'s
//   right subtree minus the height of its left subtree.
// - A node is left-heavy if `b(x) < 0` and right-heavy if `b(x) > 0`.
//
// The fundamental invariants of an AVL tree are:
// 1. `b(x)` is in `{-1, 0, 1}` for every node `x`.
// 2. An in-order traversal visits keys in strictly increasing order.
//
// Inside a rebalancing pass `b(x)` may transiently reach -2 or 2; such a value
// is a signal that a rotation is required at `x`, and the pass resolves it
// before returning. No node ever rests at |b(x)| == 2 between operations.

mod debug;
mod depth;
mod error;

#[cfg(any(test, feature = "model"))]
pub mod model;

#[cfg(test)]
mod tests;

use core::{cmp::Ordering, mem, ops::Not, ptr::NonNull};
use std::borrow::Borrow;

pub use crate::error::Error;

type Link<K, V> = Option<NonNull<Node<K, V>>>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Dir {
    Left = 0,
    Right = 1,
}

impl Dir {
    /// The contribution of a child on this side to its parent's balance
    /// factor: -1 for a left child, +1 for a right child.
    fn sign(self) -> i8 {
        match self {
            Dir::Left => -1,
            Dir::Right => 1,
        }
    }
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

struct Node<K, V> {
    parent: Link<K, V>,
    children: [Link<K, V>; 2],
    balance: i8,
    key: K,
    value: V,
}

impl<K, V> Node<K, V> {
    /// Allocates a node with balance factor 0 and no children.
    fn alloc(key: K, value: V, parent: Link<K, V>) -> NonNull<Node<K, V>> {
        NonNull::from(Box::leak(Box::new(Node {
            parent,
            children: [None; 2],
            balance: 0,
            key,
            value,
        })))
    }

    #[inline]
    fn is_leaf(&self) -> bool {
        self.left().is_none() && self.right().is_none()
    }

    #[inline]
    fn parent(&self) -> Link<K, V> {
        self.parent
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<K, V> {
        self.children[dir as usize]
    }

    #[inline]
    fn left(&self) -> Link<K, V> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<K, V> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<K, V>) -> Link<K, V> {
        mem::replace(&mut self.parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<K, V>) -> Link<K, V> {
        mem::replace(&mut self.children[dir as usize], child)
    }
}

/// An ordered map with guaranteed _O(log n)_ insertion, removal and lookup,
/// implemented as an AVL tree.
///
/// Keys are unique; inserting a key that is already present overwrites its
/// value in place without restructuring the tree.
pub struct AvlMap<K: Ord, V> {
    root: Link<K, V>,
    len: usize,
}

// The map exclusively owns its nodes; parent links never outlive the tree
// they point into.
unsafe impl<K: Ord + Send, V: Send> Send for AvlMap<K, V> {}
unsafe impl<K: Ord + Sync, V: Sync> Sync for AvlMap<K, V> {}

impl<K: Ord, V> AvlMap<K, V> {
    /// Returns a new empty map.
    pub const fn new() -> AvlMap<K, V> {
        AvlMap { root: None, len: 0 }
    }

    /// Returns the number of elements in the map.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns `true` if the map contains a value associated with `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get_raw(key).is_some()
    }

    /// Returns a reference to the value associated with `key`.
    ///
    /// This operation completes in _O(log n)_ time.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        unsafe { Some(&(*node.as_ptr()).value) }
    }

    /// Returns a mutable reference to the value associated with `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        unsafe { Some(&mut (*node.as_ptr()).value) }
    }

    /// Returns a reference to the value associated with `key`, or
    /// [`Error::KeyNotFound`] if `key` is not present.
    ///
    /// Unlike [`get`][AvlMap::get], absence is reported as a distinguished
    /// error rather than folded into an `Option`.
    pub fn try_get<Q>(&self, key: &Q) -> Result<&V, Error>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    fn get_raw<Q>(&self, key: &Q) -> Link<K, V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut opt_cur = self.root;

        loop {
            let cur = opt_cur?;

            unsafe {
                match key.cmp((*cur.as_ptr()).key.borrow()) {
                    Ordering::Less => opt_cur = (*cur.as_ptr()).left(),
                    Ordering::Equal => return Some(cur),
                    Ordering::Greater => opt_cur = (*cur.as_ptr()).right(),
                }
            }
        }
    }

    /// Returns the minimum key and its value.
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        let root = self.root?;
        unsafe {
            let (min, _) = self.min_in_subtree(root);
            let node = &*min.as_ptr();
            Some((&node.key, &node.value))
        }
    }

    /// Returns the maximum key and its value.
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        let root = self.root?;
        unsafe {
            let max = self.max_in_subtree(root);
            let node = &*max.as_ptr();
            Some((&node.key, &node.value))
        }
    }

    /// Removes and returns the minimum key and its value.
    pub fn pop_first(&mut self) -> Option<(K, V)> {
        let root = self.root?;
        unsafe {
            let (min, _) = self.min_in_subtree(root);
            Some(self.remove_at(min))
        }
    }

    /// Removes and returns the maximum key and its value.
    pub fn pop_last(&mut self) -> Option<(K, V)> {
        let root = self.root?;
        unsafe {
            let max = self.max_in_subtree(root);
            Some(self.remove_at(max))
        }
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If `key` is already present, its value is overwritten in place and the
    /// previous value is returned; the shape of the tree and every balance
    /// factor are left untouched. Otherwise a new node is attached at the
    /// search position and the tree is rebalanced bottom-up.
    ///
    /// This operation completes in _O(log n)_ time.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let Some(root) = self.root else {
            self.root = Some(Node::alloc(key, value, None));
            self.len = 1;
            return None;
        };

        let mut cur = root;

        // Descend the tree, looking for the insertion point.
        loop {
            let dir = unsafe {
                match key.cmp(&(*cur.as_ptr()).key) {
                    Ordering::Less => Dir::Left,
                    Ordering::Greater => Dir::Right,
                    Ordering::Equal => {
                        return Some(mem::replace(&mut (*cur.as_ptr()).value, value));
                    }
                }
            };

            match unsafe { (*cur.as_ptr()).child(dir) } {
                // Descend.
                Some(child) => cur = child,

                // Attach the new node and rebalance.
                None => {
                    let node = Node::alloc(key, value, Some(cur));

                    unsafe {
                        (*cur.as_ptr()).set_child(dir, Some(node));
                        self.rebalance_inserted(node);
                    }

                    self.len += 1;
                    return None;
                }
            }
        }
    }

    // Performs a bottom-up rebalance of the tree after the attachment of
    // `node`, which has balance factor 0 and no children.
    //
    // Climbing from the new node, each ancestor's balance factor absorbs the
    // height growth of the subtree below it:
    // - If the ancestor settles at 0, the growth was absorbed; stop.
    // - If it settles at ±1, its subtree grew by one; climb one level.
    // - If it reaches ±2, a single rebalance restores the invariant for the
    //   whole tree; stop.
    unsafe fn rebalance_inserted(&mut self, node: NonNull<Node<K, V>>) {
        let mut node = node;

        unsafe {
            while let Some(parent) = (*node.as_ptr()).parent() {
                let dir = self.which_child(parent, node);
                let balance = (*parent.as_ptr()).balance + dir.sign();

                match balance {
                    0 => {
                        (*parent.as_ptr()).balance = 0;
                        return;
                    }

                    -1 | 1 => {
                        (*parent.as_ptr()).balance = balance;
                        node = parent;
                    }

                    _ => {
                        let heavy = if balance < 0 { Dir::Left } else { Dir::Right };
                        self.rebalance_heavy(parent, heavy);
                        return;
                    }
                }
            }
        }
    }

    /// Removes `key` from the map, returning its value.
    ///
    /// Removing a key that is not present is a no-op and returns `None`.
    ///
    /// This operation completes in _O(log n)_ time.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let node = self.get_raw(key)?;
        let (_, value) = unsafe { self.remove_at(node) };
        Some(value)
    }

    // Unlinks and deallocates `node`, returning its entry.
    //
    // A node with two children first has its contents swapped with its
    // in-order predecessor, which has no right child; the removal then
    // uniformly splices a node with at most one child out of its parent slot.
    unsafe fn remove_at(&mut self, node: NonNull<Node<K, V>>) -> (K, V) {
        let mut doomed = node;

        unsafe {
            if let (Some(left), Some(_)) = ((*doomed.as_ptr()).left(), (*doomed.as_ptr()).right()) {
                let pred = self.max_in_subtree(left);
                self.swap_entries(doomed, pred);
                doomed = pred;
            }

            let parent = (*doomed.as_ptr()).parent();
            let child = (*doomed.as_ptr()).left().or((*doomed.as_ptr()).right());

            self.maybe_set_parent(child, parent);

            // `diff` records which side of the parent got shorter: +1 if the
            // spliced node was a left child, -1 if a right child.
            let mut diff = 0;
            match parent {
                None => self.root = child,
                Some(parent) => match self.which_child(parent, doomed) {
                    Dir::Left => {
                        (*parent.as_ptr()).set_child(Dir::Left, child);
                        diff = 1;
                    }
                    Dir::Right => {
                        (*parent.as_ptr()).set_child(Dir::Right, child);
                        diff = -1;
                    }
                },
            }

            let boxed = Box::from_raw(doomed.as_ptr());
            self.len -= 1;

            if let Some(parent) = parent {
                self.rebalance_removed(parent, diff);
            }

            (boxed.key, boxed.value)
        }
    }

    // Performs a bottom-up rebalance of the tree after a removal.
    //
    // `diff` is the balance adjustment for `node`: +1 if its left subtree got
    // shorter, -1 if its right subtree did.
    //
    // Unlike insertion, a rotation during this pass does not always restore
    // the height of the rebalanced subtree, so the pass may have to continue
    // past a rotation. The one exception is the single-rotation case whose
    // rotated-up child was perfectly balanced: that rotation leaves the
    // subtree height unchanged and the pass stops there.
    unsafe fn rebalance_removed(&mut self, node: NonNull<Node<K, V>>, diff: i8) {
        let mut node = node;
        let mut diff = diff;

        unsafe {
            loop {
                let balance = (*node.as_ptr()).balance + diff;

                match balance {
                    // The subtree height is unchanged from the parent's
                    // perspective.
                    -1 | 1 => {
                        (*node.as_ptr()).balance = balance;
                        return;
                    }

                    // The subtree height shrank by one; climb.
                    0 => {
                        (*node.as_ptr()).balance = 0;

                        let Some(parent) = (*node.as_ptr()).parent() else {
                            return;
                        };

                        diff = match self.which_child(parent, node) {
                            Dir::Left => 1,
                            Dir::Right => -1,
                        };
                        node = parent;
                    }

                    _ => {
                        let heavy = if balance < 0 { Dir::Left } else { Dir::Right };

                        if !self.rebalance_heavy(node, heavy) {
                            return;
                        }

                        // The rotated-up node now roots the rebalanced
                        // subtree, which is one shorter; climb past it.
                        let Some(sub) = (*node.as_ptr()).parent() else {
                            return;
                        };
                        let Some(parent) = (*sub.as_ptr()).parent() else {
                            return;
                        };

                        diff = match self.which_child(parent, sub) {
                            Dir::Left => 1,
                            Dir::Right => -1,
                        };
                        node = parent;
                    }
                }
            }
        }
    }

    // Restores the AVL invariant at `node`, whose balance factor has just
    // reached ±2 leaning toward `heavy`.
    //
    // Returns `true` if the rebalanced subtree ends up one shorter than
    // before the operation that unbalanced it, in which case a removal pass
    // must keep propagating; after an insertion the subtree always regains
    // its pre-insertion height and the return value is irrelevant.
    //
    // The balance factors of the nodes taking part in a rotation are set
    // explicitly from the case analysis below; the rotations themselves never
    // touch them.
    unsafe fn rebalance_heavy(&mut self, node: NonNull<Node<K, V>>, heavy: Dir) -> bool {
        let s = heavy.sign();

        unsafe {
            let Some(child) = (*node.as_ptr()).child(heavy) else {
                // A ±2 node always has a child on its heavy side; bail rather
                // than rotate a hole into the tree.
                return false;
            };

            let child_balance = (*child.as_ptr()).balance;

            if child_balance == -s {
                // Zig-zag: the heavy child leans opposite to `heavy`. Rotate
                // the child outward, then the node inward; the grandchild
                // ends up rooting the subtree, and its old lean decides which
                // of the two descended nodes comes up one short.
                let grand = (*child.as_ptr()).child(!heavy);
                let grand_balance = grand.map(|g| (*g.as_ptr()).balance).unwrap_or(0);

                self.rotate_at(child, heavy);
                self.rotate_at(node, !heavy);

                (*node.as_ptr()).balance = if grand_balance == s { -s } else { 0 };
                (*child.as_ptr()).balance = if grand_balance == -s { s } else { 0 };
                if let Some(grand) = grand {
                    (*grand.as_ptr()).balance = 0;
                }

                true
            } else {
                // Single rotation: the heavy child leans the same way as
                // `heavy`, or not at all.
                self.rotate_at(node, !heavy);

                if child_balance == 0 {
                    // Only reachable during a removal pass. The rotation
                    // shifted weight but left the subtree exactly as tall as
                    // it was before the removal, so propagation stops here.
                    (*node.as_ptr()).balance = s;
                    (*child.as_ptr()).balance = -s;
                    false
                } else {
                    (*node.as_ptr()).balance = 0;
                    (*child.as_ptr()).balance = 0;
                    true
                }
            }
        }
    }

    // Rotates the subtree rooted at `node` in direction `dir`: the child on
    // the side opposite `dir` comes up into `node`'s slot, `node` becomes
    // that child's `dir`-side child, and the displaced grandchild subtree
    // crosses over to `node`.
    //
    // No-op if `node` has no child on the rotated-up side. Balance factors
    // are not updated; callers set them explicitly.
    unsafe fn rotate_at(&mut self, node: NonNull<Node<K, V>>, dir: Dir) {
        unsafe {
            let Some(up) = (*node.as_ptr()).child(!dir) else {
                return;
            };

            let across = (*up.as_ptr()).child(dir);
            (*node.as_ptr()).set_child(!dir, across);
            self.maybe_set_parent(across, Some(node));

            (*up.as_ptr()).set_child(dir, Some(node));
            let parent = (*node.as_ptr()).set_parent(Some(up));
            (*up.as_ptr()).set_parent(parent);

            self.replace_child_or_set_root(parent, node, Some(up));
        }
    }

    // Exchanges the key and value of two node slots.
    //
    // Parent and child links stay put, and each slot keeps the balance
    // factor describing its own unchanged subtree shape, so no node's
    // structural position or balance is disturbed.
    unsafe fn swap_entries(&mut self, a: NonNull<Node<K, V>>, b: NonNull<Node<K, V>>) {
        debug_assert_ne!(a, b);

        unsafe {
            let a = &mut *a.as_ptr();
            let b = &mut *b.as_ptr();
            mem::swap(&mut a.key, &mut b.key);
            mem::swap(&mut a.value, &mut b.value);
        }
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum
    // node's parent.
    #[inline]
    unsafe fn min_in_subtree(
        &self,
        root: NonNull<Node<K, V>>,
    ) -> (NonNull<Node<K, V>>, Link<K, V>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { (*cur.as_ptr()).left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    // Returns the maximum node in the subtree. Applied to a left subtree,
    // this is the in-order predecessor of the subtree's parent.
    #[inline]
    unsafe fn max_in_subtree(&self, root: NonNull<Node<K, V>>) -> NonNull<Node<K, V>> {
        let mut cur = root;

        while let Some(right) = unsafe { (*cur.as_ptr()).right() } {
            cur = right;
        }

        cur
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<K, V>, parent: Link<K, V>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe {
            (*node.as_ptr()).set_parent(parent);
        }
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<K, V>,
        old_child: NonNull<Node<K, V>>,
        new_child: Link<K, V>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with
    // `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<Node<K, V>>,
        old_child: NonNull<Node<K, V>>,
        new_child: Link<K, V>,
    ) {
        unsafe {
            let parent = &mut *parent.as_ptr();

            if parent.left() == Some(old_child) {
                parent.set_child(Dir::Left, new_child);
            } else {
                debug_assert_eq!(parent.right(), Some(old_child));
                parent.set_child(Dir::Right, new_child);
            }
        }
    }

    unsafe fn which_child(&self, parent: NonNull<Node<K, V>>, child: NonNull<Node<K, V>>) -> Dir {
        if unsafe { (*parent.as_ptr()).left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }

    /// Clears the map, removing all elements.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| (*cur.as_ptr()).parent());

                let right = (*cur.as_ptr()).right();

                // Elevate the node's right child (which may be None).
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                drop(Box::from_raw(cur.as_ptr()));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the
                // node had no parent, the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        if let Some(root) = self.root {
            unsafe {
                assert!((*root.as_ptr()).parent().is_none());
                self.assert_invariants_at(root);
            }
        }
    }

    // Checks key ordering, parent back-links and balance factors below
    // `node`. Returns the height of the subtree, counting a leaf as 1.
    unsafe fn assert_invariants_at(&self, node: NonNull<Node<K, V>>) -> usize {
        unsafe {
            let node_ref = &*node.as_ptr();
            let mut heights = [0usize; 2];

            for dir in [Dir::Left, Dir::Right] {
                if let Some(child) = node_ref.child(dir) {
                    let child_ref = &*child.as_ptr();

                    // Ensure the child's parent link points to this node.
                    assert_eq!(child_ref.parent(), Some(node));

                    // Ensure in-order key ordering.
                    match dir {
                        Dir::Left => assert!(child_ref.key < node_ref.key),
                        Dir::Right => assert!(child_ref.key > node_ref.key),
                    }

                    heights[dir as usize] = self.assert_invariants_at(child);
                }
            }

            // Ensure the stored balance factor matches the actual height
            // difference and is within the AVL bound.
            let balance = heights[Dir::Right as usize] as i64 - heights[Dir::Left as usize] as i64;
            assert_eq!(i64::from(node_ref.balance), balance);
            assert!(balance.abs() <= 1);

            1 + heights[0].max(heights[1])
        }
    }
}

impl<K: Ord, V> Default for AvlMap<K, V> {
    fn default() -> Self {
        AvlMap::new()
    }
}

impl<K: Ord, V> Drop for AvlMap<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}
