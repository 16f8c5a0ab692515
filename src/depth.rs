use core::ptr::NonNull;

use crate::{AvlMap, Node};

impl<K: Ord, V> AvlMap<K, V> {
    /// Returns `true` if every leaf of the tree lies at the same depth.
    ///
    /// An empty map, or a map with a single entry, trivially satisfies this.
    /// The check short-circuits on the first leaf whose depth disagrees with
    /// the first leaf encountered.
    pub fn leaves_at_equal_depth(&self) -> bool {
        let Some(root) = self.root else {
            return true;
        };

        // The expected depth is unset until the first leaf fixes it.
        let mut expected = None;
        unsafe { equal_depth_at(root, 0, &mut expected) }
    }
}

unsafe fn equal_depth_at<K, V>(
    node: NonNull<Node<K, V>>,
    depth: usize,
    expected: &mut Option<usize>,
) -> bool {
    let node = unsafe { node.as_ref() };

    if node.is_leaf() {
        return match *expected {
            Some(expected) => depth == expected,
            None => {
                *expected = Some(depth);
                true
            }
        };
    }

    // Both subtrees of an internal node must individually agree.
    for child in [node.left(), node.right()].into_iter().flatten() {
        if !unsafe { equal_depth_at(child, depth + 1, expected) } {
            return false;
        }
    }

    true
}
