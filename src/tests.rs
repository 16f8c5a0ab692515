use std::ops::Range;

use proptest::prelude::*;

use crate::model;

use super::*;

fn height(map: &AvlMap<u32, u32>) -> usize {
    map.root
        .map(|root| unsafe { map.assert_invariants_at(root) })
        .unwrap_or(0)
}

fn key_and_balance(link: Link<u32, u32>) -> Option<(u32, i8)> {
    link.map(|node| unsafe {
        let node = node.as_ref();
        (node.key, node.balance)
    })
}

fn insert_find_all(keys: &[u32]) {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for &key in keys {
        map.insert(key, key.wrapping_mul(10));
        map.assert_invariants();
    }

    assert_eq!(map.len(), keys.len());

    for &key in keys {
        assert_eq!(map.get(&key), Some(&key.wrapping_mul(10)));
    }
}

fn insert_remove_all(keys: &[u32]) {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for &key in keys {
        map.insert(key, key);
        map.assert_invariants();
    }

    for &key in keys {
        assert_eq!(map.remove(&key), Some(key));
        map.assert_invariants();
    }

    assert!(map.is_empty());
    assert!(map.root.is_none());

    for &key in keys {
        map.insert(key, key);
        map.assert_invariants();
    }

    for key in keys.iter().rev() {
        assert_eq!(map.remove(key), Some(*key));
        map.assert_invariants();
    }

    assert!(map.is_empty());
    assert!(map.root.is_none());
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn all_permutations_find() {
    let mut keys = [0, 1, 2, 3, 4];
    permute(&mut keys, 5, &mut insert_find_all);
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

#[test]
fn all_permutations_remove() {
    let mut keys = [0, 1, 2, 3, 4];
    permute(&mut keys, 5, &mut insert_remove_all);

    let mut keys = [0, 1, 2, 3, 4, 5];
    permute(&mut keys, 6, &mut insert_remove_all);
}

// Heap's algorithm; calls `f` with each permutation of the first `n` keys.
fn permute(keys: &mut [u32], n: usize, f: &mut impl FnMut(&[u32])) {
    if n <= 1 {
        f(keys);
        return;
    }

    for i in 0..n {
        permute(keys, n - 1, f);
        if n % 2 == 0 {
            keys.swap(i, n - 1);
        } else {
            keys.swap(0, n - 1);
        }
    }
}

#[test]
fn ascending_inserts_trigger_single_rotation() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in [1, 2, 3] {
        map.insert(key, key);
    }

    // Inserting 3 unbalances the root (1), and one left rotation at the root
    // yields a perfectly balanced tree.
    map.assert_invariants();
    assert_eq!(key_and_balance(map.root), Some((2, 0)));

    let root = map.root.unwrap();
    unsafe {
        assert_eq!(key_and_balance((*root.as_ptr()).left()), Some((1, 0)));
        assert_eq!(key_and_balance((*root.as_ptr()).right()), Some((3, 0)));
    }
}

#[test]
fn descending_inserts_trigger_single_rotation() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in [3, 2, 1] {
        map.insert(key, key);
    }

    map.assert_invariants();
    assert_eq!(key_and_balance(map.root), Some((2, 0)));
}

#[test]
fn zig_zag_inserts_trigger_double_rotation() {
    // 2 is the zig-zag grandchild in both directions.
    for keys in [[3, 1, 2], [1, 3, 2]] {
        let mut map: AvlMap<u32, u32> = AvlMap::new();

        for key in keys {
            map.insert(key, key);
        }

        map.assert_invariants();
        assert_eq!(key_and_balance(map.root), Some((2, 0)));
    }
}

#[test]
fn five_ascending_inserts() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in 1..=5 {
        map.insert(key, key);
    }

    assert_eq!(map.len(), 5);
    assert_eq!(height(&map), 3);
    assert_eq!(key_and_balance(map.root), Some((2, 1)));
}

#[test]
fn removal_rotation_may_stop_propagation() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in [2, 1, 4, 3, 5] {
        map.insert(key, key);
    }

    // Removing 1 makes the root (2) right-heavy by two; its right child (4)
    // is perfectly balanced, so the single rotation leaves the subtree height
    // unchanged and the fix-up must stop at the rotation.
    assert_eq!(map.remove(&1), Some(1));

    map.assert_invariants();
    assert_eq!(key_and_balance(map.root), Some((4, -1)));
    assert_eq!(height(&map), 3);
}

#[test]
fn overwrite_leaves_shape_and_balances_untouched() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    for key in 1..=5 {
        map.insert(key, key);
    }

    let mut before = String::new();
    map.dotgraph("overwrite", &mut before).unwrap();

    assert_eq!(map.insert(3, 99), Some(3));
    assert_eq!(map.get(&3), Some(&99));
    assert_eq!(map.len(), 5);
    map.assert_invariants();

    // The dot rendering captures both the shape and every balance factor.
    let mut after = String::new();
    map.dotgraph("overwrite", &mut after).unwrap();
    assert_eq!(before, after);
}

#[test]
fn height_stays_within_avl_bound() {
    for order in [false, true] {
        let mut map: AvlMap<u32, u32> = AvlMap::new();

        for n in 0..200u32 {
            let key = if order { n } else { 199 - n };
            map.insert(key, key);

            let len = map.len() as f64;
            let bound = 1.44 * (len + 2.0).log2();
            assert!((height(&map) as f64) <= bound);
        }
    }
}

#[test]
fn remove_absent_key_is_a_noop() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    assert_eq!(map.remove(&7), None);

    for key in [2, 1, 3] {
        map.insert(key, key);
    }

    assert_eq!(map.remove(&7), None);
    assert_eq!(map.len(), 3);
    map.assert_invariants();
}

#[test]
fn try_get_reports_absence() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();
    map.insert(1, 10);

    assert_eq!(map.try_get(&1), Ok(&10));
    assert_eq!(map.try_get(&2), Err(Error::KeyNotFound));
}

#[test]
fn get_mut_updates_value() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();
    map.insert(1, 10);

    *map.get_mut(&1).unwrap() += 1;

    assert_eq!(map.get(&1), Some(&11));
    assert_eq!(map.get_mut(&2), None);
}

#[test]
fn first_and_last() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    assert_eq!(map.first_key_value(), None);
    assert_eq!(map.last_key_value(), None);
    assert_eq!(map.pop_first(), None);
    assert_eq!(map.pop_last(), None);

    for key in [5, 2, 8, 1, 9] {
        map.insert(key, key * 10);
    }

    assert_eq!(map.first_key_value(), Some((&1, &10)));
    assert_eq!(map.last_key_value(), Some((&9, &90)));

    assert_eq!(map.pop_first(), Some((1, 10)));
    assert_eq!(map.pop_last(), Some((9, 90)));
    map.assert_invariants();
    assert_eq!(map.len(), 3);
}

#[test]
fn round_trip_to_empty() {
    let keys: Vec<u32> = (0..32).collect();

    // Ascending, descending, and inside-out removal orders.
    let mut orders: Vec<Vec<u32>> = vec![keys.clone(), keys.iter().rev().copied().collect()];
    let inside_out: Vec<u32> = (0..16).flat_map(|i| [15 - i, 16 + i]).collect();
    orders.push(inside_out);

    for order in orders {
        let mut map: AvlMap<u32, u32> = AvlMap::new();

        for &key in &keys {
            map.insert(key, key);
        }

        for &key in &order {
            assert_eq!(map.remove(&key), Some(key));
            map.assert_invariants();
        }

        assert!(map.is_empty());
        assert!(map.root.is_none());
    }
}

#[test]
fn clear_empties_the_map() {
    let mut map: AvlMap<u32, u32> = AvlMap::default();

    for key in 0..100 {
        map.insert(key, key);
    }

    map.clear();
    assert!(map.is_empty());
    assert_eq!(map.get(&50), None);

    // The map remains usable afterward.
    map.insert(1, 1);
    assert_eq!(map.len(), 1);
    map.assert_invariants();
}

#[test]
fn equal_depth_trivial_cases() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();
    assert!(map.leaves_at_equal_depth());

    map.insert(1, 1);
    assert!(map.leaves_at_equal_depth());
}

#[test]
fn equal_depth_agreeing_leaves() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    // Root 4 over {2: {1, 3}, 6: {5}}: leaves 1, 3 and 5 all at depth 2.
    for key in [4, 2, 6, 1, 3, 5] {
        map.insert(key, key);
    }

    map.assert_invariants();
    assert!(map.leaves_at_equal_depth());
}

#[test]
fn equal_depth_disagreeing_leaves() {
    let mut map: AvlMap<u32, u32> = AvlMap::new();

    // Root 2 over {1, 3: {4}}: leaf 1 at depth 1, leaf 4 at depth 2.
    for key in [2, 1, 3, 4] {
        map.insert(key, key);
    }

    map.assert_invariants();
    assert!(!map.leaves_at_equal_depth());
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }
}
