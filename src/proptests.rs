use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::{BTreeMap, HashSet};

/// Checks the invariants every tree built by `upsert` and `remove` keeps, and
/// returns the number of values found.
fn validate_tree<V>(t: &Tree<V>) -> usize {
    let mut seen = HashSet::new();
    let mut values = 0usize;
    for node in t.roots() {
        assert!(!node.key().is_empty(), "node with empty key");
        assert!(
            seen.insert(node.key()),
            "duplicate sibling key {:?}",
            node.key()
        );
        if let Some(children) = node.children() {
            assert!(
                !children.is_empty(),
                "empty children under {:?} should be None",
                node.key()
            );
            values += validate_tree(children);
        }
        assert!(
            node.value().is_some() || !node.is_leaf(),
            "valueless leaf {:?} should have been pruned",
            node.key()
        );
        values += usize::from(node.value().is_some());
    }
    assert_eq!(values, t.len(), "value count must match Tree::len");
    values
}

const SEGMENTS: &[&str] = &["a", "b", "c", "dd"];

fn path_strategy() -> impl Strategy<Value = Vec<String>> + Clone {
    // A tiny alphabet so that paths collide, nest, and share prefixes often.
    let segment = prop::sample::select(SEGMENTS).prop_map(String::from);
    prop::collection::vec(segment, 1..=4)
}

fn tree_strategy() -> impl Strategy<Value = Tree<u8>> {
    prop::collection::vec((path_strategy(), any::<u8>()), 0..=40).prop_map(|entries| {
        let mut t = Tree::new();
        for (path, v) in entries {
            t = t.upsert(&path, v).unwrap();
        }
        t
    })
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 5)]
    Upsert(#[proptest(strategy = "path_strategy()")] Vec<String>, u8),
    #[proptest(weight = 3)]
    Remove(#[proptest(strategy = "path_strategy()")] Vec<String>),
    #[proptest(weight = 2)]
    Get(#[proptest(strategy = "path_strategy()")] Vec<String>),
}

fn sorted_entries(t: &Tree<u8>) -> Vec<(Vec<String>, u8)> {
    let mut out: Vec<_> = t
        .iter()
        .map(|(p, v)| (p.iter().map(|s| s.to_string()).collect(), *v))
        .collect();
    out.sort();
    out
}

/// Walks `path` through both trees, asserting that every sibling off the path
/// is the same allocation in each.
fn assert_shared_off_path(before: &Tree<u8>, after: &Tree<u8>, path: &[String]) {
    let mut levels = Some((before.clone(), after.clone()));
    for segment in path {
        let Some((b, a)) = levels.take() else {
            return;
        };
        for node in b.roots() {
            let Some(counterpart) = a.find(node.key()) else {
                panic!("sibling {:?} disappeared", node.key());
            };
            if node.key() != segment.as_str() {
                assert!(Arc::ptr_eq(node, counterpart), "sibling {:?} copied", node.key());
            }
        }
        levels = match (b.find(segment), a.find(segment)) {
            (Some(bn), Some(an)) => match (bn.children(), an.children()) {
                (Some(bc), Some(ac)) => Some((bc.clone(), ac.clone())),
                _ => None,
            },
            _ => None,
        };
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 20_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=300)) {
        let mut t: Tree<u8> = Tree::new();
        let mut m: BTreeMap<Vec<String>, u8> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Upsert(path, v) => {
                    t = t.upsert(&path, v).unwrap();
                    m.insert(path, v);
                }
                Op::Remove(path) => {
                    t = t.remove(&path);
                    m.remove(&path);
                }
                Op::Get(path) => {
                    prop_assert_eq!(t.get(&path), m.get(&path));
                }
            }
        }

        prop_assert_eq!(validate_tree(&t), m.len());
        let expected: Vec<(Vec<String>, u8)> = m.into_iter().collect();
        prop_assert_eq!(sorted_entries(&t), expected);
    }

    #[test]
    fn prop_read_after_write(t in tree_strategy(), path in path_strategy(), v in any::<u8>()) {
        let t2 = t.upsert(&path, v).unwrap();
        prop_assert_eq!(t2.get(&path), Some(&v));
        validate_tree(&t2);
    }

    #[test]
    fn prop_idempotent(t in tree_strategy(), path in path_strategy(), v in any::<u8>()) {
        let once = t.upsert(&path, v).unwrap();
        let twice = once.upsert(&path, v).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_structural_sharing(t in tree_strategy(), path in path_strategy(), v in any::<u8>()) {
        let t2 = t.upsert(&path, v).unwrap();
        assert_shared_off_path(&t, &t2, &path);

        let t3 = t.remove(&path);
        assert_shared_off_path(&t3, &t, &path);
    }

    #[test]
    fn prop_disjoint_order_independent(
        t in tree_strategy(),
        p1 in path_strategy(),
        p2 in path_strategy(),
        v1 in any::<u8>(),
        v2 in any::<u8>()
    ) {
        prop_assume!(!p1.starts_with(&p2) && !p2.starts_with(&p1));
        let a = t.upsert(&p1, v1).unwrap().upsert(&p2, v2).unwrap();
        let b = t.upsert(&p2, v2).unwrap().upsert(&p1, v1).unwrap();
        prop_assert_eq!(a.get(&p1), Some(&v1));
        prop_assert_eq!(a.get(&p2), Some(&v2));
        prop_assert_eq!(sorted_entries(&a), sorted_entries(&b));
    }

    #[test]
    fn prop_remove_fresh_path_restores(
        t in tree_strategy(),
        path in path_strategy(),
        v in any::<u8>()
    ) {
        prop_assume!(t.get_node(&path).is_none());
        let t2 = t.upsert(&path, v).unwrap().remove(&path);
        prop_assert_eq!(t2, t);
    }

    #[test]
    fn prop_remove_branch_keeps_descendants(
        t in tree_strategy(),
        path in path_strategy(),
        below in path_strategy(),
        v in any::<u8>(),
        w in any::<u8>()
    ) {
        let deep: Vec<String> = path.iter().chain(below.iter()).cloned().collect();
        let t = t.upsert(&path, v).unwrap().upsert(&deep, w).unwrap();
        let t = t.remove(&path);
        prop_assert_eq!(t.get(&path), None);
        prop_assert_eq!(t.get(&deep), Some(&w));
        validate_tree(&t);
    }

    #[test]
    fn prop_remove_missing_shares_everything(t in tree_strategy(), path in path_strategy()) {
        prop_assume!(!t.contains(&path));
        let t2 = t.remove(&path);
        prop_assert!(Arc::ptr_eq(&t.nodes, &t2.nodes));
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

fn small_set() -> Vec<Path> {
    ["a", "a:b", "a:c", "b", "b:x:y", "c"]
        .iter()
        .map(|p| Path::parse(p).unwrap())
        .collect()
}

#[test]
fn exhaustive_insert_order_small_set() {
    let paths = small_set();

    for_each_permutation(&paths, |perm| {
        let mut t: Tree<u8> = Tree::new();
        let mut m: BTreeMap<Vec<String>, u8> = BTreeMap::new();

        for p in perm {
            let v = p.len() as u8;
            t = t.upsert(&p, v).unwrap();
            m.insert(p.iter().map(|s| s.to_string()).collect(), v);
        }

        validate_tree(&t);
        let expected: Vec<(Vec<String>, u8)> = m.into_iter().collect();
        assert_eq!(sorted_entries(&t), expected);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let paths = small_set();

    // Insert in a fixed order, then remove in all permutations.
    let base = Tree::from_entries(paths.iter().cloned().map(|p| (p, 1u8)));
    assert_eq!(validate_tree(&base), paths.len());

    for_each_permutation(&paths, |perm| {
        let mut t = base.clone();
        let mut remaining = paths.len();

        for p in perm {
            t = t.remove(&p);
            remaining -= 1;
            assert_eq!(validate_tree(&t), remaining);
            assert!(!t.contains(&p));
        }
        assert!(t.is_empty());
        assert_eq!(base.len(), paths.len());
    });
}
