use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::RadixTree;

/// Simple model implementation using BTreeMap for comparison
#[derive(Default, Clone)]
struct Model {
    map: BTreeMap<Vec<u8>, u64>,
}

impl Model {
    fn insert(&mut self, key: Vec<u8>, value: u64) -> Option<u64> {
        self.map.insert(key, value)
    }

    fn get(&self, key: &[u8]) -> Option<&u64> {
        self.map.get(key)
    }

    fn delete(&mut self, key: &[u8]) -> Option<u64> {
        self.map.remove(key)
    }

    fn delete_prefix(&mut self, prefix: &[u8]) -> usize {
        let before = self.map.len();
        self.map.retain(|k, _| !k.starts_with(prefix));
        before - self.map.len()
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Actions to test against both implementations
#[derive(Arbitrary, Debug, Clone)]
enum Action {
    Insert(KeyValue),
    Get(Key),
    Delete(Key),
    DeletePrefix(Prefix),
}

/// Wrapper for key generation with custom strategy
#[derive(Debug, Clone)]
struct Key(Vec<u8>);

/// Wrapper for key-value pair
#[derive(Debug, Clone)]
struct KeyValue {
    key: Key,
    value: u64,
}

/// Short, non-empty prefixes that actually hit the delimiter-structured keys
#[derive(Debug, Clone)]
struct Prefix(Vec<u8>);

impl Arbitrary for Key {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            // Empty key
            Just(Key(vec![])),
            // Short keys (1-4 bytes)
            prop::collection::vec(any::<u8>(), 1..4).prop_map(Key),
            // Medium keys (4-32 bytes)
            prop::collection::vec(any::<u8>(), 4..32).prop_map(Key),
            // Keys with natural delimiters to exercise edge splitting
            "[a-c]{1,4}/[a-c]{1,4}".prop_map(|s| Key(s.into_bytes())),
            "[a-c]{1,4}:[a-c]{1,4}".prop_map(|s| Key(s.into_bytes())),
            // Keys with shared prefixes
            "[a-c]{1,6}".prop_map(|prefix| {
                let mut key = prefix.into_bytes();
                key.extend_from_slice(b"/suffix");
                Key(key)
            }),
        ]
        .boxed()
    }
}

impl Arbitrary for KeyValue {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<Key>(), any::<u64>())
            .prop_map(|(key, value)| KeyValue { key, value })
            .boxed()
    }
}

impl Arbitrary for Prefix {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        "[a-c/]{1,4}".prop_map(|s| Prefix(s.into_bytes())).boxed()
    }
}

/// Test harness that executes actions on both RadixTree and Model
#[derive(Default)]
struct Test {
    tree: RadixTree<u64>,
    model: Model,
}

impl Test {
    fn execute(&mut self, action: Action) {
        match action {
            Action::Insert(kv) => {
                let key = kv.key.0;
                let (tree, tree_result) = self.tree.insert(&key, kv.value);
                self.tree = tree;
                let model_result = self.model.insert(key.clone(), kv.value);
                assert_eq!(
                    tree_result, model_result,
                    "Insert mismatch: key={:?}, tree_result={:?}, model_result={:?}",
                    key, tree_result, model_result
                );
            }
            Action::Get(key) => {
                let tree_result = self.tree.get(&key.0);
                let model_result = self.model.get(&key.0);
                assert_eq!(
                    tree_result, model_result,
                    "Get mismatch: key={:?}, tree_result={:?}, model_result={:?}",
                    key.0, tree_result, model_result
                );
            }
            Action::Delete(key) => {
                let (tree, tree_result) = self.tree.delete(&key.0);
                self.tree = tree;
                let model_result = self.model.delete(&key.0);
                assert_eq!(
                    tree_result, model_result,
                    "Delete mismatch: key={:?}, tree_result={:?}, model_result={:?}",
                    key.0, tree_result, model_result
                );
            }
            Action::DeletePrefix(prefix) => {
                let (tree, matched) = self.tree.delete_prefix(&prefix.0);
                self.tree = tree;
                let removed = self.model.delete_prefix(&prefix.0);
                // A non-empty prefix matches a subtree exactly when it
                // removes at least one key.
                assert_eq!(
                    matched,
                    removed > 0,
                    "DeletePrefix mismatch: prefix={:?}, matched={}, removed={}",
                    prefix.0,
                    matched,
                    removed
                );
            }
        }
        // Always verify len matches
        assert_eq!(
            self.tree.len(),
            self.model.len(),
            "Length mismatch after action: tree={}, model={}",
            self.tree.len(),
            self.model.len()
        );
        assert_eq!(
            self.tree.is_empty(),
            self.model.is_empty(),
            "is_empty mismatch: tree={}, model={}",
            self.tree.is_empty(),
            self.model.is_empty()
        );
    }
}

/// Alphabet for seek keys: small enough to collide with stored keys, with a
/// delimiter to exercise mid-edge comparisons.
fn seek_key() -> impl Strategy<Value = Vec<u8>> {
    "[a-c/0-9]{0,6}".prop_map(String::into_bytes)
}

fn key_set() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec("[a-c/0-9]{1,6}".prop_map(String::into_bytes), 0..48)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn proptest_vs_btreemap(actions in prop::collection::vec(any::<Action>(), 1..64)) {
        let mut test = Test::default();
        for action in actions {
            test.execute(action);
        }

        // Iteration agrees with the model in content and order.
        let got: Vec<(Vec<u8>, u64)> = test.tree.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
        let want: Vec<(Vec<u8>, u64)> = test.model.map.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(got, want);
    }

    #[test]
    fn proptest_lower_bound_scan(keys in key_set(), seek in seek_key()) {
        let mut txn = RadixTree::new().txn();
        let mut model: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
        for (i, k) in keys.iter().enumerate() {
            txn.insert(k, i as u64);
            model.insert(k.clone(), i as u64);
        }
        let (tree, _) = txn.commit();

        let mut iter = tree.iter();
        iter.seek_lower_bound(&seek);
        let got: Vec<Vec<u8>> = iter.map(|(k, _)| k.to_vec()).collect();
        let want: Vec<Vec<u8>> = model
            .keys()
            .filter(|k| k.as_slice() >= seek.as_slice())
            .cloned()
            .collect();
        prop_assert_eq!(got, want, "seek {:?}", seek);
    }

    #[test]
    fn proptest_reverse_lower_bound_scan(keys in key_set(), seek in seek_key()) {
        let mut txn = RadixTree::new().txn();
        let mut model: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
        for (i, k) in keys.iter().enumerate() {
            txn.insert(k, i as u64);
            model.insert(k.clone(), i as u64);
        }
        let (tree, _) = txn.commit();

        let mut iter = tree.root().reverse_iter();
        iter.seek_reverse_lower_bound(&seek);
        let got: Vec<Vec<u8>> = iter.map(|(k, _)| k.to_vec()).collect();
        let want: Vec<Vec<u8>> = model
            .keys()
            .rev()
            .filter(|k| k.as_slice() <= seek.as_slice())
            .cloned()
            .collect();
        prop_assert_eq!(got, want, "seek {:?}", seek);
    }

    #[test]
    fn proptest_prefix_scan(keys in key_set(), prefix in seek_key()) {
        let mut txn = RadixTree::new().txn();
        let mut model: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
        for (i, k) in keys.iter().enumerate() {
            txn.insert(k, i as u64);
            model.insert(k.clone(), i as u64);
        }
        let (tree, _) = txn.commit();

        let mut walked = Vec::new();
        tree.root().walk_prefix(&prefix, |k, _| {
            walked.push(k.to_vec());
            false
        });
        let mut iter = tree.iter();
        iter.seek_prefix(&prefix);
        let seeked: Vec<Vec<u8>> = iter.map(|(k, _)| k.to_vec()).collect();
        let want: Vec<Vec<u8>> = model
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect();
        prop_assert_eq!(&walked, &want, "prefix {:?}", prefix);
        prop_assert_eq!(&seeked, &want, "prefix {:?}", prefix);
    }

    #[test]
    fn proptest_snapshots_stable(ops in prop::collection::vec(any::<Action>(), 1..32)) {
        // Take a snapshot, keep mutating, then confirm the snapshot still
        // reads exactly as it did.
        let half = ops.len() / 2;
        let mut test = Test::default();
        for action in ops.iter().take(half).cloned() {
            test.execute(action);
        }
        let snapshot = test.tree.clone();
        let frozen: Vec<(Vec<u8>, u64)> =
            snapshot.iter().map(|(k, v)| (k.to_vec(), *v)).collect();

        for action in ops.into_iter().skip(half) {
            test.execute(action);
        }

        let now: Vec<(Vec<u8>, u64)> =
            snapshot.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
        prop_assert_eq!(frozen, now);
    }
}
