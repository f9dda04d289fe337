//! Keyed child diff invariants over random permutations.

use proptest::prelude::*;
use weft_dom::{MemoryTarget, Patcher, VNode};

fn keyed_list(keys: &[u8]) -> VNode {
    let mut node = VNode::element("ul");
    node.children = Some(
        keys.iter()
            .map(|key| {
                let mut child = VNode::element("li");
                child.key = Some(key.to_string());
                child.text = Some(format!("item {key}"));
                child
            })
            .collect(),
    );
    node
}

fn keys() -> impl Strategy<Value = Vec<u8>> {
    proptest::sample::subsequence((0u8..10).collect::<Vec<_>>(), 0..=10).prop_shuffle()
}

proptest! {
    #[test]
    fn patch_reaches_the_new_order_reusing_shared_keys(old_keys in keys(), new_keys in keys()) {
        let mut target = MemoryTarget::new();
        let patcher = Patcher::new();

        let mut old = keyed_list(&old_keys);
        let root = target.create_root("ul");
        patcher.mount(&mut target, root, &mut old);
        target.ops.reset();

        let mut new = keyed_list(&new_keys);
        patcher.patch(&mut target, old, &mut new);

        // The target's child order matches the new tree exactly.
        let expected: Vec<_> = new
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|child| child.node)
            .collect();
        let actual: Vec<_> = target.children_of(root).iter().map(|el| Some(*el)).collect();
        prop_assert_eq!(expected, actual);

        // Keys present on both sides never recreate; each li creation
        // also creates its text child.
        let fresh = new_keys.iter().filter(|k| !old_keys.contains(k)).count();
        let gone = old_keys.iter().filter(|k| !new_keys.contains(k)).count();
        prop_assert_eq!(target.ops.created, fresh * 2);
        prop_assert_eq!(target.ops.removed, gone);
    }
}
