//! Property tests: merge never touches pending keys, the outbox keeps one
//! operation per key in bounded batches, the watermark never moves back.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use proptest::prelude::*;

use tandem_core::models::{ItemKey, ItemValue, Mutation, RemoteDocument};
use tandem_sync::listener::{Freshness, RemoteWatermark};
use tandem_sync::outbox::Outbox;
use tandem_sync::plan_merge;

fn arb_value() -> impl Strategy<Value = ItemValue> {
    prop_oneof![
        any::<bool>().prop_map(ItemValue::Bool),
        (-1000i64..1000).prop_map(ItemValue::Int),
        "[a-z]{0,6}".prop_map(ItemValue::Text),
    ]
}

fn arb_items() -> impl Strategy<Value = BTreeMap<ItemKey, ItemValue>> {
    prop::collection::btree_map("[a-h]", arb_value(), 0..8).prop_map(|items| {
        items
            .into_iter()
            .map(|(k, v)| (ItemKey::new(k).unwrap(), v))
            .collect()
    })
}

fn arb_pending() -> impl Strategy<Value = HashSet<ItemKey>> {
    prop::collection::hash_set("[a-h]", 0..4)
        .prop_map(|keys| keys.into_iter().map(|k| ItemKey::new(k).unwrap()).collect())
}

fn key(k: &str) -> ItemKey {
    ItemKey::new(k).unwrap()
}

proptest! {
    #[test]
    fn prop_merge_leaves_pending_keys_alone(
        local in arb_items(),
        remote in arb_items(),
        pending in arb_pending(),
    ) {
        let plan = plan_merge(&local, &remote, &pending);

        for (k, _) in plan.adopt.iter().chain(plan.push.iter()) {
            prop_assert!(!pending.contains(k));
        }
        for k in &plan.retained {
            prop_assert!(pending.contains(k));
        }
    }

    #[test]
    fn prop_merge_converges_settled_keys_to_remote(
        local in arb_items(),
        remote in arb_items(),
        pending in arb_pending(),
    ) {
        let plan = plan_merge(&local, &remote, &pending);
        let mut merged = local.clone();
        for (k, v) in &plan.adopt {
            merged.insert(k.clone(), v.clone());
        }

        for (k, v) in &remote {
            if !pending.contains(k) {
                prop_assert_eq!(merged.get(k), Some(v));
            }
        }
        for k in &pending {
            prop_assert_eq!(merged.get(k), local.get(k));
        }

        let pushed: BTreeSet<&ItemKey> = plan.push.iter().map(|(k, _)| k).collect();
        let expected: BTreeSet<&ItemKey> = local
            .keys()
            .filter(|k| !remote.contains_key(*k) && !pending.contains(*k))
            .collect();
        prop_assert_eq!(pushed, expected);
    }

    #[test]
    fn prop_outbox_keeps_one_operation_per_key(
        writes in prop::collection::vec(("[a-f]", arb_value()), 1..40),
        max_batch in 1usize..6,
    ) {
        let mut outbox = Outbox::new(max_batch);
        let mut last: BTreeMap<String, ItemValue> = BTreeMap::new();
        for (k, value) in &writes {
            let op = outbox.stage(&key(k), Mutation::Update { value: value.clone() });
            outbox.accept(op);
            last.insert(k.clone(), value.clone());
        }

        prop_assert_eq!(outbox.len(), last.len());
        for (k, value) in &last {
            let op = outbox.get(k).unwrap();
            prop_assert_eq!(op.payload.value(), Some(value));
        }

        let mut drained = 0;
        while !outbox.is_empty() {
            let batch = outbox.take_batch();
            prop_assert!(!batch.is_empty());
            prop_assert!(batch.len() <= max_batch);
            drained += batch.len();
        }
        prop_assert_eq!(drained, last.len());
    }

    #[test]
    fn prop_watermark_never_moves_back(revisions in prop::collection::vec(0u64..20, 1..30)) {
        let mut watermark = RemoteWatermark::at_revision(0);
        let mut highest = 0;
        for revision in revisions {
            let mut document = RemoteDocument::empty("default");
            document.revision = revision;
            document.items.insert(key("rev"), ItemValue::Int(revision as i64));

            if watermark.classify(&document) == Freshness::Fresh {
                prop_assert!(revision >= highest);
                watermark.advance(&document);
                highest = revision;
            }
            prop_assert_eq!(watermark.revision(), highest);
        }
    }
}
