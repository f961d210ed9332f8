//! Property tests: batch replay is idempotent, coalescing keeps the last value.

use std::collections::BTreeMap;

use proptest::prelude::*;

use tandem_core::models::*;

fn arb_value() -> impl Strategy<Value = ItemValue> {
    prop_oneof![
        any::<bool>().prop_map(ItemValue::Bool),
        any::<i64>().prop_map(ItemValue::Int),
        "[a-z]{0,8}".prop_map(ItemValue::Text),
    ]
}

fn arb_mutation() -> impl Strategy<Value = Mutation> {
    prop_oneof![
        arb_value().prop_map(|value| Mutation::Add { value }),
        arb_value().prop_map(|value| Mutation::Update { value }),
        Just(Mutation::Delete),
    ]
}

fn arb_batch() -> impl Strategy<Value = Batch> {
    prop::collection::vec(("[a-e]", arb_mutation()), 0..20).prop_map(|ops| {
        Batch::new(
            ops.into_iter()
                .map(|(k, m)| PendingOperation::new(ItemKey::new(k).unwrap(), m))
                .collect(),
        )
    })
}

proptest! {
    #[test]
    fn prop_replaying_a_batch_is_idempotent(batch in arb_batch()) {
        let mut once = BTreeMap::new();
        batch.apply_to(&mut once);

        let mut twice = BTreeMap::new();
        batch.apply_to(&mut twice);
        batch.apply_to(&mut twice);

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_coalesced_chain_ends_with_last_value(
        mutations in prop::collection::vec(arb_mutation(), 1..10)
    ) {
        let mut iter = mutations.clone().into_iter();
        let first = iter.next().unwrap();
        let folded = iter.fold(first, |acc, next| acc.coalesce(next));
        let last = mutations.last().unwrap();
        prop_assert_eq!(folded.value(), last.value());
    }
}
