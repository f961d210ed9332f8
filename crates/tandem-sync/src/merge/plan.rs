use std::collections::{BTreeMap, BTreeSet, HashSet};

use tandem_core::models::{ItemKey, ItemValue};

/// What a merge will do, computed without side effects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergePlan {
    /// Remote values to write into the replica. Never enqueued for push.
    pub adopt: Vec<(ItemKey, ItemValue)>,
    /// Local-only values to enqueue as `add` operations.
    pub push: Vec<(ItemKey, ItemValue)>,
    /// Keys left alone because a pending operation covers them.
    pub retained: Vec<ItemKey>,
    /// Keys where local and remote already agree.
    pub unchanged: usize,
}

impl MergePlan {
    /// Whether applying the plan changes nothing.
    pub fn is_noop(&self) -> bool {
        self.adopt.is_empty() && self.push.is_empty()
    }
}

/// Compute the merge of `remote` into `local`. `pending` holds every key
/// with unacknowledged local work: queued, in flight, or stalled.
pub fn plan_merge(
    local: &BTreeMap<ItemKey, ItemValue>,
    remote: &BTreeMap<ItemKey, ItemValue>,
    pending: &HashSet<ItemKey>,
) -> MergePlan {
    let mut plan = MergePlan::default();
    let keys: BTreeSet<&ItemKey> = local.keys().chain(remote.keys()).collect();

    for key in keys {
        if pending.contains(key) {
            plan.retained.push(key.clone());
            continue;
        }
        match (local.get(key), remote.get(key)) {
            (None, Some(remote_value)) => {
                plan.adopt.push((key.clone(), remote_value.clone()));
            }
            (Some(local_value), None) => {
                plan.push.push((key.clone(), local_value.clone()));
            }
            (Some(local_value), Some(remote_value)) if local_value == remote_value => {
                plan.unchanged += 1;
            }
            (Some(_), Some(remote_value)) => {
                plan.adopt.push((key.clone(), remote_value.clone()));
            }
            (None, None) => {}
        }
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, bool)]) -> BTreeMap<ItemKey, ItemValue> {
        entries
            .iter()
            .map(|(k, v)| (ItemKey::new(*k).unwrap(), ItemValue::Bool(*v)))
            .collect()
    }

    fn keys(names: &[&str]) -> HashSet<ItemKey> {
        names.iter().map(|k| ItemKey::new(*k).unwrap()).collect()
    }

    #[test]
    fn identical_sides_are_a_noop() {
        let both = map(&[("a", true), ("b", false)]);
        let plan = plan_merge(&both, &both, &HashSet::new());
        assert!(plan.is_noop());
        assert_eq!(plan.unchanged, 2);
    }

    #[test]
    fn pending_key_is_retained_even_when_absent_locally() {
        let plan = plan_merge(&map(&[]), &map(&[("a", true)]), &keys(&["a"]));
        assert!(plan.adopt.is_empty());
        assert_eq!(plan.retained.len(), 1);
    }

    #[test]
    fn settled_conflict_takes_remote() {
        let plan = plan_merge(&map(&[("a", false)]), &map(&[("a", true)]), &HashSet::new());
        assert_eq!(plan.adopt, vec![(ItemKey::new("a").unwrap(), ItemValue::Bool(true))]);
    }
}
