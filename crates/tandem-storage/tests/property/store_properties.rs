//! Property tests: the SQLite store and the in-memory store agree on every
//! sequence of writes and removes.

use proptest::prelude::*;

use tandem_core::traits::IDurableStore;
use tandem_storage::{MemoryStore, StorageEngine};

#[derive(Debug, Clone)]
enum StoreOp {
    Write(String, Vec<u8>),
    Remove(String),
}

fn arb_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        3 => ("[a-f]", prop::collection::vec(any::<u8>(), 0..16))
            .prop_map(|(k, v)| StoreOp::Write(k, v)),
        1 => "[a-f]".prop_map(StoreOp::Remove),
    ]
}

proptest! {
    #[test]
    fn prop_sqlite_and_memory_stores_agree(ops in prop::collection::vec(arb_op(), 0..40)) {
        let sqlite = StorageEngine::open_in_memory().unwrap();
        let memory = MemoryStore::new();

        for op in &ops {
            for store in [&sqlite as &dyn IDurableStore, &memory as &dyn IDurableStore] {
                match op {
                    StoreOp::Write(k, v) => store.write("ns", k, v).unwrap(),
                    StoreOp::Remove(k) => store.remove("ns", k).unwrap(),
                }
            }
        }

        prop_assert_eq!(sqlite.scan("ns").unwrap(), memory.scan("ns").unwrap());
        prop_assert_eq!(sqlite.count("ns").unwrap(), memory.count("ns").unwrap());
    }
}
