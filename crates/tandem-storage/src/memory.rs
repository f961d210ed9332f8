//! In-process store. Shares the `IDurableStore` contract with
//! [`StorageEngine`](crate::StorageEngine) except that nothing outlives the
//! process. Hold it in an `Arc` and hand the same instance to a second engine
//! to simulate a restart.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tandem_core::errors::{StorageError, TandemError, TandemResult};
use tandem_core::traits::IDurableStore;

#[derive(Default)]
struct Namespace {
    next_seq: u64,
    records: HashMap<String, (u64, Vec<u8>)>,
}

/// Namespaced records in a `HashMap`, scanned in first-write order.
#[derive(Default)]
pub struct MemoryStore {
    namespaces: Mutex<HashMap<String, Namespace>>,
    fail_writes: AtomicBool,
    failing_namespace: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write and remove fail, as a full disk would.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make writes and removes fail in one namespace only.
    pub fn set_failing_namespace(&self, namespace: Option<&str>) {
        let mut failing = self
            .failing_namespace
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *failing = namespace.map(str::to_string);
    }

    fn check_writable(&self, namespace: &str) -> TandemResult<()> {
        let namespace_fails = self
            .failing_namespace
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            == Some(namespace);
        if namespace_fails || self.fail_writes.load(Ordering::SeqCst) {
            return Err(TandemError::StorageError(StorageError::SqliteError {
                message: "simulated write failure".into(),
            }));
        }
        Ok(())
    }

    fn with_namespaces<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Namespace>) -> T,
    ) -> TandemResult<T> {
        let mut guard = self
            .namespaces
            .lock()
            .map_err(|e| StorageError::LockPoisoned {
                details: e.to_string(),
            })?;
        Ok(f(&mut guard))
    }
}

impl IDurableStore for MemoryStore {
    fn read(&self, namespace: &str, key: &str) -> TandemResult<Option<Vec<u8>>> {
        self.with_namespaces(|all| {
            all.get(namespace)
                .and_then(|ns| ns.records.get(key))
                .map(|(_, body)| body.clone())
        })
    }

    fn write(&self, namespace: &str, key: &str, bytes: &[u8]) -> TandemResult<()> {
        self.check_writable(namespace)?;
        self.with_namespaces(|all| {
            let ns = all.entry(namespace.to_string()).or_default();
            match ns.records.get_mut(key) {
                Some((_, body)) => *body = bytes.to_vec(),
                None => {
                    let seq = ns.next_seq;
                    ns.next_seq += 1;
                    ns.records.insert(key.to_string(), (seq, bytes.to_vec()));
                }
            }
        })
    }

    fn remove(&self, namespace: &str, key: &str) -> TandemResult<()> {
        self.check_writable(namespace)?;
        self.with_namespaces(|all| {
            if let Some(ns) = all.get_mut(namespace) {
                ns.records.remove(key);
            }
        })
    }

    fn scan(&self, namespace: &str) -> TandemResult<Vec<(String, Vec<u8>)>> {
        self.with_namespaces(|all| {
            let Some(ns) = all.get(namespace) else {
                return Vec::new();
            };
            let mut rows: Vec<_> = ns
                .records
                .iter()
                .map(|(key, (seq, body))| (*seq, key.clone(), body.clone()))
                .collect();
            rows.sort_by_key(|(seq, _, _)| *seq);
            rows.into_iter().map(|(_, key, body)| (key, body)).collect()
        })
    }
}
