use crate::errors::TandemResult;

/// Key-value persistence that survives process restarts.
///
/// Records live in namespaces. Writes are synchronous: when `write` returns
/// `Ok`, the record survives a crash. `scan` returns records in the order
/// they were first written; overwriting a record keeps its position.
pub trait IDurableStore: Send + Sync {
    fn read(&self, namespace: &str, key: &str) -> TandemResult<Option<Vec<u8>>>;
    fn write(&self, namespace: &str, key: &str, bytes: &[u8]) -> TandemResult<()>;
    fn remove(&self, namespace: &str, key: &str) -> TandemResult<()>;
    fn scan(&self, namespace: &str) -> TandemResult<Vec<(String, Vec<u8>)>>;

    /// Remove several records in one step.
    fn remove_many(&self, namespace: &str, keys: &[String]) -> TandemResult<()> {
        for key in keys {
            self.remove(namespace, key)?;
        }
        Ok(())
    }

    /// Number of records in a namespace.
    fn count(&self, namespace: &str) -> TandemResult<usize> {
        Ok(self.scan(namespace)?.len())
    }
}
