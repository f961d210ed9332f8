mod durable_store;

pub use durable_store::IDurableStore;
