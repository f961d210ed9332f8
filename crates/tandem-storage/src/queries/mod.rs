//! Raw SQL for the records table and maintenance pragmas.

pub mod maintenance;
pub mod record_ops;
