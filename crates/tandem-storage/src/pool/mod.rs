//! Connection management. All reads and writes share one connection so a
//! read always observes the last acknowledged write.

pub mod pragmas;
pub mod write_connection;

pub use write_connection::WriteConnection;
