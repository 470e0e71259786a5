//! Database initialization and the ledger schema

pub mod init;

pub use init::*;
