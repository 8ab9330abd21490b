//! Database bootstrap shared by the albumlog crates

pub mod init;

pub use init::{create_schema, init_database, init_in_memory_database};
