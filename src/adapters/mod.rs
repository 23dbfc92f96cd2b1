// Adapters layer: concrete implementations for external systems (files, table formats).

pub mod csv_table;
pub mod storage;

pub use csv_table::{read_table, write_table};
pub use storage::LocalStorage;
