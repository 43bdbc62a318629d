//! Source data module
//!
//! Typed records for the four source tables and their conversion from
//! polars DataFrames. The pipeline itself only ever sees the typed records.

mod records;
pub mod loader;

pub use records::{
    CategoryId, CategoryRecord, ItemId, ItemRecord, SaleDate, SourceTables, StoreId,
    StoreRecord, TransactionRecord,
};
pub use loader::{load_csv, transactions_from_frame};
