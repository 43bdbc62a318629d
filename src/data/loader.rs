//! DataFrame boundary for the source tables
//!
//! Column names follow the public retail dataset layout the pipeline was
//! built against (`date_block_num`, `shop_id`, `item_cnt_day`, ...).

use crate::data::records::{
    CategoryRecord, ItemRecord, SaleDate, SourceTables, StoreRecord, TransactionRecord,
};
use crate::error::{DemandError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::debug;

/// Column names of the transactions table
pub mod columns {
    pub const DATE: &str = "date";
    pub const MONTH: &str = "date_block_num";
    pub const STORE: &str = "shop_id";
    pub const STORE_NAME: &str = "shop_name";
    pub const ITEM: &str = "item_id";
    pub const ITEM_NAME: &str = "item_name";
    pub const CATEGORY: &str = "item_category_id";
    pub const CATEGORY_NAME: &str = "item_category_name";
    pub const PRICE: &str = "item_price";
    pub const QUANTITY: &str = "item_cnt_day";
}

/// Load a CSV file into a DataFrame
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let file = File::open(path.as_ref())
        .map_err(|e| DemandError::DataError(format!("{}: {}", path.as_ref().display(), e)))?;

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| DemandError::DataError(e.to_string()))
}

fn column_series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| DemandError::ColumnNotFound(name.to_string()))
}

fn int_column(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>> {
    let series = column_series(df, name)?.cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let series = column_series(df, name)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn optional_text_column(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<String>>>> {
    if df.column(name).is_err() {
        return Ok(None);
    }
    let series = column_series(df, name)?.cast(&DataType::String)?;
    let values = series
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(Some(values))
}

fn required<T>(value: Option<T>, column: &str, row: usize) -> Result<T> {
    value.ok_or_else(|| {
        DemandError::DataError(format!("null value in column '{}' at row {}", column, row))
    })
}

/// Convert a transactions DataFrame into typed records.
///
/// The `date` column is optional; when present it is carried as raw text
/// and parsed later by the sanitizer.
pub fn transactions_from_frame(df: &DataFrame) -> Result<Vec<TransactionRecord>> {
    let months = int_column(df, columns::MONTH)?;
    let stores = int_column(df, columns::STORE)?;
    let items = int_column(df, columns::ITEM)?;
    let prices = float_column(df, columns::PRICE)?;
    let quantities = float_column(df, columns::QUANTITY)?;
    let dates = optional_text_column(df, columns::DATE)?;

    let mut records = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        records.push(TransactionRecord {
            date: dates
                .as_ref()
                .and_then(|d| d[row].clone())
                .map(SaleDate::Text),
            month_index: required(months[row], columns::MONTH, row)?,
            store_id: required(stores[row], columns::STORE, row)?,
            item_id: required(items[row], columns::ITEM, row)?,
            // Missing price or count behaves like a non-positive price and is dropped by the sanitizer
            unit_price: prices[row].unwrap_or(f64::NAN),
            quantity: quantities[row].unwrap_or(0.0),
        });
    }

    debug!(rows = records.len(), "Loaded transactions");
    Ok(records)
}

/// Convert an items DataFrame into typed records
pub fn items_from_frame(df: &DataFrame) -> Result<Vec<ItemRecord>> {
    let ids = int_column(df, columns::ITEM)?;
    let categories = int_column(df, columns::CATEGORY)?;
    let names = optional_text_column(df, columns::ITEM_NAME)?;

    (0..df.height())
        .map(|row| {
            Ok(ItemRecord {
                item_id: required(ids[row], columns::ITEM, row)?,
                category_id: required(categories[row], columns::CATEGORY, row)?,
                name: names.as_ref().and_then(|n| n[row].clone()),
            })
        })
        .collect()
}

/// Convert a stores DataFrame into typed records
pub fn stores_from_frame(df: &DataFrame) -> Result<Vec<StoreRecord>> {
    let ids = int_column(df, columns::STORE)?;
    let names = optional_text_column(df, columns::STORE_NAME)?;

    (0..df.height())
        .map(|row| {
            Ok(StoreRecord {
                store_id: required(ids[row], columns::STORE, row)?,
                name: names.as_ref().and_then(|n| n[row].clone()),
            })
        })
        .collect()
}

/// Convert a categories DataFrame into typed records
pub fn categories_from_frame(df: &DataFrame) -> Result<Vec<CategoryRecord>> {
    let ids = int_column(df, columns::CATEGORY)?;
    let names = optional_text_column(df, columns::CATEGORY_NAME)?;

    (0..df.height())
        .map(|row| {
            Ok(CategoryRecord {
                category_id: required(ids[row], columns::CATEGORY, row)?,
                name: names.as_ref().and_then(|n| n[row].clone()),
            })
        })
        .collect()
}

impl SourceTables {
    /// Build typed tables from the four source DataFrames
    pub fn from_frames(
        transactions: &DataFrame,
        items: &DataFrame,
        stores: &DataFrame,
        categories: &DataFrame,
    ) -> Result<Self> {
        Ok(Self {
            transactions: transactions_from_frame(transactions)?,
            items: items_from_frame(items)?,
            stores: stores_from_frame(stores)?,
            categories: categories_from_frame(categories)?,
        })
    }

    /// Load the four source tables from CSV files
    pub fn from_csv_files(
        transactions: impl AsRef<Path>,
        items: impl AsRef<Path>,
        stores: impl AsRef<Path>,
        categories: impl AsRef<Path>,
    ) -> Result<Self> {
        Self::from_frames(
            &load_csv(transactions)?,
            &load_csv(items)?,
            &load_csv(stores)?,
            &load_csv(categories)?,
        )
    }
}
