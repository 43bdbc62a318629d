//! Typed source records

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Store identifier
pub type StoreId = i64;

/// Item identifier
pub type ItemId = i64;

/// Item category identifier
pub type CategoryId = i64;

/// Sale date as read from the source, or after calendar parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleDate {
    /// Unparsed text, typically `dd.mm.yyyy`
    Text(String),
    /// Canonical calendar date
    Calendar(NaiveDate),
}

impl SaleDate {
    /// Calendar date, if already parsed
    pub fn calendar(&self) -> Option<NaiveDate> {
        match self {
            SaleDate::Calendar(date) => Some(*date),
            SaleDate::Text(_) => None,
        }
    }
}

/// One raw sale event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub date: Option<SaleDate>,
    /// Calendar-month ordinal, monotonically increasing
    pub month_index: i64,
    pub store_id: StoreId,
    pub item_id: ItemId,
    pub unit_price: f64,
    pub quantity: f64,
}

impl TransactionRecord {
    /// Record without a date field
    pub fn new(month_index: i64, store_id: StoreId, item_id: ItemId, unit_price: f64, quantity: f64) -> Self {
        Self {
            date: None,
            month_index,
            store_id,
            item_id,
            unit_price,
            quantity,
        }
    }

    /// Attach a raw date string
    pub fn with_date_text(mut self, date: impl Into<String>) -> Self {
        self.date = Some(SaleDate::Text(date.into()));
        self
    }
}

/// Item to category mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub item_id: ItemId,
    pub category_id: CategoryId,
    pub name: Option<String>,
}

/// Store reference row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub store_id: StoreId,
    pub name: Option<String>,
}

/// Category reference row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub category_id: CategoryId,
    pub name: Option<String>,
}

/// The four source tables, already loaded in memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceTables {
    pub transactions: Vec<TransactionRecord>,
    pub items: Vec<ItemRecord>,
    pub stores: Vec<StoreRecord>,
    pub categories: Vec<CategoryRecord>,
}

impl SourceTables {
    /// True when every table is empty
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
            && self.items.is_empty()
            && self.stores.is_empty()
            && self.categories.is_empty()
    }
}
