//! Transaction loading and cleaning.
//!
//! Reading resolves the required columns by header name, parses every cell
//! into a [`RawTransaction`] (missing cells stay `None`) and applies the
//! [`DatePolicy`] to rows whose date cannot be parsed. Cleaning then runs in
//! the same order as the reference analysis:
//!
//! 1. drop rows that repeat an earlier row field for field;
//! 2. replace missing text and category cells with `"Unknown"`;
//! 3. replace missing numeric cells with the column median of the retained
//!    rows (item counts round half away from zero).
//!
//! The resulting [`Dataset`] is immutable; every later stage only borrows it.

use std::{collections::BTreeMap, collections::HashSet, path::Path};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::ValueEnum;
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};
use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::{
    data::{
        self, Calendar, Discount, Transaction, UNKNOWN, is_missing, parse_amount, parse_count,
        parse_timestamp, season_for_month,
    },
    error::InsightError,
    io_utils, printable_delimiter,
};

pub const CUSTOMER_NAME: &str = "Customer_Name";
pub const CUSTOMER_CATEGORY: &str = "Customer_Category";
pub const CITY: &str = "City";
pub const STORE_TYPE: &str = "Store_Type";
pub const DATE: &str = "Date";
pub const TOTAL_COST: &str = "Total_Cost";
pub const TOTAL_ITEMS: &str = "Total_Items";
pub const PRODUCT: &str = "Product";
pub const PAYMENT_METHOD: &str = "Payment_Method";
pub const DISCOUNT_APPLIED: &str = "Discount_Applied";
pub const PROMOTION: &str = "Promotion";
pub const SEASON: &str = "Season";

/// Handling of rows whose date is missing or unparseable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePolicy {
    /// Fail the whole load, naming the offending row.
    #[default]
    Abort,
    /// Drop the row and count it in the load summary.
    Skip,
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub encoding: &'static Encoding,
    pub date_policy: DatePolicy,
}

impl LoadOptions {
    pub fn for_path(path: &Path) -> Self {
        LoadOptions {
            delimiter: io_utils::resolve_input_delimiter(path, None),
            encoding: UTF_8,
            date_policy: DatePolicy::default(),
        }
    }
}

/// A parsed input row before deduplication and imputation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawTransaction {
    pub customer_name: Option<String>,
    pub customer_category: Option<String>,
    pub city: Option<String>,
    pub store_type: Option<String>,
    pub timestamp: NaiveDateTime,
    pub total_cost: Option<Decimal>,
    pub total_items: Option<i64>,
    pub products: Option<String>,
    pub payment_method: Option<String>,
    pub discount: Option<Discount>,
    pub promotion: Option<String>,
    pub season: Option<String>,
    /// Cells of unrecognised columns in header order. They only take part in
    /// duplicate detection; missing tokens are stored as empty strings.
    pub other_cells: Vec<String>,
}

/// The cleaned, read-only transaction table.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<Transaction>,
}

impl Dataset {
    pub fn new(rows: Vec<Transaction>) -> Self {
        Dataset { rows }
    }

    pub fn rows(&self) -> &[Transaction] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Transaction> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Transaction;
    type IntoIter = std::slice::Iter<'a, Transaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImputedColumn {
    pub column: &'static str,
    pub count: usize,
    pub replacement: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleaningReport {
    pub duplicates_removed: usize,
    pub imputed: Vec<ImputedColumn>,
}

impl CleaningReport {
    pub fn missing_values(&self) -> usize {
        self.imputed.iter().map(|column| column.count).sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub columns: usize,
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub season_derived: bool,
    pub ignored_columns: Vec<String>,
    pub cleaning: CleaningReport,
}

impl LoadSummary {
    pub fn rows_retained(&self) -> usize {
        self.rows_read - self.rows_skipped - self.cleaning.duplicates_removed
    }
}

/// Reads and cleans the transactions file at `path`.
pub fn load_transactions(path: &Path, options: &LoadOptions) -> Result<(Dataset, LoadSummary)> {
    if !io_utils::is_dash(path) && !path.exists() {
        return Err(InsightError::InputNotFound(path.to_path_buf()).into());
    }
    info!(
        "Loading transactions from {:?} with delimiter '{}'",
        path,
        printable_delimiter(options.delimiter)
    );
    let mut reader = io_utils::open_csv_reader_from_path(path, options.delimiter, true)?;
    let headers = io_utils::reader_headers(&mut reader, options.encoding)?;
    let layout = ColumnLayout::resolve(&headers)?;
    if !layout.ignored.is_empty() {
        debug!("Ignoring column(s): {}", layout.ignored.join(", "));
    }

    let mut raw_rows = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_skipped = 0usize;
    for (row_idx, record) in reader.byte_records().enumerate() {
        let line = row_idx + 2;
        let record = record.with_context(|| format!("Reading row {line}"))?;
        let decoded = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {line}"))?;
        rows_read += 1;
        match layout.parse_row(&decoded, line) {
            Ok(row) => raw_rows.push(row),
            Err(InsightError::InvalidDate { row, value }) if options.date_policy == DatePolicy::Skip => {
                warn!("Skipping row {row}: unparseable date '{value}'");
                rows_skipped += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
    info!(
        "Read {} row(s) × {} column(s)",
        rows_read,
        headers.len()
    );

    let (dataset, cleaning) = clean(raw_rows);
    info!(
        "Removed {} duplicate row(s); imputed {} missing value(s); {} row(s) retained",
        cleaning.duplicates_removed,
        cleaning.missing_values(),
        dataset.len()
    );
    let summary = LoadSummary {
        columns: headers.len(),
        rows_read,
        rows_skipped,
        season_derived: layout.season.is_none(),
        ignored_columns: layout.ignored,
        cleaning,
    };
    Ok((dataset, summary))
}

/// Deduplicates `raw` and fills every missing value.
pub fn clean(raw: Vec<RawTransaction>) -> (Dataset, CleaningReport) {
    let before = raw.len();
    let mut seen = HashSet::with_capacity(before);
    let unique = raw
        .into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect::<Vec<_>>();
    let duplicates_removed = before - unique.len();

    let mut costs = unique.iter().filter_map(|row| row.total_cost).collect::<Vec<_>>();
    let cost_median = data::median(&mut costs).unwrap_or_default();
    let mut items = unique
        .iter()
        .filter_map(|row| row.total_items.map(Decimal::from))
        .collect::<Vec<_>>();
    let items_median = data::median(&mut items)
        .map(|value| value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|value| value.to_i64())
        .unwrap_or_default();

    let mut imputer = Imputer::new(cost_median, items_median);
    let rows = unique
        .into_iter()
        .map(|row| imputer.fill(row))
        .collect::<Vec<_>>();

    let report = CleaningReport {
        duplicates_removed,
        imputed: imputer.into_report(),
    };
    (Dataset::new(rows), report)
}

struct Imputer {
    cost_median: Decimal,
    items_median: i64,
    counts: BTreeMap<&'static str, usize>,
}

impl Imputer {
    fn new(cost_median: Decimal, items_median: i64) -> Self {
        Imputer {
            cost_median,
            items_median,
            counts: BTreeMap::new(),
        }
    }

    fn fill(&mut self, row: RawTransaction) -> Transaction {
        let calendar = Calendar::from_timestamp(&row.timestamp);
        Transaction {
            customer_name: self.text(CUSTOMER_NAME, row.customer_name),
            customer_category: self.text(CUSTOMER_CATEGORY, row.customer_category),
            city: self.text(CITY, row.city),
            store_type: self.text(STORE_TYPE, row.store_type),
            timestamp: row.timestamp,
            total_cost: match row.total_cost {
                Some(cost) => cost,
                None => {
                    self.record(TOTAL_COST);
                    self.cost_median
                }
            },
            total_items: match row.total_items {
                Some(items) => items,
                None => {
                    self.record(TOTAL_ITEMS);
                    self.items_median
                }
            },
            products: self.text(PRODUCT, row.products),
            payment_method: self.text(PAYMENT_METHOD, row.payment_method),
            discount: match row.discount {
                Some(discount) => discount,
                None => {
                    self.record(DISCOUNT_APPLIED);
                    Discount::Unknown
                }
            },
            promotion: self.text(PROMOTION, row.promotion),
            season: self.text(SEASON, row.season),
            calendar,
        }
    }

    fn text(&mut self, column: &'static str, value: Option<String>) -> String {
        value.unwrap_or_else(|| {
            self.record(column);
            UNKNOWN.to_string()
        })
    }

    fn record(&mut self, column: &'static str) {
        *self.counts.entry(column).or_insert(0) += 1;
    }

    fn into_report(self) -> Vec<ImputedColumn> {
        self.counts
            .into_iter()
            .map(|(column, count)| {
                let replacement = match column {
                    TOTAL_COST => format!("median {}", self.cost_median),
                    TOTAL_ITEMS => format!("median {}", self.items_median),
                    _ => UNKNOWN.to_string(),
                };
                ImputedColumn {
                    column,
                    count,
                    replacement,
                }
            })
            .collect()
    }
}

struct ColumnLayout {
    customer_name: usize,
    customer_category: usize,
    city: usize,
    store_type: usize,
    date: usize,
    total_cost: usize,
    total_items: usize,
    product: usize,
    payment_method: usize,
    discount: usize,
    promotion: usize,
    season: Option<usize>,
    ignored: Vec<String>,
    ignored_at: Vec<usize>,
}

impl ColumnLayout {
    fn resolve(headers: &[String]) -> Result<Self, InsightError> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|header| header.trim().eq_ignore_ascii_case(name))
        };
        let require = |name: &str| {
            position(name).ok_or_else(|| InsightError::MissingColumn(name.to_string()))
        };
        let known = [
            CUSTOMER_NAME,
            CUSTOMER_CATEGORY,
            CITY,
            STORE_TYPE,
            DATE,
            TOTAL_COST,
            TOTAL_ITEMS,
            PRODUCT,
            PAYMENT_METHOD,
            DISCOUNT_APPLIED,
            PROMOTION,
            SEASON,
        ];
        let (ignored_at, ignored): (Vec<usize>, Vec<String>) = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| {
                !known
                    .iter()
                    .any(|name| header.trim().eq_ignore_ascii_case(name))
            })
            .map(|(idx, header)| (idx, header.clone()))
            .unzip();
        Ok(ColumnLayout {
            customer_name: require(CUSTOMER_NAME)?,
            customer_category: require(CUSTOMER_CATEGORY)?,
            city: require(CITY)?,
            store_type: require(STORE_TYPE)?,
            date: require(DATE)?,
            total_cost: require(TOTAL_COST)?,
            total_items: require(TOTAL_ITEMS)?,
            product: require(PRODUCT)?,
            payment_method: require(PAYMENT_METHOD)?,
            discount: require(DISCOUNT_APPLIED)?,
            promotion: require(PROMOTION)?,
            season: position(SEASON),
            ignored,
            ignored_at,
        })
    }

    fn parse_row(&self, record: &[String], row: usize) -> Result<RawTransaction, InsightError> {
        let raw_date = cell(record, self.date).unwrap_or_default();
        let timestamp = parse_timestamp(raw_date).map_err(|_| InsightError::InvalidDate {
            row,
            value: raw_date.to_string(),
        })?;
        let total_cost = cell(record, self.total_cost)
            .map(|value| {
                parse_amount(value).map_err(|_| InsightError::InvalidValue {
                    row,
                    column: TOTAL_COST,
                    value: value.to_string(),
                })
            })
            .transpose()?;
        let total_items = cell(record, self.total_items)
            .map(|value| {
                parse_count(value).map_err(|_| InsightError::InvalidValue {
                    row,
                    column: TOTAL_ITEMS,
                    value: value.to_string(),
                })
            })
            .transpose()?;
        let discount = cell(record, self.discount)
            .map(|value| {
                Discount::parse(value).ok_or_else(|| InsightError::InvalidValue {
                    row,
                    column: DISCOUNT_APPLIED,
                    value: value.to_string(),
                })
            })
            .transpose()?;
        let season = match self.season {
            Some(idx) => text(record, idx),
            None => Some(season_for_month(Calendar::from_timestamp(&timestamp).month).to_string()),
        };
        Ok(RawTransaction {
            customer_name: text(record, self.customer_name),
            customer_category: text(record, self.customer_category),
            city: text(record, self.city),
            store_type: text(record, self.store_type),
            timestamp,
            total_cost,
            total_items,
            products: text(record, self.product),
            payment_method: text(record, self.payment_method),
            discount,
            promotion: text(record, self.promotion),
            season,
            other_cells: self
                .ignored_at
                .iter()
                .map(|idx| text(record, *idx).unwrap_or_default())
                .collect(),
        })
    }
}

fn cell(record: &[String], idx: usize) -> Option<&str> {
    record
        .get(idx)
        .map(|value| value.trim())
        .filter(|value| !is_missing(value))
}

fn text(record: &[String], idx: usize) -> Option<String> {
    cell(record, idx).map(str::to_string)
}
