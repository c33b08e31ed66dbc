//! Group-by aggregation over the cleaned dataset.
//!
//! [`segment`] partitions rows by one or two [`Dimension`]s and computes a
//! [`GroupStats`] per observed key. Only combinations present in the data get
//! a row; nothing is zero-filled. Keys sort naturally: text keys
//! lexicographically, weekdays Monday first, months chronologically.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use anyhow::{Result, anyhow, bail};
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    cli::SegmentArgs,
    config::{Overrides, Settings},
    data::{self, Transaction},
    format,
    loader::{self, Dataset},
    table::{self, Align},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Dimension {
    CustomerCategory,
    StoreType,
    Promotion,
    Discount,
    Season,
    PaymentMethod,
    City,
    DayOfWeek,
    Month,
}

impl Dimension {
    pub const ALL: [Dimension; 9] = [
        Dimension::CustomerCategory,
        Dimension::StoreType,
        Dimension::Promotion,
        Dimension::Discount,
        Dimension::Season,
        Dimension::PaymentMethod,
        Dimension::City,
        Dimension::DayOfWeek,
        Dimension::Month,
    ];

    /// Column caption, matching the input header where one exists.
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::CustomerCategory => loader::CUSTOMER_CATEGORY,
            Dimension::StoreType => loader::STORE_TYPE,
            Dimension::Promotion => loader::PROMOTION,
            Dimension::Discount => loader::DISCOUNT_APPLIED,
            Dimension::Season => loader::SEASON,
            Dimension::PaymentMethod => loader::PAYMENT_METHOD,
            Dimension::City => loader::CITY,
            Dimension::DayOfWeek => "DayOfWeek",
            Dimension::Month => "Month",
        }
    }

    /// True when the dimension has a fixed presentation order.
    pub fn is_ordered(&self) -> bool {
        matches!(self, Dimension::DayOfWeek | Dimension::Month)
    }

    pub fn key_of(&self, row: &Transaction) -> KeyPart {
        match self {
            Dimension::CustomerCategory => KeyPart::text(&row.customer_category),
            Dimension::StoreType => KeyPart::text(&row.store_type),
            Dimension::Promotion => KeyPart::text(&row.promotion),
            Dimension::Discount => KeyPart::text(row.discount.as_str()),
            Dimension::Season => KeyPart::text(&row.season),
            Dimension::PaymentMethod => KeyPart::text(&row.payment_method),
            Dimension::City => KeyPart::text(&row.city),
            Dimension::DayOfWeek => KeyPart {
                rank: i64::from(row.calendar.weekday.num_days_from_monday()),
                label: row.calendar.day_name().to_string(),
            },
            Dimension::Month => KeyPart {
                rank: i64::from(row.calendar.year) * 100 + i64::from(row.calendar.month),
                label: format!(
                    "{}-{:02} {}",
                    row.calendar.year,
                    row.calendar.month,
                    data::month_name(row.calendar.month)
                ),
            },
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Dimension {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let dimension = match normalized.as_str() {
            "customer_category" | "category" => Dimension::CustomerCategory,
            "store_type" | "store" => Dimension::StoreType,
            "promotion" => Dimension::Promotion,
            "discount_applied" | "discount" => Dimension::Discount,
            "season" => Dimension::Season,
            "payment_method" | "payment" => Dimension::PaymentMethod,
            "city" => Dimension::City,
            "dayofweek" | "day_of_week" | "weekday" => Dimension::DayOfWeek,
            "month" => Dimension::Month,
            _ => bail!(
                "Unknown dimension '{value}'. Expected one of: {}",
                Dimension::ALL
                    .iter()
                    .map(|d| d.label().to_ascii_lowercase())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        };
        Ok(dimension)
    }
}

/// One component of a group key. Ordering is by `rank`, then `label`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPart {
    pub rank: i64,
    pub label: String,
}

impl KeyPart {
    fn text(value: &str) -> Self {
        KeyPart {
            rank: 0,
            label: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(pub Vec<KeyPart>);

impl GroupKey {
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|part| part.label.as_str())
    }

    pub fn matches(&self, labels: &[&str]) -> bool {
        self.0.len() == labels.len()
            && self
                .0
                .iter()
                .zip(labels)
                .all(|(part, label)| part.label == *label)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = self.labels().collect::<Vec<_>>();
        f.write_str(&labels.join(" / "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    Count,
    TotalRevenue,
    AvgCost,
    MedianCost,
    TotalItems,
    AvgItems,
    MedianItems,
}

impl Metric {
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Count => "Count",
            Metric::TotalRevenue => "Total Revenue",
            Metric::AvgCost => "Avg Cost",
            Metric::MedianCost => "Median Cost",
            Metric::TotalItems => "Total Items",
            Metric::AvgItems => "Avg Items",
            Metric::MedianItems => "Median Items",
        }
    }

    pub fn is_money(&self) -> bool {
        matches!(
            self,
            Metric::TotalRevenue | Metric::AvgCost | Metric::MedianCost
        )
    }

    pub fn value(&self, stats: &GroupStats) -> Decimal {
        match self {
            Metric::Count => Decimal::from(stats.count),
            Metric::TotalRevenue => stats.cost_sum,
            Metric::AvgCost => stats.cost_mean,
            Metric::MedianCost => stats.cost_median,
            Metric::TotalItems => Decimal::from(stats.items_sum),
            Metric::AvgItems => stats.items_mean,
            Metric::MedianItems => stats.items_median,
        }
    }

    /// Presentation text: money with the currency symbol, counts as integers.
    pub fn display(&self, stats: &GroupStats, currency: &str) -> String {
        match self {
            Metric::Count => format::count(stats.count),
            Metric::TotalItems => stats.items_sum.to_string(),
            metric if metric.is_money() => format::money(metric.value(stats), currency),
            metric => format::two_places(metric.value(stats)).to_string(),
        }
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        Ok(match normalized.as_str() {
            "count" | "transactions" => Metric::Count,
            "total-revenue" | "revenue" => Metric::TotalRevenue,
            "avg-cost" | "mean-cost" => Metric::AvgCost,
            "median-cost" => Metric::MedianCost,
            "total-items" => Metric::TotalItems,
            "avg-items" | "mean-items" => Metric::AvgItems,
            "median-items" => Metric::MedianItems,
            _ => return Err(anyhow!("Unknown metric '{value}'")),
        })
    }
}

/// Statistics for one partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    pub count: usize,
    pub cost_sum: Decimal,
    pub cost_mean: Decimal,
    pub cost_median: Decimal,
    pub items_sum: i64,
    pub items_mean: Decimal,
    pub items_median: Decimal,
}

#[derive(Default)]
struct GroupAccumulator {
    costs: Vec<Decimal>,
    items: Vec<Decimal>,
    items_sum: i64,
}

impl GroupAccumulator {
    fn ingest(&mut self, row: &Transaction) {
        self.costs.push(row.total_cost);
        self.items.push(Decimal::from(row.total_items));
        self.items_sum += row.total_items;
    }

    fn finish(mut self) -> GroupStats {
        let count = self.costs.len();
        let divisor = Decimal::from(count.max(1));
        let cost_sum = self.costs.iter().copied().sum::<Decimal>();
        GroupStats {
            count,
            cost_sum,
            cost_mean: cost_sum / divisor,
            cost_median: data::median(&mut self.costs).unwrap_or_default(),
            items_sum: self.items_sum,
            items_mean: Decimal::from(self.items_sum) / divisor,
            items_median: data::median(&mut self.items).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRow {
    pub key: GroupKey,
    pub stats: GroupStats,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateTable {
    pub name: String,
    pub dimensions: Vec<Dimension>,
    pub rows: Vec<AggregateRow>,
}

impl AggregateTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn total_count(&self) -> usize {
        self.rows.iter().map(|row| row.stats.count).sum()
    }

    /// Looks up a partition by its key labels, e.g. `&["Winter", "Mall"]`.
    pub fn get(&self, labels: &[&str]) -> Option<&GroupStats> {
        self.rows
            .iter()
            .find(|row| row.key.matches(labels))
            .map(|row| &row.stats)
    }

    pub fn is_inherently_ordered(&self) -> bool {
        self.dimensions.iter().any(Dimension::is_ordered)
    }

    /// Sorts rows descending by `metric` (stable, so ties keep key order).
    /// Tables keyed by weekday or month keep their fixed order.
    pub fn sorted_desc(mut self, metric: Metric) -> Self {
        if !self.is_inherently_ordered() {
            self.rows
                .sort_by(|a, b| metric.value(&b.stats).cmp(&metric.value(&a.stats)));
        }
        self
    }

    /// Keeps only the last `n` rows.
    pub fn last(mut self, n: usize) -> Self {
        let skip = self.rows.len().saturating_sub(n);
        self.rows.drain(..skip);
        self
    }

    pub fn headers(&self, metrics: &[Metric]) -> Vec<String> {
        self.dimensions
            .iter()
            .map(|d| d.label().to_string())
            .chain(metrics.iter().map(|m| m.label().to_string()))
            .collect()
    }

    pub fn render_rows(&self, metrics: &[Metric], currency: &str) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                row.key
                    .labels()
                    .map(str::to_string)
                    .chain(metrics.iter().map(|m| m.display(&row.stats, currency)))
                    .collect()
            })
            .collect()
    }

    pub fn render(&self, metrics: &[Metric], currency: &str) -> String {
        let aligns = self
            .dimensions
            .iter()
            .map(|_| Align::Left)
            .chain(metrics.iter().map(|_| Align::Right))
            .collect::<Vec<_>>();
        table::render_aligned_table(
            &self.headers(metrics),
            &self.render_rows(metrics, currency),
            &aligns,
        )
    }
}

/// Partitions `dataset` by one or two dimensions.
pub fn segment(dataset: &Dataset, dimensions: &[Dimension]) -> Result<AggregateTable> {
    if dimensions.is_empty() || dimensions.len() > 2 {
        bail!(
            "Grouping takes one or two dimensions, got {}",
            dimensions.len()
        );
    }
    let mut groups: BTreeMap<GroupKey, GroupAccumulator> = BTreeMap::new();
    for row in dataset {
        let key = GroupKey(dimensions.iter().map(|d| d.key_of(row)).collect());
        groups.entry(key).or_default().ingest(row);
    }
    let rows = groups
        .into_iter()
        .map(|(key, acc)| AggregateRow {
            key,
            stats: acc.finish(),
        })
        .collect();
    let name = dimensions
        .iter()
        .map(|d| d.label())
        .collect::<Vec<_>>()
        .join(" x ");
    Ok(AggregateTable {
        name,
        dimensions: dimensions.to_vec(),
        rows,
    })
}

/// Row counts for every observed (row key, column key) pair, with margins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crosstab {
    pub rows_by: Dimension,
    pub columns_by: Dimension,
    pub row_keys: Vec<KeyPart>,
    pub column_keys: Vec<KeyPart>,
    counts: BTreeMap<(KeyPart, KeyPart), usize>,
}

impl Crosstab {
    pub fn count(&self, row: &str, column: &str) -> usize {
        self.counts
            .iter()
            .filter(|((r, c), _)| r.label == row && c.label == column)
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn row_total(&self, row: &str) -> usize {
        self.counts
            .iter()
            .filter(|((r, _), _)| r.label == row)
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn column_total(&self, column: &str) -> usize {
        self.counts
            .iter()
            .filter(|((_, c), _)| c.label == column)
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn grand_total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Table form with an `All` column and an `All` row.
    pub fn to_table(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let mut headers = vec![self.rows_by.label().to_string()];
        headers.extend(self.column_keys.iter().map(|k| k.label.clone()));
        headers.push("All".to_string());

        let mut rows = Vec::with_capacity(self.row_keys.len() + 1);
        for row_key in &self.row_keys {
            let mut line = vec![row_key.label.clone()];
            for column_key in &self.column_keys {
                let count = self
                    .counts
                    .get(&(row_key.clone(), column_key.clone()))
                    .copied()
                    .unwrap_or(0);
                line.push(count.to_string());
            }
            line.push(self.row_total(&row_key.label).to_string());
            rows.push(line);
        }
        let mut totals = vec!["All".to_string()];
        totals.extend(
            self.column_keys
                .iter()
                .map(|k| self.column_total(&k.label).to_string()),
        );
        totals.push(self.grand_total().to_string());
        rows.push(totals);
        (headers, rows)
    }
}

pub fn crosstab(dataset: &Dataset, rows_by: Dimension, columns_by: Dimension) -> Crosstab {
    let mut counts = BTreeMap::new();
    let mut row_keys = BTreeSet::new();
    let mut column_keys = BTreeSet::new();
    for row in dataset {
        let r = rows_by.key_of(row);
        let c = columns_by.key_of(row);
        row_keys.insert(r.clone());
        column_keys.insert(c.clone());
        *counts.entry((r, c)).or_insert(0usize) += 1;
    }
    Crosstab {
        rows_by,
        columns_by,
        row_keys: row_keys.into_iter().collect(),
        column_keys: column_keys.into_iter().collect(),
        counts,
    }
}

pub fn execute(args: &SegmentArgs) -> Result<()> {
    let settings = Settings::resolve(
        &args.source,
        Overrides {
            currency: args.currency.as_deref(),
            ..Overrides::default()
        },
    )?;
    let (dataset, _) = loader::load_transactions(&settings.input, &settings.load)?;
    let table = segment(&dataset, &args.by)?.sorted_desc(args.sort);
    let metrics = [
        Metric::Count,
        Metric::TotalRevenue,
        Metric::AvgCost,
        Metric::MedianCost,
        Metric::AvgItems,
    ];
    print!("{}", table.render(&metrics, &settings.currency));
    info!(
        "Grouped {} row(s) into {} partition(s) by {}",
        table.total_count(),
        table.len(),
        table.name
    );
    Ok(())
}
