//! Read-only exploration queries: overview counts, frequency rankings and
//! numeric summaries.

use std::{
    collections::{HashMap, HashSet},
    fmt::Write as _,
};

use anyhow::Result;
use log::info;
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::Serialize;

use crate::{
    cli::ExploreArgs,
    config::{Overrides, Settings},
    data::{self, Discount},
    format, loader,
    loader::Dataset,
    segment::Dimension,
    table::{self, Align},
};

pub fn execute(args: &ExploreArgs) -> Result<()> {
    let settings = Settings::resolve(
        &args.source,
        Overrides {
            top_products: args.top_products,
            top_cities: args.top_cities,
            currency: args.currency.as_deref(),
            ..Overrides::default()
        },
    )?;
    let (dataset, _) = loader::load_transactions(&settings.input, &settings.load)?;
    let exploration = explore(&dataset, settings.top_products, settings.top_cities);
    print!("{}", render_exploration(&exploration, &settings.currency));
    info!("Explored {} transaction(s)", exploration.overview.transactions);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyRow {
    pub value: String,
    pub count: usize,
    pub percent: f64,
}

/// Value counter that remembers first-encounter order, so equal counts rank
/// in the order the values first appeared.
#[derive(Debug, Clone, Default)]
pub struct FrequencyCounter {
    entries: Vec<(String, usize)>,
    positions: HashMap<String, usize>,
    total: usize,
}

impl FrequencyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, value: &str) {
        self.total += 1;
        match self.positions.get(value) {
            Some(&idx) => self.entries[idx].1 += 1,
            None => {
                self.positions.insert(value.to_string(), self.entries.len());
                self.entries.push((value.to_string(), 1));
            }
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    pub fn count_of(&self, value: &str) -> usize {
        self.positions
            .get(value)
            .map(|&idx| self.entries[idx].1)
            .unwrap_or(0)
    }

    /// The `top` most frequent values (`0` returns every value).
    pub fn top(&self, top: usize) -> Vec<FrequencyRow> {
        let mut ranked = self.entries.iter().collect::<Vec<_>>();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        if top > 0 && ranked.len() > top {
            ranked.truncate(top);
        }
        ranked
            .into_iter()
            .map(|(value, count)| FrequencyRow {
                value: value.clone(),
                count: *count,
                percent: if self.total == 0 {
                    0.0
                } else {
                    (*count as f64 / self.total as f64) * 100.0
                },
            })
            .collect()
    }
}

pub fn value_counter(dataset: &Dataset, dimension: Dimension) -> FrequencyCounter {
    let mut counter = FrequencyCounter::new();
    for row in dataset {
        counter.ingest(&dimension.key_of(row).label);
    }
    counter
}

/// Most frequent values of a categorical column with their share of rows.
pub fn value_frequencies(dataset: &Dataset, dimension: Dimension, top: usize) -> Vec<FrequencyRow> {
    value_counter(dataset, dimension).top(top)
}

/// Every product mention, split from the comma-separated product cells.
pub fn product_counter(dataset: &Dataset) -> FrequencyCounter {
    let mut counter = FrequencyCounter::new();
    for row in dataset {
        for product in row.product_names() {
            counter.ingest(product);
        }
    }
    counter
}

pub fn distinct_values(dataset: &Dataset, dimension: Dimension) -> usize {
    dataset
        .iter()
        .map(|row| dimension.key_of(row).label)
        .collect::<HashSet<_>>()
        .len()
}

pub fn unique_customers(dataset: &Dataset) -> usize {
    dataset
        .iter()
        .map(|row| row.customer_name.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Share of transactions with a discount applied, in percent.
pub fn discount_rate(dataset: &Dataset) -> f64 {
    if dataset.is_empty() {
        return 0.0;
    }
    let discounted = dataset
        .iter()
        .filter(|row| row.discount == Discount::Yes)
        .count();
    (discounted as f64 / dataset.len() as f64) * 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Measure {
    Cost,
    Items,
}

impl Measure {
    pub fn of(&self, row: &data::Transaction) -> Decimal {
        match self {
            Measure::Cost => row.total_cost,
            Measure::Items => Decimal::from(row.total_items),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub sum: Decimal,
    pub mean: Option<Decimal>,
    pub median: Option<Decimal>,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    pub std_dev: Option<f64>,
}

pub fn numeric_summary(dataset: &Dataset, measure: Measure) -> NumericSummary {
    let mut stats = SummaryAccumulator::default();
    for row in dataset {
        stats.add_value(measure.of(row));
    }
    stats.finish()
}

#[derive(Default)]
struct SummaryAccumulator {
    values: Vec<Decimal>,
    sum: Decimal,
    sum_squares: f64,
    min: Option<Decimal>,
    max: Option<Decimal>,
}

impl SummaryAccumulator {
    fn add_value(&mut self, value: Decimal) {
        let numeric = value.to_f64().unwrap_or_default();
        self.sum += value;
        self.sum_squares += numeric * numeric;
        self.min = Some(match self.min {
            Some(current) => current.min(value),
            None => value,
        });
        self.max = Some(match self.max {
            Some(current) => current.max(value),
            None => value,
        });
        self.values.push(value);
    }

    fn mean(&self) -> Option<Decimal> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / Decimal::from(self.values.len()))
        }
    }

    // Sample standard deviation (n - 1), as pandas reports it.
    fn std_dev(&self) -> Option<f64> {
        let count = self.values.len();
        if count < 2 {
            return None;
        }
        let mean = self.mean()?.to_f64()?;
        let variance = (self.sum_squares - count as f64 * mean * mean) / (count as f64 - 1.0);
        Some(variance.max(0.0).sqrt())
    }

    fn finish(mut self) -> NumericSummary {
        let mean = self.mean();
        let std_dev = self.std_dev();
        NumericSummary {
            count: self.values.len(),
            sum: self.sum,
            mean,
            median: data::median(&mut self.values),
            min: self.min,
            max: self.max,
            std_dev,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub transactions: usize,
    pub unique_customers: usize,
}

impl Overview {
    pub fn per_customer(&self) -> Option<f64> {
        (self.unique_customers > 0)
            .then(|| self.transactions as f64 / self.unique_customers as f64)
    }
}

#[derive(Debug, Clone)]
pub struct Exploration {
    pub overview: Overview,
    pub products: FrequencyCounter,
    pub top_products: Vec<FrequencyRow>,
    pub top_cities: Vec<FrequencyRow>,
    pub cost: NumericSummary,
    pub items: NumericSummary,
}

pub fn explore(dataset: &Dataset, top_products: usize, top_cities: usize) -> Exploration {
    let products = product_counter(dataset);
    let top_products = products.top(top_products);
    Exploration {
        overview: Overview {
            transactions: dataset.len(),
            unique_customers: unique_customers(dataset),
        },
        products,
        top_products,
        top_cities: value_frequencies(dataset, Dimension::City, top_cities),
        cost: numeric_summary(dataset, Measure::Cost),
        items: numeric_summary(dataset, Measure::Items),
    }
}

pub fn render_exploration(exploration: &Exploration, currency: &str) -> String {
    let mut out = String::new();
    let overview = &exploration.overview;
    let _ = writeln!(out, "Transaction & customer statistics");
    let _ = writeln!(out, "  Total transactions: {}", format::count(overview.transactions));
    let _ = writeln!(
        out,
        "  Unique customers: {}",
        format::count(overview.unique_customers)
    );
    if let Some(per_customer) = overview.per_customer() {
        let _ = writeln!(out, "  Avg transactions per customer: {per_customer:.2}");
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Top {} products", exploration.top_products.len());
    let rows = exploration
        .top_products
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            vec![
                (idx + 1).to_string(),
                row.value.clone(),
                format::count(row.count),
            ]
        })
        .collect::<Vec<_>>();
    out.push_str(&table::render_aligned_table(
        &["#".to_string(), "Product".to_string(), "Times".to_string()],
        &rows,
        &[Align::Right, Align::Left, Align::Right],
    ));
    let _ = writeln!(out, "  Total unique products: {}", exploration.products.distinct());

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Top {} cities by transaction count",
        exploration.top_cities.len()
    );
    let rows = exploration
        .top_cities
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            vec![
                (idx + 1).to_string(),
                row.value.clone(),
                format::count(row.count),
                format::percent(row.percent, 1),
            ]
        })
        .collect::<Vec<_>>();
    out.push_str(&table::render_aligned_table(
        &[
            "#".to_string(),
            "City".to_string(),
            "Transactions".to_string(),
            "Share".to_string(),
        ],
        &rows,
        &[Align::Right, Align::Left, Align::Right, Align::Right],
    ));

    let money = |value: Option<Decimal>| {
        value
            .map(|v| format::money(v, currency))
            .unwrap_or_default()
    };
    let _ = writeln!(out);
    let _ = writeln!(out, "Revenue statistics");
    let cost = &exploration.cost;
    let _ = writeln!(out, "  Total revenue: {}", format::money(cost.sum, currency));
    let _ = writeln!(out, "  Average transaction: {}", money(cost.mean));
    let _ = writeln!(out, "  Median transaction: {}", money(cost.median));
    let _ = writeln!(out, "  Min transaction: {}", money(cost.min));
    let _ = writeln!(out, "  Max transaction: {}", money(cost.max));
    let std_dev = cost
        .std_dev
        .and_then(Decimal::from_f64_retain)
        .map(|v| format::money(v, currency))
        .unwrap_or_default();
    let _ = writeln!(out, "  Std deviation: {std_dev}");

    let _ = writeln!(out);
    let _ = writeln!(out, "Item statistics");
    let items = &exploration.items;
    let _ = writeln!(
        out,
        "  Total items sold: {}",
        format::whole(items.sum)
    );
    let _ = writeln!(
        out,
        "  Average items/transaction: {}",
        items.mean.map(format::two_places).unwrap_or_default()
    );
    let _ = writeln!(
        out,
        "  Median items/transaction: {}",
        items.median.map(format::two_places).unwrap_or_default()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_ranks_ties_by_first_encounter() {
        let mut counter = FrequencyCounter::new();
        for value in ["Soap", "Milk", "Bread", "Milk", "Bread", "Eggs"] {
            counter.ingest(value);
        }
        let top = counter.top(3);
        let values = top.iter().map(|row| row.value.as_str()).collect::<Vec<_>>();
        assert_eq!(values, vec!["Milk", "Bread", "Soap"]);
        assert_eq!(counter.distinct(), 4);
        assert_eq!(counter.count_of("Eggs"), 1);
        assert_eq!(counter.count_of("Tea"), 0);
    }

    #[test]
    fn counter_percentages_use_total_mentions() {
        let mut counter = FrequencyCounter::new();
        for value in ["x", "y", "x", "x"] {
            counter.ingest(value);
        }
        let top = counter.top(1);
        assert_eq!(top[0].value, "x");
        assert_eq!(top[0].percent, 75.0);
        assert_eq!(counter.top(0).len(), 2);
    }

    #[test]
    fn summary_uses_sample_standard_deviation() {
        let mut acc = SummaryAccumulator::default();
        for value in [2, 4, 4, 4, 5, 5, 7, 9] {
            acc.add_value(Decimal::from(value));
        }
        let summary = acc.finish();
        assert_eq!(summary.mean, Some(Decimal::from(5)));
        assert_eq!(summary.median, Some(Decimal::new(45, 1)));
        assert_eq!(summary.min, Some(Decimal::from(2)));
        assert_eq!(summary.max, Some(Decimal::from(9)));
        let std_dev = summary.std_dev.expect("std dev");
        assert!((std_dev - 2.138_089_935).abs() < 1e-6);
    }

    fn row(items: i64) -> data::Transaction {
        let timestamp = data::parse_timestamp("2023-05-01 10:00:00").expect("timestamp");
        data::Transaction {
            customer_name: "Ann".to_string(),
            customer_category: "Student".to_string(),
            city: "Pune".to_string(),
            store_type: "Pharmacy".to_string(),
            timestamp,
            total_cost: Decimal::from(10),
            total_items: items,
            products: "Milk".to_string(),
            payment_method: "Cash".to_string(),
            discount: data::Discount::No,
            promotion: "None".to_string(),
            season: "Spring".to_string(),
            calendar: data::Calendar::from_timestamp(&timestamp),
        }
    }

    #[test]
    fn rendered_item_total_keeps_its_sign() {
        let dataset = Dataset::new(vec![row(-4), row(1)]);
        let text = render_exploration(&explore(&dataset, 5, 10), "$");
        assert!(text.contains("Total items sold: -3"), "{text}");
    }

    #[test]
    fn summary_of_single_value_has_no_std_dev() {
        let mut acc = SummaryAccumulator::default();
        acc.add_value(Decimal::from(3));
        assert_eq!(acc.finish().std_dev, None);
    }
}
