//! Writes the computed tables to the output directory as CSV, plus a JSON
//! summary. Money columns are plain two-decimal numbers without a currency
//! symbol.

use std::{
    collections::BTreeSet,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::debug;
use serde::Serialize;

use crate::{
    explore::FrequencyRow,
    format,
    insights::Insights,
    io_utils,
    report::{Analysis, SummaryMetrics},
    segment::{AggregateTable, GroupStats, KeyPart, Metric},
};

pub const CATEGORY_SPENDING: &str = "category_spending.csv";
pub const STORE_ITEMS: &str = "store_items.csv";
pub const PROMOTION_COST: &str = "promotion_cost.csv";
pub const DISCOUNT_IMPACT: &str = "discount_impact.csv";
pub const SEASON_REVENUE: &str = "season_revenue.csv";
pub const SEASON_STORE: &str = "season_store.csv";
pub const MONTHLY_REVENUE: &str = "monthly_revenue.csv";
pub const DAY_OF_WEEK: &str = "day_of_week.csv";
pub const SEASON_CATEGORY_AVG_COST: &str = "season_category_avg_cost.csv";
pub const CITY_COUNTS: &str = "city_counts.csv";
pub const SUMMARY_JSON: &str = "summary.json";

const DELIMITER: u8 = b',';

/// Writes every artifact into `dir`, creating it if needed, and returns the
/// paths in the order they were written.
pub fn export_artifacts(dir: &Path, analysis: &Analysis, insights: &Insights) -> Result<Vec<PathBuf>> {
    io_utils::ensure_directory(dir)?;
    let cost_metrics = [
        Metric::Count,
        Metric::TotalRevenue,
        Metric::AvgCost,
        Metric::MedianCost,
        Metric::AvgItems,
    ];
    let item_metrics = [
        Metric::Count,
        Metric::TotalItems,
        Metric::AvgItems,
        Metric::MedianItems,
    ];

    let mut written = Vec::new();
    let aggregates: [(&str, &AggregateTable, &[Metric]); 8] = [
        (CATEGORY_SPENDING, &analysis.by_category, &cost_metrics),
        (STORE_ITEMS, &analysis.by_store, &item_metrics),
        (PROMOTION_COST, &analysis.by_promotion, &cost_metrics),
        (DISCOUNT_IMPACT, &analysis.by_discount, &cost_metrics),
        (SEASON_REVENUE, &analysis.by_season, &cost_metrics),
        (SEASON_STORE, &analysis.season_store, &cost_metrics),
        (MONTHLY_REVENUE, &analysis.monthly, &cost_metrics),
        (DAY_OF_WEEK, &analysis.by_weekday, &cost_metrics),
    ];
    for (file_name, table, metrics) in aggregates {
        let path = dir.join(file_name);
        write_aggregate(&path, table, metrics)?;
        written.push(path);
    }

    let path = dir.join(SEASON_CATEGORY_AVG_COST);
    write_pivot(&path, &analysis.season_category, Metric::AvgCost)?;
    written.push(path);

    let path = dir.join(CITY_COUNTS);
    write_frequencies(&path, "City", &analysis.exploration.top_cities)?;
    written.push(path);

    let path = dir.join(SUMMARY_JSON);
    write_summary(&path, &analysis.summary, insights)?;
    written.push(path);

    for path in &written {
        debug!("Wrote {path:?}");
    }
    Ok(written)
}

fn metric_cell(metric: Metric, stats: &GroupStats) -> String {
    match metric {
        Metric::Count => stats.count.to_string(),
        Metric::TotalItems => stats.items_sum.to_string(),
        other => format::two_places(other.value(stats)).to_string(),
    }
}

/// One line per partition: key columns, then one column per metric.
pub fn write_aggregate(path: &Path, table: &AggregateTable, metrics: &[Metric]) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, DELIMITER)?;
    writer
        .write_record(table.headers(metrics))
        .with_context(|| format!("Writing headers to {path:?}"))?;
    for row in &table.rows {
        let record = row
            .key
            .labels()
            .map(str::to_string)
            .chain(metrics.iter().map(|m| metric_cell(*m, &row.stats)))
            .collect_vec();
        writer
            .write_record(&record)
            .with_context(|| format!("Writing row to {path:?}"))?;
    }
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}

/// Spreads a two-dimension table into a grid: first key down, second key
/// across. Combinations absent from the data are left empty.
pub fn write_pivot(path: &Path, table: &AggregateTable, metric: Metric) -> Result<()> {
    let mut row_keys = BTreeSet::<&KeyPart>::new();
    let mut column_keys = BTreeSet::<&KeyPart>::new();
    for row in &table.rows {
        if let [first, second] = row.key.0.as_slice() {
            row_keys.insert(first);
            column_keys.insert(second);
        }
    }

    let mut writer = io_utils::open_csv_writer(path, DELIMITER)?;
    let corner = table
        .dimensions
        .first()
        .map(|d| d.label().to_string())
        .unwrap_or_default();
    let headers = std::iter::once(corner)
        .chain(column_keys.iter().map(|k| k.label.clone()))
        .collect_vec();
    writer
        .write_record(&headers)
        .with_context(|| format!("Writing headers to {path:?}"))?;
    for row_key in &row_keys {
        let mut record = vec![row_key.label.clone()];
        for column_key in &column_keys {
            let cell = table
                .get(&[row_key.label.as_str(), column_key.label.as_str()])
                .map(|stats| metric_cell(metric, stats))
                .unwrap_or_default();
            record.push(cell);
        }
        writer
            .write_record(&record)
            .with_context(|| format!("Writing row to {path:?}"))?;
    }
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}

pub fn write_frequencies(path: &Path, caption: &str, rows: &[FrequencyRow]) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path, DELIMITER)?;
    writer
        .write_record([caption, "Count", "Percent"])
        .with_context(|| format!("Writing headers to {path:?}"))?;
    for row in rows {
        writer
            .write_record([
                row.value.clone(),
                row.count.to_string(),
                format!("{:.2}", row.percent),
            ])
            .with_context(|| format!("Writing row to {path:?}"))?;
    }
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}

#[derive(Serialize)]
struct SummaryDocument<'a> {
    summary: &'a SummaryMetrics,
    insights: &'a Insights,
}

fn write_summary(path: &Path, summary: &SummaryMetrics, insights: &Insights) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Creating {path:?}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &SummaryDocument { summary, insights })
        .with_context(|| format!("Serializing summary to {path:?}"))?;
    writeln!(writer).with_context(|| format!("Writing {path:?}"))?;
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}
