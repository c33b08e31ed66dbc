//! The full analysis pipeline behind `report`.
//!
//! [`analyse`] computes every table once; [`render_report`] turns them into
//! deterministic text and [`crate::export`] writes them to disk. Rendering
//! never recomputes anything, so the console and the exported files always
//! agree.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    cli::ReportArgs,
    config::{Overrides, Settings},
    explore::{self, Exploration, FrequencyRow},
    export, format,
    insights::{self, InsightSources, Insights},
    loader::{self, Dataset, LoadSummary},
    segment::{self, AggregateTable, Crosstab, Dimension, Metric},
    table::{self, Align},
};

const RULE_WIDTH: usize = 70;
const MONTHS_SHOWN: usize = 12;
const DERIVED_FIELDS: [&str; 5] = ["Year", "Month", "Month_Name", "DayOfWeek", "Week"];

pub fn execute(args: &ReportArgs) -> Result<()> {
    let settings = Settings::resolve(
        &args.source,
        Overrides {
            output_dir: args.output_dir.as_deref(),
            top_products: args.top_products,
            top_cities: args.top_cities,
            currency: args.currency.as_deref(),
            no_export: args.no_export,
        },
    )?;
    let (dataset, load) = loader::load_transactions(&settings.input, &settings.load)?;
    let analysis = analyse(&dataset, settings.top_products, settings.top_cities)?;
    let insights =
        insights::derive_insights(&analysis.sources()).context("Deriving key insights")?;

    print!(
        "{}",
        render_report(&load, &analysis, &insights, &settings.currency)
    );

    if settings.export {
        let written = export::export_artifacts(&settings.output_dir, &analysis, &insights)?;
        info!(
            "Exported {} file(s) to {:?}",
            written.len(),
            settings.output_dir
        );
    } else {
        info!("Export disabled; no files written");
    }
    Ok(())
}

/// Headline figures for the final summary and `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMetrics {
    pub total_transactions: usize,
    pub unique_customers: usize,
    pub total_revenue: Decimal,
    pub average_transaction: Decimal,
    pub total_items: i64,
    pub average_items: Decimal,
    pub unique_products: usize,
    pub cities: usize,
    pub store_types: usize,
    pub payment_methods: usize,
    pub customer_categories: usize,
    pub promotions: usize,
    pub discount_rate: f64,
}

impl SummaryMetrics {
    fn collect(dataset: &Dataset, exploration: &Exploration) -> Self {
        let total_items = dataset.iter().map(|row| row.total_items).sum::<i64>();
        SummaryMetrics {
            total_transactions: dataset.len(),
            unique_customers: exploration.overview.unique_customers,
            total_revenue: format::two_places(exploration.cost.sum),
            average_transaction: format::two_places(exploration.cost.mean.unwrap_or_default()),
            total_items,
            average_items: format::two_places(exploration.items.mean.unwrap_or_default()),
            unique_products: exploration.products.distinct(),
            cities: explore::distinct_values(dataset, Dimension::City),
            store_types: explore::distinct_values(dataset, Dimension::StoreType),
            payment_methods: explore::distinct_values(dataset, Dimension::PaymentMethod),
            customer_categories: explore::distinct_values(dataset, Dimension::CustomerCategory),
            promotions: explore::distinct_values(dataset, Dimension::Promotion),
            discount_rate: explore::discount_rate(dataset),
        }
    }

    pub fn rows(&self, currency: &str) -> Vec<(&'static str, String)> {
        vec![
            ("Total Transactions", format::count(self.total_transactions)),
            ("Unique Customers", format::count(self.unique_customers)),
            ("Total Revenue", format::money(self.total_revenue, currency)),
            (
                "Average Transaction Value",
                format::money(self.average_transaction, currency),
            ),
            ("Total Items Sold", self.total_items.to_string()),
            ("Average Items per Transaction", self.average_items.to_string()),
            ("Unique Products", format::count(self.unique_products)),
            ("Cities", format::count(self.cities)),
            ("Store Types", format::count(self.store_types)),
            ("Payment Methods", format::count(self.payment_methods)),
            ("Customer Categories", format::count(self.customer_categories)),
            ("Promotion Types", format::count(self.promotions)),
            ("Discount Rate", format::percent(self.discount_rate, 2)),
        ]
    }
}

/// Every table the report prints or exports.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub exploration: Exploration,
    pub by_category: AggregateTable,
    pub payment_by_category: Crosstab,
    pub by_store: AggregateTable,
    pub by_discount: AggregateTable,
    pub by_promotion: AggregateTable,
    pub by_season: AggregateTable,
    pub season_store: AggregateTable,
    pub season_category: AggregateTable,
    pub monthly: AggregateTable,
    pub by_weekday: AggregateTable,
    pub payment_ranking: Vec<FrequencyRow>,
    pub summary: SummaryMetrics,
}

impl Analysis {
    pub fn sources(&self) -> InsightSources<'_> {
        InsightSources {
            by_category: &self.by_category,
            by_promotion: &self.by_promotion,
            by_discount: &self.by_discount,
            by_season: &self.by_season,
            by_store: &self.by_store,
            payment_ranking: &self.payment_ranking,
            city_ranking: &self.exploration.top_cities,
        }
    }
}

pub fn analyse(dataset: &Dataset, top_products: usize, top_cities: usize) -> Result<Analysis> {
    let exploration = explore::explore(dataset, top_products, top_cities);
    let summary = SummaryMetrics::collect(dataset, &exploration);
    let analysis = Analysis {
        by_category: segment::segment(dataset, &[Dimension::CustomerCategory])?
            .sorted_desc(Metric::AvgCost),
        payment_by_category: segment::crosstab(
            dataset,
            Dimension::CustomerCategory,
            Dimension::PaymentMethod,
        ),
        by_store: segment::segment(dataset, &[Dimension::StoreType])?,
        by_discount: segment::segment(dataset, &[Dimension::Discount])?,
        by_promotion: segment::segment(dataset, &[Dimension::Promotion])?
            .sorted_desc(Metric::AvgCost),
        by_season: segment::segment(dataset, &[Dimension::Season])?
            .sorted_desc(Metric::TotalRevenue),
        season_store: segment::segment(dataset, &[Dimension::Season, Dimension::StoreType])?,
        season_category: segment::segment(
            dataset,
            &[Dimension::Season, Dimension::CustomerCategory],
        )?,
        monthly: segment::segment(dataset, &[Dimension::Month])?,
        by_weekday: segment::segment(dataset, &[Dimension::DayOfWeek])?,
        payment_ranking: explore::value_frequencies(dataset, Dimension::PaymentMethod, 0),
        exploration,
        summary,
    };
    info!(
        "Computed {} category, {} store, {} season and {} month partition(s)",
        analysis.by_category.len(),
        analysis.by_store.len(),
        analysis.by_season.len(),
        analysis.monthly.len()
    );
    Ok(analysis)
}

fn heading(out: &mut String, title: &str) {
    let rule = "=".repeat(RULE_WIDTH);
    let _ = writeln!(out);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{rule}");
}

fn subheading(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{title}");
}

fn push_table(out: &mut String, table: &AggregateTable, metrics: &[Metric], currency: &str) {
    out.push_str(&table.render(metrics, currency));
}

fn render_preparation(out: &mut String, load: &LoadSummary) {
    heading(out, "DATA PREPARATION");
    let _ = writeln!(
        out,
        "Rows read: {} ({} columns)",
        format::count(load.rows_read),
        load.columns
    );
    if load.rows_skipped > 0 {
        let _ = writeln!(
            out,
            "Rows skipped (unparseable date): {}",
            format::count(load.rows_skipped)
        );
    }
    if !load.ignored_columns.is_empty() {
        let _ = writeln!(out, "Ignored columns: {}", load.ignored_columns.iter().join(", "));
    }
    let cleaning = &load.cleaning;
    let _ = writeln!(
        out,
        "Duplicate rows removed: {}",
        format::count(cleaning.duplicates_removed)
    );
    let _ = writeln!(
        out,
        "Missing values imputed: {}",
        format::count(cleaning.missing_values())
    );
    if !cleaning.imputed.is_empty() {
        let rows = cleaning
            .imputed
            .iter()
            .map(|column| {
                vec![
                    column.column.to_string(),
                    format::count(column.count),
                    column.replacement.clone(),
                ]
            })
            .collect_vec();
        out.push_str(&table::render_aligned_table(
            &[
                "Column".to_string(),
                "Filled".to_string(),
                "Replacement".to_string(),
            ],
            &rows,
            &[Align::Left, Align::Right, Align::Left],
        ));
    }
    if load.season_derived {
        let _ = writeln!(out, "Season derived from transaction month");
    }
    let _ = writeln!(out, "Derived fields: {}", DERIVED_FIELDS.iter().join(", "));
    let _ = writeln!(out, "Rows after cleaning: {}", format::count(load.rows_retained()));
}

fn render_behaviour(out: &mut String, analysis: &Analysis, insights: &Insights, currency: &str) {
    heading(out, "CUSTOMER BEHAVIOUR");
    subheading(out, "Spending by customer category");
    push_table(
        out,
        &analysis.by_category,
        &[Metric::AvgCost, Metric::MedianCost, Metric::TotalRevenue, Metric::Count],
        currency,
    );
    let _ = writeln!(
        out,
        "Highest average spend: {} ({})",
        insights.top_category.key,
        format::money(insights.top_category.value, currency)
    );

    subheading(out, "Payment methods by customer category");
    let (headers, rows) = analysis.payment_by_category.to_table();
    let aligns = (0..headers.len())
        .map(|idx| if idx == 0 { Align::Left } else { Align::Right })
        .collect_vec();
    out.push_str(&table::render_aligned_table(&headers, &rows, &aligns));
    let _ = writeln!(
        out,
        "Most used payment method: {} ({})",
        insights.top_payment.value,
        format::percent(insights.top_payment.percent, 1)
    );

    subheading(out, "Items per transaction by store type");
    push_table(
        out,
        &analysis.by_store,
        &[Metric::AvgItems, Metric::MedianItems, Metric::TotalItems, Metric::Count],
        currency,
    );
}

fn render_promotions(out: &mut String, analysis: &Analysis, insights: &Insights, currency: &str) {
    heading(out, "PROMOTION & DISCOUNT");
    subheading(out, "Transaction value by promotion");
    push_table(
        out,
        &analysis.by_promotion,
        &[Metric::AvgCost, Metric::MedianCost, Metric::Count, Metric::TotalRevenue],
        currency,
    );
    let _ = writeln!(
        out,
        "Most effective promotion: {} ({})",
        insights.best_promotion.key,
        format::money(insights.best_promotion.value, currency)
    );

    subheading(out, "Transaction value by discount");
    push_table(
        out,
        &analysis.by_discount,
        &[Metric::AvgCost, Metric::MedianCost, Metric::Count, Metric::AvgItems],
        currency,
    );
    let discount = &insights.discount;
    let _ = writeln!(
        out,
        "With discount: {}",
        format::money(discount.with_discount, currency)
    );
    let _ = writeln!(
        out,
        "Without discount: {}",
        format::money(discount.without_discount, currency)
    );
    let _ = writeln!(
        out,
        "Difference: {}",
        format::signed_percent(discount.difference_pct)
    );
    let _ = writeln!(
        out,
        "Discount rate: {} of transactions",
        format::percent(analysis.summary.discount_rate, 2)
    );
}

fn render_seasonality(out: &mut String, analysis: &Analysis, insights: &Insights, currency: &str) {
    heading(out, "SEASONALITY");
    subheading(out, "Revenue by season");
    push_table(
        out,
        &analysis.by_season,
        &[Metric::TotalRevenue, Metric::AvgCost, Metric::Count],
        currency,
    );
    let _ = writeln!(
        out,
        "Highest revenue season: {} ({})",
        insights.seasons.peak.key,
        format::money(insights.seasons.peak.value, currency)
    );

    subheading(out, "Revenue by season and store type");
    push_table(
        out,
        &analysis.season_store,
        &[Metric::TotalRevenue, Metric::AvgCost, Metric::Count],
        currency,
    );

    let recent = analysis.monthly.clone().last(MONTHS_SHOWN);
    subheading(out, &format!("Monthly revenue (last {} months)", recent.len()));
    push_table(
        out,
        &recent,
        &[Metric::TotalRevenue, Metric::Count, Metric::AvgCost],
        currency,
    );

    subheading(out, "Transactions by day of week");
    push_table(
        out,
        &analysis.by_weekday,
        &[Metric::Count, Metric::TotalRevenue, Metric::AvgCost],
        currency,
    );
}

/// One sentence per finding, in a fixed order.
pub fn insight_lines(insights: &Insights, currency: &str) -> Vec<String> {
    let discount = &insights.discount;
    let direction = if discount.lowers_spend() {
        "lower"
    } else if discount.difference_pct.is_zero() {
        "do not change"
    } else {
        "raise"
    };
    let seasons = &insights.seasons;
    vec![
        format!(
            "{} customers spend the most per transaction ({}).",
            insights.top_category.key,
            format::money(insights.top_category.value, currency)
        ),
        format!(
            "'{}' is the most effective promotion by average transaction value ({}).",
            insights.best_promotion.key,
            format::money(insights.best_promotion.value, currency)
        ),
        format!(
            "Discounts {direction} transaction value: {} with vs {} without ({}).",
            format::money(discount.with_discount, currency),
            format::money(discount.without_discount, currency),
            format::signed_percent(discount.difference_pct)
        ),
        format!(
            "{} is the peak season ({}); {} is the lowest ({}), a {}% spread.",
            seasons.peak.key,
            format::money(seasons.peak.value, currency),
            seasons.lowest.key,
            format::money(seasons.lowest.value, currency),
            format::two_places(seasons.difference_pct)
        ),
        format!(
            "{} stores have the largest baskets ({} items per transaction).",
            insights.largest_basket.key,
            format::two_places(insights.largest_basket.value)
        ),
        format!(
            "{} is the most used payment method ({} of transactions).",
            insights.top_payment.value,
            format::percent(insights.top_payment.percent, 1)
        ),
        format!(
            "{} leads all cities with {} of transactions.",
            insights.top_city.value,
            format::percent(insights.top_city.percent, 1)
        ),
    ]
}

/// The complete console report. Identical inputs give identical text.
pub fn render_report(
    load: &LoadSummary,
    analysis: &Analysis,
    insights: &Insights,
    currency: &str,
) -> String {
    let mut out = String::new();
    render_preparation(&mut out, load);

    heading(&mut out, "EXPLORATION");
    out.push_str(&explore::render_exploration(&analysis.exploration, currency));

    render_behaviour(&mut out, analysis, insights, currency);
    render_promotions(&mut out, analysis, insights, currency);
    render_seasonality(&mut out, analysis, insights, currency);

    heading(&mut out, "KEY INSIGHTS");
    for (idx, line) in insight_lines(insights, currency).iter().enumerate() {
        let _ = writeln!(out, "{}. {line}", idx + 1);
    }

    heading(&mut out, "FINAL SUMMARY");
    let rows = analysis
        .summary
        .rows(currency)
        .into_iter()
        .map(|(metric, value)| vec![metric.to_string(), value])
        .collect_vec();
    out.push_str(&table::render_aligned_table(
        &["Metric".to_string(), "Value".to_string()],
        &rows,
        &[Align::Left, Align::Right],
    ));
    out
}
