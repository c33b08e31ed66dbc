//! Qualitative findings derived from already computed aggregate tables.
//!
//! Nothing here reads the dataset. Each figure comes from a table built by
//! the segmenter or the explorer, and any question asked of an empty table
//! fails with [`InsightError::DegenerateAggregate`] instead of returning a
//! default.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    error::InsightError,
    explore::FrequencyRow,
    segment::{AggregateRow, AggregateTable, Metric},
};

/// Row with the largest `metric`; the first such row wins ties.
pub fn argmax(table: &AggregateTable, metric: Metric) -> Result<&AggregateRow, InsightError> {
    pick(table, metric, |candidate, best| candidate > best)
}

/// Row with the smallest `metric`; the first such row wins ties.
pub fn argmin(table: &AggregateTable, metric: Metric) -> Result<&AggregateRow, InsightError> {
    pick(table, metric, |candidate, best| candidate < best)
}

fn pick(
    table: &AggregateTable,
    metric: Metric,
    better: impl Fn(Decimal, Decimal) -> bool,
) -> Result<&AggregateRow, InsightError> {
    let mut rows = table.rows.iter();
    let mut best = rows.next().ok_or_else(|| {
        InsightError::degenerate(
            &table.name,
            format!("no groups to rank by {}", metric.label()),
        )
    })?;
    for row in rows {
        if better(metric.value(&row.stats), metric.value(&best.stats)) {
            best = row;
        }
    }
    Ok(best)
}

/// `(a - b) / b * 100`.
pub fn percent_difference(a: Decimal, b: Decimal, context: &str) -> Result<Decimal, InsightError> {
    if b.is_zero() {
        return Err(InsightError::degenerate(
            context,
            "baseline is zero, percentage difference is undefined",
        ));
    }
    Ok((a - b) / b * Decimal::ONE_HUNDRED)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscountImpact {
    pub with_discount: Decimal,
    pub without_discount: Decimal,
    pub difference_pct: Decimal,
}

impl DiscountImpact {
    pub fn lowers_spend(&self) -> bool {
        self.difference_pct.is_sign_negative() && !self.difference_pct.is_zero()
    }
}

/// Compares mean cost of discounted and undiscounted transactions.
pub fn discount_impact(by_discount: &AggregateTable) -> Result<DiscountImpact, InsightError> {
    let mean_of = |label: &str| {
        by_discount
            .get(&[label])
            .map(|stats| stats.cost_mean)
            .ok_or_else(|| {
                InsightError::degenerate(
                    &by_discount.name,
                    format!("no transactions with discount = {label}"),
                )
            })
    };
    let with_discount = mean_of("Yes")?;
    let without_discount = mean_of("No")?;
    Ok(DiscountImpact {
        with_discount,
        without_discount,
        difference_pct: percent_difference(with_discount, without_discount, &by_discount.name)?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ranked {
    pub key: String,
    pub value: Decimal,
}

impl Ranked {
    fn from_row(row: &AggregateRow, metric: Metric) -> Self {
        Ranked {
            key: row.key.to_string(),
            value: metric.value(&row.stats),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeasonalSpread {
    pub peak: Ranked,
    pub lowest: Ranked,
    pub difference_pct: Decimal,
}

pub fn seasonal_spread(by_season: &AggregateTable) -> Result<SeasonalSpread, InsightError> {
    let peak = Ranked::from_row(argmax(by_season, Metric::TotalRevenue)?, Metric::TotalRevenue);
    let lowest = Ranked::from_row(argmin(by_season, Metric::TotalRevenue)?, Metric::TotalRevenue);
    let difference_pct = percent_difference(peak.value, lowest.value, &by_season.name)?;
    Ok(SeasonalSpread {
        peak,
        lowest,
        difference_pct,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leader {
    pub value: String,
    pub count: usize,
    pub percent: f64,
}

/// First entry of a frequency ranking.
pub fn leader(ranking: &[FrequencyRow], context: &str) -> Result<Leader, InsightError> {
    ranking
        .first()
        .map(|row| Leader {
            value: row.value.clone(),
            count: row.count,
            percent: row.percent,
        })
        .ok_or_else(|| InsightError::degenerate(context, "no values observed"))
}

/// The set of findings printed under "Key insights".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub top_category: Ranked,
    pub best_promotion: Ranked,
    pub discount: DiscountImpact,
    pub seasons: SeasonalSpread,
    pub largest_basket: Ranked,
    pub top_payment: Leader,
    pub top_city: Leader,
}

pub struct InsightSources<'a> {
    pub by_category: &'a AggregateTable,
    pub by_promotion: &'a AggregateTable,
    pub by_discount: &'a AggregateTable,
    pub by_season: &'a AggregateTable,
    pub by_store: &'a AggregateTable,
    pub payment_ranking: &'a [FrequencyRow],
    pub city_ranking: &'a [FrequencyRow],
}

pub fn derive_insights(sources: &InsightSources<'_>) -> Result<Insights, InsightError> {
    Ok(Insights {
        top_category: Ranked::from_row(
            argmax(sources.by_category, Metric::AvgCost)?,
            Metric::AvgCost,
        ),
        best_promotion: Ranked::from_row(
            argmax(sources.by_promotion, Metric::AvgCost)?,
            Metric::AvgCost,
        ),
        discount: discount_impact(sources.by_discount)?,
        seasons: seasonal_spread(sources.by_season)?,
        largest_basket: Ranked::from_row(
            argmax(sources.by_store, Metric::AvgItems)?,
            Metric::AvgItems,
        ),
        top_payment: leader(sources.payment_ranking, "Payment_Method")?,
        top_city: leader(sources.city_ranking, "City")?,
    })
}
