mod common;

use retail_insights::{
    explore::{self, FrequencyCounter, Measure},
    loader::{self, LoadOptions},
    segment::Dimension,
};
use rust_decimal::Decimal;

use common::TestWorkspace;

#[test]
fn majority_value_takes_three_quarters() {
    let mut counter = FrequencyCounter::new();
    for value in ["x", "y", "x", "x"] {
        counter.ingest(value);
    }
    let top = counter.top(1);
    assert_eq!(top[0].value, "x");
    assert_eq!(top[0].count, 3);
    assert!((top[0].percent - 75.0).abs() < f64::EPSILON);
}

#[test]
fn top_cities_are_non_increasing_and_within_total() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_sample();
    let (dataset, _) =
        loader::load_transactions(&path, &LoadOptions::for_path(&path)).expect("load");
    let cities = explore::value_frequencies(&dataset, Dimension::City, 10);

    let names = cities.iter().map(|row| row.value.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["Pune", "Delhi", "Mumbai"]);
    assert!(cities.windows(2).all(|pair| pair[0].percent >= pair[1].percent));
    let total = cities.iter().map(|row| row.percent).sum::<f64>();
    assert!(total <= 100.0 + 1e-9);
}

#[test]
fn products_are_split_and_counted_per_mention() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_sample();
    let (dataset, _) =
        loader::load_transactions(&path, &LoadOptions::for_path(&path)).expect("load");
    let exploration = explore::explore(&dataset, 5, 10);

    assert_eq!(exploration.products.total(), 9);
    assert_eq!(exploration.products.distinct(), 4);
    let ranked = exploration
        .top_products
        .iter()
        .map(|row| (row.value.as_str(), row.count))
        .collect::<Vec<_>>();
    // Bread and Eggs tie; Bread was seen first.
    assert_eq!(
        ranked,
        vec![("Milk", 4), ("Bread", 2), ("Eggs", 2), ("Soap", 1)]
    );
    assert_eq!(exploration.overview.unique_customers, 5);
}

#[test]
fn cost_summary_covers_cleaned_rows() {
    let workspace = TestWorkspace::new();
    let path = workspace.write_sample();
    let (dataset, _) =
        loader::load_transactions(&path, &LoadOptions::for_path(&path)).expect("load");
    let cost = explore::numeric_summary(&dataset, Measure::Cost);

    assert_eq!(cost.count, 6);
    assert_eq!(cost.sum, Decimal::from(158));
    assert_eq!(cost.min, Some(Decimal::from(10)));
    assert_eq!(cost.max, Some(Decimal::from(50)));
    assert_eq!(cost.median, Some(Decimal::from(20)));
    assert!((explore::discount_rate(&dataset) - 50.0).abs() < 1e-9);
}
