use chrono::NaiveDate;
use proptest::prelude::*;
use retail_insights::{
    data::{Discount, UNKNOWN},
    explore,
    loader::{self, RawTransaction},
    segment::{self, Dimension},
};
use rust_decimal::Decimal;

fn raw_strategy() -> impl Strategy<Value = RawTransaction> {
    (
        proptest::option::of(prop_oneof![Just("Ann"), Just("Bob"), Just("Cy")]),
        proptest::option::of(prop_oneof![Just("Student"), Just("Retiree")]),
        proptest::option::of(prop_oneof![Just("Pune"), Just("Agra"), Just("Goa")]),
        1u32..=28,
        1u32..=12,
        proptest::option::of(0i64..500),
        proptest::option::of(1i64..10),
        proptest::option::of(prop_oneof![Just(Discount::Yes), Just(Discount::No)]),
    )
        .prop_map(|(name, category, city, day, month, cost, items, discount)| {
            let timestamp = NaiveDate::from_ymd_opt(2023, month, day)
                .and_then(|date| date.and_hms_opt(8, 0, 0))
                .expect("valid date");
            RawTransaction {
                customer_name: name.map(str::to_string),
                customer_category: category.map(str::to_string),
                city: city.map(str::to_string),
                store_type: Some("Pharmacy".to_string()),
                timestamp,
                total_cost: cost.map(Decimal::from),
                total_items: items,
                products: Some("Milk, Bread".to_string()),
                payment_method: Some("Cash".to_string()),
                discount,
                promotion: Some("None".to_string()),
                season: None,
                other_cells: Vec::new(),
            }
        })
}

proptest! {
    #[test]
    fn cleaning_never_adds_rows_or_leaves_gaps(
        rows in proptest::collection::vec(raw_strategy(), 0..40)
    ) {
        let before = rows.len();
        let (dataset, report) = loader::clean(rows);
        prop_assert!(dataset.len() <= before);
        prop_assert_eq!(dataset.len() + report.duplicates_removed, before);
        for row in &dataset {
            prop_assert!(!row.customer_name.is_empty());
            prop_assert!(!row.city.is_empty());
            prop_assert!(row.total_cost >= Decimal::ZERO);
            prop_assert!(row.total_items >= 0);
            prop_assert_eq!(row.season.as_str(), UNKNOWN);
        }
    }

    #[test]
    fn group_counts_sum_to_row_count(
        rows in proptest::collection::vec(raw_strategy(), 1..40)
    ) {
        let (dataset, _) = loader::clean(rows);
        for pair in [
            vec![Dimension::City],
            vec![Dimension::Discount],
            vec![Dimension::CustomerCategory, Dimension::Month],
        ] {
            let table = segment::segment(&dataset, &pair).expect("segment");
            prop_assert_eq!(table.total_count(), dataset.len());
        }
    }

    #[test]
    fn frequency_shares_are_ranked_and_bounded(
        rows in proptest::collection::vec(raw_strategy(), 1..40)
    ) {
        let (dataset, _) = loader::clean(rows);
        let cities = explore::value_frequencies(&dataset, Dimension::City, 10);
        let total = cities.iter().map(|row| row.percent).sum::<f64>();
        prop_assert!(total <= 100.0 + 1e-9);
        for pair in cities.windows(2) {
            prop_assert!(pair[0].count >= pair[1].count);
        }
    }
}
