use retail_insights::table::{Align, render_aligned_table, render_table};

#[test]
fn render_table_aligns_columns() {
    let headers = vec!["store".to_string(), "city".to_string()];
    let rows = vec![
        vec!["Mall".to_string(), "Pune".to_string()],
        vec!["Warehouse Club".to_string(), "Delhi".to_string()],
    ];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(
        lines,
        vec![
            "store           city",
            "--------------  -----",
            "Mall            Pune",
            "Warehouse Club  Delhi",
        ]
    );
}

#[test]
fn render_table_normalizes_control_characters() {
    let headers = vec!["product".to_string()];
    let rows = vec![vec!["Milk\nBread\tEggs".to_string()]];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "Milk Bread Eggs");
}

#[test]
fn right_aligned_columns_pad_on_the_left() {
    let headers = vec!["Season".to_string(), "Count".to_string()];
    let rows = vec![
        vec!["Winter".to_string(), "7".to_string()],
        vec!["Fall".to_string(), "120".to_string()],
    ];

    let rendered = render_aligned_table(&headers, &rows, &[Align::Left, Align::Right]);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "Season  Count");
    assert_eq!(lines[2], "Winter      7");
    assert_eq!(lines[3], "Fall      120");
}

#[test]
fn currency_symbols_count_as_single_columns() {
    let headers = vec!["Avg Cost".to_string()];
    let rows = vec![vec!["₹1,250.00".to_string()]];

    let rendered = render_aligned_table(&headers, &rows, &[Align::Right]);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], " Avg Cost");
    assert_eq!(lines[2], "₹1,250.00");
}
