use super::*;
#[cfg(feature = "live-db-tests")]
use crate::state::test_helpers;

fn input(number: &str, name: &str, quantity: Option<i32>) -> PartInput {
    PartInput {
        part_number: number.into(),
        part_name: name.into(),
        quantity,
        unit: None,
        description: None,
    }
}

fn sample_part(number: &str, quantity: i32) -> Part {
    Part {
        part_number: number.into(),
        part_name: format!("{number} resistor"),
        quantity,
        unit: Some("EA".into()),
        description: None,
        created_at: time::macros::datetime!(2024-05-17 09:30 UTC),
        updated_at: time::macros::datetime!(2024-05-18 10:00 UTC),
    }
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn validate_trims_fields() {
    let part = PartInput {
        part_number: "  R-100 ".into(),
        part_name: " 10k resistor ".into(),
        quantity: Some(5),
        unit: Some(" EA ".into()),
        description: Some("   ".into()),
    }
    .validate()
    .unwrap();
    assert_eq!(part.part_number, "R-100");
    assert_eq!(part.part_name, "10k resistor");
    assert_eq!(part.unit.as_deref(), Some("EA"));
    assert!(part.description.is_none());
}

#[test]
fn validate_rejects_blank_number() {
    let err = input("   ", "name", Some(1)).validate().unwrap_err();
    assert!(matches!(err, PartError::Invalid(msg) if msg.contains("part number")));
}

#[test]
fn validate_rejects_blank_name() {
    let err = input("R-1", "", Some(1)).validate().unwrap_err();
    assert!(matches!(err, PartError::Invalid(msg) if msg.contains("part name")));
}

#[test]
fn validate_requires_quantity() {
    let err = input("R-1", "name", None).validate().unwrap_err();
    assert!(matches!(err, PartError::Invalid(msg) if msg.contains("quantity")));
}

#[test]
fn validate_rejects_negative_quantity() {
    let err = input("R-1", "name", Some(-3)).validate().unwrap_err();
    assert!(matches!(err, PartError::Invalid(msg) if msg.contains("-3")));
}

#[test]
fn validate_allows_zero_quantity() {
    let part = input("R-1", "name", Some(0)).validate().unwrap();
    assert_eq!(part.quantity, 0);
}

#[test]
fn validate_bulk_rejects_empty_batch() {
    assert!(matches!(validate_bulk(Vec::new()), Err(PartError::Invalid(_))));
}

#[test]
fn validate_bulk_reports_one_based_row_index() {
    let rows = vec![input("R-1", "a", Some(1)), input("R-2", "b", Some(2)), input("R-3", "", Some(3))];
    match validate_bulk(rows) {
        Err(PartError::InvalidRow { index, reason }) => {
            assert_eq!(index, 3);
            assert!(reason.contains("part name"));
        }
        other => panic!("expected InvalidRow, got {other:?}"),
    }
}

#[test]
fn validate_bulk_keeps_row_order() {
    let parts = validate_bulk(vec![input("B", "b", Some(1)), input("A", "a", Some(2))]).unwrap();
    let numbers: Vec<_> = parts.iter().map(|p| p.part_number.as_str()).collect();
    assert_eq!(numbers, ["B", "A"]);
}

#[test]
fn invalid_row_error_message_names_row() {
    let err = PartError::InvalidRow { index: 4, reason: "quantity is required".into() };
    assert_eq!(err.to_string(), "row 4: quantity is required");
}

// =============================================================================
// Threshold and sorting
// =============================================================================

#[test]
fn effective_threshold_uses_positive_request() {
    assert_eq!(effective_threshold(Some(3), 10), 3);
}

#[test]
fn effective_threshold_falls_back_for_missing_or_non_positive() {
    assert_eq!(effective_threshold(None, 10), 10);
    assert_eq!(effective_threshold(Some(0), 10), 10);
    assert_eq!(effective_threshold(Some(-7), 10), 10);
}

#[test]
fn sort_column_accepts_snake_and_camel_case() {
    assert_eq!(PartSortColumn::parse("part_name"), Some(PartSortColumn::PartName));
    assert_eq!(PartSortColumn::parse("partName"), Some(PartSortColumn::PartName));
    assert_eq!(PartSortColumn::parse("quantity"), Some(PartSortColumn::Quantity));
    assert_eq!(PartSortColumn::parse("updatedAt"), Some(PartSortColumn::UpdatedAt));
}

#[test]
fn sort_column_rejects_unknown_and_injection() {
    assert_eq!(PartSortColumn::parse("is_deleted"), None);
    assert_eq!(PartSortColumn::parse("quantity; DROP TABLE parts"), None);
}

#[test]
fn sort_column_sql_names_are_table_columns() {
    for raw in ["part_number", "part_name", "quantity", "unit", "created_at", "updated_at"] {
        assert_eq!(PartSortColumn::parse(raw).unwrap().as_sql(), raw);
    }
}

// =============================================================================
// Serialization and export
// =============================================================================

#[test]
fn part_serializes_with_camel_case_keys() {
    let value = serde_json::to_value(sample_part("R-1", 4)).unwrap();
    assert_eq!(value["partNumber"], "R-1");
    assert_eq!(value["partName"], "R-1 resistor");
    assert_eq!(value["quantity"], 4);
    assert_eq!(value["unit"], "EA");
    assert_eq!(value["createdAt"], "2024-05-17T09:30:00Z");
}

#[test]
fn part_input_accepts_page_payload() {
    let body = r#"{"partNumber":"C-22","partName":"cap","quantity":7,"unit":"EA"}"#;
    let parsed: PartInput = serde_json::from_str(body).unwrap();
    assert_eq!(parsed.part_number, "C-22");
    assert_eq!(parsed.quantity, Some(7));
    assert!(parsed.description.is_none());
}

#[test]
fn parts_to_csv_writes_header_and_rows() {
    let csv = parts_to_csv(&[sample_part("R-1", 4), sample_part("R-2", 0)]).unwrap();
    let text = String::from_utf8(csv).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "part_number,part_name,quantity,unit,description,created_at,updated_at");
    assert_eq!(lines[1], "R-1,R-1 resistor,4,EA,,2024-05-17T09:30:00Z,2024-05-18T10:00:00Z");
    assert!(lines[2].starts_with("R-2,R-2 resistor,0,"));
}

#[test]
fn parts_to_csv_quotes_embedded_commas() {
    let mut part = sample_part("R-1", 1);
    part.description = Some("1/4W, 5%".into());
    let text = String::from_utf8(parts_to_csv(&[part]).unwrap()).unwrap();
    assert!(text.contains("\"1/4W, 5%\""));
}

#[test]
fn parts_to_csv_empty_has_only_header() {
    let text = String::from_utf8(parts_to_csv(&[]).unwrap()).unwrap();
    assert_eq!(text.lines().count(), 1);
}

// =============================================================================
// Live database
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn insert_existing_part_merges_quantity() {
    let state = test_helpers::live_app_state().await;
    let number = test_helpers::unique_part_number("MERGE");
    let first = input(&number, "merge test", Some(4)).validate().unwrap();
    let second = input(&number, "ignored name", Some(6)).validate().unwrap();

    assert_eq!(insert_part(&state.pool, &first).await.unwrap(), InsertOutcome::Inserted);
    assert_eq!(insert_part(&state.pool, &second).await.unwrap(), InsertOutcome::Merged { quantity: 10 });

    let stored = find_part(&state.pool, &number).await.unwrap().unwrap();
    assert_eq!(stored.quantity, 10);
    assert_eq!(stored.part_name, "merge test");
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn soft_deleted_part_is_hidden_and_revived_on_insert() {
    let state = test_helpers::live_app_state().await;
    let number = test_helpers::unique_part_number("REVIVE");
    let part = input(&number, "revive test", Some(2)).validate().unwrap();
    insert_part(&state.pool, &part).await.unwrap();

    soft_delete_part(&state.pool, &number).await.unwrap();
    assert!(find_part(&state.pool, &number).await.unwrap().is_none());
    assert!(matches!(soft_delete_part(&state.pool, &number).await, Err(PartError::NotFound(_))));

    let revived = input(&number, "revived", Some(9)).validate().unwrap();
    assert_eq!(insert_part(&state.pool, &revived).await.unwrap(), InsertOutcome::Inserted);
    let stored = find_part(&state.pool, &number).await.unwrap().unwrap();
    assert_eq!(stored.quantity, 9);
    assert_eq!(stored.part_name, "revived");
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn low_stock_includes_threshold_boundary() {
    let state = test_helpers::live_app_state().await;
    let at = test_helpers::unique_part_number("LOW-AT");
    let above = test_helpers::unique_part_number("LOW-ABOVE");
    insert_part(&state.pool, &input(&at, "at", Some(2)).validate().unwrap()).await.unwrap();
    insert_part(&state.pool, &input(&above, "above", Some(3)).validate().unwrap()).await.unwrap();

    let low = list_low_stock_parts(&state.pool, 2).await.unwrap();
    assert!(low.iter().any(|p| p.part_number == at));
    assert!(!low.iter().any(|p| p.part_number == above));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn concurrent_inserts_of_new_part_all_merge() {
    let state = test_helpers::live_app_state().await;
    let number = test_helpers::unique_part_number("RACE");
    let part = input(&number, "race test", Some(1)).validate().unwrap();

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let pool = state.pool.clone();
            let part = part.clone();
            tokio::spawn(async move { insert_part(&pool, &part).await })
        })
        .collect();

    let mut inserted = 0;
    for task in tasks {
        if task.await.unwrap().unwrap() == InsertOutcome::Inserted {
            inserted += 1;
        }
    }

    assert_eq!(inserted, 1);
    let stored = find_part(&state.pool, &number).await.unwrap().unwrap();
    assert_eq!(stored.quantity, 8);
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn merge_past_i32_max_is_quantity_overflow() {
    let state = test_helpers::live_app_state().await;
    let number = test_helpers::unique_part_number("OVERFLOW");
    let full = input(&number, "overflow test", Some(i32::MAX)).validate().unwrap();
    let one_more = input(&number, "overflow test", Some(1)).validate().unwrap();

    insert_part(&state.pool, &full).await.unwrap();
    let err = insert_part(&state.pool, &one_more).await.unwrap_err();
    assert!(matches!(err, PartError::QuantityOverflow(ref n) if *n == number));

    let stored = find_part(&state.pool, &number).await.unwrap().unwrap();
    assert_eq!(stored.quantity, i32::MAX);
}
