use chart_importer::ToolError;
use chart_importer::decode::{decode, scrub};
use chart_importer::model::{
    DISTRIBUTION_PERCENTAGE_FIELD, DISTRIBUTION_TARGET_FIELD, GroupFlag,
};

fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
    data.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

const HEADER: &[&str] = &[
    "Name",
    "Parent Name",
    "Cost Center Number",
    "Is Group",
    "Enable Distributed Cost Center",
    "Cost Center (Distributed Cost Center)",
    "Percentage Allocation (Distributed Cost Center)",
];

#[test]
fn scrub_matches_distribution_field_keys() {
    assert_eq!(scrub(" Parent Name "), "parent_name");
    assert_eq!(scrub("Cost Center (Distributed Cost Center)"), DISTRIBUTION_TARGET_FIELD);
    assert_eq!(
        scrub("Percentage Allocation (Distributed Cost Center)"),
        DISTRIBUTION_PERCENTAGE_FIELD
    );
    assert_eq!(scrub("Is-Group"), "is_group");
}

#[test]
fn decodes_named_rows_into_records() {
    let table = decode(&rows(&[
        HEADER,
        &["Sales", "", "100", "1", "0", "", ""],
        &["In-store", "Sales", "110", "0", "0", "", ""],
    ]))
    .expect("rows decoded");

    assert_eq!(table.len(), 2);

    let sales = table.get("Sales").expect("Sales present");
    assert_eq!(sales.parent, None);
    assert_eq!(sales.group, GroupFlag::Group);
    assert_eq!(sales.attribute("cost_center_number"), Some("100"));
    assert!(!sales.attributes.contains_key("parent_name"));
    assert!(!sales.attributes.contains_key("is_group"));

    let store = table.get("In-store").expect("In-store present");
    assert_eq!(store.parent.as_deref(), Some("Sales"));
    assert_eq!(store.group, GroupFlag::Ledger);
    assert!(!store.group.is_group());
}

#[test]
fn zero_group_cell_is_not_a_group() {
    let table = decode(&rows(&[
        &["Name", "Parent Name", "Is Group"],
        &["A", "", "0"],
        &["B", "", "1.0"],
        &["C", "", ""],
    ]))
    .expect("rows decoded");

    assert_eq!(table.get("A").map(|record| record.group), Some(GroupFlag::Ledger));
    assert_eq!(table.get("B").map(|record| record.group), Some(GroupFlag::Group));
    assert_eq!(
        table.get("C").map(|record| record.group),
        Some(GroupFlag::Unspecified)
    );
}

#[test]
fn continuation_rows_attach_to_previous_record() {
    let table = decode(&rows(&[
        HEADER,
        &["Allocations", "", "", "1", "0", "", ""],
        &["Rent", "Allocations", "", "0", "1", "In-store", "70"],
        &["", "", "", "", "", "Repairs", "30"],
        &["Overhead", "Allocations", "", "0", "1", "In-store", "40"],
        &["", "", "", "", "", "On-line", "60"],
    ]))
    .expect("rows decoded");

    assert_eq!(table.len(), 3);
    let rent = table.get("Rent").expect("Rent present");
    assert_eq!(rent.continuations.len(), 1);
    assert_eq!(
        rent.continuations[0].get(DISTRIBUTION_TARGET_FIELD).map(String::as_str),
        Some("Repairs")
    );
    assert!(rent.distribution_enabled());

    let overhead = table.get("Overhead").expect("Overhead present");
    assert_eq!(overhead.continuations.len(), 1);
    assert_eq!(
        overhead.continuations[0]
            .get(DISTRIBUTION_PERCENTAGE_FIELD)
            .map(String::as_str),
        Some("60")
    );
}

#[test]
fn leading_continuation_is_rejected() {
    let error = decode(&rows(&[HEADER, &["", "", "", "", "", "Repairs", "30"]]))
        .expect_err("continuation without record");

    assert!(matches!(error, ToolError::ContinuationWithoutRecord { row: 2 }));
}

#[test]
fn duplicate_names_are_rejected() {
    let error = decode(&rows(&[
        HEADER,
        &["Sales", "", "", "1", "0", "", ""],
        &["Sales", "", "", "1", "0", "", ""],
    ]))
    .expect_err("duplicate name");

    assert!(matches!(error, ToolError::DuplicateName(name) if name == "Sales"));
}

#[test]
fn non_numeric_group_flag_is_rejected() {
    let error = decode(&rows(&[
        &["Name", "Parent Name", "Is Group"],
        &["Sales", "", "yes"],
    ]))
    .expect_err("invalid flag");

    assert!(matches!(
        error,
        ToolError::InvalidGroupFlag { record, value } if record == "Sales" && value == "yes"
    ));
}

#[test]
fn non_numeric_distribution_flag_is_rejected() {
    let error = decode(&rows(&[
        HEADER,
        &["Top", "", "", "1", "", "", ""],
        &["Rent", "Top", "", "0", "Yes", "Top", "70"],
    ]))
    .expect_err("invalid flag");

    assert!(matches!(
        error,
        ToolError::InvalidDistributionFlag { record, value } if record == "Rent" && value == "Yes"
    ));
}

#[test]
fn distribution_flag_is_parsed_once() {
    let table = decode(&rows(&[
        HEADER,
        &["Rent", "", "", "0", "1.0", "Top", "70"],
        &["Power", "", "", "0", "0", "", ""],
    ]))
    .expect("decoded");

    let rent = table.get("Rent").expect("Rent present");
    assert!(rent.distribution_enabled());
    assert!(!rent.attributes.contains_key("enable_distributed_cost_center"));
    assert!(!table.get("Power").expect("Power present").distribution_enabled());
}

#[test]
fn blank_rows_and_short_rows_are_tolerated() {
    let table = decode(&rows(&[
        HEADER,
        &["Sales", "", "", "1"],
        &["", "", "", "", "", "", ""],
        &["In-store", "Sales"],
    ]))
    .expect("rows decoded");

    assert_eq!(table.len(), 2);
    let sales = table.get("Sales").expect("Sales present");
    assert!(sales.continuations.is_empty());
    assert!(!sales.attributes.contains_key("enable_distributed_cost_center"));
}

#[test]
fn empty_input_decodes_to_empty_table() {
    let table = decode(&[]).expect("empty input decoded");
    assert!(table.is_empty());
}
