use chart_importer::ToolError;
use chart_importer::decode::decode;
use chart_importer::distribution::{DISTRIBUTION_TABLE, resolve_distributions};
use chart_importer::forest::build_forest;
use chart_importer::import::{NameEntry, NameMap, import_cost_centers};
use chart_importer::io::sheet_write::{TemplateKind, template_rows};
use chart_importer::model::{ChartKind, DISTRIBUTION_TARGET_FIELD, DistributionLink};
use chart_importer::pipeline::{ensure_company, import_chart, validate_company};
use chart_importer::store::{
    Fields, MemoryStore, RecordStore, StoredRecord, WriteFlags, filter_eq,
};
use serde_json::{Value, json};

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

fn cost_center(store: &MemoryStore, name: &str) -> StoredRecord {
    store
        .query("Cost Center", &filter_eq("cost_center_name", name))
        .expect("query")
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("cost center {name} missing"))
}

fn links(record: &StoredRecord) -> Vec<(String, f64)> {
    match record.fields.get(DISTRIBUTION_TABLE) {
        Some(Value::Array(rows)) => rows
            .iter()
            .map(|row| {
                (
                    row["cost_center"].as_str().expect("target id").to_string(),
                    row["percentage_allocation"].as_f64().expect("percentage"),
                )
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn store_with_company(company: &str) -> MemoryStore {
    let mut store = MemoryStore::new();
    ensure_company(&mut store, company).expect("company created");
    store
}

#[test]
fn parents_are_created_before_children() {
    let table = decode(&rows(&[
        HEADER,
        &["In-store", "Sales", "", "0", "0", "", ""],
        &["Sales", "", "", "1", "0", "", ""],
    ]))
    .expect("decoded");
    assert_eq!(table.len(), 2);
    let forest = build_forest(table).expect("forest built");

    let mut store = MemoryStore::new();
    let names = import_cost_centers(&mut store, "Acme", &forest).expect("imported");

    let sales = cost_center(&store, "Sales");
    let in_store = cost_center(&store, "In-store");
    assert_eq!(names["Sales"].id, sales.id);
    assert_eq!(names["In-store"].id, in_store.id);
    assert_eq!(sales.fields["parent_cost_center"], Value::Null);
    assert_eq!(in_store.fields["parent_cost_center"], json!(sales.id));
    assert_eq!(sales.fields["is_group"], json!(1));
    assert_eq!(in_store.fields["is_group"], json!(0));
    assert_eq!(in_store.fields["company"], json!("Acme"));

    let all = store
        .query("Cost Center", &filter_eq("company", "Acme"))
        .expect("query");
    assert_eq!(all[0].id, sales.id);
}

#[test]
fn distribution_fields_are_not_copied_onto_records() {
    let forest = build_forest(
        decode(&rows(&[
            HEADER,
            &["Top", "", "7", "1", "0", "", ""],
            &["Rent", "Top", "", "0", "1", "Top", "100"],
            &["Power", "Top", "", "0", "0", "Top", "100"],
        ]))
        .expect("decoded"),
    )
    .expect("forest built");

    let mut store = MemoryStore::new();
    let names = import_cost_centers(&mut store, "Acme", &forest).expect("imported");

    assert_eq!(names["Rent"].links, [DistributionLink::new("Top", 100.0)]);
    assert!(names["Power"].links.is_empty());

    let rent = cost_center(&store, "Rent");
    assert!(!rent.fields.contains_key(DISTRIBUTION_TARGET_FIELD));
    assert_eq!(rent.fields["enable_distributed_cost_center"], json!(1));
    let power = cost_center(&store, "Power");
    assert_eq!(power.fields["enable_distributed_cost_center"], json!(0));
    assert_eq!(cost_center(&store, "Top").fields["cost_center_number"], json!("7"));
}

#[test]
fn non_numeric_percentage_fails_the_import() {
    let forest = build_forest(
        decode(&rows(&[HEADER, &["Rent", "", "", "0", "1", "Rent", "half"]])).expect("decoded"),
    )
    .expect("forest built");

    let error = import_cost_centers(&mut MemoryStore::new(), "Acme", &forest)
        .expect_err("invalid percentage");
    assert!(matches!(error, ToolError::InvalidLiteral { value, .. } if value == "half"));
}

#[test]
fn non_finite_percentage_fails_the_import() {
    let forest = build_forest(
        decode(&rows(&[HEADER, &["Rent", "", "", "0", "1", "Rent", "NaN"]])).expect("decoded"),
    )
    .expect("forest built");

    let error = import_cost_centers(&mut MemoryStore::new(), "Acme", &forest)
        .expect_err("non-finite percentage");
    assert!(matches!(error, ToolError::InvalidLiteral { value, .. } if value == "NaN"));
}

#[test]
fn distributions_resolve_to_assigned_identifiers() {
    let mut store = MemoryStore::new();
    let mut create = |name: &str| {
        let fields = Fields::from([("cost_center_name".to_string(), json!(name))]);
        store
            .create("Cost Center", fields, WriteFlags::unchecked())
            .expect("created")
    };
    let id1 = create("Rent");
    let id2 = create("In-store");
    let id3 = create("Repairs");

    let names = NameMap::from([
        (
            "Rent".to_string(),
            NameEntry::new(
                id1.clone(),
                vec![
                    DistributionLink::new("In-store", 70.0),
                    DistributionLink::new("Repairs", 30.0),
                ],
            ),
        ),
        ("In-store".to_string(), NameEntry::new(id2.clone(), Vec::new())),
        ("Repairs".to_string(), NameEntry::new(id3.clone(), Vec::new())),
    ]);

    let resolved = resolve_distributions(&mut store, &names).expect("resolved");
    assert_eq!(resolved, 2);

    let rent = store.get("Cost Center", &id1).expect("Rent stored");
    assert_eq!(links(&rent), [(id2, 70.0), (id3, 30.0)]);
    assert!(links(&cost_center(&store, "Repairs")).is_empty());
}

#[test]
fn unknown_distribution_target_fails() {
    let mut store = MemoryStore::new();
    let id = store
        .create("Cost Center", Fields::new(), WriteFlags::unchecked())
        .expect("created");
    let names = NameMap::from([(
        "Rent".to_string(),
        NameEntry::new(id, vec![DistributionLink::new("Warehouse", 100.0)]),
    )]);

    let error = resolve_distributions(&mut store, &names).expect_err("unknown target");
    assert!(matches!(
        error,
        ToolError::UnknownDistributionTarget { source_name, target }
            if source_name == "Rent" && target == "Warehouse"
    ));
}

#[test]
fn sample_chart_imports_end_to_end() {
    let mut store = store_with_company("Acme");
    let report = import_chart(
        &mut store,
        &template_rows(ChartKind::CostCenter, TemplateKind::Sample),
        ChartKind::CostCenter,
        "Acme",
    )
    .expect("imported");

    assert_eq!(report.created, 9);
    assert_eq!(report.distribution_links, 6);
    assert_eq!(store.count("Cost Center"), 9);

    let in_store = cost_center(&store, "In-store").id;
    let on_line = cost_center(&store, "On-line").id;
    let repairs = cost_center(&store, "Repairs").id;
    let installations = cost_center(&store, "Installations").id;

    assert_eq!(
        links(&cost_center(&store, "Rent")),
        [(in_store.clone(), 70.0), (repairs.clone(), 30.0)]
    );
    assert_eq!(
        links(&cost_center(&store, "Overhead")),
        [
            (in_store, 40.0),
            (on_line, 30.0),
            (repairs, 20.0),
            (installations, 10.0)
        ]
    );
    let allocations = cost_center(&store, "Allocations");
    assert_eq!(
        cost_center(&store, "Rent").fields["parent_cost_center"],
        json!(allocations.id)
    );
}

#[test]
fn reimport_replaces_the_previous_chart() {
    let mut store = store_with_company("Acme");
    let sample = template_rows(ChartKind::CostCenter, TemplateKind::Sample);
    import_chart(&mut store, &sample, ChartKind::CostCenter, "Acme").expect("first import");

    let mut company = store
        .query("Company", &filter_eq("company_name", "Acme"))
        .expect("query")
        .remove(0);
    let sales_id = cost_center(&store, "Sales").id;
    let fields = Fields::from([("cost_center".to_string(), json!(sales_id))]);
    store.update("Company", &company.id, fields).expect("linked");

    import_chart(&mut store, &sample, ChartKind::CostCenter, "Acme").expect("second import");
    assert_eq!(store.count("Cost Center"), 9);

    company = store.get("Company", &company.id).expect("company");
    assert_eq!(company.fields["cost_center"], json!(""));
}

#[test]
fn invalid_chart_writes_nothing() {
    let mut store = store_with_company("Acme");
    let error = import_chart(
        &mut store,
        &rows(&[HEADER, &["Rent", "", "", "0", "1", "Rent", "70"]]),
        ChartKind::CostCenter,
        "Acme",
    )
    .expect_err("rejected");

    match error {
        ToolError::Validation(violations) => assert_eq!(violations.len(), 1),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.count("Cost Center"), 0);
}

#[test]
fn dangling_parent_writes_nothing() {
    let mut store = store_with_company("Acme");
    let error = import_chart(
        &mut store,
        &rows(&[
            HEADER,
            &["Sales", "", "", "1", "0", "", ""],
            &["Repairs", "Service", "", "0", "0", "", ""],
        ]),
        ChartKind::CostCenter,
        "Acme",
    )
    .expect_err("rejected");

    assert!(matches!(error, ToolError::UnresolvedParent { .. }));
    assert_eq!(store.count("Cost Center"), 0);
}

#[test]
fn company_guard_rejects_unusable_companies() {
    let store = MemoryStore::new();
    assert!(matches!(
        validate_company(&store, "Acme"),
        Err(ToolError::UnknownCompany(_))
    ));

    let mut store = MemoryStore::new();
    let fields = Fields::from([
        ("company_name".to_string(), json!("Acme East")),
        ("parent_company".to_string(), json!("Acme")),
    ]);
    let id = store
        .create("Company", fields, WriteFlags::default())
        .expect("created");
    assert!(matches!(
        validate_company(&store, "Acme East"),
        Err(ToolError::ChildCompany(_))
    ));

    let allow = Fields::from([(
        "allow_account_creation_against_child_company".to_string(),
        json!(1),
    )]);
    store.update("Company", &id, allow).expect("updated");
    validate_company(&store, "Acme East").expect("child company allowed");

    let entry = Fields::from([("company".to_string(), json!("Acme East"))]);
    store
        .create("GL Entry", entry, WriteFlags::default())
        .expect("created");
    assert!(matches!(
        validate_company(&store, "Acme East"),
        Err(ToolError::CompanyHasTransactions(_))
    ));
}
