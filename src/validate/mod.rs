//! Structural and financial checks run over the flat table before any record
//! is written.
//!
//! Every check reports into one list so a user can fix the whole sheet in a
//! single pass. Per-record checks walk records in name order, which keeps the
//! report independent of row order.

use std::collections::{BTreeSet, HashSet};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::model::{
    ChartKind, DISTRIBUTION_PERCENTAGE_FIELD, FlatTable, GroupFlag, Record, parse_percentage,
};

/// The five fundamental account classifications.
pub const ROOT_TYPES: [&str; 5] = ["Asset", "Liability", "Expense", "Income", "Equity"];

/// Account types that must appear on at least one ledger (non-group) account.
pub const LEDGER_ACCOUNT_TYPES: [&str; 6] = [
    "Cost of Goods Sold",
    "Depreciation",
    "Fixed Asset",
    "Payable",
    "Receivable",
    "Stock Adjustment",
];

/// Account types that must appear on at least one group account.
pub const GROUP_ACCOUNT_TYPES: [&str; 3] = ["Bank", "Cash", "Stock"];

/// Largest accepted deviation of a distribution total from 100.
pub const ALLOCATION_TOLERANCE: f64 = 0.1;

/// A single problem found in the uploaded chart.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Violation {
    #[error("number of root records cannot be less than {minimum}")]
    InsufficientRoots { minimum: usize },

    #[error("please enter Root Type for account {account}")]
    MissingRootType { account: String },

    #[error(
        "root Type '{root_type}' for {account} must be one of Asset, Liability, Income, Expense and Equity"
    )]
    InvalidRootType { account: String, root_type: String },

    #[error("please identify/create Account (Ledger) for type - {}", .0.join(" , "))]
    MissingLedgerTypes(Vec<String>),

    #[error("please identify/create Account (Group) for type - {}", .0.join(" , "))]
    MissingGroupTypes(Vec<String>),

    #[error("sum of percent allocations for {cost_center} is {total}, not 100")]
    AllocationSum { cost_center: String, total: f64 },

    #[error("percent allocation '{value}' for {cost_center} is not a number")]
    InvalidAllocation { cost_center: String, value: String },
}

/// Marks every record referenced as a parent as a group.
pub fn propagate_groups(table: &mut FlatTable) {
    let parents: HashSet<String> = table
        .iter()
        .filter_map(|record| record.parent.clone())
        .collect();
    for record in table.iter_mut() {
        if parents.contains(&record.name) {
            record.group = GroupFlag::Group;
        }
    }
}

/// Runs all checks for `kind`. An empty result means the chart may be imported.
#[instrument(level = "info", skip_all, fields(record_count = table.len(), %kind))]
pub fn validate(table: &FlatTable, kind: ChartKind) -> Vec<Violation> {
    let mut table = table.clone();
    propagate_groups(&mut table);

    let mut records: Vec<&Record> = table.iter().collect();
    records.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));

    let mut violations = Vec::new();
    check_roots(&records, kind, &mut violations);
    match kind {
        ChartKind::Account => check_account_types(&records, &mut violations),
        ChartKind::CostCenter => check_distributions(&records, &mut violations),
    }

    debug!(violation_count = violations.len(), "validation finished");
    violations
}

fn check_roots(records: &[&Record], kind: ChartKind, violations: &mut Vec<Violation>) {
    let roots: Vec<&Record> = records
        .iter()
        .copied()
        .filter(|record| record.parent.is_none())
        .collect();

    let minimum = kind.minimum_roots();
    if roots.len() < minimum {
        violations.push(Violation::InsufficientRoots { minimum });
    }

    if kind != ChartKind::Account {
        return;
    }

    for root in roots {
        match root.attribute("root_type") {
            None => violations.push(Violation::MissingRootType {
                account: root.name.clone(),
            }),
            Some(root_type) if !ROOT_TYPES.contains(&root_type) => {
                violations.push(Violation::InvalidRootType {
                    account: root.name.clone(),
                    root_type: root_type.to_string(),
                });
            }
            Some(_) => {}
        }
    }
}

fn check_account_types(records: &[&Record], violations: &mut Vec<Violation>) {
    let mut ledger_types = BTreeSet::new();
    let mut group_types = BTreeSet::new();
    for record in records {
        if let Some(account_type) = record.attribute("account_type") {
            if record.group.is_group() {
                group_types.insert(account_type);
            } else {
                ledger_types.insert(account_type);
            }
        }
    }

    let missing_ledger = missing_types(&LEDGER_ACCOUNT_TYPES, &ledger_types);
    if !missing_ledger.is_empty() {
        violations.push(Violation::MissingLedgerTypes(missing_ledger));
    }

    let missing_group = missing_types(&GROUP_ACCOUNT_TYPES, &group_types);
    if !missing_group.is_empty() {
        violations.push(Violation::MissingGroupTypes(missing_group));
    }
}

fn missing_types(required: &[&str], present: &BTreeSet<&str>) -> Vec<String> {
    let mut missing: Vec<String> = required
        .iter()
        .filter(|account_type| !present.contains(*account_type))
        .map(|account_type| account_type.to_string())
        .collect();
    missing.sort();
    missing
}

fn check_distributions(records: &[&Record], violations: &mut Vec<Violation>) {
    for record in records {
        if !record.distribution_enabled() {
            continue;
        }

        let lines = std::iter::once(&record.attributes).chain(record.continuations.iter());
        let mut total = 0.0;
        let mut readable = true;
        for line in lines {
            let Some(cell) = line
                .get(DISTRIBUTION_PERCENTAGE_FIELD)
                .map(|cell| cell.trim())
                .filter(|cell| !cell.is_empty())
            else {
                continue;
            };
            match parse_percentage(cell) {
                Some(value) => total += value,
                None => {
                    readable = false;
                    violations.push(Violation::InvalidAllocation {
                        cost_center: record.name.clone(),
                        value: cell.to_string(),
                    });
                }
            }
        }

        if readable && (total - 100.0).abs() > ALLOCATION_TOLERANCE {
            violations.push(Violation::AllocationSum {
                cost_center: record.name.clone(),
                total,
            });
        }
    }
}
