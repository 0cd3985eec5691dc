use std::path::Path;

use rust_xlsxwriter::Workbook;
use tracing::{info, instrument};

use crate::error::Result;
use crate::model::ChartKind;
use crate::validate::{GROUP_ACCOUNT_TYPES, ROOT_TYPES};

/// Worksheet name used for downloaded templates.
pub const TEMPLATE_SHEET: &str = "Chart Importer Template";

/// Which template a user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Headers plus the minimum set of rows a valid chart needs, names left blank.
    Blank,
    /// A small but complete example chart.
    Sample,
}

/// File format of a written template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Csv,
    Xlsx,
}

impl TemplateFormat {
    /// File extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            TemplateFormat::Csv => "csv",
            TemplateFormat::Xlsx => "xlsx",
        }
    }
}

/// Ledger account types a blank account template pre-fills, with their root type.
const LEDGER_TEMPLATE_ROWS: [(&str, &str); 9] = [
    ("Cost of Goods Sold", "Expense"),
    ("Depreciation", "Expense"),
    ("Fixed Asset", "Asset"),
    ("Payable", "Liability"),
    ("Receivable", "Asset"),
    ("Stock Adjustment", "Expense"),
    ("Bank", "Asset"),
    ("Cash", "Asset"),
    ("Stock", "Asset"),
];

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|cell| cell.to_string()).collect()
}

/// Rows of the requested template, header first.
pub fn template_rows(chart: ChartKind, template: TemplateKind) -> Vec<Vec<String>> {
    match chart {
        ChartKind::Account => account_template(template),
        ChartKind::CostCenter => cost_center_template(template),
    }
}

fn account_template(template: TemplateKind) -> Vec<Vec<String>> {
    let mut rows = vec![row(&[
        "Name",
        "Parent Name",
        "Account Number",
        "Is Group",
        "Account Type",
        "Root Type",
        "Description",
    ])];

    if template == TemplateKind::Blank {
        rows.extend(
            ROOT_TYPES
                .iter()
                .map(|&root_type| row(&["", "", "", "1", "", root_type, ""])),
        );
        rows.extend(
            GROUP_ACCOUNT_TYPES
                .iter()
                .map(|&account_type| row(&["", "", "", "1", account_type, "Asset", ""])),
        );
        rows.extend(
            LEDGER_TEMPLATE_ROWS
                .iter()
                .map(|&(account_type, root_type)| {
                    row(&["", "", "", "0", account_type, root_type, ""])
                }),
        );
        return rows;
    }

    rows.extend([
        row(&["Application of Funds(Assets)", "", "", "1", "", "Asset", ""]),
        row(&["Sources of Funds(Liabilities)", "", "", "1", "", "Liability", ""]),
        row(&[
            "Equity",
            "",
            "",
            "1",
            "",
            "Equity",
            "Accounts that represent owner's value or opening balances",
        ]),
        row(&["Expenses", "", "", "1", "", "Expense", ""]),
        row(&["Income", "", "", "1", "", "Income", ""]),
        row(&[
            "Bank Accounts",
            "Application of Funds(Assets)",
            "",
            "1",
            "Bank",
            "Asset",
            "Accounts that represent value held at financial institutions",
        ]),
        row(&["Cash In Hand", "Application of Funds(Assets)", "", "1", "Cash", "Asset", ""]),
        row(&[
            "Stock Assets",
            "Application of Funds(Assets)",
            "",
            "1",
            "Stock",
            "Asset",
            "Accounts that represent goods in inventory",
        ]),
        row(&["Cost of Goods Sold", "Expenses", "", "0", "Cost of Goods Sold", "Expense", ""]),
        row(&["Asset Depreciation", "Expenses", "", "0", "Depreciation", "Expense", ""]),
        row(&["Fixed Assets", "Application of Funds(Assets)", "", "0", "Fixed Asset", "Asset", ""]),
        row(&[
            "Accounts Payable",
            "Sources of Funds(Liabilities)",
            "",
            "0",
            "Payable",
            "Liability",
            "",
        ]),
        row(&[
            "Accounts Receivable",
            "Application of Funds(Assets)",
            "",
            "0",
            "Receivable",
            "Asset",
            "",
        ]),
        row(&[
            "Stock Expenses",
            "Expenses",
            "",
            "0",
            "Stock Adjustment",
            "Expense",
            "Value of lost or spoiled inventory",
        ]),
        row(&[
            "Sample Bank",
            "Bank Accounts",
            "",
            "0",
            "Bank",
            "Asset",
            "Rename to reflect your actual bank",
        ]),
        row(&["Cash", "Cash In Hand", "", "0", "Cash", "Asset", ""]),
        row(&[
            "Stores",
            "Stock Assets",
            "",
            "0",
            "Stock",
            "Asset",
            "Alternately named 'Inventory'",
        ]),
    ]);
    rows
}

fn cost_center_template(template: TemplateKind) -> Vec<Vec<String>> {
    let mut rows = vec![row(&[
        "Name",
        "Parent Name",
        "Cost Center Number",
        "Is Group",
        "Enable Distributed Cost Center",
        "Cost Center (Distributed Cost Center)",
        "Percentage Allocation (Distributed Cost Center)",
    ])];

    if template == TemplateKind::Blank {
        rows.extend([
            row(&["At Least One Top Level Group", "", "", "1", "0", "", ""]),
            row(&["A Cost Center", "At Least One Top Level Group", "", "0", "0", "", ""]),
        ]);
        return rows;
    }

    rows.extend([
        row(&["Sales", "", "", "1", "0", "", ""]),
        row(&["In-store", "Sales", "", "0", "0", "", ""]),
        row(&["On-line", "Sales", "", "0", "0", "", ""]),
        row(&["Service", "", "", "1", "0", "", ""]),
        row(&["Repairs", "Service", "", "0", "0", "", ""]),
        row(&["Installations", "Service", "", "0", "0", "", ""]),
        row(&["Allocations", "", "", "1", "0", "", ""]),
        row(&["Rent", "Allocations", "", "0", "1", "In-store", "70"]),
        row(&["", "", "", "", "", "Repairs", "30"]),
        row(&["Overhead", "Allocations", "", "0", "1", "In-store", "40"]),
        row(&["", "", "", "", "", "On-line", "30"]),
        row(&["", "", "", "", "", "Repairs", "20"]),
        row(&["", "", "", "", "", "Installations", "10"]),
    ]);
    rows
}

/// Writes rows to `path` in the given format.
#[instrument(level = "info", skip(rows), fields(path = %path.display(), row_count = rows.len()))]
pub fn write_rows(path: &Path, rows: &[Vec<String>], format: TemplateFormat) -> Result<()> {
    match format {
        TemplateFormat::Csv => write_csv(path, rows)?,
        TemplateFormat::Xlsx => write_xlsx(path, rows)?,
    }
    info!("template written");
    Ok(())
}

fn write_csv(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_xlsx(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(TEMPLATE_SHEET)?;

    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            // Integral cells go out as numbers.
            match cell.parse::<i64>() {
                Ok(number) => {
                    worksheet.write_number(row_idx as u32, col_idx as u16, number as f64)?
                }
                Err(_) => worksheet.write_string(row_idx as u32, col_idx as u16, cell)?,
            };
        }
    }

    workbook.save(path)?;
    Ok(())
}
