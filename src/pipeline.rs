use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::decode::{decode, scrub};
use crate::distribution::resolve_distributions;
use crate::error::{Result, ToolError};
use crate::forest::{TreeEntry, build_forest, children_of};
use crate::import::{
    COMPANY_KIND, ChartCreator, CompanyDefaults, StoreChartCreator, StoreCompanyDefaults,
    import_cost_centers,
};
use crate::io::sheet_write::{self, TemplateFormat, TemplateKind};
use crate::model::{ChartKind, FlatTable};
use crate::store::{Fields, RecordStore, WriteFlags, filter_eq};
use crate::validate::{propagate_groups, validate};

/// Company fields that link to accounts and are blanked before a new chart.
const COMPANY_ACCOUNT_LINKS: [&str; 12] = [
    "default_bank_account",
    "default_cash_account",
    "default_receivable_account",
    "default_payable_account",
    "default_expense_account",
    "default_income_account",
    "round_off_account",
    "write_off_account",
    "exchange_gain_loss_account",
    "accumulated_depreciation_account",
    "depreciation_expense_account",
    "default_inventory_account",
];

/// Company fields that link to cost centers and are blanked before a new chart.
const COMPANY_COST_CENTER_LINKS: [&str; 3] =
    ["cost_center", "round_off_cost_center", "depreciation_cost_center"];

/// Record kinds that reference accounts and are cleared with the account chart.
const ACCOUNT_DEPENDENT_KINDS: [&str; 5] = [
    "Party Account",
    "Mode of Payment Account",
    "Tax Withholding Account",
    "Sales Taxes and Charges Template",
    "Purchase Taxes and Charges Template",
];

/// Outcome of a successful validation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationSummary {
    pub record_count: usize,
}

/// Outcome of a successful import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub created: usize,
    pub distribution_links: usize,
}

/// Decodes and checks a chart upload without touching the store.
#[instrument(level = "info", skip(rows), fields(row_count = rows.len()))]
pub fn validate_chart(rows: &[Vec<String>], kind: ChartKind) -> Result<ValidationSummary> {
    let table = decode(rows)?;
    gate(&table, kind)?;
    Ok(ValidationSummary {
        record_count: table.len(),
    })
}

fn gate(table: &FlatTable, kind: ChartKind) -> Result<()> {
    let violations = validate(table, kind);
    if violations.is_empty() {
        return Ok(());
    }
    warn!(violation_count = violations.len(), "chart rejected");
    Err(ToolError::Validation(violations))
}

/// Rejects companies whose chart may not be replaced.
#[instrument(level = "info", skip(store))]
pub fn validate_company(store: &dyn RecordStore, company: &str) -> Result<()> {
    let record = store
        .query(COMPANY_KIND, &filter_eq("company_name", company))?
        .into_iter()
        .next()
        .ok_or_else(|| ToolError::UnknownCompany(company.to_string()))?;

    if record.text("parent_company").is_some()
        && !record.flag("allow_account_creation_against_child_company")
    {
        return Err(ToolError::ChildCompany(company.to_string()));
    }

    if !store.query("GL Entry", &filter_eq("company", company))?.is_empty() {
        return Err(ToolError::CompanyHasTransactions(company.to_string()));
    }
    Ok(())
}

/// Blanks the company's links into the chart and deletes the existing chart.
#[instrument(level = "info", skip(store))]
pub fn unset_existing_data(
    store: &mut dyn RecordStore,
    kind: ChartKind,
    company: &str,
) -> Result<()> {
    let links: &[&str] = match kind {
        ChartKind::Account => &COMPANY_ACCOUNT_LINKS,
        ChartKind::CostCenter => &COMPANY_COST_CENTER_LINKS,
    };
    let blanked: Fields = links
        .iter()
        .map(|field| (field.to_string(), Value::String(String::new())))
        .collect();
    for record in store.query(COMPANY_KIND, &filter_eq("company_name", company))? {
        store.update(COMPANY_KIND, &record.id, blanked.clone())?;
    }

    let mut kinds = vec![kind.record_kind()];
    if kind == ChartKind::Account {
        kinds.extend(ACCOUNT_DEPENDENT_KINDS);
    }
    let filter = filter_eq("company", company);
    for record_kind in kinds {
        let removed = store.delete_where(record_kind, &filter)?;
        info!(record_kind, removed, "existing records removed");
    }
    Ok(())
}

/// Replaces a company's chart with the uploaded one.
///
/// Runs the company guard and the full validation before the first write.
/// A failure after that point leaves the records created so far in place.
#[instrument(level = "info", skip(store, rows), fields(row_count = rows.len()))]
pub fn import_chart(
    store: &mut dyn RecordStore,
    rows: &[Vec<String>],
    kind: ChartKind,
    company: &str,
) -> Result<ImportReport> {
    import_chart_with(
        store,
        rows,
        kind,
        company,
        &StoreChartCreator,
        &StoreCompanyDefaults,
    )
}

/// [`import_chart`] with explicit account-chart collaborators.
pub fn import_chart_with(
    store: &mut dyn RecordStore,
    rows: &[Vec<String>],
    kind: ChartKind,
    company: &str,
    creator: &dyn ChartCreator,
    defaults: &dyn CompanyDefaults,
) -> Result<ImportReport> {
    validate_company(store, company)?;

    let mut table = decode(rows)?;
    gate(&table, kind)?;
    propagate_groups(&mut table);
    let forest = build_forest(table)?;

    unset_existing_data(store, kind, company)?;

    let report = match kind {
        ChartKind::Account => {
            let created = creator.create_charts(store, company, &forest)?;
            defaults.refresh(store, company)?;
            ImportReport {
                created,
                distribution_links: 0,
            }
        }
        ChartKind::CostCenter => {
            let names = import_cost_centers(store, company, &forest)?;
            let distribution_links = resolve_distributions(store, &names)?;
            ImportReport {
                created: names.len(),
                distribution_links,
            }
        }
    };

    info!(
        created = report.created,
        links = report.distribution_links,
        "chart imported"
    );
    Ok(report)
}

/// Children of `parent` in the uploaded chart, as the preview tree shows them.
#[instrument(level = "debug", skip(rows), fields(row_count = rows.len()))]
pub fn preview_chart(
    rows: &[Vec<String>],
    kind: ChartKind,
    parent: Option<&str>,
) -> Result<Vec<TreeEntry>> {
    let forest = build_forest(decode(rows)?)?;
    Ok(children_of(&forest, kind, parent))
}

/// Writes a template into `directory` and returns the path of the new file.
#[instrument(level = "info", skip(directory))]
pub fn download_template(
    directory: &Path,
    kind: ChartKind,
    template: TemplateKind,
    format: TemplateFormat,
) -> Result<PathBuf> {
    let template_label = match template {
        TemplateKind::Blank => "Blank Template",
        TemplateKind::Sample => "Sample Template",
    };
    let file_name = format!(
        "{}_{}.{}",
        scrub(&kind.to_string()),
        scrub(template_label),
        format.extension()
    );
    let path = directory.join(file_name);
    sheet_write::write_rows(&path, &sheet_write::template_rows(kind, template), format)?;
    Ok(path)
}

/// Creates a bare company record unless one with that name exists.
pub fn ensure_company(store: &mut dyn RecordStore, company: &str) -> Result<()> {
    if !store
        .query(COMPANY_KIND, &filter_eq("company_name", company))?
        .is_empty()
    {
        return Ok(());
    }
    let fields = Fields::from([("company_name".to_string(), json!(company))]);
    store.create(COMPANY_KIND, fields, WriteFlags::default())?;
    info!(%company, "company created");
    Ok(())
}
