use std::path::PathBuf;

use thiserror::Error;

use crate::validate::Violation;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error type covering the different failure cases that can occur while a
/// chart is read, checked, and materialised in the record store.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the CSV reader or writer.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Errors bubbled up from the spreadsheet reader implementation.
    #[error("spreadsheet read error: {0}")]
    SpreadsheetRead(#[from] calamine::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Raised when a row without a name appears before any named row.
    #[error("row {row} is a continuation but no named record precedes it")]
    ContinuationWithoutRecord { row: usize },

    /// Raised when two named rows share the same record name.
    #[error("multiple records with name {0}")]
    DuplicateName(String),

    /// Raised when the `is_group` cell holds something other than an integer.
    #[error("invalid is_group value '{value}' for record {record}")]
    InvalidGroupFlag { record: String, value: String },

    /// Raised when the distribution toggle holds something other than an integer.
    #[error("invalid enable_distributed_cost_center value '{value}' for record {record}")]
    InvalidDistributionFlag { record: String, value: String },

    /// Raised when records reference parents that are not part of the upload.
    #[error("{}", describe_missing_parents(.missing))]
    UnresolvedParent { missing: Vec<String> },

    /// Raised when records form a parent cycle and can never hang off a root.
    #[error("records {} are not connected to any root record", .names.join(", "))]
    DetachedRecords { names: Vec<String> },

    /// The combined validation report. Never empty.
    #[error("chart validation failed:\n{}", describe_violations(.0))]
    Validation(Vec<Violation>),

    /// Raised when a distribution line points at a cost center that was never imported.
    #[error("cost center {source_name} distributes to unknown cost center '{target}'")]
    UnknownDistributionTarget { source_name: String, target: String },

    /// Raised when numeric parsing fails when rebuilding typed values.
    #[error("invalid literal value '{value}' in column {column}")]
    InvalidLiteral { column: String, value: String },

    /// Raised when the target company is not present in the record store.
    #[error("company {0} does not exist")]
    UnknownCompany(String),

    /// Raised when a child company does not allow its own chart.
    #[error(
        "{0} is a child company. Import the chart against the parent company or enable \
         'Allow Account Creation Against Child Company' on the company"
    )]
    ChildCompany(String),

    /// Raised when the company already has ledger postings.
    #[error("company {0} already has GL entries, its chart can no longer be replaced")]
    CompanyHasTransactions(String),

    /// Raised when a record expected in the store cannot be found.
    #[error("{kind} record {id} not found")]
    MissingRecord { kind: String, id: String },

    /// Raised by checked store writes when a mandatory field is absent.
    #[error("{kind} requires field {field}")]
    MissingMandatory { kind: String, field: String },

    /// Raised when a row source has an extension we cannot read.
    #[error("only CSV and Excel files can be imported: {0}")]
    UnsupportedFile(PathBuf),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

fn describe_missing_parents(missing: &[String]) -> String {
    match missing {
        [single] => format!(
            "record for parent named {single} does not exist in the uploaded template"
        ),
        many => format!(
            "records for parents named {} do not exist in the uploaded template",
            many.join(",")
        ),
    }
}

fn describe_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
