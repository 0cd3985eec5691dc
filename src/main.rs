use std::path::PathBuf;

use chart_importer::io::sheet_read::read_rows;
use chart_importer::io::sheet_write::{TemplateFormat, TemplateKind};
use chart_importer::model::ChartKind;
use chart_importer::pipeline;
use chart_importer::store::MemoryStore;
use chart_importer::{Result, ToolError};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Validate(args) => {
            let rows = read_rows(&args.file)?;
            let summary = pipeline::validate_chart(&rows, args.chart.into())?;
            println!("chart is valid: {} records", summary.record_count);
            Ok(())
        }
        Command::Import(args) => execute_import(args),
        Command::Preview(args) => {
            let rows = read_rows(&args.chart_file.file)?;
            let entries = pipeline::preview_chart(
                &rows,
                args.chart_file.chart.into(),
                args.parent.as_deref(),
            )?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
            Ok(())
        }
        Command::Template(args) => {
            let path = pipeline::download_template(
                &args.output,
                args.chart.into(),
                args.template.into(),
                args.format.into(),
            )?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn execute_import(args: ImportArgs) -> Result<()> {
    let rows = read_rows(&args.chart_file.file)?;
    let mut store = MemoryStore::load(&args.store)?;
    if args.ensure_company {
        pipeline::ensure_company(&mut store, &args.company)?;
    }

    let report =
        pipeline::import_chart(&mut store, &rows, args.chart_file.chart.into(), &args.company)?;

    // Only a fully successful import reaches the store file.
    store.save(&args.store)?;
    println!(
        "imported {} records ({} distribution links)",
        report.created, report.distribution_links
    );
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Import charts of accounts and cost centers from spreadsheets."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check an upload without importing it.
    Validate(ChartFileArgs),
    /// Replace a company's chart with the upload.
    Import(ImportArgs),
    /// Show the children of a node of the uploaded tree.
    Preview(PreviewArgs),
    /// Write an empty or sample upload template.
    Template(TemplateArgs),
}

#[derive(clap::Args)]
struct ChartFileArgs {
    /// CSV or Excel file holding the chart.
    #[arg(long)]
    file: PathBuf,

    /// Kind of chart the file describes.
    #[arg(long, value_enum)]
    chart: ChartArg,
}

#[derive(clap::Args)]
struct ImportArgs {
    #[command(flatten)]
    chart_file: ChartFileArgs,

    /// Company that receives the chart.
    #[arg(long)]
    company: String,

    /// JSON record store, created when missing.
    #[arg(long)]
    store: PathBuf,

    /// Create the company record when the store does not have it.
    #[arg(long)]
    ensure_company: bool,
}

#[derive(clap::Args)]
struct PreviewArgs {
    #[command(flatten)]
    chart_file: ChartFileArgs,

    /// Parent node to expand; omit for the top level.
    #[arg(long)]
    parent: Option<String>,
}

#[derive(clap::Args)]
struct TemplateArgs {
    #[arg(long, value_enum)]
    chart: ChartArg,

    #[arg(long, value_enum, default_value = "sample")]
    template: TemplateArg,

    #[arg(long, value_enum, default_value = "xlsx")]
    format: FormatArg,

    /// Directory the template is written into.
    #[arg(long, default_value = ".")]
    output: PathBuf,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ChartArg {
    Account,
    CostCenter,
}

impl From<ChartArg> for ChartKind {
    fn from(arg: ChartArg) -> Self {
        match arg {
            ChartArg::Account => ChartKind::Account,
            ChartArg::CostCenter => ChartKind::CostCenter,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum TemplateArg {
    Blank,
    Sample,
}

impl From<TemplateArg> for TemplateKind {
    fn from(arg: TemplateArg) -> Self {
        match arg {
            TemplateArg::Blank => TemplateKind::Blank,
            TemplateArg::Sample => TemplateKind::Sample,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    Csv,
    Xlsx,
}

impl From<FormatArg> for TemplateFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Csv => TemplateFormat::Csv,
            FormatArg::Xlsx => TemplateFormat::Xlsx,
        }
    }
}
