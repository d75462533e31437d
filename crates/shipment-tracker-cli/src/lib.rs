//! # shipment-tracker-cli
//!
//! Command-line front end for the shipment tracking list.
//!
//! ## Commands
//!
//! - `trk add <TRACKING_ID>` - Append a tracking number
//! - `trk deliver <SEQ> [--weight KG [--volume M3]]` - Mark a record delivered
//! - `trk edit <SEQ> --set FIELD=VALUE...` - Overwrite record fields
//! - `trk find <TRACKING_ID>` - Case-insensitive lookup
//! - `trk list [--status STATUS]` - Show records, optionally by status
//! - `trk shell` - Interactive session over stdin
//!
//! ## Configuration
//!
//! - `SHIPMENT_TRACKER_FILE` - Workbook path (default: `inventory_data.xlsx`)
//! - `RUST_LOG` - Log filter for stderr diagnostics (default: `warn`)

pub mod render;
pub mod shell;

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::Value;
use shipment_tracker_api::{Delivery, DeliveryCapture, LoadNotice, Tracker};
use shipment_tracker_core::{Record, StatusFilter};
use shipment_tracker_store_xlsx::DEFAULT_FILE_NAME;

pub const CLI_CONTRACT_VERSION: &str = "cli.v1";

/// Shipment tracker - tracking numbers kept in an xlsx workbook.
#[derive(Debug, Parser)]
#[command(name = "trk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Workbook the record list is loaded from and saved to.
    #[arg(long, env = "SHIPMENT_TRACKER_FILE", default_value = DEFAULT_FILE_NAME)]
    pub file: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Get the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config { file: self.file.clone(), format: self.format }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Append a tracking number.
    Add(AddArgs),
    /// Mark a record delivered, optionally capturing weight and volume.
    Deliver(DeliverArgs),
    /// Overwrite fields of a record.
    Edit(EditArgs),
    /// Find records by tracking number (case-insensitive).
    Find(FindArgs),
    /// List records.
    List(ListArgs),
    /// Interactive session reading commands from stdin.
    Shell,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    pub tracking_id: String,
}

#[derive(Debug, Args)]
pub struct DeliverArgs {
    /// Sequence number (`№`) of the record.
    pub sequence_number: u32,
    /// Weight in kg.
    #[arg(long)]
    pub weight: Option<f64>,
    /// Volume in m³; only kept together with a weight.
    #[arg(long, requires = "weight")]
    pub volume: Option<f64>,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    /// Sequence number (`№`) of the record.
    pub sequence_number: u32,
    /// `field=value` assignment; repeat for several fields.
    #[arg(long = "set", value_name = "FIELD=VALUE", required = true)]
    pub assignments: Vec<String>,
}

#[derive(Debug, Args)]
pub struct FindArgs {
    pub tracking_id: String,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value_t = StatusArg::All)]
    pub status: StatusArg,
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    All,
    NotDelivered,
    Delivered,
}

impl StatusArg {
    #[must_use]
    pub fn into_filter(self) -> StatusFilter {
        match self {
            Self::All => StatusFilter::All,
            Self::NotDelivered => StatusFilter::NotDelivered,
            Self::Delivered => StatusFilter::Delivered,
        }
    }
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Workbook path.
    pub file: PathBuf,
    /// Output format.
    pub format: OutputFormat,
}

/// Load the workbook, execute one command, and write its output to stdout.
///
/// # Errors
/// Returns an error when the workbook cannot be loaded or saved, or the
/// command input is invalid.
pub fn run(command: Commands, config: &Config) -> Result<()> {
    let (mut tracker, notice) = Tracker::open(&config.file)?;
    report_load(&notice);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match command {
        Commands::Add(args) => run_add(&args, &mut tracker, config, &mut out),
        Commands::Deliver(args) => run_deliver(&args, &mut tracker, config, &mut out),
        Commands::Edit(args) => run_edit(&args, &mut tracker, config, &mut out),
        Commands::Find(args) => run_find(&args, &tracker, config, &mut out),
        Commands::List(args) => run_list(args.status, &tracker, config, &mut out),
        Commands::Shell => {
            let stdin = io::stdin();
            shell::Shell::new(&mut tracker, stdin.lock(), out).run()
        }
    }
}

fn report_load(notice: &LoadNotice) {
    match notice {
        LoadNotice::Loaded { .. } => eprintln!("{}", notice.message()),
        LoadNotice::StartedEmpty { .. } => eprintln!("warning: {}", notice.message()),
    }
}

fn report_save(tracker: &mut Tracker) {
    if let Some(notice) = tracker.take_save_notice() {
        eprintln!("{}", notice.message());
    }
}

fn run_add(args: &AddArgs, tracker: &mut Tracker, config: &Config, out: &mut impl Write) -> Result<()> {
    let record = tracker.add(&args.tracking_id)?;
    report_save(tracker);
    match config.format {
        OutputFormat::Json => emit_json(out, serde_json::json!({ "record": record })),
        OutputFormat::Text => match record {
            Some(record) => write_table(out, &[&record]),
            None => Ok(()),
        },
    }
}

fn run_deliver(
    args: &DeliverArgs,
    tracker: &mut Tracker,
    config: &Config,
    out: &mut impl Write,
) -> Result<()> {
    let capture = DeliveryCapture::from_answers(args.weight, args.volume);
    let delivery = tracker.deliver_captured(args.sequence_number, capture)?;
    report_save(tracker);
    match config.format {
        OutputFormat::Json => emit_json(
            out,
            serde_json::to_value(&delivery).context("failed to serialize delivery outcome")?,
        ),
        OutputFormat::Text => match &delivery {
            Delivery::Delivered(record) => write_table(out, &[record]),
            Delivery::AlreadyDelivered(record) => {
                writeln!(out, "{}", render::already_delivered_message(record))?;
                Ok(())
            }
        },
    }
}

fn run_edit(args: &EditArgs, tracker: &mut Tracker, config: &Config, out: &mut impl Write) -> Result<()> {
    let mut form = tracker.edit_form(args.sequence_number)?;
    for assignment in &args.assignments {
        let (field, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow!("expected FIELD=VALUE, got {assignment:?}"))?;
        form.set_named(field, value)?;
    }

    let record = tracker.submit(&form)?;
    report_save(tracker);
    match config.format {
        OutputFormat::Json => emit_json(out, serde_json::json!({ "record": record })),
        OutputFormat::Text => write_table(out, &[&record]),
    }
}

fn run_find(args: &FindArgs, tracker: &Tracker, config: &Config, out: &mut impl Write) -> Result<()> {
    let query = args.tracking_id.trim();
    if query.is_empty() {
        return Err(anyhow!("enter a tracking number to search for"));
    }
    let records = tracker.find(query)?;
    match config.format {
        OutputFormat::Json => {
            emit_json(out, serde_json::json!({ "query": query, "records": records }))
        }
        OutputFormat::Text if records.is_empty() => {
            writeln!(out, "{}", render::not_found_message(query))?;
            Ok(())
        }
        OutputFormat::Text => write_table(out, &records),
    }
}

fn run_list(status: StatusArg, tracker: &Tracker, config: &Config, out: &mut impl Write) -> Result<()> {
    let filter = status.into_filter();
    let records = tracker.list(filter);
    match config.format {
        OutputFormat::Json => {
            emit_json(out, serde_json::json!({ "filter": filter, "records": records }))
        }
        OutputFormat::Text => write_table(out, &records),
    }
}

fn write_table(out: &mut impl Write, records: &[&Record]) -> Result<()> {
    out.write_all(render::table(records).as_bytes())?;
    Ok(())
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(out: &mut impl Write, value: Value) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(&with_contract_version(value))?)?;
    Ok(())
}
