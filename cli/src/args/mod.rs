use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "occtax",
    version,
    about,
    long_about = "Collect field observations offline and send them to a GeoNature server"
)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Args, Serialize)]
pub struct ConfigArgs {
    /// Name of the profile to use
    #[arg(long, short, env = "OCCTAX_PROFILE", global = true)]
    pub profile_path: Option<String>,
}

#[derive(Debug, Subcommand, Serialize, PartialEq)]
pub enum Command {
    /// Prints out current configuration
    Config,
    /// Observation records subcommands
    #[clap(subcommand)]
    Record(RecordCommand),
    /// Taxa of a record
    #[clap(subcommand)]
    Taxon(TaxonCommand),
    /// Countings of a taxon
    #[clap(subcommand)]
    Counting(CountingCommand),
    /// Sends every exported record to the server
    Sync,
}

#[derive(Debug, Subcommand, Serialize, PartialEq)]
pub enum RecordCommand {
    /// Creates a new draft record.
    New(RecordNewArgs),
    /// Lists local records, drafts first.
    List(RecordListArgs),
    /// Shows one record.
    Show(RecordShowArgs),
    /// Marks a record as ready to be sent.
    Export(RecordIdArgs),
    /// Deletes a local record.
    Delete(RecordIdArgs),
}

#[derive(Debug, Subcommand, Serialize, PartialEq)]
pub enum TaxonCommand {
    /// Adds a taxon to a record.
    Add(TaxonAddArgs),
    /// Removes a taxon from a record.
    Delete(TaxonDeleteArgs),
}

#[derive(Debug, Subcommand, Serialize, PartialEq)]
pub enum CountingCommand {
    /// Adds a counting to a taxon of a record.
    Add(CountingAddArgs),
}

#[derive(Debug, Args, Serialize, PartialEq)]
pub struct RecordNewArgs {
    /// Observation date (e.g. "2024-03-16" or "2024-03-16T08:30:00Z"), defaults to now
    #[arg(long, short)]
    pub date: Option<String>,
    /// Dataset id
    #[arg(long)]
    pub dataset: Option<i64>,
    /// Observer id (can be specified multiple times or comma-separated)
    #[arg(long, value_name = "ID", value_delimiter = ',')]
    pub observer: Vec<i64>,
    #[arg(long, short)]
    pub comment: Option<String>,
    /// Longitude of the observation point
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,
    /// Latitude of the observation point
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,
}

#[derive(Debug, Clone, ValueEnum, PartialEq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    #[default]
    Pretty,
    Plain,
    Json,
}

#[derive(Debug, Args, PartialEq, Serialize, Deserialize)]
pub struct RecordListArgs {
    /// Output format (pretty, plain, or json)
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,
}

#[derive(Debug, Args, PartialEq, Serialize, Deserialize)]
pub struct RecordShowArgs {
    #[arg(value_name = "ID")]
    pub id: i64,

    /// Output format (pretty, plain, or json)
    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub output: OutputFormat,
}

#[derive(Debug, Args, Serialize, PartialEq)]
pub struct RecordIdArgs {
    #[arg(value_name = "ID")]
    pub id: i64,
}

#[derive(Debug, Args, Serialize, PartialEq)]
pub struct TaxonAddArgs {
    /// Record id
    #[arg(value_name = "RECORD")]
    pub record: i64,
    /// Taxon reference id
    #[arg(long)]
    pub cd_nom: i64,
    /// Cited name
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub kingdom: String,
    /// Vernacular group, e.g. "Oiseaux"
    #[arg(long)]
    pub group: Option<String>,
}

#[derive(Debug, Args, Serialize, PartialEq)]
pub struct TaxonDeleteArgs {
    #[arg(value_name = "RECORD")]
    pub record: i64,
    #[arg(value_name = "CD_NOM")]
    pub cd_nom: i64,
}

#[derive(Debug, Args, Serialize, PartialEq)]
pub struct CountingAddArgs {
    #[arg(value_name = "RECORD")]
    pub record: i64,
    #[arg(value_name = "CD_NOM")]
    pub cd_nom: i64,
    #[arg(long)]
    pub min: Option<i64>,
    #[arg(long)]
    pub max: Option<i64>,
    /// Nomenclature value as CODE=ID, e.g. SEXE=168 (can be specified multiple times)
    #[arg(long, value_name = "CODE=ID", value_parser = parse_nomenclature)]
    pub nomenclature: Vec<(String, i64)>,
    /// Media file attached to the counting (can be specified multiple times)
    #[arg(long, value_name = "PATH")]
    pub media: Vec<PathBuf>,
}

pub fn parse_nomenclature(s: &str) -> anyhow::Result<(String, i64)> {
    let (code, id) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("expected CODE=ID, got '{s}'"))?;

    let code = code.trim();
    if code.is_empty() {
        anyhow::bail!("nomenclature code is empty in '{s}'");
    }

    let id = id
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("nomenclature id is not a number in '{s}'"))?;

    Ok((code.to_uppercase(), id))
}
