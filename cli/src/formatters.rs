use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Utc};
use occtax_core::codec::{ObservationRecordWriter, WriteOptions};
use occtax_core::{ObservationRecord, Properties, PropertyValue, Status};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::args::OutputFormat;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Prints records to stdout in the requested format.
pub struct RecordFormatter {
    stdout: StandardStream,
    output: OutputFormat,
}

impl RecordFormatter {
    pub fn new(output: OutputFormat) -> Self {
        let choice = if io::stdout().is_terminal() {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };

        RecordFormatter {
            stdout: StandardStream::stdout(choice),
            output,
        }
    }

    pub fn print_records(&mut self, records: &[ObservationRecord]) -> anyhow::Result<()> {
        match self.output {
            OutputFormat::Json => {
                let values = records
                    .iter()
                    .map(to_json)
                    .collect::<serde_json::Result<Vec<_>>>()?;
                writeln!(self.stdout, "{}", serde_json::to_string_pretty(&values)?)?;
            }
            OutputFormat::Plain => {
                for record in records {
                    writeln!(
                        self.stdout,
                        "{}\t{}\t{}\t{}",
                        record.internal_id,
                        record.status,
                        format_date(record.start_date()),
                        record.taxa().len()
                    )?;
                }
            }
            OutputFormat::Pretty => {
                if records.is_empty() {
                    writeln!(self.stdout, "No records found")?;
                }

                for record in records {
                    self.print_summary(record)?;
                }
            }
        }

        Ok(())
    }

    pub fn print_record(&mut self, record: &ObservationRecord) -> anyhow::Result<()> {
        match self.output {
            OutputFormat::Json => {
                writeln!(
                    self.stdout,
                    "{}",
                    serde_json::to_string_pretty(&to_json(record)?)?
                )?;
            }
            OutputFormat::Plain => {
                writeln!(self.stdout, "id\t{}", record.internal_id)?;
                writeln!(self.stdout, "status\t{}", record.status)?;
                writeln!(self.stdout, "start\t{}", format_date(record.start_date()))?;
                writeln!(self.stdout, "end\t{}", format_date(record.end_date()))?;
                for taxon in record.taxa() {
                    writeln!(
                        self.stdout,
                        "taxon\t{}\t{}\t{}",
                        taxon.taxon().id,
                        taxon.taxon().name,
                        taxon.counting().len()
                    )?;
                }
            }
            OutputFormat::Pretty => self.print_details(record)?,
        }

        Ok(())
    }

    fn print_summary(&mut self, record: &ObservationRecord) -> io::Result<()> {
        self.print_status(record.status)?;

        self.stdout.set_color(ColorSpec::new().set_bold(true))?;
        write!(self.stdout, " {}", record.internal_id)?;
        self.stdout.reset()?;

        write!(
            self.stdout,
            "  {}  {} taxa",
            format_date(record.start_date()),
            record.taxa().len()
        )?;

        if let Some(comment) = record.comment() {
            self.stdout.set_color(ColorSpec::new().set_dimmed(true))?;
            write!(self.stdout, "  {comment}")?;
            self.stdout.reset()?;
        }

        writeln!(self.stdout)
    }

    fn print_details(&mut self, record: &ObservationRecord) -> io::Result<()> {
        self.print_summary(record)?;

        if let Some(id) = record.id {
            writeln!(self.stdout, "  server id: {id}")?;
        }
        writeln!(
            self.stdout,
            "  period: {} to {}",
            format_date(record.start_date()),
            format_date(record.end_date())
        )?;
        if let Some(dataset) = record.dataset_id() {
            writeln!(self.stdout, "  dataset: {dataset}")?;
        }
        if !record.observers().is_empty() {
            let observers: Vec<String> =
                record.observers().iter().map(i64::to_string).collect();
            writeln!(self.stdout, "  observers: {}", observers.join(", "))?;
        }
        if let Some(position) = record.geometry.as_ref().and_then(|g| g.anchor()) {
            writeln!(self.stdout, "  position: {position:?}")?;
        }
        self.print_nomenclatures(record.properties(), 2)?;

        for taxon in record.taxa() {
            self.stdout
                .set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true))?;
            write!(self.stdout, "  {}", taxon.taxon().name)?;
            self.stdout.reset()?;
            writeln!(
                self.stdout,
                " ({}, {})",
                taxon.taxon().id,
                taxon.taxon().taxonomy.kingdom
            )?;
            self.print_nomenclatures(taxon.properties(), 4)?;

            for counting in taxon.counting() {
                writeln!(
                    self.stdout,
                    "    #{}: {} to {}",
                    counting.index(),
                    counting.min(),
                    counting.max()
                )?;
                self.print_nomenclatures(counting.properties(), 6)?;
                for media in counting.medias() {
                    writeln!(self.stdout, "      media: {media}")?;
                }
            }
        }

        Ok(())
    }

    fn print_nomenclatures(&mut self, properties: &Properties, indent: usize) -> io::Result<()> {
        for value in properties.values() {
            if let PropertyValue::Nomenclature { code, label, value } = value {
                match label {
                    Some(label) => writeln!(self.stdout, "{:indent$}{code}: {label}", "")?,
                    None => writeln!(self.stdout, "{:indent$}{code}: {value}", "")?,
                }
            }
        }

        Ok(())
    }

    fn print_status(&mut self, status: Status) -> io::Result<()> {
        let color = match status {
            Status::Draft => Color::Yellow,
            Status::ToSync | Status::SyncInProgress => Color::Cyan,
            Status::SyncSuccessful => Color::Green,
            Status::SyncError => Color::Red,
        };

        self.stdout.set_color(ColorSpec::new().set_fg(Some(color)))?;
        write!(self.stdout, "[{status}]")?;
        self.stdout.reset()
    }
}

/// The local copy shape of a record.
fn to_json(record: &ObservationRecord) -> serde_json::Result<serde_json::Value> {
    serde_json::to_value(ObservationRecordWriter {
        record,
        options: WriteOptions::default(),
    })
}

fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_else(|| "-".to_string())
}
