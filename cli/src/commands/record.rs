use anyhow::Context;
use occtax_core::{codec, resolve_labels, Geometry, ObservationRecord};

use crate::{
    app_config::AppConfig,
    args::{RecordCommand, RecordNewArgs},
    formatters::RecordFormatter,
};

pub async fn record_cmd(config: &AppConfig, subcommand: RecordCommand) -> anyhow::Result<()> {
    let store = config.store();

    match subcommand {
        RecordCommand::New(args) => {
            let record = build_record(args)?;
            let record = store.save(&record).await.context("Failed to save record")?;

            println!("Record created ({})", record.internal_id);
        }
        RecordCommand::List(args) => {
            let records = store.read_all().await;

            let mut formatter = RecordFormatter::new(args.output);
            formatter
                .print_records(&records)
                .context("Error while formatting records")?;
        }
        RecordCommand::Show(args) => {
            let mut record = store.read(args.id).await?;

            if let Some(nomenclatures) = config.nomenclatures().await? {
                resolve_labels(&mut record, &nomenclatures);
            }

            let mut formatter = RecordFormatter::new(args.output);
            formatter
                .print_record(&record)
                .context("Error while formatting record")?;
        }
        RecordCommand::Export(args) => {
            let record = store.export(args.id).await?;

            println!(
                "Record {} ready to synchronize ({})",
                args.id,
                record.server_visible_id()
            );
        }
        RecordCommand::Delete(args) => {
            store.delete(args.id).await?;

            println!("Record {} deleted", args.id);
        }
    }

    Ok(())
}

fn build_record(args: RecordNewArgs) -> anyhow::Result<ObservationRecord> {
    let mut record = ObservationRecord::new();

    if let Some(date) = &args.date {
        let date = codec::parse_date(date).with_context(|| format!("Invalid date '{date}'"))?;
        record.set_dates(date, date);
    }

    record.set_dataset_id(args.dataset);
    record.set_observers(args.observer);
    record.set_comment(args.comment.as_deref());

    if let (Some(lon), Some(lat)) = (args.lon, args.lat) {
        record.geometry = Some(Geometry::point(lon, lat));
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::{TimeZone, Utc};

    use super::*;

    fn args() -> RecordNewArgs {
        RecordNewArgs {
            date: None,
            dataset: None,
            observer: vec![],
            comment: None,
            lon: None,
            lat: None,
        }
    }

    #[test]
    fn test_build_record() {
        let record = build_record(RecordNewArgs {
            date: Some("2024-03-16".to_string()),
            dataset: Some(3),
            observer: vec![1, 2],
            comment: Some("Bord de Loire".to_string()),
            lon: Some(-1.5),
            lat: Some(47.25),
        })
        .unwrap();

        let date = Utc.with_ymd_and_hms(2024, 3, 16, 0, 0, 0).unwrap();
        assert_eq!(record.start_date(), Some(date));
        assert_eq!(record.end_date(), Some(date));
        assert_eq!(record.dataset_id(), Some(3));
        assert_eq!(record.observers(), &[1, 2]);
        assert_eq!(record.comment(), Some("Bord de Loire"));
        assert_eq!(record.geometry, Some(Geometry::point(-1.5, 47.25)));
    }

    #[test]
    fn test_build_record_defaults_to_now() {
        let record = build_record(args()).unwrap();

        assert!(record.start_date().is_some());
        assert!(record.geometry.is_none());
        assert!(record.comment().is_none());
    }

    #[test]
    fn test_invalid_date() {
        let result = build_record(RecordNewArgs {
            date: Some("yesterday".to_string()),
            ..args()
        });

        assert!(result.is_err());
    }
}
