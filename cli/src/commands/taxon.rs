use anyhow::Context;
use occtax_core::{apply_default_values, Error, Taxon, TaxonRecord, Taxonomy};
use tracing::warn;

use crate::{app_config::AppConfig, args::TaxonCommand};

pub async fn taxon_cmd(config: &AppConfig, subcommand: TaxonCommand) -> anyhow::Result<()> {
    let store = config.store();

    match subcommand {
        TaxonCommand::Add(args) => {
            let mut record = store.read(args.record).await?;

            let taxon = Taxon::new(
                args.cd_nom,
                args.name,
                Taxonomy::new(args.kingdom, args.group.as_deref()),
            );
            let mut taxon = TaxonRecord::new(record.internal_id, taxon);

            if let Some(nomenclatures) = config.nomenclatures().await? {
                match apply_default_values(&mut taxon, &nomenclatures) {
                    Ok(()) => {}
                    Err(Error::NoDefaultNomenclatureValuesFound) => {
                        warn!(cd_nom = args.cd_nom, "no default nomenclature values for taxon");
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            record.add_taxon_record(taxon);
            store
                .save(&record)
                .await
                .context("Failed to save record")?;

            println!("Taxon {} added to record {}", args.cd_nom, args.record);
        }
        TaxonCommand::Delete(args) => {
            let mut record = store.read(args.record).await?;

            if record.delete_taxon(args.cd_nom).is_none() {
                anyhow::bail!("Taxon {} not found in record {}", args.cd_nom, args.record);
            }

            store
                .save(&record)
                .await
                .context("Failed to save record")?;

            println!("Taxon {} removed from record {}", args.cd_nom, args.record);
        }
    }

    Ok(())
}
