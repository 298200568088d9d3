use anyhow::Context;
use occtax_core::{CountingRecord, PropertyValue, TaxonRecord};

use crate::{
    app_config::AppConfig,
    args::{CountingAddArgs, CountingCommand},
};

pub async fn counting_cmd(config: &AppConfig, subcommand: CountingCommand) -> anyhow::Result<()> {
    let store = config.store();

    match subcommand {
        CountingCommand::Add(args) => {
            let mut record = store.read(args.record).await?;
            let (record_id, cd_nom) = (args.record, args.cd_nom);

            let taxon = record
                .taxon_mut(cd_nom)
                .with_context(|| format!("Taxon {cd_nom} not found in record {record_id}"))?;

            let counting = build_counting(taxon, args)?;
            let index = counting.index();
            taxon.add_or_update_counting(counting);

            store
                .save(&record)
                .await
                .context("Failed to save record")?;

            println!("Counting {index} added to taxon {cd_nom} of record {record_id}");
        }
    }

    Ok(())
}

fn build_counting(taxon: &TaxonRecord, args: CountingAddArgs) -> anyhow::Result<CountingRecord> {
    let mut counting = taxon.create_counting();

    if let Some(max) = args.max {
        counting.set_max(max);
    }
    if let Some(min) = args.min {
        counting.set_min(min);
    }

    for (code, id) in args.nomenclature {
        counting.set_property(PropertyValue::nomenclature(code, id, None));
    }

    let medias = args
        .media
        .iter()
        .map(|path| {
            std::path::absolute(path)
                .map(|p| p.to_string_lossy().into_owned())
                .with_context(|| format!("Invalid media path {}", path.display()))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    counting.set_medias(medias);

    Ok(counting)
}
