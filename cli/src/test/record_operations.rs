#![allow(clippy::unwrap_used)]

use predicates::prelude::*;
use predicates::str::contains;

use super::test_context::TestContext;

#[test]
fn test_new_record_is_listed_as_draft() {
    let ctx = TestContext::new();
    let id = ctx.new_record(&["--date", "2024-03-16", "--comment", "Bord de Loire"]);

    assert!(ctx.inputs_dir.join(format!("input_{id}.json")).exists());

    ctx.command()
        .args(["record", "list", "--output", "plain"])
        .assert()
        .success()
        .stdout(contains(format!("{id}\tdraft\t2024-03-16 00:00\t0")));

    ctx.command()
        .args(["record", "list", "--output", "json"])
        .assert()
        .success()
        .stdout(
            contains(format!(r#""internal_id": {id}"#))
                .and(contains(r#""comment": "Bord de Loire""#)),
        );
}

#[test]
fn test_list_without_records() {
    let ctx = TestContext::new();

    ctx.command()
        .args(["record", "list"])
        .assert()
        .success()
        .stdout(contains("No records found"));
}

#[test]
fn test_taxon_gets_default_nomenclatures() {
    let ctx = TestContext::new();
    let id = ctx.new_record(&[]);
    let record = id.to_string();

    ctx.command()
        .args(["taxon", "add", &record, "--cd-nom", "8", "--name", "Ablette"])
        .args(["--kingdom", "Animalia", "--group", "Poissons"])
        .assert()
        .success()
        .stdout(contains(format!("Taxon 8 added to record {id}")));

    ctx.command()
        .args(["record", "show", &record, "--output", "json"])
        .assert()
        .success()
        .stdout(
            contains(r#""cd_nom": 8"#)
                .and(contains(r#""id_nomenclature_bio_condition": 29"#))
                .and(contains(r#""id_nomenclature_sex": 168"#)),
        );

    ctx.command()
        .args(["record", "show", &record])
        .assert()
        .success()
        .stdout(contains("Observé vivant").and(contains("Non renseigné")));
}

#[test]
fn test_counting_add() {
    let ctx = TestContext::new();
    let id = ctx.new_record(&[]);
    let record = id.to_string();

    ctx.command()
        .args(["taxon", "add", &record, "--cd-nom", "79306", "--name", "Ophrys abeille"])
        .args(["--kingdom", "Plantae"])
        .assert()
        .success();

    ctx.command()
        .args(["counting", "add", &record, "79306", "--min", "3", "--max", "12"])
        .args(["--nomenclature", "SEXE=171"])
        .assert()
        .success()
        .stdout(contains(format!(
            "Counting 1 added to taxon 79306 of record {id}"
        )));

    ctx.command()
        .args(["record", "show", &record, "--output", "json"])
        .assert()
        .success()
        .stdout(
            contains(r#""count_min": 3"#)
                .and(contains(r#""count_max": 12"#))
                .and(contains(r#""id_nomenclature_sex": 171"#)),
        );

    ctx.command()
        .args(["record", "show", &record])
        .assert()
        .success()
        .stdout(contains("#1: 3 to 12").and(contains("SEXE: Mâle")));
}

#[test]
fn test_counting_for_unknown_taxon() {
    let ctx = TestContext::new();
    let record = ctx.new_record(&[]).to_string();

    ctx.command()
        .args(["counting", "add", &record, "8"])
        .assert()
        .failure()
        .stderr(contains("Taxon 8 not found"));
}

#[test]
fn test_taxon_delete() {
    let ctx = TestContext::new();
    let record = ctx.new_record(&[]).to_string();

    ctx.command()
        .args(["taxon", "add", &record, "--cd-nom", "8", "--name", "Ablette"])
        .args(["--kingdom", "Animalia"])
        .assert()
        .success();

    ctx.command()
        .args(["taxon", "delete", &record, "8"])
        .assert()
        .success();

    ctx.command()
        .args(["record", "show", &record, "--output", "json"])
        .assert()
        .success()
        .stdout(contains("cd_nom").not());

    ctx.command()
        .args(["taxon", "delete", &record, "8"])
        .assert()
        .failure()
        .stderr(contains("Taxon 8 not found"));
}

#[test]
fn test_export_then_delete() {
    let ctx = TestContext::new();
    let id = ctx.new_record(&[]);
    let record = id.to_string();

    ctx.command()
        .args(["record", "export", &record])
        .assert()
        .success()
        .stdout(contains(format!("Record {id} ready to synchronize")));

    ctx.command()
        .args(["record", "list", "--output", "plain"])
        .assert()
        .success()
        .stdout(contains(format!("{id}\tto_sync")));

    ctx.command()
        .args(["record", "delete", &record])
        .assert()
        .success();

    ctx.command()
        .args(["record", "show", &record])
        .assert()
        .failure()
        .stderr(contains(format!("observation record {id} not found")));
}
