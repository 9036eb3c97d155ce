mod common;

use std::sync::Arc;

use ideal_stock::io::{loader, reporting};
use ideal_stock::pipeline::{reconcile, PipelineConfig, PipelineOutput, ReplenishmentPipeline};
use ideal_stock::strategy::{AdditiveConfig, AdditiveForecaster};

use common::*;

fn run(records: &[ideal_stock::model::ConsumptionRecord]) -> PipelineOutput {
    let forecaster = AdditiveForecaster::new(AdditiveConfig::default());
    let config = PipelineConfig {
        workers: 2,
        ..Default::default()
    };
    ReplenishmentPipeline::new(config, Arc::new(forecaster))
        .unwrap()
        .run(records)
}

#[test]
fn constant_demand_gives_flat_forecast_and_matching_target() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_extract(
        dir.path(),
        "riwayatStok.csv",
        &ledger_lines("Bandung", "Gula", day(2024, 1, 1), &[10.0; 20]),
    );

    let extract = loader::load_extract_file(&input).unwrap();
    let output = run(&extract.records);

    assert_eq!(output.rows.len(), 14);
    assert_eq!(output.rows[0].date, day(2024, 1, 21));
    for row in &output.rows {
        assert!((row.predicted_demand - 10.0).abs() < 0.5, "{row:?}");
        assert!(row.safety_stock.abs() < 1e-6);
        assert!((row.ideal_stock - 10.0).abs() < 0.5);
    }
    assert_eq!(output.targets.len(), 1);
    assert_eq!(output.targets[0].ideal_stock, 10);

    let augmented = reconcile(&extract.table, &output.targets);
    let augmented_path = reporting::augmented_output_path(&input);
    reporting::write_augmented(&augmented_path, &augmented).unwrap();

    assert_eq!(
        augmented_path.file_name().unwrap(),
        "riwayatStok_dengan_stokIdeal.csv"
    );
    let (headers, rows) = read_artifact(&augmented_path);
    let col = column(&headers, "stokIdeal");
    assert_eq!(rows.len(), 20);
    assert!(rows.iter().all(|r| &r[col] == "10"));
}

#[test]
fn short_history_pair_gets_no_rows_and_zero_target() {
    let dir = tempfile::tempdir().unwrap();
    let mut lines = ledger_lines("Bandung", "Gula", day(2024, 1, 1), &normal_demand(30, 12.0, 3.0, 7));
    lines.extend(ledger_lines("Bandung", "Ragi", day(2024, 1, 20), &[2.0; 5]));
    let input = write_extract(dir.path(), "riwayatStok.csv", &lines);

    let extract = loader::load_extract_file(&input).unwrap();
    let output = run(&extract.records);

    assert_eq!(output.summary.forecast, 1);
    assert_eq!(output.summary.insufficient_history, 1);
    assert!(output.rows.iter().all(|r| r.material == "Gula"));

    let out_path = dir.path().join("out/augmented.csv");
    reporting::write_augmented(&out_path, &reconcile(&extract.table, &output.targets)).unwrap();
    let (headers, rows) = read_artifact(&out_path);
    let material = column(&headers, "namaBahan");
    let ideal = column(&headers, "stokIdeal");

    assert_eq!(rows.len(), 35);
    for row in &rows {
        if &row[material] == "Ragi" {
            assert_eq!(&row[ideal], "0");
        } else {
            assert_ne!(&row[ideal], "0");
        }
    }
}

#[test]
fn per_branch_files_partition_the_detail_table() {
    let dir = tempfile::tempdir().unwrap();
    let mut lines = ledger_lines("Bandung", "Gula", day(2024, 2, 1), &normal_demand(28, 40.0, 6.0, 1));
    lines.extend(ledger_lines("Jakarta", "Gula", day(2024, 2, 1), &normal_demand(28, 5.0, 1.0, 2)));
    let input = write_extract(dir.path(), "riwayatStok.csv", &lines);

    let extract = loader::load_extract_file(&input).unwrap();
    let output = run(&extract.records);

    let detail = dir.path().join("prediksi.csv");
    reporting::write_forecast_table(&detail, &output.rows).unwrap();
    let files = reporting::write_per_branch(&dir.path().join("cabang"), &output.rows).unwrap();
    assert_eq!(files.len(), 2);

    let (_, all_rows) = read_artifact(&detail);
    let mut total = 0;
    for (file, branch) in files.iter().zip(["Bandung", "Jakarta"]) {
        assert!(file.ends_with(format!("prediksi_{branch}.csv")));
        let (headers, rows) = read_artifact(file);
        let col = column(&headers, "namaCabang");
        assert_eq!(rows.len(), 14);
        assert!(rows.iter().all(|r| &r[col] == branch));
        total += rows.len();
    }
    assert_eq!(total, all_rows.len());

    let bandung = output.targets.iter().find(|t| t.branch == "Bandung").unwrap();
    let jakarta = output.targets.iter().find(|t| t.branch == "Jakarta").unwrap();
    assert!(bandung.ideal_stock > jakarta.ideal_stock);
}

#[test]
fn unparseable_date_is_skipped_without_changing_the_result() {
    let dir = tempfile::tempdir().unwrap();
    let lines = ledger_lines("Bandung", "Gula", day(2024, 3, 1), &normal_demand(21, 8.0, 2.0, 3));
    let clean = write_extract(dir.path(), "bersih.csv", &lines);

    let mut dirty_lines = lines.clone();
    dirty_lines.insert(10, "Bandung,Gula,bukan-tanggal,999".to_string());
    let dirty = write_extract(dir.path(), "kotor.csv", &dirty_lines);

    let clean_extract = loader::load_extract_file(&clean).unwrap();
    let dirty_extract = loader::load_extract_file(&dirty).unwrap();
    let clean_out = run(&clean_extract.records);
    let dirty_out = run(&dirty_extract.records);

    assert_eq!(dirty_out.summary.skipped_rows, 1);
    assert_eq!(clean_out.rows, dirty_out.rows);
    assert_eq!(clean_out.targets, dirty_out.targets);

    // The bad row still appears in the augmented copy, with its pair's target.
    let augmented = reconcile(&dirty_extract.table, &dirty_out.targets);
    assert_eq!(augmented.len(), 22);
    assert_eq!(augmented.ideal_stock[10], dirty_out.targets[0].ideal_stock);
}

#[test]
fn nothing_trained_still_writes_both_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut lines = ledger_lines("Bandung", "Gula", day(2024, 1, 1), &[3.0; 4]);
    lines.extend(ledger_lines("Jakarta", "Tepung", day(2024, 1, 1), &[1.0; 2]));
    let input = write_extract(dir.path(), "riwayatStok.csv", &lines);

    let extract = loader::load_extract_file(&input).unwrap();
    let output = run(&extract.records);
    assert!(output.rows.is_empty());
    assert!(output.diagnostic.is_none());

    let detail = dir.path().join("prediksi.csv");
    reporting::write_forecast_table(&detail, &output.rows).unwrap();
    let (headers, rows) = read_artifact(&detail);
    assert_eq!(headers.len(), reporting::FORECAST_COLUMNS.len());
    assert!(rows.is_empty());

    let augmented_path = reporting::augmented_output_path(&input);
    reporting::write_augmented(&augmented_path, &reconcile(&extract.table, &output.targets)).unwrap();
    let (headers, rows) = read_artifact(&augmented_path);
    let ideal = column(&headers, "stokIdeal");
    assert_eq!(rows.len(), 6);
    assert!(rows.iter().all(|r| &r[ideal] == "0"));
}
