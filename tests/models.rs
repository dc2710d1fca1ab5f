//! Ground-truth labelling, the reference model, its store and the reporters.

use iotad::encoders::{BatchingEncoder, Encoder};
use iotad::features::{FeatureRecord, FeatureValue, PacketFeature, PredictionField};
use iotad::models::{AnomalyModel, CentroidDistanceConfig, CentroidDistanceModel, ModelStore};
use iotad::preprocessors::{CsvLabel, CsvLabelConfig, FileLabel, FileLabelConfig};
use iotad::reporting::{AccuracyReporter, DistanceReporter, Reporter};
use iotad::{PipelineError, Preprocessor};
use std::fs;
use std::path::Path;
use std::time::Duration;

fn sized(sizes: &[i64]) -> Vec<FeatureRecord> {
    sizes
        .iter()
        .map(|s| FeatureRecord::new().with(PacketFeature::PacketSize, *s))
        .collect()
}

fn encoded(records: Vec<FeatureRecord>) -> iotad::encoders::EncodedStream {
    let encoder = BatchingEncoder::new(None, 2, Duration::from_secs(60)).unwrap();
    Box::new(encoder).encode(Box::new(records.into_iter().map(Ok)))
}

fn labels(
    stage: Box<dyn Preprocessor>,
    records: Vec<FeatureRecord>,
) -> Vec<Result<i64, PipelineError>> {
    stage
        .process(Box::new(records.into_iter().map(Ok)))
        .map(|r| r.and_then(|r| r.get_i64(PredictionField::GroundTruth)))
        .collect()
}

#[test]
fn file_label_applies_zero_and_known_captures() {
    let zero = FileLabel::from_config(&FileLabelConfig {
        source_file: None,
        label_value: Some(0),
    })
    .unwrap();
    let out = labels(Box::new(zero), sized(&[1, 2]));
    assert!(out.iter().all(|l| matches!(l, Ok(0))));

    let flood = FileLabel::from_config(&FileLabelConfig {
        source_file: Some("/data/MQTTset/Data/PCAP/capture_flood.pcap".to_string()),
        label_value: None,
    })
    .unwrap();
    assert!(matches!(labels(Box::new(flood), sized(&[1]))[0], Ok(1)));

    assert!(matches!(
        FileLabel::from_config(&FileLabelConfig::default()),
        Err(PipelineError::InvalidParams { .. })
    ));
}

#[test]
fn csv_labels_run_out() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.csv");
    fs::write(&path, "index,label\n0,1\n1,0\n").unwrap();
    let stage = CsvLabel::new(&CsvLabelConfig {
        label_file: path,
        column: None,
    });
    let out = labels(Box::new(stage), sized(&[1, 2, 3]));
    assert!(matches!(out[0], Ok(1)));
    assert!(matches!(out[1], Ok(0)));
    assert!(matches!(out[2], Err(PipelineError::LabelsExhausted(_))));
}

#[test]
fn csv_label_file_opens_on_first_pull() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("late.csv");
    let stage = CsvLabel::new(&CsvLabelConfig {
        label_file: path.clone(),
        column: Some(1),
    });
    // Created after the stage was built.
    fs::write(&path, "0,1.0\n").unwrap();
    let out = labels(Box::new(stage), sized(&[1]));
    assert!(matches!(out[0], Ok(1)));

    let missing = CsvLabel::new(&CsvLabelConfig {
        label_file: dir.path().join("absent.csv"),
        column: None,
    });
    let out = labels(Box::new(missing), sized(&[1]));
    assert!(matches!(out[0], Err(PipelineError::Io(_))));
}

#[test]
fn csv_label_rejects_non_integral_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.csv");
    fs::write(&path, "index,label\n0,NaN\n1,0.5\n").unwrap();
    let stage = CsvLabel::new(&CsvLabelConfig {
        label_file: path,
        column: None,
    });
    let out = labels(Box::new(stage), sized(&[1, 2]));
    assert!(matches!(out[0], Err(PipelineError::InvalidParams { .. })));
    assert!(matches!(out[1], Err(PipelineError::InvalidParams { .. })));
}

#[test]
fn store_paths_and_guards() {
    let dir = tempfile::tempdir().unwrap();
    let store = ModelStore::new(dir.path());
    assert_eq!(store.base(), dir.path());
    assert_eq!(
        store.path_for("centroid", None),
        dir.path().join("centroid").join("centroid.json")
    );
    assert_eq!(
        store.path_for("centroid", Some(Path::new("custom/m.json"))),
        dir.path().join("custom/m.json")
    );

    let path = store.path_for("centroid", None);
    assert!(matches!(store.ensure_readable(&path), Err(PipelineError::ModelNotFound(_))));
    store.ensure_writable(&path, false).unwrap();

    ModelStore::write_json(&path, &vec![1.0, 2.0]).unwrap();
    assert!(matches!(
        store.ensure_writable(&path, false),
        Err(PipelineError::ModelStoreConflict(_))
    ));
    store.ensure_writable(&path, true).unwrap();
    store.ensure_readable(&path).unwrap();
}

#[test]
fn centroid_flags_outliers_and_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("centroid.json");
    let config = CentroidDistanceConfig {
        threshold: 2.0,
        train_label: None,
    };

    let mut model = CentroidDistanceModel::new("centroid", config.clone());
    assert!(matches!(
        model.predict(encoded(sized(&[1]))),
        Err(PipelineError::NotTrained(_))
    ));
    model.train(encoded(sized(&[90, 100, 110, 100]))).unwrap();
    model.save(&path).unwrap();

    let mut loaded = CentroidDistanceModel::new("centroid", config);
    loaded.load(&path).unwrap();
    assert!(loaded.is_fitted());

    let out: Vec<FeatureRecord> = loaded
        .predict(encoded(sized(&[100, 1000])))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].get_text(PredictionField::ModelName).unwrap(), "centroid");
    assert_eq!(out[0].get_i64(PredictionField::OutputBinary).unwrap(), 0);
    assert_eq!(out[1].get_i64(PredictionField::OutputBinary).unwrap(), 1);
    assert!(matches!(
        out[1].get(PredictionField::OutputDistance).unwrap(),
        FeatureValue::Vector(v) if v.len() == 1
    ));
}

#[test]
fn centroid_can_fit_on_one_label() {
    let mut model = CentroidDistanceModel::new(
        "benign",
        CentroidDistanceConfig {
            threshold: 3.0,
            train_label: Some(0),
        },
    );
    let records = sized(&[10, 20])
        .into_iter()
        .map(|r| r.with(PredictionField::GroundTruth, 1))
        .collect();
    assert!(matches!(
        model.train(encoded(records)),
        Err(PipelineError::InvalidParams { .. })
    ));
    assert!(!model.is_fitted());
}

fn prediction(model: &str, binary: i64, truth: i64, distance: Vec<f64>) -> FeatureRecord {
    FeatureRecord::new()
        .with(PredictionField::ModelName, model)
        .with(PredictionField::OutputBinary, binary)
        .with(PredictionField::OutputDistance, distance)
        .with(PredictionField::GroundTruth, truth)
}

#[test]
fn accuracy_counts_per_model() {
    let mut reporter = AccuracyReporter::new();
    for r in [
        prediction("a", 1, 1, vec![]),
        prediction("a", 0, 1, vec![]),
        prediction("a", 0, 0, vec![]),
        prediction("b", 1, 0, vec![]),
    ] {
        reporter.report(&r).unwrap();
    }
    reporter.end_processing().unwrap();

    let a = reporter.summary("a").unwrap();
    assert_eq!((a.correct, a.incorrect), (2, 1));
    assert!((a.accuracy() - 2.0 / 3.0).abs() < 1e-12);
    assert_eq!(reporter.summary("b").unwrap().accuracy(), 0.0);
    assert!(reporter.summary("c").is_none());
}

#[test]
fn distance_averages_by_label_and_feature() {
    let features = vec!["flow_pkt_count".to_string(), "ip_size".to_string()];
    let mut reporter = DistanceReporter::new(Some(features));
    reporter.report(&prediction("m", 0, 0, vec![1.0, -2.0])).unwrap();
    reporter.report(&prediction("m", 0, 0, vec![3.0, 4.0])).unwrap();
    reporter.report(&prediction("m", 1, 1, vec![10.0, 0.0])).unwrap();
    reporter.end_processing().unwrap();

    assert_eq!(reporter.average("m", 0, Some("flow_pkt_count")), Some(2.0));
    assert_eq!(reporter.average("m", 0, Some("ip_size")), Some(3.0));
    assert_eq!(reporter.average("m", 1, Some("flow_pkt_count")), Some(10.0));
    assert_eq!(reporter.average("m", 0, None), None);

    assert!(matches!(
        reporter.report(&prediction("m", 0, 0, vec![1.0])),
        Err(PipelineError::DimensionMismatch { expected: 2, found: 1 })
    ));
}
