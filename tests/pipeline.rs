//! End-to-end runs: extractor output on disk → preprocessors → encoder → model →
//! reporters, plus the model-store and configuration failure paths.

use iotad::features::{FlowFeature, PacketFeature};
use iotad::{
    FeatureKey, Pipeline, PipelineConfig, PipelineError, Preprocessor, RecordStream, Registry,
};
use serde_json::{json, Value};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

const PACKETS: usize = 20;

fn write_capture(path: &Path) {
    let mut f = File::create(path).unwrap();
    for i in 0..PACKETS {
        let flags = if i == 0 { "[0,0,0,0,0,0,1,0]" } else { "[0,0,0,1,1,0,0,0]" };
        writeln!(
            f,
            "10.0.0.1 10.0.0.2 50000 1883 6 {{\"ts\":{},\"ip_len\":60,\"tcp_flags\":{}}}",
            1_000_000 + i * 1_000,
            flags
        )
        .unwrap();
    }
    // Malformed lines are dropped by the parser.
    writeln!(f, "not an extractor line").unwrap();
}

fn config(dir: &Path, preprocessors: Value) -> PipelineConfig {
    let capture = dir.join("capture.txt");
    write_capture(&capture);
    serde_json::from_value(json!({
        "data_sources": [{
            "loader": "LineFile",
            "params": { "path": capture },
            "preprocessors": preprocessors,
        }],
        "encoder": {
            "name": "BatchingEncoder",
            "params": {
                "feature_filter": ["flow_pkt_count", "flow_avg_pkt_size", "ip_size"],
                "max_batch_size": 8,
                "max_batch_time_ms": 60000
            }
        },
        "models": [{
            "name": "CentroidDistance",
            "model_name": "centroid",
            "params": { "threshold": 100.0 }
        }],
        "model_storage": dir.join("models"),
        "reporters": [
            { "name": "Accuracy" },
            { "name": "Distance" },
            { "name": "JsonLines", "params": { "path": dir.join("predictions.jsonl") } }
        ]
    }))
    .unwrap()
}

fn labelled_flow() -> Value {
    json!([
        { "name": "ExtractorLineParser" },
        { "name": "FlowAggregator" },
        { "name": "FileLabel", "params": { "label_value": 0 } }
    ])
}

#[test]
fn train_then_predict_annotates_every_record() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path(), labelled_flow()), Registry::with_defaults());

    pipeline.train().unwrap();
    assert!(dir.path().join("models/centroid/centroid.json").is_file());

    let reported = pipeline.predict().unwrap();
    assert_eq!(reported, PACKETS as u64);

    let output = fs::read_to_string(dir.path().join("predictions.jsonl")).unwrap();
    let lines: Vec<Value> = output
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), PACKETS);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line["model_name"], "centroid");
        assert_eq!(line["ground_truth"], 0);
        assert_eq!(line["output_binary"], 0);
        assert_eq!(line["flow_pkt_count"], i as u64 + 1);
        assert_eq!(line["output_distance"].as_array().unwrap().len(), 3);
    }
}

#[test]
fn training_into_existing_store_needs_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), labelled_flow());
    Pipeline::new(cfg.clone(), Registry::with_defaults()).train().unwrap();

    let again = Pipeline::new(cfg.clone(), Registry::with_defaults());
    assert!(matches!(again.train(), Err(PipelineError::ModelStoreConflict(_))));

    cfg.models[0].overwrite = true;
    Pipeline::new(cfg, Registry::with_defaults()).train().unwrap();
}

#[test]
fn predicting_without_stored_model_fails() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path(), labelled_flow()), Registry::with_defaults());
    assert!(matches!(pipeline.predict(), Err(PipelineError::ModelNotFound(_))));
}

#[test]
fn skip_saving_leaves_store_empty() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(dir.path(), labelled_flow());
    cfg.models[0].skip_saving = true;
    Pipeline::new(cfg, Registry::with_defaults()).train().unwrap();
    assert!(!dir.path().join("models/centroid").exists());
}

#[test]
fn misordered_stages_are_rejected_before_running() {
    let dir = tempfile::tempdir().unwrap();
    let stages = json!([{ "name": "FlowAggregator" }, { "name": "ExtractorLineParser" }]);
    let pipeline = Pipeline::new(config(dir.path(), stages), Registry::with_defaults());
    match pipeline.records() {
        Err(PipelineError::SignatureViolation { stage, .. }) => assert_eq!(stage, "FlowAggregator"),
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("chain should not validate"),
    }
}

#[test]
fn unknown_stage_name_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let stages = json!([{ "name": "ExtractorLineParser" }, { "name": "PacketSniffer" }]);
    let pipeline = Pipeline::new(config(dir.path(), stages), Registry::with_defaults());
    assert!(matches!(
        pipeline.count(None),
        Err(PipelineError::UnknownComponent { kind: "preprocessor", .. })
    ));
}

#[test]
fn windowed_source_only_emits_closed_windows() {
    let dir = tempfile::tempdir().unwrap();
    // 1ms apart, 5ms windows: packets 6, 12 and 18 close a window.
    let stages = json!([
        { "name": "ExtractorLineParser" },
        { "name": "WindowedFlowAggregator", "params": { "window_size_ms": 5 } }
    ]);
    let pipeline = Pipeline::new(config(dir.path(), stages), Registry::with_defaults());
    assert_eq!(pipeline.count(None).unwrap(), 3);
}

#[test]
fn count_honours_limit_and_stop_flag() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(config(dir.path(), labelled_flow()), Registry::with_defaults());
    assert_eq!(pipeline.count(None).unwrap(), PACKETS as u64);
    assert_eq!(pipeline.count(Some(5)).unwrap(), 5);

    pipeline.stop_handle().store(true, Ordering::Relaxed);
    assert_eq!(pipeline.count(None).unwrap(), 0);
}

#[test]
fn missing_config_file_gives_defaults() {
    let c = PipelineConfig::load(Path::new("nonexistent.json")).unwrap();
    assert!(c.data_sources.is_empty());
    assert_eq!(c.encoder.name, "BatchingEncoder");
    assert_eq!(c.log.level, "info");
}

#[test]
fn config_file_is_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"data_sources":[{"loader":"LineFile","params":{"path":"capture.txt"}}],"log":{"level":"debug","json":true}}"#,
    )
    .unwrap();
    let c = PipelineConfig::load(&path).unwrap();
    assert_eq!(c.data_sources[0].loader, "LineFile");
    assert!(c.data_sources[0].preprocessors.is_empty());
    assert!(c.log.json);

    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(PipelineConfig::load(&path), Err(PipelineError::Json(_))));
}

#[test]
fn undecodable_lines_are_dropped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        config(dir.path(), json!([{ "name": "ExtractorLineParser" }])),
        Registry::with_defaults(),
    );
    let mut capture = OpenOptions::new()
        .append(true)
        .open(dir.path().join("capture.txt"))
        .unwrap();
    capture.write_all(b"\xff\xfe garbage\n").unwrap();
    drop(capture);

    assert_eq!(pipeline.count(None).unwrap(), PACKETS as u64);
}

#[cfg(unix)]
#[test]
fn extractor_output_with_bad_bytes_streams_to_the_end() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("extractor.sh");
    // Far more output than a pipe buffer holds.
    fs::write(
        &script,
        r##"#!/bin/sh
printf '\377\376 garbage\n'
i=0
while [ "$i" -lt 5000 ]; do
  printf '10.0.0.1 10.0.0.2 1 2 6 {"ts":%d,"ip_len":60,"tcp_flags":[0,0,0,1,0,0,0,0]}\n' $((1000000 + i))
  i=$((i + 1))
done
"##,
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let config: PipelineConfig = serde_json::from_value(json!({
        "data_sources": [{
            "loader": "ExtractorProcess",
            "params": { "extractor": script, "input": "eth0", "mode": "device" },
            "preprocessors": [{ "name": "ExtractorLineParser" }, { "name": "FlowAggregator" }]
        }]
    }))
    .unwrap();
    let pipeline = Pipeline::new(config, Registry::with_defaults());
    assert_eq!(pipeline.count(None).unwrap(), 5000);
    // Dropping the stream early stops the extractor.
    assert_eq!(pipeline.count(Some(10)).unwrap(), 10);
}

#[test]
fn sources_drain_in_order_with_separate_state() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let captures = [first.path().join("capture.txt"), second.path().join("capture.txt")];
    for capture in &captures {
        write_capture(capture);
    }
    let source = |path: &Path| {
        json!({
            "loader": "LineFile",
            "params": { "path": path, "tag_source": true },
            "preprocessors": [{ "name": "ExtractorLineParser" }, { "name": "FlowAggregator" }]
        })
    };
    let config: PipelineConfig = serde_json::from_value(json!({
        "data_sources": [source(captures[0].as_path()), source(captures[1].as_path())]
    }))
    .unwrap();
    let pipeline = Pipeline::new(config, Registry::with_defaults());

    let records = pipeline
        .records()
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(records.len(), 2 * PACKETS);
    for (i, record) in records.iter().enumerate() {
        let expected = captures[i / PACKETS].display().to_string();
        assert_eq!(record.get_text(PacketFeature::SourceName).unwrap(), expected);
        // Same 5-tuple in both captures; counts restart with the second source.
        assert_eq!(
            record.get_i64(FlowFeature::PacketCount).unwrap(),
            (i % PACKETS) as i64 + 1
        );
    }
}

static TALLIED: AtomicU64 = AtomicU64::new(0);

/// Counts every record that reaches it.
struct Tally;

impl Preprocessor for Tally {
    fn name(&self) -> &'static str {
        "Tally"
    }

    fn input_signature(&self) -> Vec<FeatureKey> {
        Vec::new()
    }

    fn output_signature(&self) -> Vec<FeatureKey> {
        Vec::new()
    }

    fn process(self: Box<Self>, input: RecordStream) -> RecordStream {
        Box::new(input.inspect(|_| {
            TALLIED.fetch_add(1, Ordering::SeqCst);
        }))
    }
}

#[test]
fn stop_flag_prevents_further_pulls() {
    let dir = tempfile::tempdir().unwrap();
    let mut registry = Registry::with_defaults();
    registry.register_preprocessor("Tally", |_| Ok(Box::new(Tally)));
    let stages = json!([{ "name": "ExtractorLineParser" }, { "name": "Tally" }]);
    let pipeline = Pipeline::new(config(dir.path(), stages), registry);

    let mut records = pipeline.records().unwrap();
    for _ in 0..3 {
        records.next().unwrap().unwrap();
    }
    pipeline.stop_handle().store(true, Ordering::Relaxed);
    assert!(records.next().is_none());
    assert_eq!(TALLIED.load(Ordering::SeqCst), 3);
}
