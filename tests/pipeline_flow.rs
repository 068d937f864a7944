use std::path::Path;

use yolo_workbench::{
    EngineConfig, Frame, FramePipeline, InferenceEngine, MediaDescriptor, SessionAccumulator,
    CSV_HEADERS, STUB_CLASSES,
};

fn write_image(path: &Path, seed: u8) {
    let (width, height) = (64u32, 48u32);
    let data: Vec<u8> = (0..width * height * 3)
        .map(|i| (i as u8).wrapping_mul(3).wrapping_add(seed))
        .collect();
    let frame = Frame::new(data, width, height).expect("build frame");
    frame.save_png(path).expect("save fixture");
}

#[test]
fn folder_session_accumulates_and_exports() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_image(&dir.path().join("b.png"), 20);
    write_image(&dir.path().join("a.png"), 10);
    write_image(&dir.path().join("c.png"), 30);

    let mut engine = InferenceEngine::load(EngineConfig::default()).expect("engine");
    let mut pipeline = FramePipeline::new();
    pipeline
        .open(&MediaDescriptor::Path(dir.path().to_path_buf()))
        .expect("open folder");

    let mut session = SessionAccumulator::new();
    let mut labels = Vec::new();
    while let Some(result) = pipeline.tick(&mut engine) {
        let label = pipeline.source_label().expect("label").to_string();
        assert!(!result.boxes.is_empty());
        assert!(result.annotated_frame.is_some());
        session.append(&label, &result.boxes);
        labels.push(label);
    }

    assert_eq!(pipeline.ticks(), 3);
    assert_eq!(pipeline.degraded_frames(), 0);
    assert_eq!(labels, ["a.png", "b.png", "c.png"]);
    assert!(!session.is_empty());

    let csv_path = dir.path().join("session.csv");
    session.export_csv(&csv_path).expect("export");

    let raw = std::fs::read(&csv_path).expect("read export");
    assert!(raw.starts_with(b"\xEF\xBB\xBF"));

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(&raw[3..]);
    let headers = reader.headers().expect("headers").clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), CSV_HEADERS);

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.expect("row")).collect();
    assert_eq!(rows.len(), session.len());
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(&row[0], (i + 1).to_string().as_str());
        let label = &row[1];
        assert!(labels.iter().any(|l| l == label));
        let class = &row[2];
        assert!(STUB_CLASSES.iter().any(|name| *name == class));
        let confidence = &row[3];
        assert_eq!(
            format!("{:.2}", confidence.parse::<f32>().expect("confidence")),
            confidence
        );
        let coords = &row[4];
        assert!(coords.starts_with('(') && coords.ends_with(')'));
    }
}

#[test]
fn undecodable_file_degrades_but_run_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_image(&dir.path().join("a.png"), 1);
    std::fs::write(dir.path().join("broken.jpg"), b"not an image").expect("fixture");
    write_image(&dir.path().join("c.png"), 2);

    let mut engine = InferenceEngine::load(EngineConfig::default()).expect("engine");
    let mut pipeline = FramePipeline::new();
    pipeline
        .open(&MediaDescriptor::Path(dir.path().to_path_buf()))
        .expect("open folder");

    let mut results = Vec::new();
    while let Some(result) = pipeline.tick(&mut engine) {
        results.push(result);
    }

    assert_eq!(results.len(), 3);
    assert_eq!(pipeline.degraded_frames(), 1);
    assert!(results[1].boxes.is_empty());
    assert!(results[1].raw_frame.is_empty());
    assert!(!results[0].boxes.is_empty());
    assert!(!results[2].boxes.is_empty());
}

#[test]
fn synthetic_stream_runs_a_bounded_session() {
    let mut engine = InferenceEngine::load(EngineConfig::default()).expect("engine");
    let mut pipeline = FramePipeline::new();
    let descriptor: MediaDescriptor = "stub://bench".parse().expect("descriptor");
    pipeline.open(&descriptor).expect("open stream");
    assert!(pipeline.suggested_interval_ms() > 0);

    let mut session = SessionAccumulator::new();
    for _ in 0..5 {
        let result = pipeline.tick(&mut engine).expect("live source always yields");
        session.append(pipeline.source_label().expect("label"), &result.boxes);
    }

    assert_eq!(pipeline.ticks(), 5);
    assert!(session.len() >= 5);
    let first = &session.records()[0];
    assert_eq!(first.sequence_index, 1);
    assert_eq!(first.source_label, "stub://bench");
}
