use image::{GrayImage, Luma};
use mediq::batch_pipeline::{run_pipeline, JoinedRecord};
use mediq::config::PipelineConfig;
use mediq::insights::load_joined_dataset;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const METADATA_HEADER: &str =
    "Image Index,Finding Labels,Follow-up #,Patient ID,Patient Age,Patient Gender,View Position";

fn write_scan(dir: &Path, name: &str, sharp: bool) {
    let image = if sharp {
        GrayImage::from_fn(16, 16, |x, y| Luma([if (x + y) % 2 == 0 { 30 } else { 220 }]))
    } else {
        GrayImage::from_pixel(16, 16, Luma([128]))
    };
    image.save(dir.join(name)).unwrap();
}

fn write_metadata(path: &Path, rows: &[&str]) {
    let mut content = String::from(METADATA_HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(path, content).unwrap();
}

struct Fixture {
    _temp: TempDir,
    config: PipelineConfig,
}

/// 4 decodable images plus one corrupt file, 5 metadata rows, 3 shared keys
fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let image_dir = temp.path().join("raw_images");
    fs::create_dir_all(&image_dir).unwrap();

    write_scan(&image_dir, "00000001_000.png", true);
    write_scan(&image_dir, "00000002_000.png", false);
    write_scan(&image_dir, "00000003_000.png", true);
    write_scan(&image_dir, "unlisted.png", true);
    fs::write(image_dir.join("00000004_000.png"), b"corrupted").unwrap();
    fs::write(image_dir.join("notes.txt"), "not an image").unwrap();

    let metadata_file = temp.path().join("Data_Entry_2017.csv");
    write_metadata(
        &metadata_file,
        &[
            "00000003_000.png,Hernia,0,3,81,F,PA",
            "00000001_000.png,Cardiomegaly|Emphysema,1,1,58,M,PA",
            "00000004_000.png,No Finding,0,4,33,M,AP",
            "00000099_000.png,Mass,0,99,45,F,PA",
            "00000002_000.png,No Finding,0,2,061Y,M,AP",
        ],
    );

    let config = PipelineConfig::new(
        image_dir,
        metadata_file,
        temp.path().join("out").join("final_data.csv"),
    );
    Fixture {
        _temp: temp,
        config,
    }
}

#[test]
fn test_pipeline_join_and_counts() {
    let fx = fixture();
    let summary = run_pipeline(&fx.config).unwrap();

    assert_eq!(summary.images_found, 5);
    assert_eq!(summary.images_processed, 4);
    assert_eq!(summary.images_failed, 1);
    assert_eq!(summary.joined_rows, 3);

    let records = load_joined_dataset(&fx.config.output_file).unwrap();
    let keys: Vec<_> = records.iter().map(|r| r.image_index.as_str()).collect();
    assert_eq!(
        keys,
        vec!["00000001_000.png", "00000002_000.png", "00000003_000.png"]
    );
}

#[test]
fn test_pipeline_output_values() {
    let fx = fixture();
    run_pipeline(&fx.config).unwrap();

    let records = load_joined_dataset(&fx.config.output_file).unwrap();
    let flat: &JoinedRecord = &records[1];
    assert_eq!(flat.brightness, 128.0);
    assert_eq!(flat.contrast, 0.0);
    assert_eq!(flat.snr, 0.0);
    assert_eq!(flat.patient_age, "061Y");
    assert_eq!(flat.patient_gender, "M");

    let sharp = &records[0];
    assert_eq!(sharp.brightness, 125.0);
    assert_eq!(sharp.contrast, 95.0);
    assert_eq!(sharp.finding_labels, "Cardiomegaly|Emphysema");
}

#[test]
fn test_pipeline_csv_header() {
    let fx = fixture();
    run_pipeline(&fx.config).unwrap();

    let content = fs::read_to_string(&fx.config.output_file).unwrap();
    assert_eq!(
        content.lines().next(),
        Some("Image Index,Brightness,Contrast,Sharpness,SNR,Finding Labels,Patient Age,Patient Gender")
    );
    assert_eq!(content.lines().count(), 4);
}

#[test]
fn test_pipeline_sidecar_only_when_requested() {
    let fx = fixture();
    let sidecar = fx
        .config
        .output_file
        .parent()
        .unwrap()
        .join("final_data.mediq.toml");

    run_pipeline(&fx.config).unwrap();
    assert!(!sidecar.exists());

    let mut config = fx.config.clone();
    config.base.skip_metadata = false;
    run_pipeline(&config).unwrap();

    let content = fs::read_to_string(&sidecar).unwrap();
    assert!(content.contains("[process]"));
    assert!(content.contains("joined_rows = 3"));
    assert!(content.contains("[process.execution]"));
}

#[test]
fn test_pipeline_missing_metadata_fails() {
    let fx = fixture();
    fs::remove_file(&fx.config.metadata_file).unwrap();

    let err = run_pipeline(&fx.config).unwrap_err();
    assert!(format!("{err:#}").contains("Data_Entry_2017.csv"));
    assert!(!fx.config.output_file.exists());
}
