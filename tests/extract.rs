use std::io::Write;

use assert_matches::assert_matches;
use flate2::Compression;
use flate2::write::GzEncoder;

use kira_image_harvester::error::KiraError;
use kira_image_harvester::extract::extract_from_log;

const CONSOLE: &str = "\
2024-05-01 10:00:00,001 - INFO - Reading data from minka_data/observations-417.csv
2024-05-01 10:00:02,417 - ERROR - Error downloading https://minka-sdg.org/attachments/1/large.jpeg: 500 Server Error
Downloading images:  41%|####      | 205/500 [00:41<00:59,  4.95it/s]
2024-05-01 10:00:03,008 - ERROR - Error downloading https://minka-sdg.org/attachments/2/large.png: Read timed out.
2024-05-01 10:00:03,900 - ERROR - Error downloading https://minka-sdg.org/attachments/1/large.jpeg: 500 Server Error
";

#[test]
fn reads_plain_log_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("failed_errors.txt");
    std::fs::write(&path, CONSOLE).unwrap();

    let urls = extract_from_log(&path).unwrap();

    assert_eq!(urls.len(), 2);
    assert!(urls.contains("https://minka-sdg.org/attachments/1/large.jpeg"));
    assert!(urls.contains("https://minka-sdg.org/attachments/2/large.png"));
}

#[test]
fn reads_gzipped_log_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("failed_errors.txt.gz");
    let file = std::fs::File::create(&path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(CONSOLE.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let urls = extract_from_log(&path).unwrap();
    assert_eq!(urls.len(), 2);
}

#[test]
fn reads_every_member_of_appended_gzip_log() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("errors.txt.gz");
    let mut file = std::fs::File::create(&path).unwrap();
    for line in [
        "Error downloading https://x.org/a.jpg: timeout\n",
        "Error downloading https://x.org/b.png: 503\n",
    ] {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(line.as_bytes()).unwrap();
        file.write_all(&encoder.finish().unwrap()).unwrap();
    }
    drop(file);

    let urls = extract_from_log(&path).unwrap();

    assert_eq!(urls.len(), 2);
    assert!(urls.contains("https://x.org/a.jpg"));
    assert!(urls.contains("https://x.org/b.png"));
}

#[test]
fn empty_log_is_not_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("empty.txt");
    std::fs::write(&path, "").unwrap();

    assert!(extract_from_log(&path).unwrap().is_empty());
}

#[test]
fn missing_log_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let err = extract_from_log(&temp.path().join("absent.txt")).unwrap_err();
    assert_matches!(err, KiraError::LogRead { .. });
}
