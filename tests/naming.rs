use kira_image_harvester::domain::{IndexedRecord, ObservationRecord};
use kira_image_harvester::naming::{image_file_name, sanitize_name};

#[test]
fn record_file_name_matches_earlier_pass() {
    let record = IndexedRecord {
        position: 7,
        record: ObservationRecord {
            scientific_name: Some("Panthera leo".to_string()),
            image_url: Some("https://x.org/a/b.jpg".to_string()),
            url: Some("https://x.org/obs/123".to_string()),
        },
    };
    assert_eq!(record.file_name(), "panthera_leo_123_7.jpg");
    assert_eq!(record.file_name(), record.file_name());
}

#[test]
fn sanitize_is_stable_over_mixed_labels() {
    let words = ["Quercus", "ilex", "subsp.", "×", "(L.)", "Müll.", "var", "–", "12"];
    for a in words {
        for b in words {
            let label = format!(" {a}\t {b} ");
            let once = sanitize_name(Some(&label));
            assert_eq!(sanitize_name(Some(&once)), once, "label {label:?}");
            assert!(
                once.chars()
                    .all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-'),
                "token {once:?}"
            );
        }
    }
}

#[test]
fn malformed_observation_url_degrades_silently() {
    assert_eq!(
        image_file_name(Some("Bufo bufo"), Some("???"), 3),
        "bufo_bufo_3.jpg"
    );
    assert_eq!(
        image_file_name(Some("Bufo bufo"), Some(""), 3),
        "bufo_bufo_3.jpg"
    );
}
