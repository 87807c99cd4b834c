#[path = "../src/store.rs"]
mod store;

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use store::{Grade, ScoreValue, Store, Student, StudentStatus};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

#[test]
fn collections_roundtrip_through_whole_file_writes() {
    let workspace = temp_dir("gradebook-store");
    let store = Store::open(&workspace).expect("open store");

    // Missing files read as empty collections.
    assert!(store.load_students().expect("load students").is_empty());
    assert!(store.load_grades().expect("load grades").is_empty());

    let students = vec![Student {
        id: "s1".to_string(),
        name: "Ada Lovelace".to_string(),
        student_id: "S-001".to_string(),
        status: StudentStatus::Active,
    }];
    store.save_students(&students).expect("save students");

    let grades = vec![Grade {
        id: "g1".to_string(),
        student_id: "s1".to_string(),
        course_id: "c1".to_string(),
        score: ScoreValue::Text("88.5".to_string()),
        comment: Some("solid".to_string()),
        created_at: "2026-03-01T08:00:00+00:00".to_string(),
        updated_at: "2026-03-01T08:00:00+00:00".to_string(),
    }];
    store.save_grades(&grades).expect("save grades");

    let reloaded = store.load_students().expect("reload students");
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].student_id, "S-001");
    assert_eq!(reloaded[0].status, StudentStatus::Active);

    let reloaded = store.load_grades().expect("reload grades");
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded[0].score.parse(), Some(88.5));
    assert_eq!(reloaded[0].comment.as_deref(), Some("solid"));

    // No temp files left behind by the write cycle.
    let leftovers: Vec<String> = std::fs::read_dir(&workspace)
        .expect("read workspace")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with(".writing"))
        .collect();
    assert!(leftovers.is_empty(), "stray temp files: {:?}", leftovers);

    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn score_values_parse_only_finite_numbers() {
    assert_eq!(ScoreValue::Number(92.5).parse(), Some(92.5));
    assert_eq!(ScoreValue::Text("76".to_string()).parse(), Some(76.0));
    assert_eq!(ScoreValue::Text(" 61.5 ".to_string()).parse(), Some(61.5));
    assert_eq!(ScoreValue::Text("absent".to_string()).parse(), None);
    assert_eq!(ScoreValue::Text(String::new()).parse(), None);
    assert_eq!(ScoreValue::Number(f64::NAN).parse(), None);
    assert_eq!(ScoreValue::Number(f64::INFINITY).parse(), None);
}

#[test]
fn mixed_score_shapes_deserialize_from_legacy_files() {
    let workspace = temp_dir("gradebook-store-legacy");
    let raw = r#"[
        {"id":"g1","studentId":"s1","courseId":"c1","score":95,
         "createdAt":"2026-03-01T08:00:00+00:00","updatedAt":"2026-03-01T08:00:00+00:00"},
        {"id":"g2","studentId":"s1","courseId":"c1","score":"88.5","comment":"ok",
         "createdAt":"2026-03-02T08:00:00+00:00","updatedAt":"2026-03-02T08:00:00+00:00"}
    ]"#;
    std::fs::write(workspace.join("grades.json"), raw).expect("write grades file");

    let store = Store::open(&workspace).expect("open store");
    let grades = store.load_grades().expect("load grades");
    assert_eq!(grades.len(), 2);
    assert_eq!(grades[0].score.parse(), Some(95.0));
    assert_eq!(grades[1].score.parse(), Some(88.5));
    assert!(grades[0].comment.is_none());

    let _ = std::fs::remove_dir_all(workspace);
}
