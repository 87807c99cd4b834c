mod test_support;

use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    name: &str,
    code: &str,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        id,
        "students.create",
        json!({ "name": name, "studentId": code }),
    );
    created
        .get("student")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string()
}

/// Record scores oldest to newest; creation order fixes recency.
fn record_scores(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
    student_id: &str,
    course_id: &str,
    scores: &[f64],
) {
    for (i, score) in scores.iter().enumerate() {
        let _ = request_ok(
            stdin,
            reader,
            &format!("{}-{}", prefix, i),
            "grades.create",
            json!({ "studentId": student_id, "courseId": course_id, "score": score }),
        );
    }
}

#[test]
fn trend_sweep_flags_consecutive_decline_and_publishes_notifications() {
    let workspace = temp_dir("gradebook-trends");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let falling = create_student(&mut stdin, &mut reader, "2", "Falling", "S-1");
    let wobbling = create_student(&mut stdin, &mut reader, "3", "Wobbling", "S-2");
    let sparse = create_student(&mut stdin, &mut reader, "4", "Sparse", "S-3");

    let course = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "courses.create",
        json!({ "name": "Algebra", "code": "MATH1", "teacherId": "t-1" }),
    );
    let course_id = course
        .get("course")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("courseId")
        .to_string();

    // Four straight drops, a non-monotonic wobble, and too little data.
    record_scores(
        &mut stdin,
        &mut reader,
        "f",
        &falling,
        &course_id,
        &[90.0, 80.0, 70.0, 60.0],
    );
    record_scores(
        &mut stdin,
        &mut reader,
        "w",
        &wobbling,
        &course_id,
        &[60.0, 70.0, 65.0],
    );
    record_scores(
        &mut stdin,
        &mut reader,
        "s",
        &sparse,
        &course_id,
        &[90.0, 10.0],
    );

    let sweep = request_ok(&mut stdin, &mut reader, "6", "analytics.trends", json!({}));
    let warnings = sweep
        .get("warnings")
        .and_then(|v| v.as_array())
        .expect("warnings");
    assert_eq!(warnings.len(), 1);
    let warning = &warnings[0];
    assert_eq!(
        warning.get("studentId").and_then(|v| v.as_str()),
        Some(falling.as_str())
    );
    assert_eq!(
        warning.get("trend").and_then(|v| v.as_str()),
        Some("declining")
    );
    assert_eq!(
        warning.get("consecutiveDeclines").and_then(|v| v.as_u64()),
        Some(4)
    );
    let recent = warning
        .get("recentGrades")
        .and_then(|v| v.as_array())
        .expect("recentGrades");
    assert_eq!(recent.len(), 4);
    assert_eq!(recent[0].get("score").and_then(|v| v.as_f64()), Some(60.0));

    // Per-pair endpoint agrees with the sweep.
    let single = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "analytics.student.trend",
        json!({ "studentId": falling, "courseId": course_id }),
    );
    let result = single.get("result").expect("result");
    assert_eq!(result.get("hasWarning").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(
        result.get("trend").and_then(|v| v.as_str()),
        Some("declining")
    );

    let single = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "analytics.student.trend",
        json!({ "studentId": wobbling, "courseId": course_id }),
    );
    let result = single.get("result").expect("result");
    assert_eq!(
        result.get("hasWarning").and_then(|v| v.as_bool()),
        Some(false)
    );
    assert_eq!(result.get("trend").and_then(|v| v.as_str()), Some("stable"));

    let single = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "analytics.student.trend",
        json!({ "studentId": sparse, "courseId": course_id }),
    );
    let result = single.get("result").expect("result");
    assert_eq!(
        result.get("trend").and_then(|v| v.as_str()),
        Some("insufficient_data")
    );
    assert_eq!(single.get("gradeCount").and_then(|v| v.as_u64()), Some(2));

    // Publishing turns each warning into an unread notification for the
    // student.
    let published = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "analytics.publishWarnings",
        json!({}),
    );
    assert_eq!(published.get("warnings").and_then(|v| v.as_u64()), Some(1));
    assert_eq!(
        published
            .get("notificationsCreated")
            .and_then(|v| v.as_u64()),
        Some(1)
    );
    let inbox = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "notifications.list",
        json!({ "userId": falling, "unreadOnly": true }),
    );
    let notifications = inbox
        .get("notifications")
        .and_then(|v| v.as_array())
        .expect("notifications");
    assert_eq!(notifications.len(), 1);
    let message = notifications[0]
        .get("message")
        .and_then(|v| v.as_str())
        .expect("message");
    assert!(message.contains("4 consecutive score drops"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn trend_threshold_is_adjustable_per_request() {
    let workspace = temp_dir("gradebook-trend-threshold");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let student = create_student(&mut stdin, &mut reader, "2", "Dipping", "S-1");
    let course = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.create",
        json!({ "name": "History", "code": "HIST1", "teacherId": "t-1" }),
    );
    let course_id = course
        .get("course")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("courseId")
        .to_string();

    record_scores(
        &mut stdin,
        &mut reader,
        "d",
        &student,
        &course_id,
        &[80.0, 70.0],
    );

    // Two grades: below the default threshold, but a two-grade run when
    // the caller lowers it.
    let sweep = request_ok(&mut stdin, &mut reader, "4", "analytics.trends", json!({}));
    assert_eq!(
        sweep
            .get("warnings")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );

    let sweep = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "analytics.trends",
        json!({ "threshold": 2 }),
    );
    let warnings = sweep
        .get("warnings")
        .and_then(|v| v.as_array())
        .expect("warnings");
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].get("consecutiveDeclines").and_then(|v| v.as_u64()),
        Some(2)
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
