mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, spawn_sidecar, temp_dir};
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};

fn seed_pair(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
) -> (String, String) {
    let student = request_ok(
        stdin,
        reader,
        "seed-student",
        "students.create",
        json!({ "name": "Grace Hopper", "studentId": "S-010" }),
    );
    let student_id = student
        .get("student")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("studentId")
        .to_string();
    let course = request_ok(
        stdin,
        reader,
        "seed-course",
        "courses.create",
        json!({ "name": "Compilers", "code": "CS301", "teacherId": "t-1" }),
    );
    let course_id = course
        .get("course")
        .and_then(|v| v.get("id"))
        .and_then(|v| v.as_str())
        .expect("courseId")
        .to_string();
    (student_id, course_id)
}

#[test]
fn grades_validate_references_and_scores_at_write_time() {
    let workspace = temp_dir("gradebook-grades-crud");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let (student_id, course_id) = seed_pair(&mut stdin, &mut reader);

    // Both foreign keys must resolve.
    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "grades.create",
        json!({ "studentId": "missing", "courseId": course_id, "score": 50 }),
    );
    assert_eq!(code, "not_found");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "grades.create",
        json!({ "studentId": student_id, "courseId": "missing", "score": 50 }),
    );
    assert_eq!(code, "not_found");

    // Score validation: range and parseability are enforced on write.
    for (id, score) in [
        ("4", json!(150)),
        ("5", json!(-3)),
        ("6", json!("not-a-number")),
        ("7", json!(["nope"])),
    ] {
        let code = request_err(
            &mut stdin,
            &mut reader,
            id,
            "grades.create",
            json!({ "studentId": student_id, "courseId": course_id, "score": score }),
        );
        assert_eq!(code, "bad_params", "score {} must be rejected", id);
    }

    // Decimal strings are accepted and preserved.
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "grades.create",
        json!({
            "studentId": student_id,
            "courseId": course_id,
            "score": "88.5",
            "comment": "solid work"
        }),
    );
    let grade = created.get("grade").expect("grade");
    let grade_id = grade
        .get("id")
        .and_then(|v| v.as_str())
        .expect("gradeId")
        .to_string();
    assert_eq!(grade.get("score").and_then(|v| v.as_str()), Some("88.5"));
    assert_eq!(
        grade.get("comment").and_then(|v| v.as_str()),
        Some("solid work")
    );

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "grades.update",
        json!({ "id": grade_id, "patch": { "score": 91.25, "comment": null } }),
    );
    let grade = updated.get("grade").expect("grade");
    assert_eq!(grade.get("score").and_then(|v| v.as_f64()), Some(91.25));
    assert!(grade.get("comment").is_none());

    // List filters by student and course.
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "grades.list",
        json!({ "studentId": student_id, "courseId": course_id }),
    );
    assert_eq!(
        listed
            .get("grades")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(1)
    );
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "grades.list",
        json!({ "courseId": "other" }),
    );
    assert_eq!(
        listed
            .get("grades")
            .and_then(|v| v.as_array())
            .map(|a| a.len()),
        Some(0)
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "grades.delete",
        json!({ "id": grade_id }),
    );
    let code = request_err(
        &mut stdin,
        &mut reader,
        "13",
        "grades.delete",
        json!({ "id": grade_id }),
    );
    assert_eq!(code, "not_found");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
