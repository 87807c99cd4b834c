use crate::analytics;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, read_err, required_str, store_ref, write_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{now_rfc3339, Course, Grade, Notification, Store, Student};
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

struct Snapshot {
    students: Vec<Student>,
    courses: Vec<Course>,
    grades: Vec<Grade>,
}

fn load_snapshot(store: &Store) -> anyhow::Result<Snapshot> {
    Ok(Snapshot {
        students: store.load_students()?,
        courses: store.load_courses()?,
        grades: store.load_grades()?,
    })
}

/// Authorization scoping happens here, before the engine sees the data;
/// the engine itself never filters.
fn apply_scope(snapshot: &mut Snapshot, teacher_id: Option<&str>, student_id: Option<&str>) {
    if let Some(teacher_id) = teacher_id {
        snapshot.courses.retain(|c| c.teacher_id == teacher_id);
        let course_ids: HashSet<&str> = snapshot.courses.iter().map(|c| c.id.as_str()).collect();
        snapshot
            .grades
            .retain(|g| course_ids.contains(g.course_id.as_str()));
    }
    if let Some(student_id) = student_id {
        snapshot.students.retain(|s| s.id == student_id);
        snapshot.grades.retain(|g| g.student_id == student_id);
    }
}

fn parse_threshold(req: &Request) -> Result<usize, serde_json::Value> {
    match req.params.get("threshold") {
        None => Ok(analytics::CONSECUTIVE_THRESHOLD),
        Some(v) => match v.as_u64() {
            Some(n) if n >= 2 => Ok(n as usize),
            _ => Err(err(
                &req.id,
                "bad_params",
                "threshold must be an integer >= 2",
                None,
            )),
        },
    }
}

fn handle_analytics_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut snapshot = match load_snapshot(store) {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let teacher_id = optional_str(req, "teacherId");
    let student_id = optional_str(req, "studentId");
    apply_scope(&mut snapshot, teacher_id.as_deref(), student_id.as_deref());

    let statistics = analytics::statistics(&snapshot.grades);
    ok(
        &req.id,
        json!({
            "statistics": statistics,
            "totals": {
                "students": snapshot.students.len(),
                "courses": snapshot.courses.len(),
                "grades": snapshot.grades.len()
            }
        }),
    )
}

fn handle_analytics_courses(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut snapshot = match load_snapshot(store) {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let teacher_id = optional_str(req, "teacherId");
    apply_scope(&mut snapshot, teacher_id.as_deref(), None);

    let per_course = analytics::group_by_course(&snapshot.grades, &snapshot.courses);
    let difficulty = analytics::course_difficulty(&per_course);
    ok(
        &req.id,
        json!({ "courses": per_course, "difficulty": difficulty }),
    )
}

fn handle_analytics_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut snapshot = match load_snapshot(store) {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let teacher_id = optional_str(req, "teacherId");
    apply_scope(&mut snapshot, teacher_id.as_deref(), None);

    let per_student = analytics::group_by_student(&snapshot.grades, &snapshot.students);
    let leaderboard = analytics::leaderboard(&per_student);
    ok(
        &req.id,
        json!({ "students": per_student, "leaderboard": leaderboard }),
    )
}

fn handle_analytics_trends(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let threshold = match parse_threshold(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut snapshot = match load_snapshot(store) {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let teacher_id = optional_str(req, "teacherId");
    apply_scope(&mut snapshot, teacher_id.as_deref(), None);

    let warnings = analytics::analyze_all_trends(
        &snapshot.grades,
        &snapshot.students,
        &snapshot.courses,
        threshold,
    );
    ok(
        &req.id,
        json!({ "threshold": threshold, "warnings": warnings }),
    )
}

fn handle_analytics_student_trend(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let threshold = match parse_threshold(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let snapshot = match load_snapshot(store) {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(student) = snapshot.students.iter().find(|s| s.id == student_id) else {
        return err(&req.id, "not_found", "student not found", None);
    };
    let Some(course) = snapshot.courses.iter().find(|c| c.id == course_id) else {
        return err(&req.id, "not_found", "course not found", None);
    };

    let pair_grades: Vec<Grade> = snapshot
        .grades
        .iter()
        .filter(|g| g.student_id == student_id && g.course_id == course_id)
        .cloned()
        .collect();
    let result = analytics::detect_trend(&pair_grades, threshold);

    ok(
        &req.id,
        json!({
            "student": { "id": student.id, "name": student.name },
            "course": { "id": course.id, "name": course.name },
            "threshold": threshold,
            "gradeCount": pair_grades.len(),
            "result": result
        }),
    )
}

fn handle_analytics_publish_warnings(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let threshold = match parse_threshold(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut snapshot = match load_snapshot(store) {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let teacher_id = optional_str(req, "teacherId");
    apply_scope(&mut snapshot, teacher_id.as_deref(), None);

    let warnings = analytics::analyze_all_trends(
        &snapshot.grades,
        &snapshot.students,
        &snapshot.courses,
        threshold,
    );
    if warnings.is_empty() {
        return ok(
            &req.id,
            json!({ "warnings": 0, "notificationsCreated": 0 }),
        );
    }

    let mut notifications = match store.load_notifications() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let now = now_rfc3339();
    for warning in &warnings {
        let declines = warning.result.consecutive_declines.unwrap_or(0);
        notifications.push(Notification {
            id: Uuid::new_v4().to_string(),
            user_id: warning.student_id.clone(),
            title: "Grade decline warning".to_string(),
            message: format!(
                "{} consecutive score drops in {}",
                declines, warning.course_name
            ),
            read: false,
            created_at: now.clone(),
        });
    }
    if let Err(e) = store.save_notifications(&notifications) {
        return write_err(req, e);
    }

    ok(
        &req.id,
        json!({ "warnings": warnings.len(), "notificationsCreated": warnings.len() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.overview" => Some(handle_analytics_overview(state, req)),
        "analytics.courses" => Some(handle_analytics_courses(state, req)),
        "analytics.students" => Some(handle_analytics_students(state, req)),
        "analytics.trends" => Some(handle_analytics_trends(state, req)),
        "analytics.student.trend" => Some(handle_analytics_student_trend(state, req)),
        "analytics.publishWarnings" => Some(handle_analytics_publish_warnings(state, req)),
        _ => None,
    }
}
