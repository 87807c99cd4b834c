use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, read_err, required_str, store_ref, write_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{now_rfc3339, Grade, ScoreValue};
use serde_json::json;
use uuid::Uuid;

/// Write-time score validation. The analytics engine tolerates anything;
/// the store should only ever receive finite scores in 0..=100.
fn score_from_value(id: &str, raw: &serde_json::Value) -> Result<ScoreValue, serde_json::Value> {
    let value = match raw {
        serde_json::Value::Number(n) => n.as_f64().map(ScoreValue::Number),
        serde_json::Value::String(s) => Some(ScoreValue::Text(s.trim().to_string())),
        _ => None,
    };
    let Some(value) = value else {
        return Err(err(
            id,
            "bad_params",
            "score must be a number or decimal string",
            None,
        ));
    };
    let Some(parsed) = value.parse() else {
        return Err(err(
            id,
            "bad_params",
            "score must parse to a finite number",
            None,
        ));
    };
    if !(0.0..=100.0).contains(&parsed) {
        return Err(err(
            id,
            "bad_params",
            "score must be in range 0..=100",
            Some(json!({ "score": parsed })),
        ));
    }
    Ok(value)
}

fn comment_from_patch(
    req: &Request,
    v: &serde_json::Value,
) -> Result<Option<String>, serde_json::Value> {
    if v.is_null() {
        return Ok(None);
    }
    let Some(s) = v.as_str() else {
        return Err(err(
            &req.id,
            "bad_params",
            "comment must be string or null",
            None,
        ));
    };
    let trimmed = s.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

fn handle_grades_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut grades = match store.load_grades() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    if let Some(student_id) = optional_str(req, "studentId") {
        grades.retain(|g| g.student_id == student_id);
    }
    if let Some(course_id) = optional_str(req, "courseId") {
        grades.retain(|g| g.course_id == course_id);
    }
    ok(&req.id, json!({ "grades": grades }))
}

fn handle_grades_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let Some(raw_score) = req.params.get("score") else {
        return err(&req.id, "bad_params", "missing score", None);
    };
    let score = match score_from_value(&req.id, raw_score) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let comment = match req.params.get("comment") {
        None => None,
        Some(v) => match comment_from_patch(req, v) {
            Ok(c) => c,
            Err(e) => return e,
        },
    };

    let students = match store.load_students() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    if !students.iter().any(|s| s.id == student_id) {
        return err(&req.id, "not_found", "student not found", None);
    }
    let courses = match store.load_courses() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    if !courses.iter().any(|c| c.id == course_id) {
        return err(&req.id, "not_found", "course not found", None);
    }

    let now = now_rfc3339();
    let grade = Grade {
        id: Uuid::new_v4().to_string(),
        student_id,
        course_id,
        score,
        comment,
        created_at: now.clone(),
        updated_at: now,
    };
    let mut grades = match store.load_grades() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    grades.push(grade.clone());
    if let Err(e) = store.save_grades(&grades) {
        return write_err(req, e);
    }

    ok(&req.id, json!({ "grade": grade }))
}

fn handle_grades_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing/invalid patch", None);
    };

    let mut grades = match store.load_grades() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = grades.iter().position(|g| g.id == id) else {
        return err(&req.id, "not_found", "grade not found", None);
    };

    if let Some(v) = patch.get("score") {
        match score_from_value(&req.id, v) {
            Ok(score) => grades[idx].score = score,
            Err(e) => return e,
        }
    }
    if let Some(v) = patch.get("comment") {
        match comment_from_patch(req, v) {
            Ok(c) => grades[idx].comment = c,
            Err(e) => return e,
        }
    }
    grades[idx].updated_at = now_rfc3339();

    let updated = grades[idx].clone();
    if let Err(e) = store.save_grades(&grades) {
        return write_err(req, e);
    }
    ok(&req.id, json!({ "grade": updated }))
}

fn handle_grades_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut grades = match store.load_grades() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = grades.iter().position(|g| g.id == id) else {
        return err(&req.id, "not_found", "grade not found", None);
    };
    grades.remove(idx);
    if let Err(e) = store.save_grades(&grades) {
        return write_err(req, e);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.list" => Some(handle_grades_list(state, req)),
        "grades.create" => Some(handle_grades_create(state, req)),
        "grades.update" => Some(handle_grades_update(state, req)),
        "grades.delete" => Some(handle_grades_delete(state, req)),
        _ => None,
    }
}
