use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, read_err, required_str, store_ref, write_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{now_rfc3339, Exam};
use serde_json::json;
use uuid::Uuid;

fn handle_exams_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut exams = match store.load_exams() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    if let Some(course_id) = optional_str(req, "courseId") {
        exams.retain(|x| x.course_id == course_id);
    }
    ok(&req.id, json!({ "exams": exams }))
}

fn handle_exams_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam_date = match required_str(req, "examDate") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let courses = match store.load_courses() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    if !courses.iter().any(|c| c.id == course_id) {
        return err(&req.id, "not_found", "course not found", None);
    }

    let now = now_rfc3339();
    let exam = Exam {
        id: Uuid::new_v4().to_string(),
        course_id,
        title,
        exam_date,
        created_at: now.clone(),
        updated_at: now,
    };
    let mut exams = match store.load_exams() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    exams.push(exam.clone());
    if let Err(e) = store.save_exams(&exams) {
        return write_err(req, e);
    }

    ok(&req.id, json!({ "exam": exam }))
}

fn handle_exams_update(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let mut exams = match store.load_exams() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = exams.iter().position(|x| x.id == id) else {
        return err(&req.id, "not_found", "exam not found", None);
    };

    if let Some(v) = patch.get("title") {
        let Some(s) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(
                &req.id,
                "bad_params",
                "patch.title must be a non-empty string",
                None,
            );
        };
        exams[idx].title = s.to_string();
    }
    if let Some(v) = patch.get("examDate") {
        let Some(s) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(
                &req.id,
                "bad_params",
                "patch.examDate must be a non-empty string",
                None,
            );
        };
        exams[idx].exam_date = s.to_string();
    }
    exams[idx].updated_at = now_rfc3339();

    let updated = exams[idx].clone();
    if let Err(e) = store.save_exams(&exams) {
        return write_err(req, e);
    }
    ok(&req.id, json!({ "exam": updated }))
}

fn handle_exams_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut exams = match store.load_exams() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = exams.iter().position(|x| x.id == id) else {
        return err(&req.id, "not_found", "exam not found", None);
    };
    exams.remove(idx);
    if let Err(e) = store.save_exams(&exams) {
        return write_err(req, e);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.list" => Some(handle_exams_list(state, req)),
        "exams.create" => Some(handle_exams_create(state, req)),
        "exams.update" => Some(handle_exams_update(state, req)),
        "exams.delete" => Some(handle_exams_delete(state, req)),
        _ => None,
    }
}
