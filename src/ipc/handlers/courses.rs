use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{read_err, required_str, store_ref, write_err};
use crate::ipc::types::{AppState, Request};
use crate::store::Course;
use serde_json::json;
use uuid::Uuid;

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store.load_courses() {
        Ok(courses) => ok(&req.id, json!({ "courses": courses })),
        Err(e) => read_err(req, e),
    }
}

fn handle_courses_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let code = match required_str(req, "code") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut courses = match store.load_courses() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    if courses.iter().any(|c| c.code == code) {
        return err(
            &req.id,
            "bad_params",
            "course code already in use",
            Some(json!({ "code": code })),
        );
    }

    let course = Course {
        id: Uuid::new_v4().to_string(),
        name,
        code,
        teacher_id,
    };
    courses.push(course.clone());
    if let Err(e) = store.save_courses(&courses) {
        return write_err(req, e);
    }

    ok(&req.id, json!({ "course": course }))
}

fn handle_courses_update(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let mut courses = match store.load_courses() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = courses.iter().position(|c| c.id == id) else {
        return err(&req.id, "not_found", "course not found", None);
    };

    if let Some(v) = patch.get("name") {
        let Some(s) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(
                &req.id,
                "bad_params",
                "patch.name must be a non-empty string",
                None,
            );
        };
        courses[idx].name = s.to_string();
    }
    if let Some(v) = patch.get("code") {
        let Some(s) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(
                &req.id,
                "bad_params",
                "patch.code must be a non-empty string",
                None,
            );
        };
        if courses
            .iter()
            .enumerate()
            .any(|(i, other)| i != idx && other.code == s)
        {
            return err(
                &req.id,
                "bad_params",
                "course code already in use",
                Some(json!({ "code": s })),
            );
        }
        courses[idx].code = s.to_string();
    }
    if let Some(v) = patch.get("teacherId") {
        let Some(s) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(
                &req.id,
                "bad_params",
                "patch.teacherId must be a non-empty string",
                None,
            );
        };
        courses[idx].teacher_id = s.to_string();
    }

    let updated = courses[idx].clone();
    if let Err(e) = store.save_courses(&courses) {
        return write_err(req, e);
    }
    ok(&req.id, json!({ "course": updated }))
}

fn handle_courses_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut courses = match store.load_courses() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = courses.iter().position(|c| c.id == id) else {
        return err(&req.id, "not_found", "course not found", None);
    };

    // Dependents first: exams and grades reference the course.
    let mut exams = match store.load_exams() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let exams_before = exams.len();
    exams.retain(|x| x.course_id != id);
    let removed_exams = exams_before - exams.len();
    if removed_exams > 0 {
        if let Err(e) = store.save_exams(&exams) {
            return write_err(req, e);
        }
    }

    let mut grades = match store.load_grades() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let grades_before = grades.len();
    grades.retain(|g| g.course_id != id);
    let removed_grades = grades_before - grades.len();
    if removed_grades > 0 {
        if let Err(e) = store.save_grades(&grades) {
            return write_err(req, e);
        }
    }

    courses.remove(idx);
    if let Err(e) = store.save_courses(&courses) {
        return write_err(req, e);
    }

    ok(
        &req.id,
        json!({ "ok": true, "removedExams": removed_exams, "removedGrades": removed_grades }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.create" => Some(handle_courses_create(state, req)),
        "courses.update" => Some(handle_courses_update(state, req)),
        "courses.delete" => Some(handle_courses_delete(state, req)),
        _ => None,
    }
}
