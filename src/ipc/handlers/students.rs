use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{read_err, required_str, store_ref, write_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{Student, StudentStatus};
use serde_json::json;
use uuid::Uuid;

fn parse_status(v: &serde_json::Value) -> Result<StudentStatus, String> {
    match v.as_str() {
        Some("active") => Ok(StudentStatus::Active),
        Some("inactive") => Ok(StudentStatus::Inactive),
        _ => Err("status must be one of: active, inactive".to_string()),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store.load_students() {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => read_err(req, e),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let code = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let status = match req.params.get("status") {
        None => StudentStatus::Active,
        Some(v) => match parse_status(v) {
            Ok(s) => s,
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        },
    };

    let mut students = match store.load_students() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    if students.iter().any(|s| s.student_id == code) {
        return err(
            &req.id,
            "bad_params",
            "studentId already in use",
            Some(json!({ "studentId": code })),
        );
    }

    let student = Student {
        id: Uuid::new_v4().to_string(),
        name,
        student_id: code,
        status,
    };
    students.push(student.clone());
    if let Err(e) = store.save_students(&students) {
        return write_err(req, e);
    }

    ok(&req.id, json!({ "student": student }))
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let mut students = match store.load_students() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = students.iter().position(|s| s.id == id) else {
        return err(&req.id, "not_found", "student not found", None);
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
        students[idx].name = s.to_string();
    }
    if let Some(v) = patch.get("studentId") {
        let Some(s) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(
                &req.id,
                "bad_params",
                "patch.studentId must be a non-empty string",
                None,
            );
        };
        if students
            .iter()
            .enumerate()
            .any(|(i, other)| i != idx && other.student_id == s)
        {
            return err(
                &req.id,
                "bad_params",
                "studentId already in use",
                Some(json!({ "studentId": s })),
            );
        }
        students[idx].student_id = s.to_string();
    }
    if let Some(v) = patch.get("status") {
        match parse_status(v) {
            Ok(s) => students[idx].status = s,
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        }
    }

    let updated = students[idx].clone();
    if let Err(e) = store.save_students(&students) {
        return write_err(req, e);
    }
    ok(&req.id, json!({ "student": updated }))
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut students = match store.load_students() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = students.iter().position(|s| s.id == id) else {
        return err(&req.id, "not_found", "student not found", None);
    };

    // Grades first, then the student row.
    let mut grades = match store.load_grades() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let before = grades.len();
    grades.retain(|g| g.student_id != id);
    let removed_grades = before - grades.len();
    if removed_grades > 0 {
        if let Err(e) = store.save_grades(&grades) {
            return write_err(req, e);
        }
    }

    students.remove(idx);
    if let Err(e) = store.save_students(&students) {
        return write_err(req, e);
    }

    ok(&req.id, json!({ "ok": true, "removedGrades": removed_grades }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
