use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{read_err, required_str, store_ref, write_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{now_rfc3339, User, UserRole};
use serde_json::json;
use uuid::Uuid;

fn parse_role(v: &serde_json::Value) -> Result<UserRole, String> {
    match v.as_str() {
        Some("admin") => Ok(UserRole::Admin),
        Some("teacher") => Ok(UserRole::Teacher),
        Some("student") => Ok(UserRole::Student),
        _ => Err("role must be one of: admin, teacher, student".to_string()),
    }
}

fn handle_users_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store.load_users() {
        Ok(users) => ok(&req.id, json!({ "users": users })),
        Err(e) => read_err(req, e),
    }
}

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(raw_role) = req.params.get("role") else {
        return err(&req.id, "bad_params", "missing role", None);
    };
    let role = match parse_role(raw_role) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };

    let mut users = match store.load_users() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    if users.iter().any(|u| u.username == username) {
        return err(
            &req.id,
            "bad_params",
            "username already in use",
            Some(json!({ "username": username })),
        );
    }

    let now = now_rfc3339();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username,
        name,
        role,
        created_at: now.clone(),
        updated_at: now,
    };
    users.push(user.clone());
    if let Err(e) = store.save_users(&users) {
        return write_err(req, e);
    }

    ok(&req.id, json!({ "user": user }))
}

fn handle_users_update(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    let mut users = match store.load_users() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = users.iter().position(|u| u.id == id) else {
        return err(&req.id, "not_found", "user not found", None);
    };

    if let Some(v) = patch.get("username") {
        let Some(s) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(
                &req.id,
                "bad_params",
                "patch.username must be a non-empty string",
                None,
            );
        };
        if users
            .iter()
            .enumerate()
            .any(|(i, other)| i != idx && other.username == s)
        {
            return err(
                &req.id,
                "bad_params",
                "username already in use",
                Some(json!({ "username": s })),
            );
        }
        users[idx].username = s.to_string();
    }
    if let Some(v) = patch.get("name") {
        let Some(s) = v.as_str().map(str::trim).filter(|s| !s.is_empty()) else {
            return err(
                &req.id,
                "bad_params",
                "patch.name must be a non-empty string",
                None,
            );
        };
        users[idx].name = s.to_string();
    }
    if let Some(v) = patch.get("role") {
        match parse_role(v) {
            Ok(role) => users[idx].role = role,
            Err(msg) => return err(&req.id, "bad_params", msg, None),
        }
    }
    users[idx].updated_at = now_rfc3339();

    let updated = users[idx].clone();
    if let Err(e) = store.save_users(&users) {
        return write_err(req, e);
    }
    ok(&req.id, json!({ "user": updated }))
}

fn handle_users_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut users = match store.load_users() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = users.iter().position(|u| u.id == id) else {
        return err(&req.id, "not_found", "user not found", None);
    };
    users.remove(idx);
    if let Err(e) = store.save_users(&users) {
        return write_err(req, e);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.list" => Some(handle_users_list(state, req)),
        "users.create" => Some(handle_users_create(state, req)),
        "users.update" => Some(handle_users_update(state, req)),
        "users.delete" => Some(handle_users_delete(state, req)),
        _ => None,
    }
}
