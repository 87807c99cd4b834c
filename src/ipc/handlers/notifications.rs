use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, read_err, required_str, store_ref, write_err};
use crate::ipc::types::{AppState, Request};
use crate::store::{now_rfc3339, Notification};
use serde_json::json;
use uuid::Uuid;

fn handle_notifications_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut notifications = match store.load_notifications() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    if let Some(user_id) = optional_str(req, "userId") {
        notifications.retain(|n| n.user_id == user_id);
    }
    if req
        .params
        .get("unreadOnly")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
    {
        notifications.retain(|n| !n.read);
    }
    ok(&req.id, json!({ "notifications": notifications }))
}

fn handle_notifications_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let user_id = match required_str(req, "userId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let message = match required_str(req, "message") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let notification = Notification {
        id: Uuid::new_v4().to_string(),
        user_id,
        title,
        message,
        read: false,
        created_at: now_rfc3339(),
    };
    let mut notifications = match store.load_notifications() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    notifications.push(notification.clone());
    if let Err(e) = store.save_notifications(&notifications) {
        return write_err(req, e);
    }

    ok(&req.id, json!({ "notification": notification }))
}

fn handle_notifications_mark_read(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut notifications = match store.load_notifications() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = notifications.iter().position(|n| n.id == id) else {
        return err(&req.id, "not_found", "notification not found", None);
    };
    notifications[idx].read = true;

    let updated = notifications[idx].clone();
    if let Err(e) = store.save_notifications(&notifications) {
        return write_err(req, e);
    }
    ok(&req.id, json!({ "notification": updated }))
}

fn handle_notifications_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let store = match store_ref(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let mut notifications = match store.load_notifications() {
        Ok(v) => v,
        Err(e) => return read_err(req, e),
    };
    let Some(idx) = notifications.iter().position(|n| n.id == id) else {
        return err(&req.id, "not_found", "notification not found", None);
    };
    notifications.remove(idx);
    if let Err(e) = store.save_notifications(&notifications) {
        return write_err(req, e);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "notifications.list" => Some(handle_notifications_list(state, req)),
        "notifications.create" => Some(handle_notifications_create(state, req)),
        "notifications.markRead" => Some(handle_notifications_mark_read(state, req)),
        "notifications.delete" => Some(handle_notifications_delete(state, req)),
        _ => None,
    }
}
