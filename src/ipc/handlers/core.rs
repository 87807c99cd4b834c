use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::Store;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(_state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = match req.params.get("path").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => PathBuf::from(v),
        _ => return err(&req.id, "bad_params", "missing path", None),
    };

    match Store::open(&path) {
        Ok(store) => {
            let resp = ok(
                &req.id,
                json!({ "workspace": store.root().to_string_lossy() }),
            );
            state.workspace = Some(path);
            state.store = Some(store);
            resp
        }
        Err(e) => err(&req.id, "workspace_open_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
