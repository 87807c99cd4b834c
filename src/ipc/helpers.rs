use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::store::Store;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    match req.params.get(key).and_then(|v| v.as_str()).map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must not be empty", key),
            None,
        )),
        None => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn store_ref<'a>(state: &'a AppState, req: &Request) -> Result<&'a Store, serde_json::Value> {
    state
        .store
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn read_err(req: &Request, e: anyhow::Error) -> serde_json::Value {
    err(&req.id, "store_read_failed", e.to_string(), None)
}

pub fn write_err(req: &Request, e: anyhow::Error) -> serde_json::Value {
    err(&req.id, "store_write_failed", e.to_string(), None)
}
