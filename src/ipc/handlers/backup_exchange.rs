use crate::backup;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_export_bundle(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let workspace_path = match required_str(req, "workspacePath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let out_path = match required_str(req, "outPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };

    match backup::export_workspace_bundle(&workspace_path, &out_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format,
                "fileCount": summary.file_count,
                "outPath": out_path.to_string_lossy()
            }),
        ),
        Err(e) => err(&req.id, "backup_failed", e.to_string(), None),
    }
}

fn handle_import_bundle(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let in_path = match required_str(req, "inPath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let workspace_path = match required_str(req, "workspacePath") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };

    match backup::import_workspace_bundle(&in_path, &workspace_path) {
        Ok(summary) => ok(
            &req.id,
            json!({
                "bundleFormat": summary.bundle_format_detected,
                "fileCount": summary.file_count
            }),
        ),
        Err(e) => err(&req.id, "restore_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportWorkspaceBundle" => Some(handle_export_bundle(state, req)),
        "backup.importWorkspaceBundle" => Some(handle_import_bundle(state, req)),
        _ => None,
    }
}
