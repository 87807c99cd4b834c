use anyhow::{anyhow, Context};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DATA_PREFIX: &str = "data/";
pub const BUNDLE_FORMAT_V1: &str = "gradebook-workspace-v1";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub file_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub file_count: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn collection_files(workspace: &Path) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::new();
    let entries = std::fs::read_dir(workspace).with_context(|| {
        format!("failed to read workspace {}", workspace.to_string_lossy())
    })?;
    for entry in entries {
        let entry = entry.context("failed to read workspace entry")?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.ends_with(".json") && entry.path().is_file() {
            out.push(name);
        }
    }
    out.sort();
    Ok(out)
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let files = collection_files(workspace_path)?;
    if files.is_empty() {
        return Err(anyhow!(
            "no collection files found in {}",
            workspace_path.to_string_lossy()
        ));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let mut checksums: BTreeMap<String, String> = BTreeMap::new();
    let mut payloads: Vec<(String, Vec<u8>)> = Vec::with_capacity(files.len());
    for name in &files {
        let path = workspace_path.join(name);
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.to_string_lossy()))?;
        checksums.insert(name.clone(), sha256_hex(&bytes));
        payloads.push((name.clone(), bytes));
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut bundle = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let exported_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": exported_at,
        "checksums": checksums,
    });
    bundle
        .start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    bundle
        .write_all(
            serde_json::to_string_pretty(&manifest)
                .context("failed to serialize manifest")?
                .as_bytes(),
        )
        .context("failed to write manifest entry")?;

    for (name, bytes) in &payloads {
        bundle
            .start_file(format!("{}{}", DATA_PREFIX, name), opts)
            .with_context(|| format!("failed to start entry for {}", name))?;
        bundle
            .write_all(bytes)
            .with_context(|| format!("failed to write entry for {}", name))?;
    }
    bundle.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        file_count: payloads.len(),
    })
}

pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    let Some(checksums) = manifest.get("checksums").and_then(|v| v.as_object()) else {
        return Err(anyhow!("manifest.json is missing checksums"));
    };

    let mut restored = 0usize;
    for (name, expected) in checksums {
        if name.contains('/') || name.contains("..") {
            return Err(anyhow!("invalid collection file name in manifest: {}", name));
        }
        let expected = expected.as_str().unwrap_or("");
        let entry_name = format!("{}{}", DATA_PREFIX, name);
        let mut bytes = Vec::new();
        archive
            .by_name(&entry_name)
            .with_context(|| format!("bundle missing {}", entry_name))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("failed to read {}", entry_name))?;
        let actual = sha256_hex(&bytes);
        if actual != expected {
            return Err(anyhow!(
                "checksum mismatch for {}: expected {}, got {}",
                name,
                expected,
                actual
            ));
        }

        let tmp = workspace_path.join(format!("{}.importing", name));
        std::fs::write(&tmp, &bytes)
            .with_context(|| format!("failed to write {}", tmp.to_string_lossy()))?;
        let dst = workspace_path.join(name.as_str());
        std::fs::rename(&tmp, &dst).with_context(|| {
            format!("failed to move restored file to {}", dst.to_string_lossy())
        })?;
        restored += 1;
    }

    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        file_count: restored,
    })
}
