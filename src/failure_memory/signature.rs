//! Operation signatures and environment fingerprints.
//!
//! Both are lowercase hex SHA-256 digests so they make fixed-width keys.

use std::path::Path;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Canonical form of operation parameters.
///
/// Object keys are sorted and string values trimmed, recursively, so two
/// parameter sets that differ only in formatting produce the same text.
pub fn canonicalize(params: &Value) -> Value {
    match params {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.trim().to_string(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

/// Signature of one operation invocation.
pub fn signature(operation: &str, params: &Value) -> String {
    let canonical = canonicalize(params);
    let mut hasher = Sha256::new();
    hasher.update(operation.trim().as_bytes());
    hasher.update(b":");
    hasher.update(canonical.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of the execution environment.
///
/// Covers the working directory, OS family, the version of this crate and
/// the sorted file list when one is given. The crate version stands in for
/// the runtime: a rebuilt guard starts with a fresh environment.
pub fn env_hash(working_dir: &Path, files: Option<&[String]>) -> String {
    let mut files: Vec<&str> = files.unwrap_or_default().iter().map(String::as_str).collect();
    files.sort_unstable();

    let snapshot = serde_json::json!({
        "cwd": working_dir.to_string_lossy(),
        "os": std::env::consts::FAMILY,
        "os_name": std::env::consts::OS,
        "crate_version": env!("CARGO_PKG_VERSION"),
        "files": files,
    });

    let mut hasher = Sha256::new();
    hasher.update(snapshot.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}
