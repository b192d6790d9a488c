//! Per-chunk byte transforms applied between source and target.
//!
//! A transform only ever sees one chunk; it must not assume chunk boundaries
//! line up with anything in the content. Transforms are total: input they
//! cannot handle passes through unchanged.

use std::sync::Arc;

use chrono::Utc;

use crate::errors::{Result, SyncError};

pub type Transform = Arc<dyn Fn(Vec<u8>) -> Vec<u8> + Send + Sync>;

/// Compose transforms left to right: `chain([t1, t2])(c) == t2(t1(c))`.
pub fn chain(transforms: Vec<Transform>) -> Transform {
    Arc::new(move |chunk: Vec<u8>| transforms.iter().fold(chunk, |acc, t| t(acc)))
}

/// Uppercase UTF-8 text; chunks that are not valid UTF-8 are returned as-is.
pub fn uppercase(chunk: Vec<u8>) -> Vec<u8> {
    match String::from_utf8(chunk) {
        Ok(text) => text.to_uppercase().into_bytes(),
        Err(err) => err.into_bytes(),
    }
}

/// Prefix the chunk with a `[transferred at <utc timestamp>]` line.
pub fn add_timestamp(chunk: Vec<u8>) -> Vec<u8> {
    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f");
    let mut out = format!("[transferred at {timestamp}]\n").into_bytes();
    out.extend_from_slice(&chunk);
    out
}

/// Look up a transform by name.
pub fn builtin(name: &str) -> Option<Transform> {
    let transform: Transform = match name.trim().to_ascii_lowercase().as_str() {
        "uppercase" => Arc::new(uppercase),
        "add_timestamp" => Arc::new(add_timestamp),
        "timestamp_and_uppercase" => chain(vec![Arc::new(add_timestamp), Arc::new(uppercase)]),
        _ => return None,
    };
    Some(transform)
}

pub fn builtin_names() -> &'static [&'static str] {
    &["uppercase", "add_timestamp", "timestamp_and_uppercase"]
}

/// Build a chain from a comma-separated list of builtin names.
pub fn parse_transform(names: &str) -> Result<Transform> {
    let mut transforms = Vec::new();
    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let transform = builtin(name).ok_or_else(|| {
            SyncError::config(format!(
                "unknown transform '{name}' (available: {})",
                builtin_names().join(", ")
            ))
        })?;
        transforms.push(transform);
    }
    if transforms.is_empty() {
        return Err(SyncError::config("transform list is empty"));
    }
    if transforms.len() == 1 {
        return Ok(transforms.remove(0));
    }
    Ok(chain(transforms))
}
