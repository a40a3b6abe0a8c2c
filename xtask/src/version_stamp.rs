//! `version.json` generation

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum VersionStampError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Manifest has no [package].version or [workspace.package].version")]
    MissingVersion,

    #[error("Failed to encode stamp: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionStamp {
    pub version: String,

    /// RFC 3339
    pub build_time: String,

    /// Unix milliseconds
    pub build_timestamp: i64,
}

impl VersionStamp {
    pub fn new(version: String, at: DateTime<Utc>) -> Self {
        Self {
            version,
            build_time: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            build_timestamp: at.timestamp_millis(),
        }
    }
}

/// Reads the version from manifest text
///
/// `[package].version` wins; a workspace root falls back to
/// `[workspace.package].version`. A `version.workspace = true` package
/// entry is not a version string and is skipped.
pub fn manifest_version(manifest: &str) -> Result<String, VersionStampError> {
    let value: toml::Table = manifest.parse()?;

    let package = value
        .get("package")
        .and_then(|p| p.get("version"))
        .and_then(toml::Value::as_str);

    let workspace = || {
        value
            .get("workspace")
            .and_then(|w| w.get("package"))
            .and_then(|p| p.get("version"))
            .and_then(toml::Value::as_str)
    };

    package
        .or_else(workspace)
        .map(str::to_string)
        .ok_or(VersionStampError::MissingVersion)
}

pub fn write_stamp(
    manifest: &Path,
    out: &Path,
    at: DateTime<Utc>,
) -> Result<VersionStamp, VersionStampError> {
    let text = fs::read_to_string(manifest).map_err(|source| VersionStampError::Read {
        path: manifest.to_path_buf(),
        source,
    })?;

    let stamp = VersionStamp::new(manifest_version(&text)?, at);
    let json = serde_json::to_string_pretty(&stamp)?;

    fs::write(out, json + "\n").map_err(|source| VersionStampError::Write {
        path: out.to_path_buf(),
        source,
    })?;

    Ok(stamp)
}
