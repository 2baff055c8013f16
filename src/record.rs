//! The JSON interchange document.
//!
//! ```json
//! {
//!   "tracestats": [
//!     {
//!       "binary_name": "hl2",
//!       "api": "D3D9",
//!       "name": "Half-Life 2",
//!       "link": "https://www.pcgamingwiki.com/wiki/Half-Life_2",
//!       "stats": [
//!         {"stat_type": "api_calls", "stat_name": "IDirect3DDevice9::Clear", "stat_count": 4}
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Older documents carry one map per category instead of `stats`
//! (`"api_calls": {"IDirect3DDevice9::Clear": 4}`) and may omit `api`, in
//! which case it is inferred from the entry-point calls. Both shapes are
//! accepted on import; only the current one is written.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, TraceStatsError};
use crate::stats::{Accumulator, AggregatedResult, StatRow, StatType};
use crate::trace::{self, ApiVariant, TraceIdentity};

/// Top-level key of every document.
pub const DOCUMENT_KEY: &str = "tracestats";
/// Where `parse` writes when no output path is given.
pub const DEFAULT_OUTPUT: &str = "tracestats.json";

/// One trace as it appears in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub binary_name: String,
    pub api: ApiVariant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub stats: Vec<StatRow>,
}

#[derive(Debug, Serialize)]
struct Document<'a> {
    tracestats: &'a [TraceRecord],
}

impl From<&AggregatedResult> for TraceRecord {
    fn from(result: &AggregatedResult) -> Self {
        let identity = &result.identity;
        Self {
            binary_name: identity.application.clone(),
            api: identity.api.clone(),
            name: identity.display_name.clone(),
            link: identity.link.clone(),
            stats: result.counts.rows(),
        }
    }
}

impl From<TraceRecord> for AggregatedResult {
    fn from(record: TraceRecord) -> Self {
        let identity = TraceIdentity::new(record.binary_name, record.api)
            .with_display_name(record.name)
            .with_link(record.link);
        AggregatedResult::new(identity, record.stats.into_iter().collect())
    }
}

/// Serialize results into one pretty-printed document.
pub fn to_json(results: &[AggregatedResult]) -> Result<String> {
    let records: Vec<TraceRecord> = results.iter().map(TraceRecord::from).collect();
    serde_json::to_string_pretty(&Document {
        tracestats: &records,
    })
    .map_err(|e| TraceStatsError::Internal {
        message: format!("Failed to serialize trace statistics: {e}"),
    })
}

pub fn write_document(path: &Path, results: &[AggregatedResult]) -> Result<()> {
    let json = to_json(results)?;
    std::fs::write(path, json + "\n").map_err(|e| TraceStatsError::Store {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Read and validate a document file. `TraceNotFound` if it doesn't exist.
pub fn read_document(path: &Path) -> Result<Vec<AggregatedResult>> {
    let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => TraceStatsError::TraceNotFound {
            path: path.to_path_buf(),
        },
        _ => TraceStatsError::MalformedRecord {
            document: path.display().to_string(),
            reason: e.to_string(),
        },
    })?;
    parse_document(&text, &path.display().to_string())
}

/// Parse and validate a whole document.
///
/// Validation covers every entry before anything is returned, so a caller
/// never sees part of a document that is malformed further down.
/// `document` names the source in errors.
pub fn parse_document(text: &str, document: &str) -> Result<Vec<AggregatedResult>> {
    let malformed = |reason: String| TraceStatsError::MalformedRecord {
        document: document.to_string(),
        reason,
    };

    let root: Value =
        serde_json::from_str(text).map_err(|e| malformed(format!("invalid JSON: {e}")))?;
    let entries = root
        .get(DOCUMENT_KEY)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            malformed(format!(
                "not a tracestats document (no `{DOCUMENT_KEY}` list)"
            ))
        })?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_entry(entry).map_err(|reason| malformed(format!("entry {index} {reason}"))))
        .collect()
}

/// Fields of an entry that are never a legacy category map.
const IDENTITY_FIELDS: &[&str] = &["binary_name", "api", "name", "link", "stats"];

fn parse_entry(entry: &Value) -> std::result::Result<AggregatedResult, String> {
    let object = entry
        .as_object()
        .ok_or_else(|| "is not an object".to_string())?;

    let binary_name = match object.get("binary_name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            return Err("is missing required field `binary_name`".to_string());
        }
        Some(_) => return Err("has a non-string `binary_name`".to_string()),
    };
    let name = optional_string(object, "name")?;
    let link = optional_string(object, "link")?;

    let mut counts = Accumulator::new();
    if let Some(stats) = object.get("stats") {
        let rows = stats
            .as_array()
            .ok_or_else(|| "has a `stats` field that is not a list".to_string())?;
        for (index, row) in rows.iter().enumerate() {
            let row = parse_row(row).map_err(|reason| format!("stat {index} {reason}"))?;
            counts.add(row.stat_type, &row.stat_name, row.stat_count);
        }
    }
    for (key, value) in object {
        if IDENTITY_FIELDS.contains(&key.as_str()) {
            continue;
        }
        // Legacy per-category map; other scalar fields are ignored
        if let Value::Object(names) = value {
            let stat_type = StatType::from(key.as_str());
            for (stat_name, count) in names {
                let count = count
                    .as_u64()
                    .ok_or_else(|| format!("has a non-integer count for `{key}.{stat_name}`"))?;
                counts.add(stat_type.clone(), stat_name, count);
            }
        }
    }

    let api = match object.get("api") {
        Some(Value::String(api)) if !api.trim().is_empty() => ApiVariant::from(api.as_str()),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            let functions = counts
                .category(&StatType::ApiCalls)
                .into_iter()
                .flat_map(|names| names.keys().map(String::as_str));
            trace::detect_api(functions).ok_or_else(|| {
                "is missing required field `api` and has no entry-point call to infer it from"
                    .to_string()
            })?
        }
        Some(_) => return Err("has a non-string `api`".to_string()),
    };

    let identity = TraceIdentity::new(binary_name, api)
        .with_display_name(name)
        .with_link(link);
    Ok(AggregatedResult::new(identity, counts))
}

fn optional_string(
    object: &Map<String, Value>,
    field: &str,
) -> std::result::Result<Option<String>, String> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) if value.is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(format!("has a non-string `{field}`")),
    }
}

fn parse_row(row: &Value) -> std::result::Result<StatRow, String> {
    let object = row
        .as_object()
        .ok_or_else(|| "is not an object".to_string())?;
    let text = |field: &str| match object.get(field) {
        Some(Value::String(value)) if !value.is_empty() => Ok(value.clone()),
        _ => Err(format!("is missing required field `{field}`")),
    };
    let stat_type = StatType::from(text("stat_type")?);
    let stat_name = text("stat_name")?;
    let stat_count = match object.get("stat_count") {
        Some(count) => count
            .as_u64()
            .ok_or_else(|| "has a `stat_count` that is not a non-negative integer".to_string())?,
        None => return Err("is missing required field `stat_count`".to_string()),
    };
    Ok(StatRow {
        stat_type,
        stat_name,
        stat_count,
    })
}
