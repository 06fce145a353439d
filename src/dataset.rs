//! Loading merged per-query search results.
//!
//! Producers disagree on both file layout (JSONL, a JSON array, JSONL
//! with stray commas and brackets) and field names (`solr_poiName`,
//! `poi_name`, `name`, ...). This module absorbs both so the scoring core
//! only ever sees [`QueryRecord`]s.

use crate::error::{PoiEvalError, Result};
use crate::poi::{CandidateItem, PoiItem, QueryRecord, ReferenceItem};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Key holding the candidate engine's results.
pub const CANDIDATE_LIST_KEY: &str = "solr_results";

/// Key holding the reference engine's results.
pub const REFERENCE_LIST_KEY: &str = "google_autocomplete_results";

/// Malformed lines logged before going quiet.
const MAX_LOGGED_SAMPLES: usize = 10;

const CANDIDATE_PRIMARY_FIELDS: &[&str] = &["solr_poiName", "poi_name", "solr_name", "name"];
const CANDIDATE_SECONDARY_FIELDS: &[&str] = &["solr_containerName", "container", "containerName"];
const REFERENCE_PRIMARY_FIELDS: &[&str] = &[
    "google_main_text",
    "main_text",
    "google_place_prediction_text",
    "text",
];
const REFERENCE_SECONDARY_FIELDS: &[&str] = &["google_secondary_text", "secondary_text"];

/// How the records were finally read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// One JSON object per line.
    Lines,
    /// The whole file as one JSON array.
    Array,
}

/// Options for [`load_records`].
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// Malformed lines tolerated before trying the whole-file parse.
    pub malformed_tolerance: usize,
    /// Truncate each result list to this many items.
    pub max_results: Option<usize>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            malformed_tolerance: 5,
            max_results: None,
        }
    }
}

/// Records read from an input file plus parse bookkeeping.
#[derive(Debug, Clone)]
pub struct LoadedRecords {
    pub records: Vec<QueryRecord>,
    /// Entries that could not be used (bad lines or non-record array items).
    pub skipped: usize,
    pub strategy: ParseStrategy,
}

fn is_record(obj: &Map<String, Value>) -> bool {
    obj.contains_key("query")
        || obj.contains_key(CANDIDATE_LIST_KEY)
        || obj.contains_key(REFERENCE_LIST_KEY)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_field(item: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|field| item.get(*field).and_then(scalar_text))
}

/// Map one raw result object onto a [`PoiItem`].
///
/// When none of the known name fields is present, the item's scalar
/// values are joined so it can still be matched on whatever text it has.
fn adapt_item(
    item: &Map<String, Value>,
    primary_fields: &[&str],
    secondary_fields: &[&str],
) -> PoiItem {
    let secondary = first_field(item, secondary_fields);
    let primary = match first_field(item, primary_fields) {
        Some(primary) => primary,
        None if secondary.is_some() => String::new(),
        None => item
            .values()
            .filter_map(scalar_text)
            .collect::<Vec<_>>()
            .join(" "),
    };
    PoiItem {
        primary_label: primary,
        secondary_label: secondary,
    }
}

fn adapt_list(
    record: &Map<String, Value>,
    key: &str,
    primary_fields: &[&str],
    secondary_fields: &[&str],
) -> Vec<PoiItem> {
    match record.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .map(|item| adapt_item(item, primary_fields, secondary_fields))
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            warn!(key, kind = %json_kind(other), "result list is not an array; treating as empty");
            Vec::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Convert one raw input object into a [`QueryRecord`].
pub fn adapt_record(raw: &Map<String, Value>) -> QueryRecord {
    let query = raw
        .get("query")
        .and_then(scalar_text)
        .unwrap_or_default();
    let candidates: Vec<CandidateItem> = adapt_list(
        raw,
        CANDIDATE_LIST_KEY,
        CANDIDATE_PRIMARY_FIELDS,
        CANDIDATE_SECONDARY_FIELDS,
    );
    let references: Vec<ReferenceItem> = adapt_list(
        raw,
        REFERENCE_LIST_KEY,
        REFERENCE_PRIMARY_FIELDS,
        REFERENCE_SECONDARY_FIELDS,
    );
    QueryRecord::new(query, candidates, references)
}

fn strip_bom(s: &str) -> &str {
    s.strip_prefix('\u{feff}').unwrap_or(s)
}

/// Parse `content` line by line. Returns raw records and the malformed count.
fn parse_lines(content: &str, source: &Path) -> (Vec<Map<String, Value>>, usize) {
    let mut records = Vec::new();
    let mut malformed = 0;

    for (idx, raw_line) in content.lines().enumerate() {
        let line = strip_bom(raw_line.trim());
        if line.is_empty() || line.starts_with('#') || matches!(line, "," | "[" | "]") {
            continue;
        }
        let line = line.trim_end_matches(',');

        match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(obj)) if is_record(&obj) => records.push(obj),
            Ok(_) => {
                malformed += 1;
                if malformed <= MAX_LOGGED_SAMPLES {
                    warn!(path = %source.display(), line = idx + 1, "line is JSON but not a query record");
                }
            }
            Err(e) => {
                malformed += 1;
                if malformed <= MAX_LOGGED_SAMPLES {
                    error!(
                        path = %source.display(),
                        line = idx + 1,
                        error = %e,
                        content = raw_line,
                        "malformed JSON"
                    );
                }
            }
        }
    }

    (records, malformed)
}

/// Parse `content` as a single JSON array. Returns raw records and the
/// number of array elements that were not records.
fn parse_array(content: &str) -> Result<(Vec<Map<String, Value>>, usize)> {
    let parsed: Value = serde_json::from_str(strip_bom(content.trim()))
        .map_err(|e| PoiEvalError::Serialization(format!("whole-file parse failed: {}", e)))?;

    let kind = json_kind(&parsed);
    let Value::Array(items) = parsed else {
        return Err(PoiEvalError::Serialization(format!(
            "top-level JSON is {}, expected an array",
            kind
        )));
    };

    let mut records = Vec::new();
    let mut skipped = 0;
    for (idx, item) in items.into_iter().enumerate() {
        match item {
            Value::Object(obj) if is_record(&obj) => records.push(obj),
            _ => {
                skipped += 1;
                if skipped <= MAX_LOGGED_SAMPLES {
                    debug!(index = idx + 1, "skipping non-record array element");
                }
            }
        }
    }
    Ok((records, skipped))
}

/// Parse already-read file content. See [`load_records`].
pub fn parse_records(content: &str, source: &Path, options: LoadOptions) -> LoadedRecords {
    let (mut raw_records, malformed) = parse_lines(content, source);
    let mut skipped = malformed;
    let mut strategy = ParseStrategy::Lines;

    if malformed > options.malformed_tolerance || raw_records.is_empty() {
        match parse_array(content) {
            Ok((records, array_skipped)) if !records.is_empty() => {
                info!(records = records.len(), "parsed input as a JSON array (fallback)");
                raw_records = records;
                skipped = array_skipped;
                strategy = ParseStrategy::Array;
            }
            Ok(_) => error!("parsed array contains no valid records"),
            Err(e) => {
                if !raw_records.is_empty() || malformed > 0 {
                    error!(error = %e, "failed fallback parse as JSON array");
                }
            }
        }
    }

    if malformed > 0 {
        info!(
            total_lines = content.lines().count(),
            parsed_records = raw_records.len(),
            malformed_lines = malformed,
            "input parsing summary"
        );
    }

    let records = raw_records
        .iter()
        .map(|raw| {
            let mut record = adapt_record(raw);
            if let Some(limit) = options.max_results {
                record.truncate(limit);
            }
            record
        })
        .collect();

    LoadedRecords {
        records,
        skipped,
        strategy,
    }
}

/// Load query records from a JSONL or JSON-array file.
///
/// Lines that fail to parse are skipped and counted. If more than
/// `malformed_tolerance` lines fail, or nothing parses at all, the file is
/// re-read as a single JSON array before giving up.
pub fn load_records(path: &Path, options: LoadOptions) -> Result<LoadedRecords> {
    if !path.exists() {
        return Err(PoiEvalError::InputNotFound(path.to_path_buf()));
    }
    let content = fs::read_to_string(path).map_err(|e| PoiEvalError::io(path, e))?;
    Ok(parse_records(&content, path, options))
}
