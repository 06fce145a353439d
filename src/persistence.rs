//! Persistence layer for evaluation reports.
//!
//! Reports are stored as JSON Lines, one compact object per query. The
//! whole file is rewritten after every record through a sibling temp file
//! and a rename, so an interrupted run leaves a readable report holding
//! everything finished so far.

use crate::error::{PoiEvalError, Result};
use crate::report::EvaluationReport;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default filename for the report.
pub const DEFAULT_REPORT_FILENAME: &str = "advanced_evaluation_report.jsonl";

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| DEFAULT_REPORT_FILENAME.into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| PoiEvalError::io(parent, e))?;
        }
    }
    Ok(())
}

/// Encode reports as JSONL text.
pub fn to_jsonl(reports: &[EvaluationReport]) -> Result<String> {
    let mut out = String::new();
    for report in reports {
        let line = serde_json::to_string(report)
            .map_err(|e| PoiEvalError::Serialization(e.to_string()))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Replace `path` with the given reports in one rename.
pub fn save_reports(reports: &[EvaluationReport], path: &Path) -> Result<()> {
    ensure_parent(path)?;

    let data = to_jsonl(reports)?;
    let tmp = temp_path(path);
    fs::write(&tmp, data).map_err(|e| PoiEvalError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| PoiEvalError::io(path, e))?;

    Ok(())
}

/// Load reports from a JSONL file. Blank lines are ignored.
pub fn load_reports(path: &Path) -> Result<Vec<EvaluationReport>> {
    if !path.exists() {
        return Err(PoiEvalError::ReportNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| PoiEvalError::io(path, e))?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| {
                PoiEvalError::Serialization(format!("{}:{}: {}", path.display(), idx + 1, e))
            })
        })
        .collect()
}

/// Accumulating report sink for one run.
#[derive(Debug)]
pub struct ReportStore {
    path: PathBuf,
    reports: Vec<EvaluationReport>,
}

impl ReportStore {
    /// Start a fresh report at `path`, truncating anything already there.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            path: path.into(),
            reports: Vec::new(),
        };
        save_reports(&store.reports, &store.path)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Add a report and rewrite the file.
    pub fn append(&mut self, report: EvaluationReport) -> Result<()> {
        self.reports.push(report);
        save_reports(&self.reports, &self.path)?;
        debug!(path = %self.path.display(), reports = self.reports.len(), "report saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::AlignOptions;
    use crate::judge::JudgeVerdict;
    use crate::metrics::aggregate;
    use crate::poi::{PoiItem, QueryRecord};
    use tempfile::TempDir;

    fn create_test_report(query: &str) -> EvaluationReport {
        let record = QueryRecord::new(
            query,
            vec![PoiItem::new("Katara Cultural Village")],
            vec![PoiItem::new("Katara Cultural Village").with_secondary("Doha")],
        );
        let metrics = aggregate(&record.candidates, &record.references, AlignOptions::default());
        EvaluationReport::new(&record, &metrics, &JudgeVerdict::scored(9.0, None))
    }

    #[test]
    fn test_append_rewrites_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("report.jsonl");

        let mut store = ReportStore::create(&path).unwrap();
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");

        store.append(create_test_report("katara")).unwrap();
        store.append(create_test_report("katara village")).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("{\"query\":\"katara\""));
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_create_truncates_previous_run() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.jsonl");
        fs::write(&path, "stale\n").unwrap();

        let store = ReportStore::create(&path).unwrap();
        assert!(store.is_empty());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.jsonl");

        let reports = vec![create_test_report("a"), create_test_report("b")];
        save_reports(&reports, &path).unwrap();

        let loaded = load_reports(&path).unwrap();
        assert_eq!(loaded, reports);
    }

    #[test]
    fn test_load_nonexistent() {
        let result = load_reports(Path::new("/nonexistent/report.jsonl"));
        assert!(matches!(result, Err(PoiEvalError::ReportNotFound(_))));
    }

    #[test]
    fn test_load_reports_names_bad_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.jsonl");
        let good = to_jsonl(&[create_test_report("a")]).unwrap();
        fs::write(&path, format!("{}\n{{broken\n", good)).unwrap();

        let err = load_reports(&path).unwrap_err().to_string();
        assert!(err.contains(":3:"), "{}", err);
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let path = Path::new("/data/results/report.jsonl");
        assert_eq!(temp_path(path), PathBuf::from("/data/results/report.jsonl.tmp"));
    }
}
