use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::warn;

use crate::config::LoggingConfig;

const WORKFLOW_LOG_FILE: &str = "workflow.jsonl";

static REDACTION_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "api_key",
            Regex::new(r"(?i)(api[_-]?key\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid api_key regex"),
        ),
        (
            "query_key",
            Regex::new(r"([?&]key=)([^&\s]+)").expect("invalid query_key regex"),
        ),
        (
            "secret",
            Regex::new(r"(?i)(secret\s*[:=]\s*)([A-Za-z0-9\-_.+/]+)")
                .expect("invalid secret regex"),
        ),
        (
            "bearer",
            Regex::new(r"(?i)(bearer\s+)([A-Za-z0-9\-_.+=/]+)").expect("invalid bearer regex"),
        ),
        (
            "sk_token",
            Regex::new(r"(sk-[A-Za-z0-9]{16,})").expect("invalid sk_token regex"),
        ),
    ]
});

/// Summary of one finished workflow, before redaction.
#[derive(Debug, Clone)]
pub struct WorkflowLogInput {
    pub task_id: String,
    pub title: String,
    pub success: bool,
    pub confidence: f64,
    pub total_secs: f64,
    /// `(stage, error)` for every stage that ran; `None` means it succeeded.
    pub stages: Vec<(String, Option<String>)>,
    pub error: Option<String>,
}

#[derive(Serialize)]
struct StageLogRecord {
    stage: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
struct WorkflowLogRecord {
    timestamp: String,
    task_id: String,
    title: String,
    success: bool,
    confidence: f64,
    total_secs: f64,
    stages: Vec<StageLogRecord>,
    error: Option<String>,
    redactions: Vec<&'static str>,
}

/// Append-only JSONL audit trail, partitioned by year and month.
#[derive(Debug, Clone)]
pub struct AuditLog {
    base_dir: PathBuf,
    retention_days: u64,
}

impl AuditLog {
    pub fn new(base_dir: impl Into<PathBuf>, retention_days: u64) -> Self {
        Self {
            base_dir: base_dir.into(),
            retention_days,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self::new(&config.audit_dir, config.retention_days)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Redact, append one line, then prune files past retention.
    pub fn record(&self, input: WorkflowLogInput) -> Result<PathBuf> {
        let timestamp = Utc::now();
        let mut redactions = BTreeSet::new();

        let title = sanitize_text(&input.title, &mut redactions);
        let stages = input
            .stages
            .into_iter()
            .map(|(stage, error)| StageLogRecord {
                stage,
                ok: error.is_none(),
                error: error.map(|err| sanitize_text(&err, &mut redactions)),
            })
            .collect();
        let error = input
            .error
            .as_deref()
            .map(|err| sanitize_text(err, &mut redactions));

        let record = WorkflowLogRecord {
            timestamp: timestamp.to_rfc3339(),
            task_id: input.task_id.clone(),
            title,
            success: input.success,
            confidence: input.confidence,
            total_secs: input.total_secs,
            stages,
            error,
            redactions: redactions.into_iter().collect(),
        };

        if !record.redactions.is_empty() {
            warn!(
                task_id = %input.task_id,
                fields = ?record.redactions,
                "redacted potential secrets from workflow log"
            );
        }

        let path = self
            .base_dir
            .join(format!("{:04}", timestamp.year()))
            .join(format!("{:02}", timestamp.month()))
            .join(WORKFLOW_LOG_FILE);
        append_json_line(&path, &record)?;

        self.enforce_retention()?;
        Ok(path)
    }

    fn enforce_retention(&self) -> Result<()> {
        if self.retention_days == 0 || !self.base_dir.exists() {
            return Ok(());
        }
        let cutoff = SystemTime::now()
            .checked_sub(Duration::from_secs(self.retention_days.saturating_mul(86_400)))
            .unwrap_or(SystemTime::UNIX_EPOCH);
        prune_directory(&self.base_dir, cutoff)
    }
}

fn append_json_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let line = serde_json::to_string(value)?;
    writeln!(writer, "{line}")
        .with_context(|| format!("failed to append log entry to {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// Replace credential-looking substrings with `[REDACTED]`, noting which
/// patterns fired.
pub(crate) fn sanitize_text(input: &str, redactions: &mut BTreeSet<&'static str>) -> String {
    let mut output = input.to_string();
    for (name, regex) in REDACTION_PATTERNS.iter() {
        let mut matched = false;
        output = regex
            .replace_all(&output, |caps: &Captures| {
                matched = true;
                if caps.len() > 2 {
                    format!("{}[REDACTED]", &caps[1])
                } else {
                    "[REDACTED]".to_string()
                }
            })
            .to_string();
        if matched {
            redactions.insert(*name);
        }
    }
    output
}

fn prune_directory(dir: &Path, cutoff: SystemTime) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            prune_directory(&path, cutoff)?;
            if path.read_dir()?.next().is_none() {
                fs::remove_dir(&path).ok();
            }
        } else if metadata.is_file()
            && metadata
                .modified()
                .map(|time| time < cutoff)
                .unwrap_or(false)
        {
            fs::remove_file(&path).ok();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tempfile::TempDir;

    fn input() -> WorkflowLogInput {
        WorkflowLogInput {
            task_id: "task_1_1".into(),
            title: "Quantum computing".into(),
            success: true,
            confidence: 0.62,
            total_secs: 3.5,
            stages: vec![
                ("research".into(), None),
                (
                    "analysis".into(),
                    Some("language backend call failed: POST https://host/m:generateContent?key=AIzaSyExample&alt=json".into()),
                ),
            ],
            error: Some("Bearer abc.def".into()),
        }
    }

    #[test]
    fn workflow_record_is_redacted_and_partitioned() -> Result<()> {
        let temp = TempDir::new().expect("temp dir");
        let log = AuditLog::new(temp.path(), 0);

        let path = log.record(input())?;
        assert!(path.ends_with(WORKFLOW_LOG_FILE));
        assert!(path.starts_with(temp.path()));

        let line = fs::read_to_string(&path)?;
        let record: Value = serde_json::from_str(line.trim())?;
        assert_eq!(record["task_id"], "task_1_1");
        assert_eq!(record["stages"][0]["ok"], true);

        let stage_error = record["stages"][1]["error"].as_str().unwrap();
        assert!(stage_error.contains("key=[REDACTED]"));
        assert!(!stage_error.contains("AIzaSyExample"));
        assert!(stage_error.contains("&alt=json"));
        assert_eq!(record["error"], "Bearer [REDACTED]");

        let redactions: Vec<&str> = record["redactions"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(redactions, vec!["bearer", "query_key"]);
        Ok(())
    }

    #[test]
    fn records_append_to_the_same_month_file() -> Result<()> {
        let temp = TempDir::new().expect("temp dir");
        let log = AuditLog::new(temp.path(), 0);
        let first = log.record(input())?;
        let second = log.record(input())?;
        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(&first)?.lines().count(), 2);
        Ok(())
    }

    #[test]
    fn sk_tokens_are_replaced_whole() {
        let mut redactions = BTreeSet::new();
        let out = sanitize_text("token sk-abcdef1234567890XYZ used", &mut redactions);
        assert_eq!(out, "token [REDACTED] used");
        assert!(redactions.contains("sk_token"));
    }

    #[test]
    fn retention_keeps_fresh_files() -> Result<()> {
        let temp = TempDir::new().expect("temp dir");
        let log = AuditLog::new(temp.path(), 30);
        let path = log.record(input())?;
        assert!(path.exists());
        Ok(())
    }
}
