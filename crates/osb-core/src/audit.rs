use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::{
    domain::Sender,
    errors::Error,
    shards::dispatch::{SearchMode, SearchResult},
    Result,
};

const AUDIT_MAX_TEXT: usize = 500;

/// RFC3339 timestamp in UTC.
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,
    pub user_id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_shards: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undelivered: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<f64>,
}

impl AuditEvent {
    fn base(event: &str, sender: &Sender) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            user_id: sender.id.0,
            username: sender.username.clone(),
            mode: None,
            query: None,
            lines: None,
            records: None,
            failed_shards: Vec::new(),
            undelivered: None,
            retry_after: None,
        }
    }

    pub fn search(
        sender: &Sender,
        mode: SearchMode,
        query: &str,
        result: &SearchResult,
        undelivered: usize,
    ) -> Self {
        Self {
            mode: Some(mode.label().to_string()),
            query: Some(query.to_string()),
            lines: Some(result.lines.len()),
            records: Some(result.record_count()),
            failed_shards: result
                .failed_shards()
                .into_iter()
                .map(|s| s.to_string())
                .collect(),
            undelivered: Some(undelivered),
            ..Self::base("search", sender)
        }
    }

    pub fn rate_limit(sender: &Sender, retry_after: f64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::base("rate_limit", sender)
        }
    }

    pub fn unauthorized(sender: &Sender) -> Self {
        Self::base("unauthorized", sender)
    }
}

/// Append-only audit log, plain text or JSON lines.
#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(q) = &event.query {
            event.query = Some(truncate_text(q, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        let value = serde_json::to_value(&event)?;
        let Some(obj) = value.as_object() else {
            return Err(Error::External(
                "audit event is not a JSON object".to_string(),
            ));
        };

        let mut out = String::new();
        out.push('\n');
        out.push_str(&"=".repeat(60));
        for (k, v) in obj {
            out.push('\n');
            out.push_str(k);
            out.push_str(": ");
            match v {
                serde_json::Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
        }
        out.push('\n');

        file.write_all(out.as_bytes())?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}
