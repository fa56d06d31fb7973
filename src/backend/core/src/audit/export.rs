//! Audit export rendering.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::str::FromStr;

use super::models::AuditLogEntry;
use crate::error::{AccessError, Result};

const CSV_HEADER: &str = "ID,User ID,Action,Resource,IP Address,User Agent,Details,Created At";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv",
        }
    }

    pub fn render(&self, entries: &[AuditLogEntry]) -> Result<Vec<u8>> {
        match self {
            Self::Json => Ok(serde_json::to_vec_pretty(entries)?),
            Self::Csv => Ok(render_csv(entries).into_bytes()),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(AccessError::validation(format!(
                "unsupported export format: {}",
                other
            ))),
        }
    }
}

/// Quote a field when it contains a delimiter, quote, or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn render_csv(entries: &[AuditLogEntry]) -> String {
    let mut out = String::with_capacity(64 * (entries.len() + 1));
    out.push_str(CSV_HEADER);
    out.push('\n');

    for entry in entries {
        let fields = [
            entry.id.to_string(),
            entry.user_id.as_ref().map(|u| u.to_string()).unwrap_or_default(),
            entry.action.clone(),
            entry.resource.clone(),
            entry.ip_address.clone(),
            entry.user_agent.clone().unwrap_or_default(),
            entry.details.to_string(),
            entry.created_at.to_rfc3339(),
        ];
        let line = fields.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(",");
        let _ = writeln!(out, "{}", line);
    }

    out
}
