//! Structured logging with credential redaction.
//!
//! Bearer tokens and ID tokens must never reach a log sink or the audit
//! trail in clear text. [`SensitiveFieldRedactor`] masks them by key name
//! and by value shape.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::ObservabilityConfig;

static REDACTOR: OnceLock<SensitiveFieldRedactor> = OnceLock::new();

/// JWT compact serialization: three base64url segments, header starts with `{"`.
const JWT_PATTERN: &str = r"eyJ[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]+\.[a-zA-Z0-9_-]*";
const BEARER_PATTERN: &str = r"(?i)bearer\s+[a-zA-Z0-9._~+/-]+=*";

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. `info` or `access_core=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Extra per-module directives
    #[serde(default)]
    pub module_levels: HashMap<String, String>,

    #[serde(default = "default_true")]
    pub include_location: bool,

    #[serde(default = "default_true")]
    pub include_target: bool,

    #[serde(default)]
    pub redaction: RedactionConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            module_levels: HashMap::new(),
            include_location: true,
            include_target: true,
            redaction: RedactionConfig::default(),
        }
    }
}

impl From<&ObservabilityConfig> for LoggingConfig {
    fn from(observability: &ObservabilityConfig) -> Self {
        Self {
            level: observability.log_level.clone(),
            format: if observability.json_logging {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    /// Single line, used by the CLI
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedactionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Field names whose values are always masked (case-insensitive substring)
    #[serde(default = "default_sensitive_keys")]
    pub sensitive_keys: Vec<String>,

    /// Regexes masked wherever they appear inside a value
    #[serde(default = "default_value_patterns")]
    pub value_patterns: Vec<String>,

    #[serde(default = "default_replacement")]
    pub replacement: String,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sensitive_keys: default_sensitive_keys(),
            value_patterns: default_value_patterns(),
            replacement: default_replacement(),
        }
    }
}

fn default_log_level() -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
}

fn default_true() -> bool {
    true
}

fn default_replacement() -> String {
    "[REDACTED]".to_string()
}

fn default_sensitive_keys() -> Vec<String> {
    ["password", "secret", "credential", "id_token", "access_token", "refresh_token", "authorization", "bearer"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_value_patterns() -> Vec<String> {
    vec![JWT_PATTERN.to_string(), BEARER_PATTERN.to_string()]
}

// ═══════════════════════════════════════════════════════════════════════════════
// Redaction
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SensitiveFieldRedactor {
    keys: Vec<String>,
    patterns: Vec<Regex>,
    replacement: String,
    enabled: bool,
}

impl SensitiveFieldRedactor {
    /// Patterns that fail to compile are skipped with a warning.
    pub fn new(config: &RedactionConfig) -> Self {
        let patterns = config
            .value_patterns
            .iter()
            .filter_map(|p| {
                Regex::new(p)
                    .map_err(|e| tracing::warn!(pattern = %p, error = %e, "invalid redaction pattern"))
                    .ok()
            })
            .collect();

        Self {
            keys: config.sensitive_keys.iter().map(|k| k.to_lowercase()).collect(),
            patterns,
            replacement: config.replacement.clone(),
            enabled: config.enabled,
        }
    }

    pub fn global() -> &'static SensitiveFieldRedactor {
        REDACTOR.get_or_init(|| SensitiveFieldRedactor::new(&RedactionConfig::default()))
    }

    pub fn is_sensitive_key(&self, field_name: &str) -> bool {
        let lower = field_name.to_lowercase();
        self.enabled && self.keys.iter().any(|k| lower.contains(k.as_str()))
    }

    pub fn redact_value(&self, value: &str) -> String {
        if !self.enabled {
            return value.to_string();
        }
        self.patterns.iter().fold(value.to_string(), |acc, re| {
            re.replace_all(&acc, self.replacement.as_str()).into_owned()
        })
    }

    /// Scrub a JSON document in place: values under sensitive keys are
    /// replaced wholesale, every other string is scrubbed by value pattern.
    ///
    /// `token_hash` is not a sensitive key; its value is already non-reversible.
    pub fn redact_json_values(&self, value: &mut serde_json::Value) {
        if !self.enabled {
            return;
        }
        match value {
            serde_json::Value::String(s) => {
                let redacted = self.redact_value(s);
                if redacted != *s {
                    *s = redacted;
                }
            }
            serde_json::Value::Array(items) => items.iter_mut().for_each(|item| self.redact_json_values(item)),
            serde_json::Value::Object(map) => {
                for (key, item) in map.iter_mut() {
                    if self.is_sensitive_key(key) {
                        *item = serde_json::Value::String(self.replacement.clone());
                    } else {
                        self.redact_json_values(item);
                    }
                }
            }
            _ => {}
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Subscriber
// ═══════════════════════════════════════════════════════════════════════════════

/// Install the global subscriber and redactor. Call once per process.
///
/// In `development` a JSON format falls back to pretty output.
pub fn init_logging(config: &LoggingConfig, environment: &str) -> anyhow::Result<()> {
    let _ = REDACTOR.set(SensitiveFieldRedactor::new(&config.redaction));

    let mut filter = EnvFilter::try_new(&config.level)?;
    for (module, level) in &config.module_levels {
        filter = filter.add_directive(format!("{}={}", module, level).parse()?);
    }

    let format = match config.format {
        LogFormat::Json if environment == "development" => LogFormat::Pretty,
        other => other,
    };

    let base = fmt::layer()
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(config.include_target);

    let fmt_layer = match format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
    Ok(())
}
