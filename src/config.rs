use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::models::{MatchPair, MatchRule};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_LOG_EVERY: usize = 10;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 150;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Rows processed between progress/cancellation checkpoints.
    pub batch_size: usize,
    /// Emit a row trace every `log_every` rows.
    pub log_every: usize,
    /// Owner-side polling interval for the progress and log channels.
    pub poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            log_every: DEFAULT_LOG_EVERY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Copy, Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Csv,
    Xlsx,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }

    /// Infers the format from a file extension.
    pub fn from_path(path: &str) -> Option<Self> {
        let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(Self::Csv),
            "xlsx" => Some(Self::Xlsx),
            _ => None,
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(format!("unsupported output format '{}'", other)),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct ExportConfig {
    /// `None` infers the format from the output path.
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct ImportConfig {
    pub delimiter: u8,
    /// Parse integer/float looking cells as numbers instead of text.
    pub infer_numbers: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            delimiter: b',',
            infer_numbers: false,
        }
    }
}

/// Frozen description of a merge job.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq, Eq)]
pub struct MergeConfig {
    pub file1: String,
    pub file2: String,
    pub output: String,
    #[serde(default)]
    pub match_pairs: Vec<MatchPair>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub import: ImportConfig,
}

impl MergeConfig {
    pub fn from_json_file(path: &str) -> Result<Self, ConfigError> {
        if !Path::new(path).exists() {
            return Err(ConfigError::FileNotFound(path.to_string()));
        }
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::InvalidValue {
            field: "job",
            reason: format!("{}: {}", path, e),
        })?;
        serde_json::from_str(&text).map_err(|e| ConfigError::InvalidValue {
            field: "job",
            reason: format!("{}: {}", path, e),
        })
    }

    /// Format to write: explicit setting first, then the output extension, then csv.
    pub fn output_format(&self) -> OutputFormat {
        self.export
            .format
            .or_else(|| OutputFormat::from_path(&self.output))
            .unwrap_or(OutputFormat::Csv)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.file1.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "file1" });
        }
        if self.file2.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "file2" });
        }
        if self.output.trim().is_empty() {
            return Err(ConfigError::MissingField { field: "output" });
        }
        for path in [&self.file1, &self.file2] {
            if !Path::new(path).is_file() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
        }
        if self.match_pairs.is_empty() {
            return Err(ConfigError::MissingField {
                field: "match_pairs",
            });
        }
        for (i, p) in self.match_pairs.iter().enumerate() {
            if p.source_column.trim().is_empty() || p.target_column.trim().is_empty() {
                return Err(ConfigError::InvalidMatchPair {
                    input: format!("#{}", i + 1),
                    reason: "source and target columns are required".into(),
                });
            }
        }
        if self.columns.is_empty() {
            return Err(ConfigError::MissingField { field: "columns" });
        }
        if self.engine.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.batch_size",
                reason: "must be > 0".into(),
            });
        }
        if self.engine.log_every == 0 {
            return Err(ConfigError::InvalidValue {
                field: "engine.log_every",
                reason: "must be > 0".into(),
            });
        }
        Ok(())
    }
}

/// Parses `SOURCE=TARGET[:RULE]`. The rule defaults to fuzzy; a suffix that is
/// not a rule name stays part of the target column (`t=Time:Start`).
pub fn parse_match_pair(input: &str) -> Result<MatchPair, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidMatchPair {
        input: input.to_string(),
        reason: reason.to_string(),
    };
    let (source, rest) = input
        .split_once('=')
        .ok_or_else(|| invalid("expected SOURCE=TARGET[:exact|:fuzzy]"))?;
    let (target, rule) = match rest.rsplit_once(':') {
        Some((t, r)) => match r.parse::<MatchRule>() {
            Ok(rule) => (t, rule),
            Err(_) => (rest, MatchRule::default()),
        },
        None => (rest, MatchRule::default()),
    };
    let (source, target) = (source.trim(), target.trim());
    if source.is_empty() || target.is_empty() {
        return Err(invalid("source and target columns are required"));
    }
    Ok(MatchPair::new(source, target, rule))
}
