use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required field: {field}")]
    MissingField { field: &'static str },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("dataset {dataset} has no data rows")]
    EmptyDataset { dataset: &'static str },
    #[error("column '{column}' not found in {dataset}")]
    MissingColumn {
        dataset: &'static str,
        column: String,
    },
    #[error("invalid match pair '{input}': {reason}")]
    InvalidMatchPair { input: String, reason: String },
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("csv error in {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },
    #[error("spreadsheet error in {path}: {reason}")]
    Xlsx { path: String, reason: String },
    #[error("duplicate column '{column}' in {path}")]
    DuplicateColumn { path: String, column: String },
    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("csv export error: {0}")]
    Csv(String),
    #[error("xlsx export error: {0}")]
    Xlsx(String),
    #[error("io error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
    #[error("export error: {0}")]
    Export(#[from] ExportError),
    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Coarse failure category reported to the owner of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad job description or unreadable input, found before any row is processed.
    Config,
    /// Anything that broke while indexing, matching or writing.
    Runtime,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Config => "configuration",
            Self::Runtime => "runtime",
        })
    }
}

impl MergeError {
    /// Configuration problems, including inputs that cannot be opened or
    /// parsed, are detected before any row is processed.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Dataset(_))
    }

    pub fn kind(&self) -> FailureKind {
        if self.is_config() {
            FailureKind::Config
        } else {
            FailureKind::Runtime
        }
    }
}
