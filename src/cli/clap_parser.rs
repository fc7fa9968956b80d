use crate::config::{MergeConfig, OutputFormat, parse_match_pair};
use crate::error::ConfigError;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, ValueEnum, Debug)]
pub enum FormatOpt {
    Csv,
    Xlsx,
}

impl FormatOpt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

impl std::fmt::Display for FormatOpt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<FormatOpt> for OutputFormat {
    fn from(f: FormatOpt) -> Self {
        match f {
            FormatOpt::Csv => OutputFormat::Csv,
            FormatOpt::Xlsx => OutputFormat::Xlsx,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "table_merge",
    version,
    about = "Multi-condition record matching and column merge between two tables",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Match file 1 rows against file 2 and write the merged table
    Run(RunArgs),
    /// Print the columns, row count and first rows of a file
    Inspect(InspectArgs),
    /// Write a .env template with the supported variables
    EnvTemplate {
        #[arg(value_name = "PATH", default_value = ".env.template")]
        path: String,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// JSON job file; flags below override its fields
    #[arg(long, value_name = "FILE")]
    pub job: Option<String>,
    /// Primary table (rows are kept in this order)
    #[arg(long, value_name = "FILE")]
    pub file1: Option<String>,
    /// Secondary table (values are copied from here)
    #[arg(long, value_name = "FILE")]
    pub file2: Option<String>,
    /// Output path (.csv or .xlsx)
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<String>,
    /// Match condition SOURCE=TARGET[:exact|:fuzzy], repeatable; fuzzy by default
    #[arg(long = "pair", value_name = "PAIR")]
    pub pairs: Vec<String>,
    /// File 2 column to copy, repeatable
    #[arg(long = "column", value_name = "COLUMN")]
    pub columns: Vec<String>,
    /// Output format when it cannot be inferred from the extension
    #[arg(long, value_name = "FORMAT", env = "TABLE_MERGE_FORMAT")]
    pub format: Option<FormatOpt>,
    /// Rows per progress/cancellation checkpoint (env: TABLE_MERGE_BATCH_SIZE)
    #[arg(long, value_name = "ROWS", env = "TABLE_MERGE_BATCH_SIZE")]
    pub batch_size: Option<usize>,
    /// Row trace interval (env: TABLE_MERGE_LOG_EVERY)
    #[arg(long, value_name = "ROWS", env = "TABLE_MERGE_LOG_EVERY")]
    pub log_every: Option<usize>,
    /// Progress polling interval (env: TABLE_MERGE_POLL_MS)
    #[arg(long = "poll-ms", value_name = "MS", env = "TABLE_MERGE_POLL_MS")]
    pub poll_ms: Option<u64>,
    /// Input field delimiter
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,
    /// Read integer and float looking cells as numbers
    #[arg(long)]
    pub infer_numbers: bool,
    /// Request cancellation after N matching batches
    #[arg(long, value_name = "N", hide = true)]
    pub cancel_after_batches: Option<usize>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[arg(value_name = "FILE")]
    pub file: String,
    /// Preview rows to print
    #[arg(long, value_name = "N", default_value_t = 5)]
    pub rows: usize,
    #[arg(long, value_name = "CHAR")]
    pub delimiter: Option<char>,
}

pub fn delimiter_byte(c: char) -> Result<u8, ConfigError> {
    if c.is_ascii() {
        Ok(c as u8)
    } else {
        Err(ConfigError::InvalidValue {
            field: "delimiter",
            reason: format!("'{}' is not a single-byte character", c),
        })
    }
}

impl RunArgs {
    /// Starts from the job file (or defaults), applies flags and env values on
    /// top, then validates.
    pub fn to_merge_config(&self) -> Result<MergeConfig, ConfigError> {
        let mut cfg = match &self.job {
            Some(path) => MergeConfig::from_json_file(path)?,
            None => MergeConfig::default(),
        };
        if let Some(v) = &self.file1 {
            cfg.file1 = v.clone();
        }
        if let Some(v) = &self.file2 {
            cfg.file2 = v.clone();
        }
        if let Some(v) = &self.output {
            cfg.output = v.clone();
        }
        if !self.pairs.is_empty() {
            cfg.match_pairs = self
                .pairs
                .iter()
                .map(|p| parse_match_pair(p))
                .collect::<Result<_, _>>()?;
        }
        if !self.columns.is_empty() {
            cfg.columns = self.columns.iter().map(|c| c.trim().to_string()).collect();
        }
        if let Some(f) = self.format {
            // a recognised output extension wins
            if OutputFormat::from_path(&cfg.output).is_none() {
                cfg.export.format = Some(f.into());
            }
        }
        if let Some(v) = self.batch_size {
            cfg.engine.batch_size = v;
        }
        if let Some(v) = self.log_every {
            cfg.engine.log_every = v;
        }
        if let Some(v) = self.poll_ms {
            cfg.engine.poll_interval_ms = v;
        }
        if let Some(c) = self.delimiter {
            cfg.import.delimiter = delimiter_byte(c)?;
        }
        if self.infer_numbers {
            cfg.import.infer_numbers = true;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
