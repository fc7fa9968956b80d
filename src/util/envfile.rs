use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Parses `KEY=VALUE` lines. Blank lines and `#` comments are skipped and
/// surrounding quotes are stripped from values.
pub fn parse_env_str(content: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (idx, line) in content.lines().enumerate() {
        let s = line.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        if let Some((key, val)) = s.split_once('=') {
            let mut val = val.trim().to_string();
            if val.len() >= 2
                && ((val.starts_with('"') && val.ends_with('"'))
                    || (val.starts_with('\'') && val.ends_with('\'')))
            {
                val = val[1..val.len() - 1].to_string();
            }
            map.insert(key.trim().to_string(), val);
        } else {
            eprintln!(
                "Warning: ignoring .env line {} without '=': {}",
                idx + 1,
                line
            );
        }
    }
    map
}

/// Parses the .env file at `path`, if present. Does not modify the process environment.
pub fn parse_env_file_at(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    Ok(parse_env_str(&fs::read_to_string(path)?))
}

/// Loads `.env` from the working directory into the process environment.
/// Existing variables are NOT overridden.
pub fn load_dotenv_if_present() -> Result<usize> {
    let map = parse_env_file_at(Path::new(".env"))?;
    let mut applied = 0;
    for (k, v) in map {
        if std::env::var_os(&k).is_none() {
            // single-threaded startup, before the worker is spawned
            unsafe {
                std::env::set_var(&k, &v);
            }
            applied += 1;
        }
    }
    Ok(applied)
}

pub const ENV_TEMPLATE: &str = r#"# table_merge environment configuration template
# Copy this file to .env and adjust as needed.
# Any of these variables can also be provided via the system environment.

# Rows processed between progress updates and cancellation checks
#TABLE_MERGE_BATCH_SIZE=100
# Log a per-row match trace every N rows
#TABLE_MERGE_LOG_EVERY=10
# Progress/log polling interval of the command line runner (ms)
#TABLE_MERGE_POLL_MS=150
# Output format when it cannot be inferred from the output extension (csv|xlsx)
#TABLE_MERGE_FORMAT=csv

# Logging: RUST_LOG filter, and TABLE_MERGE_TRACING=1 to use tracing-subscriber
#RUST_LOG=info
#TABLE_MERGE_TRACING=0
"#;

/// Writes a .env template with commented defaults.
pub fn write_env_template(path: &str) -> Result<()> {
    let mut f = fs::File::create(path)?;
    f.write_all(ENV_TEMPLATE.as_bytes())?;
    Ok(())
}
