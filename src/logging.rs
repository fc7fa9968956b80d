use env_logger::Env;

pub const TRACING_ENV: &str = "TABLE_MERGE_TRACING";

fn flag_enabled(value: Option<String>) -> bool {
    value
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub fn tracing_requested() -> bool {
    flag_enabled(std::env::var(TRACING_ENV).ok())
}

/// Installs the process logger: env_logger by default, a tracing subscriber
/// with a `log` bridge when `TABLE_MERGE_TRACING` is set. Filters come from
/// RUST_LOG and default to info.
pub fn init_from_env() {
    if tracing_requested() {
        init_tracing_from_env();
    } else {
        let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info")).try_init();
    }
}

pub fn init_tracing_from_env() {
    // Bridge log:: macros into tracing
    let _ = tracing_log::LogTracer::init();
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
    tracing::debug!("tracing subscriber installed");
}
