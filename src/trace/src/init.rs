use std::sync::Mutex;

use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

pub const DEFAULT_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct TraceConfig {
    pub level: String,
    pub format: String,
    pub file: Option<String>,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL.to_string(),
            format: "plain".to_string(),
            file: None,
        }
    }
}

// RUST_LOG takes precedence over the configured level.
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
}

pub fn prepare_tracing(conf: TraceConfig) {
    let json = conf.format == "json";

    let stdout = if json {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().with_ansi(true).boxed()
    };

    let file = conf.file.and_then(|path| match std::fs::File::create(&path) {
        Ok(f) => Some(f),
        Err(e) => {
            eprintln!("failed to open log file {path}: {e}");
            None
        }
    });
    let file = file.map(|f| {
        let layer = fmt::layer().with_writer(Mutex::new(f)).with_ansi(false);
        if json {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    });

    // Tests initialize tracing more than once.
    let _ = Registry::default()
        .with(build_filter(&conf.level))
        .with(stdout)
        .with(file)
        .try_init();
}
