// 📝 Logging - tracing subscriber setup for the binary
//
// Logs go to stderr so command output on stdout stays machine-readable.
// RUST_LOG still overrides per-module levels.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;

pub fn init_logging(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<()> {
    let level = determine_level(settings, verbose, quiet);
    let env_filter = build_env_filter(level)?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(build_console_layer(settings.json_format))
        .try_init()
        .context("Failed to initialize logging")?;

    tracing::debug!(level = %level, json = settings.json_format, "logging initialized");
    Ok(())
}

fn determine_level(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }

    match verbose {
        0 => parse_level(&settings.level),
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn build_env_filter(level: Level) -> Result<EnvFilter> {
    let base = level.to_string().to_lowercase();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&base))
        .add_directive(
            format!("spend_persona={}", base)
                .parse()
                .context("Invalid log directive")?,
        );
    Ok(filter)
}

fn build_console_layer<S>(json_format: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    if json_format {
        Box::new(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
    } else {
        Box::new(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
    }
}
