use std::io;
use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt};

use crate::{EcosystemError, LoggingConfig};

static SUBSCRIBER_INSTALLED: OnceLock<()> = OnceLock::new();

/// How pipeline logs are rendered. Logs go to stderr; stdout carries the
/// report and progress lines.
#[derive(Debug, Clone)]
pub struct TelemetryOptions {
    /// Wins over `RUST_LOG` and `level`.
    pub env_filter: Option<String>,
    pub level: String,
    pub with_ansi: bool,
    pub with_target: bool,
}

impl Default for TelemetryOptions {
    fn default() -> Self {
        Self::from_logging(&LoggingConfig::default())
    }
}

impl TelemetryOptions {
    pub fn from_logging(logging: &LoggingConfig) -> Self {
        Self {
            env_filter: None,
            level: logging.level.clone(),
            with_ansi: true,
            with_target: false,
        }
    }

    /// Directive in effect given the value of `RUST_LOG`.
    fn directive(&self, rust_log: Option<String>) -> String {
        self.env_filter
            .clone()
            .or(rust_log.filter(|value| !value.trim().is_empty()))
            .unwrap_or_else(|| self.level.clone())
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init_telemetry(options: TelemetryOptions) -> Result<(), EcosystemError> {
    if SUBSCRIBER_INSTALLED.get().is_some() {
        return Ok(());
    }

    let directive = options.directive(std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive).map_err(|err| {
        EcosystemError::InvalidConfiguration(format!("invalid log filter `{directive}`: {err}"))
    })?;

    fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(options.with_ansi)
        .with_target(options.with_target)
        .try_init()
        .map_err(|err| {
            EcosystemError::InvalidConfiguration(format!("telemetry init failed: {err}"))
        })?;

    SUBSCRIBER_INSTALLED.get_or_init(|| ());
    Ok(())
}
