use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

/// Dependencies whose debug output drowns out channel events.
const QUIET_TARGETS: &[&str] = &["tungstenite", "tokio_tungstenite", "rustls", "tokio"];

/// Crates logged at the level chosen on the command line.
const SIGNO_TARGETS: &[&str] = &["signo", "signo_channel", "signo_frame", "signo_transport"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Filter used when `RUST_LOG` is unset: signo crates at `level`, transport
/// dependencies capped at `warn`, everything else at `level`.
fn default_directives(level: LogLevel) -> String {
    let level = level.directive();
    let quiet_level = if level == "error" { "error" } else { "warn" };

    let mut directives = vec![level.to_string()];
    directives.extend(SIGNO_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.extend(
        QUIET_TARGETS
            .iter()
            .map(|target| format!("{target}={quiet_level}")),
    );
    directives.join(",")
}

/// Install the stderr subscriber. `RUST_LOG`, when set, wins over `level`.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_ansi(false);

    // Text output is read by people following one channel; JSON output keeps
    // targets so log pipelines can route per layer.
    let installed = match format {
        LogFormat::Text => subscriber.with_target(false).try_init(),
        LogFormat::Json => subscriber.json().with_current_span(false).try_init(),
    };
    if installed.is_err() {
        tracing::debug!("log subscriber already installed");
    }
}
