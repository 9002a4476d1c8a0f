use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use signo_channel::{
    spawn, ChannelConfig, ChannelHandle, ChannelManager, ConnectionState, TokioScheduler,
};
use signo_frame::ChannelMessage;
use signo_transport::{Endpoint, WsConfig, WsConnector, DEFAULT_CHANNEL_PATH};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::exit::{
    channel_error, io_error, transport_error, CliError, CliResult, TIMEOUT, TRANSPORT_ERROR, USAGE,
};
use crate::output::OutputFormat;

pub mod listen;
pub mod ping;
pub mod send;
pub mod version;

const CLOSE_GRACE: Duration = Duration::from_secs(2);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect and print received messages.
    Listen(ListenArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Measure round-trip latency with a control ping.
    Ping(PingArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => block_on(listen::run(args, format)),
        Command::Send(args) => block_on(send::run(args, format)),
        Command::Ping(args) => block_on(ping::run(args, format)),
        Command::Version(args) => version::run(args),
    }
}

fn block_on<F>(future: F) -> CliResult<i32>
where
    F: Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("failed to start runtime", err))?;
    runtime.block_on(future)
}

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Channel endpoint: a ws:// or wss:// URL, or a page origin with --origin.
    #[arg(env = "SIGNO_ENDPOINT")]
    pub endpoint: String,
    /// Treat ENDPOINT as an http(s) page origin and derive the channel URL.
    #[arg(long)]
    pub origin: bool,
    /// Channel path used with --origin.
    #[arg(long, default_value = DEFAULT_CHANNEL_PATH)]
    pub path: String,
    /// JSON channel configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Base reconnect delay (e.g. 1s, 250ms).
    #[arg(long, value_name = "DURATION")]
    pub reconnect_interval: Option<String>,
    /// Reconnect attempts before giving up.
    #[arg(long, value_name = "N")]
    pub max_reconnect_attempts: Option<u32>,
    /// Do not reconnect after connectivity loss.
    #[arg(long)]
    pub no_reconnect: bool,
    /// Time allowed for connecting and for each awaited reply (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Print only these message kinds (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub kinds: Option<Vec<String>>,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Message kind.
    #[arg(long, default_value = "chat")]
    pub kind: String,
    /// JSON object merged into the message payload.
    #[arg(long, conflicts_with = "text")]
    pub json: Option<String>,
    /// Text body, sent as the `message` field.
    #[arg(long, conflicts_with = "json")]
    pub text: Option<String>,
    /// Wait for the next non-welcome message and print it.
    #[arg(long)]
    pub wait: bool,
}

#[derive(Args, Debug)]
pub struct PingArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

impl ConnectArgs {
    pub fn resolve_endpoint(&self) -> CliResult<Endpoint> {
        let endpoint = if self.origin {
            Endpoint::from_origin_with_path(&self.endpoint, &self.path)
        } else {
            Endpoint::parse(&self.endpoint)
        };
        endpoint.map_err(|err| transport_error("invalid endpoint", err))
    }

    /// File config (or defaults) with command-line overrides applied.
    pub fn channel_config(&self) -> CliResult<ChannelConfig> {
        let mut config = match &self.config {
            Some(path) => ChannelConfig::from_json_file(path)
                .map_err(|err| channel_error("config load failed", err))?,
            None => ChannelConfig::default(),
        };

        if let Some(interval) = &self.reconnect_interval {
            let interval = parse_duration(interval)?;
            config.reconnect_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
            config.max_reconnect_interval_ms = config
                .max_reconnect_interval_ms
                .max(config.reconnect_interval_ms);
        }
        if let Some(max) = self.max_reconnect_attempts {
            config.max_reconnect_attempts = max;
        }
        if self.no_reconnect {
            config.auto_reconnect = false;
        }

        config
            .validate()
            .map_err(|err| channel_error("invalid configuration", err))?;
        Ok(config)
    }

    pub fn timeout(&self) -> CliResult<Duration> {
        parse_duration(&self.timeout)
    }
}

/// A spawned WebSocket channel driven on the current runtime.
pub struct Session {
    pub handle: ChannelHandle,
    pub endpoint: Endpoint,
    task: JoinHandle<()>,
}

impl Session {
    /// Build and spawn the channel. Nothing connects until [`start`](Self::start),
    /// so callers can subscribe first.
    pub fn open(args: &ConnectArgs) -> CliResult<Self> {
        let endpoint = args.resolve_endpoint()?;
        let config = args.channel_config()?;
        let connector = WsConnector::new(WsConfig {
            connect_timeout: args.timeout()?,
        });
        let manager =
            ChannelManager::new(endpoint.clone(), config, connector, TokioScheduler::new());
        let (handle, task) = spawn(manager);
        tracing::debug!(endpoint = %endpoint, "channel session created");
        Ok(Self {
            handle,
            endpoint,
            task,
        })
    }

    pub fn start(&self) -> CliResult<()> {
        self.handle
            .start()
            .map_err(|err| channel_error("start failed", err))
    }

    /// Wait for `Open`; a terminal `Closed` first means the retry budget ran out.
    pub async fn wait_open(&self, timeout: Duration) -> CliResult<()> {
        let state = self
            .handle
            .wait_for_status(
                |state| matches!(state, ConnectionState::Open | ConnectionState::Closed),
                timeout,
            )
            .await;
        match state {
            Some(ConnectionState::Open) => Ok(()),
            Some(_) => Err(CliError::new(
                TRANSPORT_ERROR,
                format!("could not connect to {}", self.endpoint),
            )),
            None => Err(CliError::new(
                TIMEOUT,
                format!("timed out connecting to {}", self.endpoint),
            )),
        }
    }

    /// Close gracefully, then stop the driver.
    pub async fn finish(self) {
        if self.handle.close().is_ok() {
            let _ = self
                .handle
                .wait_for_status(|state| *state == ConnectionState::Closed, CLOSE_GRACE)
                .await;
        }
        let _ = self.handle.shutdown();
        if let Err(err) = self.task.await {
            tracing::debug!(error = %err, "channel driver ended abnormally");
        }
    }
}

/// Next message accepted by `accept`, waiting at most `timeout`.
pub async fn next_message<F>(
    messages: &mut broadcast::Receiver<ChannelMessage>,
    timeout: Duration,
    mut accept: F,
) -> CliResult<ChannelMessage>
where
    F: FnMut(&ChannelMessage) -> bool,
{
    let wait = async {
        loop {
            match messages.recv().await {
                Ok(message) if accept(&message) => return Ok(message),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "message receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(CliError::new(
                        TRANSPORT_ERROR,
                        "channel closed while waiting for a reply",
                    ));
                }
            }
        }
    };
    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| CliError::new(TIMEOUT, "timed out waiting for a reply"))?
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        _ => Duration::from_secs(value),
    })
}
