use std::time::{Duration, Instant};

use signo_frame::{ChannelMessage, PONG};
use tokio::sync::broadcast;

use crate::cmd::{next_message, PingArgs, Session};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_ping, OutputFormat};

pub async fn run(args: PingArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = args.connect.timeout()?;
    let session = Session::open(&args.connect)?;
    let mut messages = session.handle.subscribe();
    session.start()?;

    let result = probe(&session, &mut messages, timeout, format).await;
    session.finish().await;
    result
}

async fn probe(
    session: &Session,
    messages: &mut broadcast::Receiver<ChannelMessage>,
    timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    session.wait_open(timeout).await?;

    let sent = Instant::now();
    session
        .handle
        .send_control()
        .await
        .map_err(|err| channel_error("ping failed", err))?;
    let pong = next_message(messages, timeout, |m| m.kind() == PONG).await?;

    print_ping(session.endpoint.as_str(), sent.elapsed(), &pong, format);
    Ok(SUCCESS)
}
