use signo_channel::ConnectionState;
use signo_frame::ChannelMessage;
use tokio::sync::broadcast::error::RecvError;

use crate::cmd::{ListenArgs, Session};
use crate::exit::{CliError, CliResult, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_message, OutputFormat};

pub async fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let session = Session::open(&args.connect)?;
    let mut messages = session.handle.subscribe();
    let mut transitions = session.handle.status_events();
    session.start()?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut printed = 0usize;
    let mut previous = session.handle.status();

    let result = loop {
        tokio::select! {
            received = messages.recv() => match received {
                Ok(message) => {
                    if !wanted(&message, args.kinds.as_deref()) {
                        continue;
                    }
                    print_message(&message, format);
                    printed = printed.saturating_add(1);
                    if args.count.is_some_and(|count| printed >= count) {
                        break Ok(SUCCESS);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "output fell behind; messages skipped");
                }
                Err(RecvError::Closed) => break Ok(SUCCESS),
            },
            state = transitions.recv() => match state {
                Ok(ConnectionState::Closed) => break closed_after(previous),
                Ok(state) => previous = state,
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break Ok(SUCCESS),
            },
            _ = &mut shutdown => {
                tracing::info!("interrupted");
                break Ok(SUCCESS);
            }
        }
    };

    session.finish().await;
    result
}

fn wanted(message: &ChannelMessage, kinds: Option<&[String]>) -> bool {
    kinds.is_none_or(|kinds| kinds.iter().any(|kind| kind == message.kind()))
}

// Closed straight out of Faulted means the channel gave up reconnecting.
fn closed_after(previous: ConnectionState) -> CliResult<i32> {
    if previous == ConnectionState::Faulted {
        Err(CliError::new(
            TRANSPORT_ERROR,
            "channel closed after repeated connection failures",
        ))
    } else {
        Ok(SUCCESS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_filter() {
        let chat = ChannelMessage::new("chat");
        assert!(wanted(&chat, None));
        let kinds = vec!["pong".to_string(), "chat".to_string()];
        assert!(wanted(&chat, Some(kinds.as_slice())));
        let kinds = vec!["broadcast".to_string()];
        assert!(!wanted(&chat, Some(kinds.as_slice())));
    }

    #[test]
    fn closing_after_fault_is_a_transport_error() {
        assert_eq!(
            closed_after(ConnectionState::Faulted).unwrap_err().code,
            TRANSPORT_ERROR
        );
        assert_eq!(closed_after(ConnectionState::Open).unwrap(), SUCCESS);
    }
}
