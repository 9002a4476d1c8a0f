use std::time::Duration;

use serde_json::Value;
use signo_frame::{ChannelMessage, WELCOME};

use crate::cmd::{next_message, SendArgs, Session};
use crate::exit::{channel_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub async fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = args.connect.timeout()?;
    let message = build_message(&args)?;

    let session = Session::open(&args.connect)?;
    let mut messages = session.handle.subscribe();
    session.start()?;

    let result = deliver(&session, message, args.wait, timeout, &mut messages, format).await;
    session.finish().await;
    result
}

async fn deliver(
    session: &Session,
    message: ChannelMessage,
    wait: bool,
    timeout: Duration,
    messages: &mut tokio::sync::broadcast::Receiver<ChannelMessage>,
    format: OutputFormat,
) -> CliResult<i32> {
    session.wait_open(timeout).await?;
    session
        .handle
        .send_message(message)
        .await
        .map_err(|err| channel_error("send failed", err))?;

    if wait {
        let reply = next_message(messages, timeout, |m| m.kind() != WELCOME).await?;
        print_message(&reply, format);
    }
    Ok(SUCCESS)
}

fn build_message(args: &SendArgs) -> CliResult<ChannelMessage> {
    if args.kind.trim().is_empty() {
        return Err(CliError::new(USAGE, "--kind must not be empty"));
    }

    if let Some(json) = &args.json {
        let value: Value = serde_json::from_str(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        let Value::Object(payload) = value else {
            return Err(CliError::new(USAGE, "--json must be a JSON object"));
        };
        return Ok(ChannelMessage::with_payload(args.kind.clone(), payload));
    }

    let message = ChannelMessage::new(args.kind.clone());
    Ok(match &args.text {
        Some(text) => message.with_text(text),
        None => message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::ConnectArgs;

    fn send_args(kind: &str, json: Option<&str>, text: Option<&str>) -> SendArgs {
        SendArgs {
            connect: ConnectArgs {
                endpoint: "ws://localhost:5000/ws".to_string(),
                origin: false,
                path: "/ws".to_string(),
                config: None,
                reconnect_interval: None,
                max_reconnect_attempts: None,
                no_reconnect: false,
                timeout: "1s".to_string(),
            },
            kind: kind.to_string(),
            json: json.map(str::to_string),
            text: text.map(str::to_string),
            wait: false,
        }
    }

    #[test]
    fn json_payload_becomes_message_fields() {
        let message =
            build_message(&send_args("load_offer", Some(r#"{"tonnes":18,"kind":"x"}"#), None))
                .unwrap();
        assert_eq!(message.kind(), "load_offer");
        assert_eq!(message.field("tonnes"), Some(&Value::from(18)));
        assert_eq!(message.field("kind"), None);
    }

    #[test]
    fn text_goes_into_message_field() {
        let message = build_message(&send_args("chat", None, Some("on my way"))).unwrap();
        assert_eq!(message.text("message"), Some("on my way"));
        assert!(message.text("timestamp").is_some());
    }

    #[test]
    fn rejects_bad_payloads() {
        assert_eq!(
            build_message(&send_args("chat", Some("[1,2]"), None))
                .unwrap_err()
                .code,
            USAGE
        );
        assert_eq!(
            build_message(&send_args("chat", Some("{"), None))
                .unwrap_err()
                .code,
            USAGE
        );
        assert_eq!(build_message(&send_args(" ", None, None)).unwrap_err().code, USAGE);
    }
}
