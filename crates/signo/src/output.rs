use std::io::{IsTerminal, Write};
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::{Map, Value};
use signo_frame::{encode_message, ChannelMessage};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'a str,
    payload: &'a Map<String, Value>,
    parse_error: bool,
    received_at: String,
}

#[derive(Serialize)]
struct PingOutput<'a> {
    endpoint: &'a str,
    latency_ms: f64,
    server_timestamp: Option<&'a str>,
}

pub fn print_message(message: &ChannelMessage, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind: message.kind(),
                payload: message.payload(),
                parse_error: message.is_parse_error(),
                received_at: now_rfc3339(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "RECEIVED", "PAYLOAD"])
                .add_row(vec![
                    message.kind().to_string(),
                    now_rfc3339(),
                    payload_preview(message.payload()),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "kind={} received={} payload={}",
                message.kind(),
                now_rfc3339(),
                payload_preview(message.payload())
            );
        }
        OutputFormat::Raw => match encode_message(message) {
            Ok(frame) => print_line(&frame),
            Err(err) => tracing::warn!(error = %err, "message could not be re-encoded"),
        },
    }
}

pub fn print_ping(endpoint: &str, latency: Duration, pong: &ChannelMessage, format: OutputFormat) {
    let latency_ms = (latency.as_secs_f64() * 1000.0 * 100.0).round() / 100.0;
    let server_timestamp = pong.text("timestamp");
    match format {
        OutputFormat::Json => {
            let out = PingOutput {
                endpoint,
                latency_ms,
                server_timestamp,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["ENDPOINT", "LATENCY (ms)", "SERVER TIME"])
                .add_row(vec![
                    endpoint.to_string(),
                    format!("{latency_ms:.2}"),
                    server_timestamp.unwrap_or("-").to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("pong from {endpoint} in {latency_ms:.2} ms");
        }
        OutputFormat::Raw => print_line(&format!("{latency_ms:.2}")),
    }
}

fn print_line(text: &str) {
    let mut out = std::io::stdout();
    let _ = writeln!(out, "{text}");
    let _ = out.flush();
}

fn payload_preview(payload: &Map<String, Value>) -> String {
    if payload.is_empty() {
        return "-".to_string();
    }
    serde_json::to_string(payload).unwrap_or_else(|_| "<unprintable>".to_string())
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
