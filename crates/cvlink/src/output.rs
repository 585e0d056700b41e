use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::{Map, Value};

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

/// Whether a response text reports a failure.
pub fn is_error_response(response: &str) -> bool {
    response == "error" || response.starts_with("error ")
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    command: &'a str,
    status: &'static str,
    response: &'a str,
    /// The response parsed as a JSON object, for result-map responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a Map<String, Value>>,
    timestamp: String,
}

pub fn print_response(command: &str, response: &str, format: OutputFormat) {
    let parsed = serde_json::from_str::<Value>(response).ok();
    let data = parsed.as_ref().and_then(Value::as_object);
    let status = if is_error_response(response) { "error" } else { "ok" };

    match format {
        OutputFormat::Json => {
            let out = ResponseOutput {
                command,
                status,
                response,
                data,
                timestamp: now_unix_seconds(),
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
                .set_content_arrangement(ContentArrangement::Dynamic);
            match data {
                Some(map) => {
                    table.set_header(vec!["NAME", "VALUE"]);
                    for (name, value) in map {
                        table.add_row(vec![name.clone(), value_text(value)]);
                    }
                }
                None => {
                    table
                        .set_header(vec!["COMMAND", "STATUS", "RESPONSE"])
                        .add_row(vec![command, status, response]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("command={command} status={status} response={response}");
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(response.as_bytes());
            let _ = out.write_all(b"\n");
            let _ = out.flush();
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
