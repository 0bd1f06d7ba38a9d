use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use gpioprims_client::{Level, LineEvent};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
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
struct EventOutput {
    line: u8,
    level: &'static str,
    level_code: u32,
    tick: u32,
}

/// Print one flat record: a JSON object, a field/value table, or
/// `key=value` pairs.
pub fn print_record<T: Serialize>(record: &T, format: OutputFormat) {
    let value = serde_json::to_value(record).unwrap_or(Value::Null);
    match format {
        OutputFormat::Json => println!("{value}"),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (key, field) in fields(&value) {
                table.add_row(vec![key, field]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line = fields(&value)
                .into_iter()
                .map(|(key, field)| format!("{key}={field}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
        }
    }
}

pub fn print_event(event: &LineEvent, format: OutputFormat) {
    let out = EventOutput {
        line: event.line,
        level: level_name(event.level),
        level_code: event.level.code(),
        tick: event.tick,
    };
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["LINE", "LEVEL", "TICK"])
                .add_row(vec![
                    out.line.to_string(),
                    out.level.to_string(),
                    out.tick.to_string(),
                ]);
            println!("{table}");
        }
        _ => print_record(&out, format),
    }
}

pub fn level_name(level: Level) -> &'static str {
    match level {
        Level::Low => "low",
        Level::High => "high",
        Level::Timeout => "timeout",
    }
}

fn fields(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, field)| (key.clone(), render(field)))
            .collect(),
        other => vec![("value".to_string(), render(other))],
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "-".to_string(),
        Value::Array(items) => items.iter().map(render).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}
