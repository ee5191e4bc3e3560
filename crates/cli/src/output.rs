//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn print_structured<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> bool {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
            true
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yaml::to_string(value).unwrap_or_default());
            true
        }
        OutputFormat::Table => false,
    }
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    if print_structured(item, format) {
        return;
    }
    let mut table = table();
    table.set_header(T::headers());
    table.add_row(item.row());
    println!("{table}");
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if print_structured(items, format) {
        return;
    }
    if items.is_empty() {
        println!("No items found.");
        return;
    }
    let mut table = table();
    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    println!("{table}");
}

/// Print any serializable value; tables fall back to key/value lines
pub fn print_value<T: Serialize>(value: &T, format: OutputFormat) {
    if print_structured(value, format) {
        return;
    }
    if let Ok(serde_json::Value::Object(map)) = serde_json::to_value(value) {
        for (key, value) in map {
            match value {
                serde_json::Value::String(s) => println!("{}: {}", key.bold(), s),
                other => println!("{}: {}", key.bold(), other),
            }
        }
    }
}

/// Colored PASS/FAIL marker
pub fn verdict(passed: bool) -> String {
    if passed {
        "PASS".green().bold().to_string()
    } else {
        "FAIL".red().bold().to_string()
    }
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "❌".red(), message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
