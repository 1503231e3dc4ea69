mod config_cmd;
mod taxonomy;
mod term;

pub use config_cmd::ConfigCommand;
pub use taxonomy::TaxonomyCommand;
pub use term::TermCommand;

use clap::ValueEnum;
use termstore_core::{ChangeInfo, Fields, Value};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Parses a `KEY=VALUE` argument. Bare literals are typed, so `count=3` is
/// an integer and `name=News` a string.
pub fn parse_field(s: &str) -> Result<(String, Value), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), Value::parse_bare(value)))
}

pub fn print_fields(fields: &Fields) {
    for (key, value) in fields {
        println!("  {}: {}", key, value);
    }
}

pub fn print_change(change: Option<ChangeInfo>) {
    match change {
        Some(change) => match &change.taxonomy {
            Some(taxonomy) => println!("Changed: {} (taxonomy: {})", change, taxonomy),
            None => println!("Changed: {}", change),
        },
        None => println!("No changes."),
    }
}
