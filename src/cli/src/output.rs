//! Terminal output for `schoolgate` commands.
//!
//! Status lines (`[OK]`, `[DENIED]`, `[ERROR]`) are for people; lists and
//! records render as a table, JSON or YAML depending on `--output`.

use anyhow::Result;
use clap::ValueEnum;
use colored::*;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

/// Value of the global `--output` flag.
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

/// Completed operation, e.g. an allowed check or an enabled module.
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// Goes to stderr so piped JSON/YAML stays parseable.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), msg);
}

/// A refused `check`. Not an error: the command still exits 0.
pub fn print_denied(msg: &str) {
    println!("{} {}", "[DENIED]".yellow().bold(), msg);
}

/// Catalog rows, module status rows and profile modules.
pub fn print_list<T: Tabled + Serialize>(items: &[T], format: OutputFormat) -> Result<()> {
    print!("{}", render_list(items, format)?);
    Ok(())
}

/// One structured record: a profile, a decision, a validation summary.
pub fn print_item<T: Serialize>(item: &T, format: OutputFormat) -> Result<()> {
    print!("{}", render_item(item, format)?);
    Ok(())
}

pub fn print_detail(key: &str, value: &str) {
    println!("  {}: {}", key.cyan(), value);
}

pub fn print_header(title: &str) {
    println!();
    println!("{}", title.bold().underline());
    println!();
}

fn render_list<T: Tabled + Serialize>(items: &[T], format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Table if items.is_empty() => format!("{}\n", "No results found.".dimmed()),
        OutputFormat::Table => {
            let table = Table::new(items)
                .with(Style::rounded())
                .with(Modify::new(Columns::first()).with(Alignment::left()))
                .to_string();
            format!("{table}\n")
        }
        OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(items)?),
        OutputFormat::Yaml => serde_yaml::to_string(items)?,
    })
}

/// Records nest (a profile maps modules to action lists), so there is no
/// flat table for them and `table` falls back to pretty JSON.
fn render_item<T: Serialize>(item: &T, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Table | OutputFormat::Json => {
            format!("{}\n", serde_json::to_string_pretty(item)?)
        }
        OutputFormat::Yaml => serde_yaml::to_string(item)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Tabled, Serialize)]
    struct Row {
        #[tabled(rename = "Key")]
        key: &'static str,
        #[tabled(rename = "Active")]
        active: bool,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { key: "students", active: true },
            Row { key: "billing", active: false },
        ]
    }

    #[test]
    fn test_list_as_table() {
        let out = render_list(&rows(), OutputFormat::Table).unwrap();
        assert!(out.contains("Key"));
        assert!(out.contains("students"));
        assert!(out.contains("billing"));
    }

    #[test]
    fn test_empty_list_as_table() {
        colored::control::set_override(false);
        let out = render_list::<Row>(&[], OutputFormat::Table).unwrap();
        assert_eq!(out, "No results found.\n");
    }

    #[test]
    fn test_list_as_json_and_yaml() {
        let json: serde_json::Value =
            serde_json::from_str(&render_list(&rows(), OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json[1]["key"], "billing");
        assert_eq!(json[0]["active"], true);

        let yaml = render_list(&rows(), OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("key: students"));
    }

    #[test]
    fn test_nested_item_renders_json_for_table() {
        let mut actions = BTreeMap::new();
        actions.insert("paces", vec!["grade", "read"]);

        let table = render_item(&actions, OutputFormat::Table).unwrap();
        assert_eq!(table, render_item(&actions, OutputFormat::Json).unwrap());
        let parsed: serde_json::Value = serde_json::from_str(&table).unwrap();
        assert_eq!(parsed["paces"][0], "grade");

        let yaml = render_item(&actions, OutputFormat::Yaml).unwrap();
        assert!(yaml.contains("paces:"));
    }
}
