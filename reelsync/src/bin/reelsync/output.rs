use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;
use std::io::Write;

use crate::theme::{ICONS, THEME};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output and behavior
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Data that can be displayed as a table
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

/// One row of a listing. `Vec<T>` renders as a table with these headers.
pub trait TableRow {
    const HEADERS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    pub fn is_json(&self) -> bool {
        self.options.output_format == OutputFormat::Json
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                let table = data.to_table(&self.options);
                println!("{table}");
            }
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    pub fn success(&self, message: &str) {
        self.line(ICONS.success, THEME.success, message);
    }

    pub fn error(&self, message: &str) {
        let output = if self.options.no_color {
            format!("{} {message}", ICONS.error)
        } else {
            format!("{} {}", ICONS.error.color(THEME.error), message.color(THEME.error))
        };
        eprintln!("{output}");
    }

    pub fn warning(&self, message: &str) {
        self.line(ICONS.warning, THEME.warning, message);
    }

    pub fn info(&self, message: &str) {
        self.line(ICONS.info, THEME.info, message);
    }

    /// Toggle outcome: `+` for an added member, `-` for a removed one.
    pub fn toggled(&self, added: bool, message: &str) {
        if added {
            self.line(ICONS.added, THEME.added, message);
        } else {
            self.line(ICONS.removed, THEME.removed, message);
        }
    }

    /// Only shown with `--verbose`; goes to stderr so piped output stays clean.
    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            let output = if self.options.no_color {
                format!("{} {message}", ICONS.arrow)
            } else {
                format!("{} {}", ICONS.arrow.color(THEME.muted), message.color(THEME.muted))
            };
            eprintln!("{output}");
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.options.quiet && !self.is_json() {
            let output = if self.options.no_color {
                format!("\n{text}\n{}", "=".repeat(text.chars().count()))
            } else {
                format!("\n{}", text.color(THEME.primary).bold())
            };
            println!("{output}");
        }
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if !self.options.quiet && !self.is_json() {
            let output = if self.options.no_color {
                format!("{key}: {value}")
            } else {
                format!("{}: {}", key.color(THEME.key).bold(), value.color(THEME.value))
            };
            println!("{output}");
        }
    }

    pub fn bullet(&self, text: &str) {
        if !self.options.quiet && !self.is_json() {
            let output = if self.options.no_color {
                format!("  {} {text}", ICONS.bullet)
            } else {
                format!("  {} {text}", ICONS.bullet.color(THEME.muted))
            };
            println!("{output}");
        }
    }

    /// Display progress indicator
    pub fn progress(&self, message: &str) {
        if self.options.quiet || self.is_json() {
            return;
        }

        let output = if self.options.no_color {
            format!("{} {message}...", ICONS.loading)
        } else {
            format!(
                "{} {}...",
                ICONS.loading.color(THEME.highlight).bold(),
                message.color(THEME.highlight)
            )
        };

        print!("\r{output}");
        std::io::stdout().flush().ok();
    }

    /// Clear the current line after a progress indicator
    pub fn clear_line(&self) {
        if self.options.quiet || self.is_json() {
            return;
        }

        print!("\r{}", " ".repeat(80));
        print!("\r");
        std::io::stdout().flush().ok();
    }

    fn line(&self, icon: &str, color: colored::Color, message: &str) {
        if self.options.quiet || self.is_json() {
            return;
        }
        let output = if self.options.no_color {
            format!("{icon} {message}")
        } else {
            format!("{} {}", icon.color(color), message.color(color))
        };
        println!("{output}");
    }
}

/// Themed table with a bold header row.
pub fn themed_table(options: &GlobalOptions, headers: &[&str]) -> Table {
    let mut table = Table::new();
    if options.no_color {
        table.load_preset(comfy_table::presets::ASCII_FULL);
    } else {
        table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    }

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|header| {
            let cell = Cell::new(header).add_attribute(Attribute::Bold);
            if options.no_color { cell } else { cell.fg(TableColor::Cyan) }
        })
        .collect();
    table.set_header(header_cells);
    table
}

impl<T> TableDisplay for Vec<T>
where
    T: TableRow + Serialize,
{
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, T::HEADERS);
        if self.is_empty() {
            table.add_row(vec![Cell::new("No items found")]);
            return table;
        }
        for item in self {
            table.add_row(item.cells());
        }
        table
    }

    fn to_compact(&self) -> String {
        self.iter()
            .map(|item| item.cells().join(" | "))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        id: String,
        likes: usize,
    }

    impl TableRow for Row {
        const HEADERS: &'static [&'static str] = &["ID", "Likes"];

        fn cells(&self) -> Vec<String> {
            vec![self.id.clone(), self.likes.to_string()]
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                id: "v1".to_string(),
                likes: 3,
            },
            Row {
                id: "v2".to_string(),
                likes: 0,
            },
        ]
    }

    #[test]
    fn compact_output_has_one_line_per_row() {
        assert_eq!(rows().to_compact(), "v1 | 3\nv2 | 0");
    }

    #[test]
    fn tables_carry_headers_and_rows() {
        let options = GlobalOptions {
            no_color: true,
            ..Default::default()
        };
        let rendered = rows().to_table(&options).to_string();
        assert!(rendered.contains("Likes"));
        assert!(rendered.contains("v2"));

        let empty: Vec<Row> = Vec::new();
        assert!(empty.to_table(&options).to_string().contains("No items found"));
    }

    #[test]
    fn quiet_display_prints_nothing_and_succeeds() {
        let manager = OutputManager::new(GlobalOptions {
            quiet: true,
            output_format: OutputFormat::Json,
            ..Default::default()
        });
        assert!(manager.display(&rows()).is_ok());
    }
}
