//! Terminal output for the Baton CLI.
//!
//! A run is printed as one aligned table with a configuration block and a
//! result block, followed by the integrity verdict and any warnings.

use anyhow::{Context, Result};
use console::style;
use serde::Serialize;
use std::fmt::Display;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// JSON output for scripting
    Json,
}

enum Line {
    Section(String),
    Row(String, String),
}

/// Two-column table with section separators.
#[derive(Default)]
pub struct ReportTable {
    lines: Vec<Line>,
}

impl ReportTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(mut self, title: impl Into<String>) -> Self {
        self.lines.push(Line::Section(title.into()));
        self
    }

    pub fn row(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.lines.push(Line::Row(key.into(), value.to_string()));
        self
    }

    fn key_width(&self) -> usize {
        self.lines
            .iter()
            .filter_map(|line| match line {
                Line::Row(key, _) => Some(key.chars().count()),
                Line::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Render without styling; keys are padded to a common width and each
    /// section is preceded by a rule carrying its title.
    pub fn render(&self) -> String {
        let width = self.key_width();
        let mut out = String::new();
        for line in &self.lines {
            match line {
                Line::Section(title) => {
                    let rule = "─".repeat((width + 4).saturating_sub(title.chars().count()));
                    out.push_str(&format!("── {} {}\n", title, rule));
                }
                Line::Row(key, value) => {
                    out.push_str(&format!("  {:<width$}  {}\n", key, value, width = width));
                }
            }
        }
        out
    }

    pub fn print(&self) {
        let width = self.key_width();
        for line in &self.lines {
            match line {
                Line::Section(title) => {
                    let rule = "─".repeat((width + 4).saturating_sub(title.chars().count()));
                    println!("{} {} {}", style("──").dim(), style(title).bold(), style(rule).dim());
                }
                Line::Row(key, value) => {
                    let padded = format!("{:<width$}", key, width = width);
                    println!("  {}  {}", style(padded).cyan(), value);
                }
            }
        }
    }
}

/// Print the integrity verdict
pub fn verdict(integrity_ok: bool) {
    if integrity_ok {
        println!("{} destination matches source", style("PASS").green().bold());
    } else {
        println!("{} destination differs from source", style("FAIL").red().bold());
    }
}

/// Print a warning message
pub fn warning(msg: impl Display) {
    println!("{} {}", style("warning:").yellow().bold(), msg);
}

/// Print an error message
pub fn error(msg: impl Display) {
    eprintln!("{} {}", style("error:").red().bold(), msg);
}

/// Print any serializable value as pretty JSON
pub fn json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", text);
    Ok(())
}
