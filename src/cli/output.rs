//! Colored output helpers for the CLI
//!
//! Provides consistent, colored terminal output for the scrivener CLI.

use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the scrivener banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                "\n  {} {}\n",
                "scrivener".bright_cyan().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
            println!(
                "  {}\n",
                "Multi-source literature review pipeline".bright_white()
            );
        } else {
            println!(
                "\n  scrivener v{}\n\n  Multi-source literature review pipeline\n",
                env!("CARGO_PKG_VERSION")
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a scored item with its relevance score up front
    pub fn scored_item(&self, score: u8, title: &str, reason: &str) {
        if self.colored {
            let badge = format!("[{score:>2}]");
            let badge = match score {
                7.. => badge.green().bold().to_string(),
                4..=6 => badge.yellow().bold().to_string(),
                _ => badge.red().bold().to_string(),
            };
            println!("    {} {}", badge, title.bright_white());
            println!("         {}", reason.dimmed());
        } else {
            println!("    [{score:>2}] {}", title);
            println!("         {}", reason);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {}", message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Prompt for confirmation (returns true if user confirms)
    pub fn confirm(&self, message: &str) -> bool {
        if self.colored {
            print!(
                "  {} {} [y/N]: ",
                "?".bright_yellow().bold(),
                message.bright_white()
            );
        } else {
            print!("  [?] {} [y/N]: ", message);
        }

        io::stdout().flush().ok();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_ok() {
            let input = input.trim().to_lowercase();
            input == "y" || input == "yes"
        } else {
            false
        }
    }

    /// Print a table header row
    pub fn table_header(&self, columns: &[&str]) {
        let header: String = columns
            .iter()
            .map(|c| format!("{:<38}", c))
            .collect::<Vec<_>>()
            .join(" ");
        if self.colored {
            println!("    {}", header.bright_white().bold());
            println!("    {}", "─".repeat(columns.len() * 39).dimmed());
        } else {
            println!("    {}", header);
            println!("    {}", "-".repeat(columns.len() * 39));
        }
    }

    /// Print a table row
    pub fn table_row(&self, values: &[&str]) {
        let row: String = values
            .iter()
            .map(|v| format!("{:<38}", v))
            .collect::<Vec<_>>()
            .join(" ");
        println!("    {}", row);
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_new() {
        let output = Output::new();
        assert!(output.colored);
    }

    #[test]
    fn test_output_no_color() {
        let output = Output::no_color();
        assert!(!output.colored);
    }

    #[test]
    fn test_output_methods_no_panic() {
        // Smoke test - ensure none of the output methods panic
        let output = Output::no_color();

        output.banner();
        output.success("test success");
        output.info("test info");
        output.warning("test warning");
        output.error("test error");
        output.header("Test Header");
        output.kv("key", "value");
        output.list_item("item");
        output.scored_item(8, "title", "reason");
        output.scored_item(5, "title", "reason");
        output.scored_item(1, "title", "reason");
        output.hint("hint message");
        output.table_header(&["Id", "Name"]);
        output.table_row(&["a", "b"]);
        output.newline();
    }

    #[test]
    fn test_output_methods_colored_no_panic() {
        // Smoke test for colored output
        let output = Output::new();

        output.banner();
        output.success("test success");
        output.error("test error");
        output.header("Test Header");
        output.kv("key", "value");
        output.scored_item(9, "title", "reason");
        output.table_header(&["Id"]);
        output.table_row(&["a"]);
        output.newline();
    }
}
