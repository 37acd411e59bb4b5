//! Styled terminal output utilities.

use owo_colors::OwoColorize;

/// Print a header/title
pub fn header(text: &str) {
    println!();
    println!("{}", text.bold().cyan());
    println!("{}", "─".repeat(text.chars().count()).dimmed());
    println!();
}

/// Print a section header
pub fn section(text: &str) {
    println!("{}", text.bold().white());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a success message
pub fn success(text: &str) {
    println!("{} {}", "✔".green().bold(), text.green());
}

/// Print an info message
pub fn info(text: &str) {
    println!("{} {}", "ℹ".blue().bold(), text);
}

/// Print a warning message
pub fn warn(text: &str) {
    println!("{} {}", "⚠".yellow().bold(), text.yellow());
}

/// Print an error message
pub fn error(text: &str) {
    eprintln!("{} {}", "✖".red().bold(), text.red());
}

/// Print an error item on stdout, as part of an itemized list
pub fn error_item(text: &str) {
    println!("  {} {}", "✖".red(), text);
}

/// Print a warning item
pub fn warn_item(text: &str) {
    println!("  {} {}", "⚠".yellow(), text);
}

/// Print a list item
pub fn list_item(text: &str) {
    println!("  {} {}", "•".dimmed(), text);
}

/// Print a numbered list item
pub fn numbered_item(number: usize, text: &str) {
    println!("  {}. {}", number.to_string().dimmed(), text);
}

/// Print a newline
pub fn newline() {
    println!();
}

/// Print dimmed text
pub fn dim(text: &str) {
    println!("{}", text.dimmed());
}

/// Print a code block
pub fn code(code: &str) {
    println!();
    for line in code.lines() {
        println!("  {}", line.bright_white());
    }
    println!();
}

/// Render a boolean as yes/no
pub fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Print every error and warning of a result
pub fn diagnostics(errors: &[String], warnings: &[String]) {
    if !errors.is_empty() {
        newline();
        section(&format!("Errors ({})", errors.len()));
        for e in errors {
            error_item(e);
        }
    }
    if !warnings.is_empty() {
        newline();
        section(&format!("Warnings ({})", warnings.len()));
        for w in warnings {
            warn_item(w);
        }
    }
}
