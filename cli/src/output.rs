//! Output formatting utilities for CLI commands

use colored::Colorize;
use spanstat_shared::Event;

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Render events as an aligned name / value / unit table.
pub fn event_table(events: &[Event]) -> String {
    let name_width = events
        .iter()
        .map(|e| e.name.len())
        .max()
        .unwrap_or(0)
        .max("EVENT".len());

    let mut out = format!("{:<width$}  {:>14}  UNIT\n", "EVENT", "VALUE", width = name_width);
    for e in events {
        out.push_str(&format!(
            "{:<width$}  {:>14}  {}\n",
            e.name,
            format_value(e.value),
            e.unit,
            width = name_width
        ));
    }
    out
}

/// Whole numbers print without a fractional part.
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}
