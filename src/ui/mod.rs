//! Terminal UI: status lines, spinners and progress bars.
//!
//! The CLI reports every request through the same status surface
//! (idle, in progress, success, warning, error). Spinners and bars are
//! hidden when stdout is not a terminal or output is quiet.

use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

/// Check if stdout is a terminal.
pub fn is_terminal() -> bool {
    std::io::stdout().is_terminal()
}

/// Check if stdin is a terminal.
pub fn is_interactive() -> bool {
    std::io::stdin().is_terminal()
}

/// Status of the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    InProgress,
    Success,
    Warning,
    Error,
    Info,
}

/// Status icons for different operations.
pub fn status_icon(status: Status) -> &'static str {
    match status {
        Status::Idle => "○",
        Status::InProgress => "◐",
        Status::Success => "✓",
        Status::Warning => "⚠",
        Status::Error => "✗",
        Status::Info => "ℹ",
    }
}

/// Format a status line with a coloured icon.
pub fn status_line(status: Status, msg: &str) -> String {
    let icon = status_icon(status);
    match status {
        Status::Idle => format!("{} {}", icon.white().dimmed(), msg),
        Status::InProgress => format!("{} {}", icon.cyan(), msg),
        Status::Success => format!("{} {}", icon.green().bold(), msg),
        Status::Warning => format!("{} {}", icon.yellow().bold(), msg),
        Status::Error => format!("{} {}", icon.red().bold(), msg),
        Status::Info => format!("{} {}", icon.cyan().bold(), msg),
    }
}

/// Print a styled status message. Progress, warnings and errors go to stderr
/// so stdout carries only results.
pub fn print_status(status: Status, msg: &str) {
    match status {
        Status::InProgress | Status::Warning | Status::Error => {
            eprintln!("{}", status_line(status, msg))
        }
        _ => println!("{}", status_line(status, msg)),
    }
}

/// Welcome banner for the interactive form.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");

    println!();
    println!("{}", format!("✍  Blogsmith v{}", version).bold().cyan());
    println!(
        "{}",
        "Generate a blog post with a local model and export it to PDF.".dimmed()
    );
    println!();
}

/// Format a section header.
pub fn section_header(title: &str) -> String {
    format!("━━━ {} ━━━", title).bold().cyan().to_string()
}

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", section_header(title));
}

/// Format a divider line.
pub fn divider_line() -> String {
    "─".repeat(80).dimmed().to_string()
}

/// Get a human-readable file size.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Loading spinner for the in-progress state.
pub struct Spinner {
    pb: indicatif::ProgressBar,
}

impl Spinner {
    /// Create a spinner that only draws when `visible` is set.
    pub fn with_visibility(msg: &str, visible: bool) -> Self {
        if !visible {
            return Self {
                pb: indicatif::ProgressBar::hidden(),
            };
        }

        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_style(
            indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")
                .unwrap()
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Self { pb }
    }

    /// Increment progress.
    pub fn inc(&self, delta: u64) {
        self.pb.inc(delta);
    }

    /// Finish with success message.
    pub fn finish_with_success(&self, msg: &str) {
        self.finish_styled("{spinner:.green} {msg}", "✓✓", msg);
    }

    /// Finish with error message.
    pub fn finish_with_error(&self, msg: &str) {
        self.finish_styled("{spinner:.red} {msg}", "✗✗", msg);
    }

    /// Remove the spinner without leaving a line behind.
    pub fn finish_and_clear(&self) {
        self.pb.finish_and_clear();
    }

    fn finish_styled(&self, template: &str, ticks: &str, msg: &str) {
        if self.pb.is_hidden() {
            return;
        }
        self.pb.set_style(
            indicatif::ProgressStyle::with_template(template)
                .unwrap()
                .tick_chars(ticks),
        );
        self.pb.finish_with_message(msg.to_string());
    }
}

/// Create a progress bar for downloads. An unknown length falls back to a
/// byte counter.
pub fn create_progress_bar(len: Option<u64>, msg: &str) -> Spinner {
    if !is_terminal() {
        return Spinner {
            pb: indicatif::ProgressBar::hidden(),
        };
    }

    let pb = match len {
        Some(len) => {
            let pb = indicatif::ProgressBar::new(len);
            pb.set_style(
                indicatif::ProgressStyle::with_template(
                    "{msg}: {bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})",
                )
                .unwrap()
                .progress_chars("█▓▒░ "),
            );
            pb
        }
        None => {
            let pb = indicatif::ProgressBar::new_spinner();
            pb.set_style(
                indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg}: {bytes}")
                    .unwrap(),
            );
            pb
        }
    };
    pb.set_message(msg.to_string());

    Spinner { pb }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_icon() {
        assert_eq!(status_icon(Status::Success), "✓");
        assert_eq!(status_icon(Status::Error), "✗");
        assert_eq!(status_icon(Status::Warning), "⚠");
        assert_eq!(status_icon(Status::Idle), "○");
    }

    #[test]
    fn test_status_line_contains_message() {
        let line = status_line(Status::Warning, "topic required.");
        assert!(line.contains("topic required."));
        assert!(line.contains("⚠"));
    }

    #[test]
    fn test_in_progress_line() {
        let line = status_line(Status::InProgress, "Generating blog post...");
        assert!(line.contains("◐"));
        assert!(line.contains("Generating blog post..."));
    }

    #[test]
    fn test_section_header_and_divider() {
        assert!(section_header("Blog").contains("━━━ Blog ━━━"));
        assert_eq!(divider_line().matches('─').count(), 80);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(500), "500 B");
        assert_eq!(format_file_size(1024), "1.00 KB");
        assert_eq!(format_file_size(1048576), "1.00 MB");
        assert_eq!(format_file_size(7 * 1024 * 1024 * 1024), "7.00 GB");
    }

    #[test]
    fn test_hidden_spinner() {
        let spinner = Spinner::with_visibility("Generating", false);
        spinner.inc(1);
        spinner.finish_with_success("done");
        assert!(spinner.pb.is_hidden());
    }
}
