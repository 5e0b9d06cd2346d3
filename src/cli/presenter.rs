//! CLI presenter for output formatting

use std::path::Path;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::capture::{format_elapsed, CapturedFile};

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Stop spinner without status
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        eprintln!("{} {}", "ℹ".cyan(), message);
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green(), message);
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// Spinner line while recording
    pub fn format_recording(&self, elapsed_secs: u64, limit_secs: Option<u64>, paused: bool) -> String {
        let state = if paused { "Paused" } else { "Recording" };
        match limit_secs {
            Some(limit) => format!(
                "{} {} / {}  (Ctrl+C to stop)",
                state,
                format_elapsed(elapsed_secs),
                format_elapsed(limit)
            ),
            None => format!("{} {}  (Ctrl+C to stop)", state, format_elapsed(elapsed_secs)),
        }
    }

    /// Update the recording spinner
    pub fn update_recording(&self, elapsed_secs: u64, limit_secs: Option<u64>, paused: bool) {
        self.update_spinner(&self.format_recording(elapsed_secs, limit_secs, paused));
    }

    /// One-line summary of a saved capture
    pub fn format_saved(&self, file: &CapturedFile, path: &Path) -> String {
        let mut line = format!(
            "Saved {} ({}",
            path.display(),
            file.blob().human_readable_size()
        );
        if let Some(secs) = file.duration_secs() {
            line.push_str(&format!(", {}", format_elapsed(secs)));
        }
        line.push(')');
        line
    }

    /// One row of the `formats` listing
    pub fn format_candidate(&self, candidate: &str, supported: bool, chosen: bool) -> String {
        let mark = if supported {
            "✓".green()
        } else {
            "✗".red()
        };
        if chosen {
            format!("{} {} {}", mark, candidate.bold(), "(selected)".cyan())
        } else {
            format!("{} {}", mark, candidate)
        }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capture::{Blob, CaptureMode, PlaybackHandle};
    use chrono::Local;
    use std::path::PathBuf;

    #[test]
    fn format_recording_without_limit() {
        let presenter = Presenter::new();
        let line = presenter.format_recording(65, None, false);
        assert!(line.starts_with("Recording 01:05"));
    }

    #[test]
    fn format_recording_with_limit_and_pause() {
        let presenter = Presenter::new();
        let line = presenter.format_recording(5, Some(30), true);
        assert!(line.contains("Paused 00:05 / 00:30"));
    }

    #[test]
    fn format_saved_includes_size_and_duration() {
        colored::control::set_override(false);
        let presenter = Presenter::new();
        let file = CapturedFile::recording(
            CaptureMode::ScreenVideo,
            Blob::new(vec![0; 2048], "video/webm"),
            PlaybackHandle::new("blob:test"),
            42,
            Local::now(),
        );
        let line = presenter.format_saved(&file, &PathBuf::from("/tmp/clip.webm"));
        assert!(line.starts_with("Saved /tmp/clip.webm ("));
        assert!(line.ends_with(", 00:42)"));
    }

    #[test]
    fn format_candidate_marks_selection() {
        colored::control::set_override(false);
        let presenter = Presenter::new();
        assert_eq!(
            presenter.format_candidate("video/webm", true, true),
            "✓ video/webm (selected)"
        );
        assert_eq!(presenter.format_candidate("video/mp4", false, false), "✗ video/mp4");
    }
}
