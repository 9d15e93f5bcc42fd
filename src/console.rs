//! Terminal output: transfer lines and the spinner indicator.

use crate::indicator::{Glyph, IndicatorSignal};
use crate::transfer::record::{PhaseIcon, Transfer};
use async_trait::async_trait;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

/// One-line rendering of a transfer
pub fn format_transfer_line(transfer: &Transfer) -> String {
    let marker = match transfer.icon {
        Some(PhaseIcon::DoneIcon) => "✓".green(),
        Some(PhaseIcon::ErrorIcon) => "✗".red(),
        Some(PhaseIcon::CancelIcon) => "⊘".yellow(),
        Some(PhaseIcon::ArchiveIcon) => "▣".cyan(),
        Some(PhaseIcon::UploadIcon) => "↑".cyan(),
        Some(PhaseIcon::MoveIcon) => "→".cyan(),
        None => "·".dimmed(),
    };

    let status = if transfer.error {
        transfer.status.red().to_string()
    } else if transfer.canceled {
        transfer.status.yellow().to_string()
    } else if transfer.pending {
        transfer.status.cyan().to_string()
    } else {
        transfer.status.green().to_string()
    };

    let mut line = format!(
        "{} {} {} {}",
        marker,
        transfer.transfer_id.bold(),
        transfer.title,
        status
    );

    let stats = &transfer.stats;
    if let (Some(progress), Some(total)) = (&stats.progress, &stats.total) {
        line.push_str(&format!(" {} / {}", progress, total));
        if let Some(percent) = transfer.progress {
            line.push_str(&format!(" ({}%)", percent));
        }
    } else if let Some([a, b, c]) = stats.archived {
        line.push_str(&format!(" [{}/{}/{}]", a, b, c));
    }

    line
}

pub fn print_transfer(transfer: &Transfer) {
    println!("{}", format_transfer_line(transfer));
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "error:".red().bold(), message);
}

// =============================================================================
// Spinner
// =============================================================================

/// Indicator shown as an indicatif spinner on stderr
pub struct TerminalIndicator {
    spinner: ProgressBar,
    active: AtomicBool,
}

impl TerminalIndicator {
    pub fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self {
            spinner,
            active: AtomicBool::new(false),
        }
    }

    /// Print above the spinner without tearing it
    pub fn println(&self, line: impl AsRef<str>) {
        self.spinner.println(line);
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl Default for TerminalIndicator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndicatorSignal for TerminalIndicator {
    async fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::SeqCst);
    }

    async fn busy(&self) {
        self.spinner.enable_steady_tick(TICK);
        self.spinner.set_message("transfers running");
    }

    async fn settle(&self) {
        self.spinner.disable_steady_tick();
    }

    async fn success(&self) {
        self.spinner
            .set_message("transfer finished".green().to_string());
    }

    async fn set_glyph(&self, glyph: Glyph) {
        let active = self.active.load(Ordering::SeqCst);
        let message = match (glyph, active) {
            (Glyph::Synced, false) => "all synced".green().to_string(),
            (Glyph::Error, false) => "sync problem".red().to_string(),
            // still busy: keep the running message unless something failed
            (Glyph::Synced, true) => return,
            (Glyph::Error, true) => "transfers running, some failed".yellow().to_string(),
        };
        self.spinner.set_message(message);
        self.spinner.tick();
    }
}
