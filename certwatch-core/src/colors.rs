//! Catppuccin-inspired color palette for terminal output.
//!
//! Uses standard ANSI bright colors for maximum terminal compatibility,
//! mapped to approximate Catppuccin Frappe aesthetics.

use colored::{ColoredString, Colorize};

use crate::registry::CertStatus;

/// Extension trait for applying Catppuccin-inspired colors to strings.
pub trait CatppuccinExt {
    fn ctp_red(&self) -> ColoredString;
    fn peach(&self) -> ColoredString;
    fn ctp_yellow(&self) -> ColoredString;
    fn ctp_green(&self) -> ColoredString;
    fn teal(&self) -> ColoredString;
    fn sky(&self) -> ColoredString;
    fn lavender(&self) -> ColoredString;

    fn ctp_white(&self) -> ColoredString;
    fn subtext0(&self) -> ColoredString;
    fn overlay1(&self) -> ColoredString;
}

impl<S: AsRef<str>> CatppuccinExt for S {
    fn ctp_red(&self) -> ColoredString {
        self.as_ref().bright_red()
    }

    // Peach -> yellow (orange-ish, dimmer than ctp_yellow)
    fn peach(&self) -> ColoredString {
        self.as_ref().yellow()
    }

    fn ctp_yellow(&self) -> ColoredString {
        self.as_ref().bright_yellow()
    }

    fn ctp_green(&self) -> ColoredString {
        self.as_ref().bright_green()
    }

    fn teal(&self) -> ColoredString {
        self.as_ref().cyan()
    }

    fn sky(&self) -> ColoredString {
        self.as_ref().bright_cyan()
    }

    fn lavender(&self) -> ColoredString {
        self.as_ref().bright_purple()
    }

    fn ctp_white(&self) -> ColoredString {
        self.as_ref().bright_white()
    }

    fn subtext0(&self) -> ColoredString {
        self.as_ref().white()
    }

    // Overlay -> bright black (gray)
    fn overlay1(&self) -> ColoredString {
        self.as_ref().bright_black()
    }
}

/// Palette entry for a certificate status.
pub fn status_color(status: CertStatus, text: &str) -> ColoredString {
    match status {
        CertStatus::Valid => text.ctp_green(),
        CertStatus::Expiring => text.ctp_yellow().bold(),
        CertStatus::Expired => text.ctp_red().bold(),
        CertStatus::Error => text.ctp_red(),
        CertStatus::Unknown => text.overlay1(),
    }
}

/// Days-left highlighting: red at a week or less, peach within a month.
pub fn days_color(days: i64, text: &str) -> ColoredString {
    if days <= 7 {
        text.ctp_red().bold()
    } else if days <= 30 {
        text.peach()
    } else {
        text.ctp_white()
    }
}
