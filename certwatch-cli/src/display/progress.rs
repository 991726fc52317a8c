//! Refresh progress bar with tracing integration.
//!
//! While a refresh pass is running its progress bar is registered here, and
//! the tracing writer prints log lines through it so they don't tear the bar.
//! The REPL keeps the terminal in raw mode during a pass, so lines written
//! then end in `\r\n`.

use certwatch_core::ProgressCallback;
use crossterm::terminal;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::sync::{Mutex, MutexGuard};

/// The progress bar of the pass currently running, if any.
static ACTIVE_PROGRESS_BAR: Mutex<Option<ProgressBar>> = Mutex::new(None);

fn active() -> MutexGuard<'static, Option<ProgressBar>> {
    match ACTIVE_PROGRESS_BAR.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn active_progress_bar() -> Option<ProgressBar> {
    active().clone()
}

/// Progress bar for one refresh pass. Cleared when finished or dropped.
pub struct RefreshProgress {
    bar: ProgressBar,
}

impl RefreshProgress {
    pub fn start() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        *active() = Some(bar.clone());
        Self { bar }
    }

    /// Callback that advances the bar as domains are merged.
    pub fn callback(&self) -> ProgressCallback {
        let bar = self.bar.clone();
        Box::new(move |completed, total, domain| {
            bar.set_length(total as u64);
            bar.set_position(completed as u64);
            bar.set_message(domain.to_string());
        })
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
        *active() = None;
    }
}

impl Drop for RefreshProgress {
    fn drop(&mut self) {
        self.finish();
    }
}

fn line_ending(raw_mode: bool) -> &'static [u8] {
    if raw_mode {
        b"\r\n"
    } else {
        b"\n"
    }
}

/// A writer that routes output through the active progress bar.
pub struct ProgressWriter {
    buffer: Vec<u8>,
}

impl ProgressWriter {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn emit(line: &str) -> std::io::Result<()> {
        let raw = terminal::is_raw_mode_enabled().unwrap_or(false);
        let write_line = || {
            let mut stderr = std::io::stderr().lock();
            stderr.write_all(line.as_bytes())?;
            stderr.write_all(line_ending(raw))
        };

        match active_progress_bar() {
            // indicatif's println ends lines with a bare \n
            Some(pb) if raw => pb.suspend(write_line),
            Some(pb) => {
                pb.println(line);
                Ok(())
            }
            None => write_line(),
        }
    }
}

impl Default for ProgressWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);

        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line_str = String::from_utf8_lossy(&line);
            Self::emit(line_str.trim_end_matches('\n'))?;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.buffer.is_empty() {
            let line_str = String::from_utf8_lossy(&self.buffer).to_string();
            self.buffer.clear();
            let trimmed = line_str.trim_end();
            if !trimmed.is_empty() {
                Self::emit(trimmed)?;
            }
        }
        Ok(())
    }
}

impl Drop for ProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter for tracing-subscriber that creates ProgressWriters.
#[derive(Default)]
pub struct ProgressWriterFactory;

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for ProgressWriterFactory {
    type Writer = ProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ProgressWriter::new()
    }
}
