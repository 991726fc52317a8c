mod commands;
mod completer;

pub use commands::{CommandContext, CommandResult};
pub use completer::CertwatchCompleter;

use std::io::Write;
use std::time::Duration;

use certwatch_core::colors::CatppuccinExt;
use certwatch_core::output::{get_formatter, OutputFormat};
use certwatch_core::{AddRequest, CertWatch, CertwatchError, Removal, RemoveRequest};
use chrono::Local;
use colored::Colorize;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::display::{Countdown, RefreshProgress};
use commands::{format_interval, parse_interval};

const HISTORY_FILE: &str = ".certwatch_history";

fn history_path() -> std::path::PathBuf {
    dirs::home_dir()
        .map(|p| p.join(HISTORY_FILE))
        .unwrap_or_else(|| HISTORY_FILE.into())
}

/// Puts the terminal in raw mode and cancels `cancel` on Esc or Ctrl+C.
struct KeyListener {
    stop: CancellationToken,
    handle: JoinHandle<()>,
    raw_mode: bool,
}

impl KeyListener {
    fn spawn(cancel: CancellationToken) -> Self {
        let raw_mode = terminal::enable_raw_mode().is_ok();
        let stop = CancellationToken::new();
        let stop_listening = stop.clone();

        let handle = tokio::task::spawn_blocking(move || {
            while !stop_listening.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    // No usable terminal
                    Err(_) => break,
                }
                if let Ok(Event::Key(KeyEvent {
                    code, modifiers, ..
                })) = event::read()
                {
                    let ctrl_c =
                        code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL);
                    if code == KeyCode::Esc || ctrl_c {
                        cancel.cancel();
                        break;
                    }
                }
            }
        });

        Self {
            stop,
            handle,
            raw_mode,
        }
    }

    async fn shutdown(self) {
        self.stop.cancel();
        let _ = self.handle.await;
        if self.raw_mode {
            let _ = terminal::disable_raw_mode();
        }
    }
}

pub struct Repl {
    editor: Editor<CertwatchCompleter, DefaultHistory>,
    context: CommandContext,
    service: CertWatch,
}

impl Repl {
    pub fn new(service: CertWatch, output_format: OutputFormat) -> anyhow::Result<Self> {
        let config = rustyline::Config::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(rustyline::EditMode::Emacs)
            .build();

        let completer = CertwatchCompleter::new(service.registry().clone());
        let mut editor = Editor::with_config(config)?;
        editor.set_helper(Some(completer));
        let _ = editor.load_history(&history_path());

        Ok(Self {
            editor,
            context: CommandContext::new(output_format),
            service,
        })
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        self.print_banner();

        loop {
            let prompt = self.get_prompt();

            match self.editor.readline(&prompt) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    self.editor.add_history_entry(line)?;

                    match self.execute_line(line).await {
                        CommandResult::Continue => {}
                        CommandResult::Exit => break,
                        CommandResult::Error(e) => {
                            eprintln!("{} {}", "Error:".ctp_red().bold(), e);
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("exit");
                    break;
                }
                Err(err) => {
                    eprintln!("{} {:?}", "Error:".ctp_red().bold(), err);
                    break;
                }
            }
        }

        let _ = self.editor.save_history(&history_path());
        Ok(())
    }

    fn print_banner(&self) {
        println!();
        println!(
            "  {} - TLS certificate expiry tracker",
            format!("certwatch v{}", env!("CARGO_PKG_VERSION"))
                .bright_purple()
                .bold()
        );
        println!(
            "  Tracking {} domains. Type {} for available commands\n",
            self.service.list().len().to_string().bright_green(),
            "help".bright_green()
        );
    }

    fn get_prompt(&self) -> String {
        let format_indicator = match self.context.output_format {
            OutputFormat::Human => "",
            OutputFormat::Json => " [json]",
        };
        format!(
            "{}{} ",
            "certwatch".bright_cyan().bold(),
            format!("{}›", format_indicator).white()
        )
    }

    async fn execute_line(&mut self, line: &str) -> CommandResult {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            return CommandResult::Continue;
        }

        let command = parts[0].to_lowercase();
        let args = &parts[1..];

        match command.as_str() {
            "help" | "?" => {
                self.print_help();
                CommandResult::Continue
            }
            "exit" | "quit" | "q" => CommandResult::Exit,
            "list" | "ls" => self.execute_list(),
            "add" => self.execute_add(args),
            "remove" | "rm" => self.execute_remove(args),
            "refresh" => self.execute_refresh().await,
            "import" => self.execute_import(args).await,
            "export" => self.execute_export(args),
            "note" => self.execute_note(args),
            "watch" => self.execute_watch(args).await,
            "set" => self.execute_set(args),
            "clear" => {
                print!("\x1B[2J\x1B[1;1H");
                let _ = std::io::stdout().flush();
                CommandResult::Continue
            }
            // A bare domain adds it
            _ if command.contains('.') => self.execute_add(&parts),
            _ => CommandResult::Error(format!(
                "Unknown command: {}. Type 'help' for available commands.",
                command
            )),
        }
    }

    fn print_help(&self) {
        println!();
        println!("{}", "DOMAINS".bright_purple().bold());
        println!("  {:<30} Show tracked domains and their status", "list".bright_cyan());
        println!("  {:<30} Track a domain (or just type the domain)", "add <domain> [notes]".bright_cyan());
        println!("  {:<30} Stop tracking a domain", "remove <domain>".bright_cyan());
        println!("  {:<30} Stop tracking everything", "remove --all".bright_cyan());
        println!("  {:<30} Set or clear notes", "note <domain> [text]".bright_cyan());
        println!();
        println!("{}", "CHECKS".bright_purple().bold());
        println!("  {:<30} Inspect every tracked certificate now", "refresh".bright_cyan());
        println!("  {:<30} Refresh periodically until Esc", "watch [interval]".bright_cyan());
        println!();
        println!("{}", "FILES".bright_purple().bold());
        println!("  {:<30} Import domain,notes CSV or a plain list", "import <file>".bright_cyan());
        println!("  {:<30} Export the table as CSV", "export [file]".bright_cyan());
        println!();
        println!("{}", "SETTINGS".bright_purple().bold());
        println!("  {:<30} Change output format", "set output <human|json>".bright_cyan());
        println!("  {:<30} Change the watch interval", "set interval <30s|5m|1h>".bright_cyan());
        println!("  {:<30} Clear screen", "clear".bright_cyan());
        println!("  {:<30} Exit the program", "exit".bright_cyan());
        println!();
    }

    fn execute_list(&self) -> CommandResult {
        let formatter = get_formatter(self.context.output_format);
        println!("{}", formatter.format_records(&self.service.list()));
        CommandResult::Continue
    }

    fn execute_add(&self, args: &[&str]) -> CommandResult {
        if args.is_empty() {
            return CommandResult::Error("Usage: add <domain> [notes]".to_string());
        }

        let notes = (args.len() > 1).then(|| args[1..].join(" "));
        let request = AddRequest {
            domain: Some(args[0].to_string()),
            notes,
        };

        match self.service.add(&request) {
            Ok(true) => {
                println!("Tracking {}", args[0].ctp_green());
                CommandResult::Continue
            }
            Ok(false) => {
                println!("{} is already tracked", args[0].ctp_yellow());
                CommandResult::Continue
            }
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }

    fn execute_remove(&self, args: &[&str]) -> CommandResult {
        let Some(target) = args.first() else {
            return CommandResult::Error("Usage: remove <domain> | remove --all".to_string());
        };

        let request = if *target == "--all" {
            RemoveRequest {
                domain: None,
                clear_all: true,
            }
        } else {
            RemoveRequest {
                domain: Some(target.to_string()),
                clear_all: false,
            }
        };

        match self.service.remove(&request) {
            Ok(Removal::Removed) => println!("Removed {}", target.ctp_green()),
            Ok(Removal::NotTracked) => println!("{} was not tracked", target.ctp_yellow()),
            Ok(Removal::Cleared(n)) => println!("Removed all {} domains", n),
            Err(e) => return CommandResult::Error(e.to_string()),
        }
        CommandResult::Continue
    }

    fn execute_note(&self, args: &[&str]) -> CommandResult {
        let Some(domain) = args.first() else {
            return CommandResult::Error("Usage: note <domain> [text]".to_string());
        };

        let notes = (args.len() > 1).then(|| args[1..].join(" "));
        let cleared = notes.is_none();
        match self.service.set_notes(domain, notes) {
            Ok(true) if cleared => println!("Cleared notes for {}", domain.ctp_green()),
            Ok(true) => println!("Updated notes for {}", domain.ctp_green()),
            Ok(false) => {
                return CommandResult::Error(format!("{} is not tracked", domain));
            }
            Err(e) => return CommandResult::Error(e.to_string()),
        }
        CommandResult::Continue
    }

    async fn execute_refresh(&self) -> CommandResult {
        if self.service.list().is_empty() {
            return CommandResult::Error("No domains tracked. Use 'add <domain>' first.".to_string());
        }

        println!("Press {} to stop early", "Esc".ctp_yellow());
        let cancel = CancellationToken::new();
        let listener = KeyListener::spawn(cancel.clone());

        let progress = RefreshProgress::start();
        let result = self
            .service
            .refresh_with(Some(progress.callback()), &cancel)
            .await;
        progress.finish();
        listener.shutdown().await;

        match result {
            Ok(results) => {
                let formatter = get_formatter(self.context.output_format);
                println!("{}", formatter.format_results(&results));
                CommandResult::Continue
            }
            Err(CertwatchError::Cancelled { completed, total }) => {
                println!(
                    "{} after {} of {} domains; checked results were saved",
                    "Refresh interrupted".ctp_yellow(),
                    completed,
                    total
                );
                CommandResult::Continue
            }
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }

    async fn execute_import(&self, args: &[&str]) -> CommandResult {
        let Some(path) = args.first() else {
            return CommandResult::Error("Usage: import <file>".to_string());
        };

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => return CommandResult::Error(format!("Failed to read file: {}", e)),
        };
        let rows = match certwatch_core::tabular::parse_import(&content) {
            Ok(rows) => rows,
            Err(e) => return CommandResult::Error(e.to_string()),
        };

        println!(
            "Importing {} rows from {}...",
            rows.len().to_string().bright_green(),
            path.bright_yellow()
        );

        let cancel = CancellationToken::new();
        let listener = KeyListener::spawn(cancel.clone());
        let progress = RefreshProgress::start();
        let result = self
            .service
            .import_with(&rows, Some(progress.callback()), &cancel)
            .await;
        progress.finish();
        listener.shutdown().await;

        match result {
            Ok(report) => {
                let formatter = get_formatter(self.context.output_format);
                println!("{}", formatter.format_import(&report));
                CommandResult::Continue
            }
            Err(CertwatchError::Cancelled { completed, total }) => {
                println!(
                    "{} after {} of {} domains; rows were imported",
                    "Refresh interrupted".ctp_yellow(),
                    completed,
                    total
                );
                CommandResult::Continue
            }
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }

    fn execute_export(&self, args: &[&str]) -> CommandResult {
        let csv = match self.service.export_csv() {
            Ok(csv) => csv,
            Err(e) => return CommandResult::Error(e.to_string()),
        };

        match args.first() {
            Some(path) => {
                if let Err(e) = std::fs::write(path, csv) {
                    return CommandResult::Error(format!("Failed to write output file: {}", e));
                }
                println!(
                    "Exported {} domains to {}",
                    self.service.list().len(),
                    path.bright_green()
                );
            }
            None => print!("{}", csv),
        }
        CommandResult::Continue
    }

    async fn execute_watch(&self, args: &[&str]) -> CommandResult {
        let interval = match args.first() {
            Some(arg) => match parse_interval(arg) {
                Some(interval) => interval,
                None => {
                    return CommandResult::Error(
                        "Invalid interval. Use e.g. 30s, 5m or 1h".to_string(),
                    )
                }
            },
            None => self.context.watch_interval,
        };

        println!(
            "Watching {} domains every {}",
            self.service.list().len().to_string().ctp_green(),
            format_interval(interval).ctp_yellow()
        );
        println!("Press {} or {} to stop\n", "Esc".ctp_yellow(), "Ctrl+C".ctp_yellow());

        let cancel = CancellationToken::new();
        let listener = KeyListener::spawn(cancel.clone());
        let formatter = get_formatter(self.context.output_format);
        let mut passes = 0usize;

        let outcome = loop {
            let result = self.service.refresh_with(None, &cancel).await;
            match result {
                Ok(results) => {
                    passes += 1;
                    // Raw mode is on, so lines need explicit carriage returns
                    let text = formatter.format_results(&results).replace('\n', "\r\n");
                    print!(
                        "{}\r\n{}\r\n",
                        format!("[{}] pass {}", Local::now().format("%H:%M:%S"), passes).overlay1(),
                        text
                    );
                    let _ = std::io::stdout().flush();
                }
                Err(CertwatchError::Cancelled { .. }) => break Ok(()),
                Err(e) => break Err(e),
            }

            if !Countdown::new().wait(interval, &cancel).await {
                break Ok(());
            }
        };

        listener.shutdown().await;

        match outcome {
            Ok(()) => {
                println!("\n{} after {} passes", "Watch stopped".ctp_yellow(), passes);
                CommandResult::Continue
            }
            Err(e) => CommandResult::Error(e.to_string()),
        }
    }

    fn execute_set(&mut self, args: &[&str]) -> CommandResult {
        if args.len() < 2 {
            return CommandResult::Error("Usage: set <setting> <value>".to_string());
        }

        match args[0] {
            "output" => match args[1].parse() {
                Ok(format) => {
                    self.context.output_format = format;
                    println!("Output format set to: {}", args[1]);
                    CommandResult::Continue
                }
                Err(_) => CommandResult::Error("Invalid format. Use: human, json".to_string()),
            },
            "interval" => match parse_interval(args[1]) {
                Some(interval) => {
                    self.context.watch_interval = interval;
                    println!("Watch interval set to: {}", format_interval(interval));
                    CommandResult::Continue
                }
                None => CommandResult::Error("Invalid interval. Use e.g. 30s, 5m or 1h".to_string()),
            },
            _ => CommandResult::Error(format!("Unknown setting: {}", args[0])),
        }
    }
}
