mod display;
mod repl;

use std::path::PathBuf;
use std::time::Duration;

use certwatch_core::colors::CatppuccinExt;
use certwatch_core::output::{get_formatter, OutputFormat, OutputFormatter};
use certwatch_core::{
    AddRequest, CertWatch, CertwatchError, Removal, RemoveRequest, Settings, StorageBackend,
};
use chrono::Local;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::display::{Countdown, ProgressWriterFactory, RefreshProgress};

#[derive(Parser)]
#[command(name = "certwatch")]
#[command(about = "TLS certificate expiry tracker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// JSON file holding the tracked domains
    #[arg(long, env = "CERTWATCH_STORE", default_value = "domains.json", global = true)]
    store: PathBuf,

    /// Keep domains in memory only (nothing is written to disk)
    #[arg(long, global = true)]
    memory: bool,

    /// Probe timeout in seconds, covering DNS, connect and handshake together
    #[arg(long, env = "CERTWATCH_TIMEOUT", default_value = "10", global = true)]
    timeout: u64,

    /// Maximum probes in flight during a refresh (1 = sequential)
    #[arg(long, env = "CERTWATCH_CONCURRENCY", default_value = "5", global = true)]
    concurrency: usize,

    /// Output format (human or json)
    #[arg(short, long, default_value = "human", global = true)]
    format: OutputFormat,

    /// Log filter (error, warn, info, debug, trace); RUST_LOG is used when unset
    #[arg(long, env = "CERTWATCH_LOG", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show tracked domains and their last known status
    List,
    /// Track a domain
    Add {
        /// Domain name (URLs and host:port are accepted)
        domain: String,
        /// Free-form notes stored with the domain
        #[arg(short, long)]
        notes: Option<String>,
    },
    /// Stop tracking a domain
    Remove {
        /// Domain name to remove
        #[arg(required_unless_present = "all")]
        domain: Option<String>,
        /// Remove every tracked domain
        #[arg(long, conflicts_with = "domain")]
        all: bool,
    },
    /// Inspect every tracked certificate once
    Refresh,
    /// Import domains from a CSV (domain,notes) or plain list, then refresh
    Import {
        /// File to read
        file: PathBuf,
    },
    /// Export the domain table as CSV
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Set the notes of a tracked domain (no text clears them)
    Note {
        /// Tracked domain
        domain: String,
        /// Notes text
        text: Vec<String>,
    },
    /// Refresh periodically until Ctrl+C
    Watch {
        /// Seconds between passes
        #[arg(short, long, default_value = "300")]
        interval: u64,
    },
}

impl Cli {
    fn settings(&self) -> Settings {
        let storage = if self.memory {
            StorageBackend::Memory
        } else {
            StorageBackend::JsonFile(self.store.clone())
        };

        Settings::default()
            .with_storage(storage)
            .with_timeout(Duration::from_secs(self.timeout.max(1)))
            .with_concurrency(self.concurrency)
    }

    fn env_filter(&self) -> EnvFilter {
        match self.log_level.as_deref() {
            Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn")),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.env_filter())
        .with_writer(ProgressWriterFactory)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".ctp_red(), e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = cli.settings();
    debug!(?settings, "Resolved settings");
    let service = CertWatch::from_settings(&settings)?;

    match cli.command {
        Some(cmd) => execute_command(cmd, &service, cli.format).await,
        None => {
            let mut repl = repl::Repl::new(service, cli.format)?;
            repl.run().await
        }
    }
}

/// Token cancelled on the first Ctrl+C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

fn report_cancelled(completed: usize, total: usize) {
    eprintln!(
        "{} after {} of {} domains; checked results were saved",
        "Interrupted".ctp_yellow(),
        completed,
        total
    );
}

async fn execute_command(
    command: Commands,
    service: &CertWatch,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    let formatter = get_formatter(output_format);
    let json = output_format == OutputFormat::Json;

    match command {
        Commands::List => {
            println!("{}", formatter.format_records(&service.list()));
        }
        Commands::Add { domain, notes } => {
            let created = service.add(&AddRequest {
                domain: Some(domain.clone()),
                notes,
            })?;
            if json {
                println!("{}", serde_json::json!({ "domain": domain, "created": created }));
            } else if created {
                println!("Tracking {}", domain.ctp_green());
            } else {
                println!("{} is already tracked", domain.ctp_yellow());
            }
        }
        Commands::Remove { domain, all } => {
            let removal = service.remove(&RemoveRequest {
                domain: domain.clone(),
                clear_all: all,
            })?;
            let target = domain.unwrap_or_default();
            match removal {
                Removal::Removed if json => {
                    println!("{}", serde_json::json!({ "removed": [target] }))
                }
                Removal::NotTracked if json => {
                    println!("{}", serde_json::json!({ "removed": [] }))
                }
                Removal::Cleared(n) if json => println!("{}", serde_json::json!({ "cleared": n })),
                Removal::Removed => println!("Removed {}", target.ctp_green()),
                Removal::NotTracked => println!("{} was not tracked", target.ctp_yellow()),
                Removal::Cleared(n) => println!("Removed all {} domains", n),
            }
        }
        Commands::Refresh => {
            let cancel = cancel_on_ctrl_c();
            let progress = RefreshProgress::start();
            let result = service
                .refresh_with(Some(progress.callback()), &cancel)
                .await;
            progress.finish();

            match result {
                Ok(results) => println!("{}", formatter.format_results(&results)),
                Err(CertwatchError::Cancelled { completed, total }) => {
                    report_cancelled(completed, total);
                    std::process::exit(130);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
            let rows = certwatch_core::tabular::parse_import(&content)?;
            if rows.is_empty() {
                anyhow::bail!(
                    "No domains found in {}. Expected a CSV with a 'domain' column or one domain per line",
                    file.display()
                );
            }

            let cancel = cancel_on_ctrl_c();
            let progress = RefreshProgress::start();
            let result = service
                .import_with(&rows, Some(progress.callback()), &cancel)
                .await;
            progress.finish();

            match result {
                Ok(report) => println!("{}", formatter.format_import(&report)),
                Err(CertwatchError::Cancelled { completed, total }) => {
                    report_cancelled(completed, total);
                    std::process::exit(130);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Commands::Export { output } => {
            let csv = service.export_csv()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, csv)?;
                    eprintln!(
                        "Exported {} domains to {}",
                        service.list().len(),
                        path.display().to_string().ctp_green()
                    );
                }
                None => print!("{}", csv),
            }
        }
        Commands::Note { domain, text } => {
            let notes = (!text.is_empty()).then(|| text.join(" "));
            if !service.set_notes(&domain, notes.clone())? {
                anyhow::bail!("{} is not tracked", domain);
            }
            if json {
                println!("{}", serde_json::json!({ "domain": domain, "notes": notes }));
            } else {
                println!("Updated notes for {}", domain.ctp_green());
            }
        }
        Commands::Watch { interval } => {
            watch(service, formatter.as_ref(), Duration::from_secs(interval.max(1))).await?;
        }
    }

    Ok(())
}

async fn watch(
    service: &CertWatch,
    formatter: &dyn OutputFormatter,
    interval: Duration,
) -> anyhow::Result<()> {
    let cancel = cancel_on_ctrl_c();
    eprintln!(
        "Watching {} domains every {}s. Press {} to stop.",
        service.list().len(),
        interval.as_secs(),
        "Ctrl+C".ctp_yellow()
    );

    loop {
        let progress = RefreshProgress::start();
        let result = service
            .refresh_with(Some(progress.callback()), &cancel)
            .await;
        progress.finish();

        match result {
            Ok(results) => {
                eprintln!("[{}]", Local::now().format("%Y-%m-%d %H:%M:%S"));
                println!("{}", formatter.format_results(&results));
            }
            Err(CertwatchError::Cancelled { completed, total }) => {
                report_cancelled(completed, total);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        if !Countdown::new().wait(interval, &cancel).await {
            eprintln!("{}", "Watch stopped".ctp_yellow());
            return Ok(());
        }
    }
}
