mod cli;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use transcriber::db::Database;
use transcriber::service::TranscriptFile;
use transcriber::{
    init_tracing, load_config, Config, InFlightRegistry, JobCatalog, JobId, JobStatus,
    ProgressReporter, TranscriptionService,
};

use cli::{Cli, Commands};

const RESULT_POLL: Duration = Duration::from_millis(200);

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    init_tracing(&config.logging);

    match cli.command {
        Commands::Transcribe { files, output_dir } => {
            transcribe(&config, &files, output_dir.as_deref())
        }
        Commands::Status { job_id } => {
            let view = reporter(&config)?.status(&parse_id(&job_id)?)?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        Commands::History { limit } => {
            for summary in reporter(&config)?.history(limit)? {
                println!(
                    "{}  {:<10}  {}  {}",
                    summary.created_at.format("%Y-%m-%d %H:%M:%S"),
                    summary.status,
                    summary.job_id,
                    summary.original_name
                );
            }
            Ok(())
        }
        Commands::Download { job_id, output } => {
            let job = reporter(&config)?.find(&parse_id(&job_id)?)?;
            let file = TranscriptFile::from_job(job)?;
            let path = output.unwrap_or_else(|| PathBuf::from(&file.file_name));
            write_transcript(&path, &file)
        }
        Commands::Rename { job_id, name } => {
            let summary = catalog(&config)?.rename(&parse_id(&job_id)?, &name)?;
            println!("{}  renamed  {}", summary.job_id, summary.original_name);
            Ok(())
        }
        Commands::Delete { job_id } => {
            let job_id = parse_id(&job_id)?;
            catalog(&config)?.delete(&job_id)?;
            println!("{}  deleted", job_id);
            Ok(())
        }
    }
}

fn parse_id(raw: &str) -> Result<JobId> {
    raw.parse::<JobId>().map_err(anyhow::Error::msg)
}

fn open_database(config: &Config) -> Result<Database> {
    let path = config
        .resolve_database_path()
        .context("Could not determine the database location")?;
    Ok(Database::open(&path)?)
}

/// Read-only view of the job store for queries outside a running service.
fn reporter(config: &Config) -> Result<ProgressReporter> {
    Ok(ProgressReporter::new(
        Arc::new(open_database(config)?),
        InFlightRegistry::new(),
    ))
}

fn catalog(config: &Config) -> Result<JobCatalog> {
    Ok(JobCatalog::new(
        Arc::new(open_database(config)?),
        InFlightRegistry::new(),
    ))
}

fn transcribe(config: &Config, files: &[PathBuf], output_dir: Option<&Path>) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        ctrlc::set_handler(move || {
            eprintln!("\nStopping after running jobs finish...");
            stop.store(true, Ordering::SeqCst);
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    let service = TranscriptionService::from_config(config)?;
    let mut events = service.subscribe_progress();

    let mut pending: HashMap<JobId, String> = HashMap::new();
    let mut rejected = 0usize;
    for file in files {
        if stop.load(Ordering::SeqCst) {
            break;
        }
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        let media = match std::fs::read(file) {
            Ok(media) => media,
            Err(e) => {
                eprintln!("{}: {}", file.display(), e);
                rejected += 1;
                continue;
            }
        };
        match service.submit(&media, &name, media.len() as u64) {
            Ok(job_id) => {
                println!("{}  queued  {}", job_id, name);
                pending.insert(job_id, name);
            }
            Err(e) => {
                eprintln!("{}: {}", name, e);
                rejected += 1;
            }
        }
    }

    let mut failed = 0usize;
    while !pending.is_empty() && !stop.load(Ordering::SeqCst) {
        while let Ok(event) = events.try_recv() {
            if !event.is_terminal() {
                println!(
                    "{}  {:>3}%  {}",
                    event.job_id, event.progress_percent, event.message
                );
            }
        }

        let finished: Vec<(JobId, Option<String>)> = match service.next_result_timeout(RESULT_POLL)
        {
            Some(result) => {
                let error = (!result.is_success()).then(|| {
                    result
                        .error_reason
                        .unwrap_or_else(|| "unknown error".to_string())
                });
                vec![(result.job_id, error)]
            }
            // Results are only buffered up to a limit; fall back to the store.
            None => pending
                .keys()
                .filter_map(|id| {
                    let view = service.status(id).ok()?;
                    match view.status {
                        JobStatus::Completed => Some((id.clone(), None)),
                        JobStatus::Failed => Some((
                            id.clone(),
                            Some(view.error_reason.unwrap_or_else(|| "unknown error".to_string())),
                        )),
                        _ => None,
                    }
                })
                .collect(),
        };

        for (job_id, error) in finished {
            let Some(name) = pending.remove(&job_id) else {
                continue;
            };
            let delivered = match error {
                Some(reason) => {
                    eprintln!("{}  failed  {}: {}", job_id, name, reason);
                    false
                }
                None => deliver(&service, &job_id, &name, output_dir),
            };
            if !delivered {
                failed += 1;
            }
        }
    }

    let abandoned = service.shutdown();
    if !abandoned.is_empty() {
        warn!(count = abandoned.len(), "Queued jobs were not started");
    }
    info!(failed, rejected, "Done");

    let unfinished = pending.len();
    if failed + rejected + unfinished > 0 {
        bail!(
            "{} failed, {} rejected, {} unfinished",
            failed,
            rejected,
            unfinished
        );
    }
    Ok(())
}

/// Saves or prints the transcript of a completed job. Errors are reported
/// and return false so the remaining jobs still run.
fn deliver(
    service: &TranscriptionService,
    job_id: &JobId,
    name: &str,
    output_dir: Option<&Path>,
) -> bool {
    let file = match service.download(job_id) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("{}  failed  {}: {}", job_id, name, e);
            return false;
        }
    };
    let written = match output_dir {
        Some(dir) => write_transcript(&dir.join(&file.file_name), &file),
        None => {
            println!("==> {} <==", name);
            println!("{}", file.content);
            Ok(())
        }
    };
    match written {
        Ok(()) => true,
        Err(e) => {
            eprintln!("{}  failed  {}: {:#}", job_id, name, e);
            false
        }
    }
}

fn write_transcript(path: &Path, file: &TranscriptFile) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, &file.content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Saved {}", path.display());
    Ok(())
}
