use std::process::ExitCode;

use ontopages::batch::Batch;
use ontopages::{Pipeline, RunError};

mod config;
mod flags;
mod logging;

/// Exit code of a run in which some items failed.
const BATCH_FAILURE: u8 = 1;

/// Exit code of a run that could not proceed.
const FATAL_FAILURE: u8 = 2;

pub fn main() -> ExitCode {
    // A missing `.env` is fine: every input has another source.
    let _ = dotenvy::dotenv();
    let flags = flags::Nspub::from_env_or_exit();
    let logconf = config::logconf(&flags, config::process_env);
    logging::init(logconf.as_deref());

    let settings = match config::settings(&flags, config::process_env) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(FATAL_FAILURE);
        }
    };

    let start = std::time::Instant::now();
    let result = Pipeline::new(settings)
        .map_err(RunError::Fatal)
        .and_then(|pipeline| pipeline.run());

    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "finished");
    match result {
        Ok(batch) => {
            println!("{}", batch.summary());
            ExitCode::SUCCESS
        }
        Err(RunError::Batch(e)) => {
            println!("{}", e.batch.summary());
            eprintln!("error: {e}");
            list_failures(&e.batch);
            ExitCode::from(BATCH_FAILURE)
        }
        Err(RunError::Compose { error, batch }) => {
            println!("{}", batch.summary());
            eprintln!("error: {error}");
            list_failures(&batch);
            ExitCode::from(FATAL_FAILURE)
        }
        Err(RunError::Fatal(e)) => {
            eprintln!("error: {e}");
            ExitCode::from(FATAL_FAILURE)
        }
    }
}

/// Prints every failed publication with its message to stderr.
fn list_failures(batch: &Batch) {
    for publication in batch.failures() {
        let message = publication.outcome.failure().map_or("", |f| f.message.as_str());
        eprintln!("  {}: {message}", publication.key);
    }
}
