//! nohup-desk - stdio bridge for the nohup session core
//!
//! The desktop shell spawns this binary, writes one JSON intent per line to
//! its stdin and reads one JSON UI event per line from its stdout. Logs go to
//! a file (or stderr with `--verbose`) so stdout stays clean.

use std::io::BufRead;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use nohup_client::{
    ActionExecutor, CoreConfig, Intent, SessionCore, SystemAutomation, UiEvent, UiSink,
};
use nohup_utils::{init_logging_with_config, Result};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    init_logging_with_config(args.log_config())?;
    tracing::info!("nohup-desk starting");
    tracing::debug!("CLI args: {:?}", args);

    match run(args).await {
        Ok(()) => {
            tracing::info!("nohup-desk exiting normally");
            Ok(())
        }
        Err(e) => {
            tracing::error!("nohup-desk error: {}", e);
            eprintln!("Error: {}", e);
            Err(e)
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.load_config()?;
    let mut core_config = CoreConfig::from_client_config(&config)?;
    core_config.session = args.session;

    let executor = ActionExecutor::new(
        config.executor_config()?,
        Arc::new(SystemAutomation::new()),
    );
    tracing::info!(
        endpoint = %core_config.endpoint,
        working_dir = %executor.config().working_dir.display(),
        "Configuration loaded"
    );

    let (ui, events) = UiSink::channel();
    let (intents_tx, intents_rx) = mpsc::unbounded_channel();

    let writer = tokio::spawn(write_events(events));

    // A blocking stdin read must not hold up runtime shutdown, so the reader
    // gets a plain thread that is left behind on exit.
    let reader_ui = ui.clone();
    std::thread::Builder::new()
        .name("nohup-stdin".into())
        .spawn(move || read_intents(intents_tx, reader_ui))?;

    SessionCore::new(core_config, executor, ui).run(intents_rx).await;

    // Give the writer a moment to flush the final events.
    if tokio::time::timeout(std::time::Duration::from_millis(500), writer)
        .await
        .is_err()
    {
        tracing::debug!("Event writer still running at exit");
    }
    Ok(())
}

/// Forward stdin lines to the core as intents
fn read_intents(intents: mpsc::UnboundedSender<Intent>, ui: UiSink) {
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to read stdin: {}", e);
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Intent>(line) {
            Ok(intent) => {
                tracing::debug!(?intent, "Intent received");
                if intents.send(intent).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!("Invalid intent: {}", e);
                ui.toast(format!("Invalid intent: {}", e));
            }
        }
    }
    tracing::info!("stdin closed");
    // Dropping the sender closes the intent channel, which stops the core.
}

/// Write UI events to stdout as JSON lines
async fn write_events(mut events: mpsc::UnboundedReceiver<UiEvent>) {
    let mut stdout = tokio::io::stdout();
    while let Some(event) = events.recv().await {
        let mut line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to encode UI event: {}", e);
                continue;
            }
        };
        line.push('\n');

        if let Err(e) = stdout.write_all(line.as_bytes()).await {
            tracing::error!("Failed to write UI event: {}", e);
            break;
        }
        if let Err(e) = stdout.flush().await {
            tracing::error!("Failed to flush stdout: {}", e);
            break;
        }
    }
}
