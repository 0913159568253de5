//! snap_dispatch - mail new captures in batches and delete them once sent.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use snapwatch::dispatch::PollOutcome;
use snapwatch::{DispatchConfig, Dispatcher, SmtpChannel, SnapwatchConfig};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Send capture files in batches over SMTP and delete them after delivery"
)]
struct Args {
    /// Directory to watch for captures.
    #[arg(long)]
    watch_dir: Option<PathBuf>,

    /// Capture file name prefix to match.
    #[arg(long)]
    prefix: Option<String>,

    /// Captures per notification.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Seconds between directory scans.
    #[arg(long)]
    poll_secs: Option<u64>,

    /// Run a single poll and exit.
    #[arg(long)]
    once: bool,
}

impl Args {
    fn apply(&self, dispatch: &mut DispatchConfig) {
        if let Some(dir) = &self.watch_dir {
            dispatch.watch_dir = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            dispatch.file_prefix = prefix.clone();
        }
        if let Some(size) = self.batch_size {
            dispatch.batch_size = size;
        }
        if let Some(secs) = self.poll_secs {
            dispatch.poll_interval = Duration::from_secs(secs);
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = SnapwatchConfig::load()?;
    args.apply(&mut cfg.dispatch);
    cfg.validate()?;

    let channel = SmtpChannel::new(&cfg.smtp)?;
    let mut dispatcher = Dispatcher::new(&cfg.dispatch, Box::new(channel))?;

    if args.once {
        match dispatcher.poll_once()? {
            PollOutcome::Waiting { pending } => {
                log::info!("{} capture(s) waiting; no batch sent", pending)
            }
            PollOutcome::Delivered { names, undeleted } => {
                log::info!("sent {} capture(s)", names.len());
                if !undeleted.is_empty() {
                    log::warn!("could not delete: {}", undeleted.join(", "));
                }
            }
            PollOutcome::Failed { error, .. } => {
                return Err(anyhow::Error::new(error).context("batch not sent"));
            }
        }
        return Ok(());
    }

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Relaxed);
    })
    .context("error setting Ctrl-C handler")?;

    dispatcher.run_until(&stop);
    Ok(())
}
