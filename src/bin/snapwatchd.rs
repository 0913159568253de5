//! snapwatchd - watch a frame source and keep the sharpest frame of each visit.
//!
//! 1. Pulls frame cycles from the configured source
//! 2. Opens a capture event when the target class appears and the debounce has elapsed
//! 3. Samples a short burst, scores each frame by Laplacian variance
//! 4. Writes the best frame to the capture directory if it is sharp enough

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use snapwatch::{
    open_source, CaptureConfig, CaptureError, CaptureNaming, CapturePipeline, CaptureStore,
    FilesystemCaptureStore, InMemoryCaptureStore, SnapwatchConfig,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Capture the sharpest frame whenever the target class shows up"
)]
struct Args {
    /// Frame source: `stub://<name>` or a local replay directory.
    #[arg(long)]
    source: Option<String>,

    /// Directory captures are written to.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Capture file name prefix.
    #[arg(long)]
    prefix: Option<String>,

    /// Class name that triggers a capture.
    #[arg(long)]
    target_label: Option<String>,

    /// Minimum Laplacian variance (exclusive) for a frame to be kept.
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum seconds between two saved captures.
    #[arg(long)]
    debounce_secs: Option<f64>,

    /// Keep captures in memory instead of writing them.
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn apply(&self, capture: &mut CaptureConfig) -> Result<()> {
        if let Some(source) = &self.source {
            capture.source_url = source.clone();
        }
        if let Some(dir) = &self.output_dir {
            capture.output_dir = dir.clone();
        }
        if let Some(prefix) = &self.prefix {
            capture.file_prefix = prefix.clone();
        }
        if let Some(label) = &self.target_label {
            capture.target_label = label.clone();
        }
        if let Some(threshold) = self.threshold {
            capture.sharpness_threshold = threshold;
        }
        if let Some(secs) = self.debounce_secs {
            capture.debounce = Duration::try_from_secs_f64(secs)
                .context("--debounce-secs must be a non-negative number")?;
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = SnapwatchConfig::load()?;
    args.apply(&mut cfg.capture)?;
    cfg.validate()?;
    let capture = &cfg.capture;

    log::info!("snapwatchd starting");
    log::info!("  Source: {}", capture.source_url);
    log::info!("  Target: {}", capture.target_label);
    log::info!(
        "  Burst: {} samples / {} attempts, {:?} apart",
        capture.target_samples,
        capture.max_attempts,
        capture.sample_spacing
    );
    log::info!("  Sharpness threshold: {:.1}", capture.sharpness_threshold);
    log::info!("  Debounce: {:?}", capture.debounce);

    let naming = CaptureNaming::new(&capture.file_prefix)?;
    let store: Box<dyn CaptureStore> = if args.dry_run {
        log::warn!("dry run: captures are kept in memory and discarded on exit");
        Box::new(InMemoryCaptureStore::new(naming))
    } else {
        let store = FilesystemCaptureStore::open(&capture.output_dir, naming)?;
        log::info!("  Output: {}", store.dir().display());
        Box::new(store)
    };
    let source = open_source(&capture.source_url)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Relaxed);
    })
    .context("error setting Ctrl-C handler")?;

    let mut pipeline = CapturePipeline::new(capture, source, store);
    match pipeline.run_until(&stop) {
        Ok(()) => log::info!("shutdown signal received"),
        Err(CaptureError::SourceExhausted) => log::info!("frame source exhausted"),
        Err(err) => {
            return Err(anyhow::Error::new(err).context("capture loop stopped"));
        }
    }

    let stats = pipeline.stats();
    log::info!(
        "snapwatchd done: {} cycles, {} bursts, {} saved, {} skipped, {} persist failures",
        stats.cycles,
        stats.bursts,
        stats.saved,
        stats.skipped_no_frames + stats.skipped_not_sharp,
        stats.persist_failures
    );
    Ok(())
}
