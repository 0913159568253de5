//! Frame cycle sources.
//!
//! A source hands out one `FrameCycle` per blocking pull: a preview image, a
//! full-resolution image and the tracker's object set for that instant. The
//! sequence is effectively infinite for live sources and is not restartable.
//!
//! - Synthetic source (`stub://...`): generated scene, for demos and tests
//! - Replay source (local directory): a recorded session with a `frames.jsonl` manifest
//!
//! Live camera/inference pipelines plug in by implementing `FrameSource`.

pub mod replay;
pub mod synthetic;

use anyhow::{anyhow, Result};

use crate::error::CaptureError;
use crate::frame::FrameCycle;

pub use replay::{ReplayConfig, ReplaySource};
pub use synthetic::{SyntheticConfig, SyntheticSource};

/// Blocking pull-based producer of frame cycles.
pub trait FrameSource {
    /// Human-readable origin for logs.
    fn describe(&self) -> String;

    /// Pull the next cycle, blocking until one is available.
    ///
    /// `CaptureError::SourceExhausted` means no further cycles will ever arrive.
    fn next_cycle(&mut self) -> Result<FrameCycle, CaptureError>;

    /// Cycles handed out so far.
    fn frames_delivered(&self) -> u64;
}

/// Open a source from a URL-ish string.
///
/// `stub://<name>` selects the synthetic source. Anything without a scheme is a
/// local replay directory. Other schemes are rejected.
pub fn open_source(url: &str) -> Result<Box<dyn FrameSource>> {
    let url = url.trim();
    if url.is_empty() {
        return Err(anyhow!("frame source url must not be empty"));
    }
    if let Some(name) = url.strip_prefix("stub://") {
        return Ok(Box::new(SyntheticSource::new(SyntheticConfig {
            name: name.to_string(),
            ..SyntheticConfig::default()
        })));
    }
    if url.contains("://") {
        return Err(anyhow!(
            "unsupported frame source '{}'; expected stub://<name> or a local replay directory",
            url
        ));
    }
    let source = ReplaySource::open(ReplayConfig {
        dir: url.into(),
        ..ReplayConfig::default()
    })?;
    Ok(Box::new(source))
}
