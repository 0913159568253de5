//! Local replay source.
//!
//! Replays a recorded session from a directory holding PNG frames and a
//! `frames.jsonl` manifest, one cycle per line:
//!
//! ```text
//! {"preview": "p_0001.png", "frame": "f_0001.png", "tracklets": [{"id": 1, "label": 3, "roi": {...}}]}
//! ```
//!
//! Image paths are relative to the directory. Blank lines are skipped. The end
//! of the manifest is reported as `SourceExhausted`.
//!
//! The replay source MUST NOT fetch remote URLs; only local directories are accepted.

use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::detect::TrackedObject;
use crate::error::CaptureError;
use crate::frame::{FrameCycle, FrameSample, Image};

use super::FrameSource;

pub const DEFAULT_MANIFEST: &str = "frames.jsonl";

/// Configuration for a replay source.
#[derive(Clone, Debug)]
pub struct ReplayConfig {
    /// Session directory.
    pub dir: PathBuf,
    /// Manifest file name inside `dir`.
    pub manifest: String,
    /// Delay per pull, to replay at roughly camera pace.
    pub frame_interval: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::new(),
            manifest: DEFAULT_MANIFEST.to_string(),
            frame_interval: Duration::ZERO,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    preview: PathBuf,
    frame: PathBuf,
    #[serde(default)]
    tracklets: Vec<TrackedObject>,
}

pub struct ReplaySource {
    config: ReplayConfig,
    lines: Lines<BufReader<File>>,
    line_no: u64,
    frame_count: u64,
}

impl ReplaySource {
    pub fn open(config: ReplayConfig) -> anyhow::Result<Self> {
        let dir_str = config.dir.to_string_lossy();
        if dir_str.trim().is_empty() || dir_str.contains("://") {
            return Err(anyhow!(
                "replay only supports local directories (no URL schemes)"
            ));
        }
        let manifest_path = config.dir.join(&config.manifest);
        let file = File::open(&manifest_path)
            .with_context(|| format!("open replay manifest {}", manifest_path.display()))?;
        log::info!("ReplaySource: replaying {}", manifest_path.display());
        Ok(Self {
            config,
            lines: BufReader::new(file).lines(),
            line_no: 0,
            frame_count: 0,
        })
    }

    fn load_cycle(&self, entry: ManifestEntry) -> anyhow::Result<FrameCycle> {
        let preview = Image::open(&self.config.dir.join(&entry.preview))?;
        let full = Image::open(&self.config.dir.join(&entry.frame))?;
        Ok(FrameCycle {
            sample: FrameSample {
                preview,
                full,
                captured_at: Instant::now(),
            },
            objects: entry.tracklets,
        })
    }
}

impl FrameSource for ReplaySource {
    fn describe(&self) -> String {
        format!("replay:{}", self.config.dir.display())
    }

    fn next_cycle(&mut self) -> Result<FrameCycle, CaptureError> {
        if !self.config.frame_interval.is_zero() {
            std::thread::sleep(self.config.frame_interval);
        }
        loop {
            let line = match self.lines.next() {
                None => return Err(CaptureError::SourceExhausted),
                Some(line) => line
                    .with_context(|| format!("read {}", self.config.manifest))
                    .map_err(CaptureError::Source)?,
            };
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let entry: ManifestEntry = serde_json::from_str(trimmed)
                .with_context(|| format!("{} line {}", self.config.manifest, self.line_no))
                .map_err(CaptureError::Source)?;
            let cycle = self
                .load_cycle(entry)
                .with_context(|| format!("{} line {}", self.config.manifest, self.line_no))
                .map_err(CaptureError::Source)?;
            self.frame_count += 1;
            return Ok(cycle);
        }
    }

    fn frames_delivered(&self) -> u64 {
        self.frame_count
    }
}
