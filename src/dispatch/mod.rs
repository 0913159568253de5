//! Batch dispatcher: watches the capture directory, groups new captures into
//! fixed-size batches and hands each batch to a delivery channel.
//!
//! A batch's files are deleted only after the channel reports success for the
//! whole batch. Fewer than `batch_size` waiting captures never form a batch.

mod notification;
mod pending;
mod smtp;
mod watcher;

use anyhow::{anyhow, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::config::DispatchConfig;
use crate::error::{DeliveryError, DispatchError};
use crate::storage::CaptureNaming;

pub use notification::{
    build_notification, Attachment, Batch, Notification, ATTACHMENT_CONTENT_TYPE,
};
pub use pending::PendingSet;
pub use smtp::SmtpChannel;
pub use watcher::{scan_capture_dir, ScanResult};

const STOP_CHECK_SLICE: Duration = Duration::from_millis(100);

/// Outbound transport for notifications.
pub trait DeliveryChannel {
    fn name(&self) -> &'static str;

    /// Deliver one notification. `Ok` means the whole batch was accepted.
    fn deliver(&mut self, note: &Notification) -> Result<(), DeliveryError>;
}

/// Result of one poll.
#[derive(Debug)]
pub enum PollOutcome {
    /// Not enough unsent captures to form a batch.
    Waiting { pending: usize },
    /// Batch delivered. `undeleted` lists members whose removal failed.
    Delivered {
        names: Vec<String>,
        undeleted: Vec<String>,
    },
    /// Batch abandoned; every file stays in place for the next poll.
    Failed {
        names: Vec<String>,
        error: DispatchError,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub polls: u64,
    pub batches_sent: u64,
    pub files_sent: u64,
    pub failures: u64,
}

pub struct Dispatcher {
    dir: PathBuf,
    naming: CaptureNaming,
    batch_size: usize,
    poll_interval: Duration,
    subject_label: String,
    channel: Box<dyn DeliveryChannel>,
    pending: PendingSet,
    stats: DispatchStats,
}

impl Dispatcher {
    /// Build a dispatcher over `config.watch_dir`, creating it if missing.
    pub fn new(config: &DispatchConfig, channel: Box<dyn DeliveryChannel>) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(anyhow!("batch size must be at least 1"));
        }
        fs::create_dir_all(&config.watch_dir).map_err(|e| {
            anyhow!(
                "failed to create watch dir {}: {}",
                config.watch_dir.display(),
                e
            )
        })?;
        Ok(Self {
            dir: config.watch_dir.clone(),
            naming: CaptureNaming::new(&config.file_prefix)?,
            batch_size: config.batch_size,
            poll_interval: config.poll_interval,
            subject_label: config.subject_label.clone(),
            channel,
            pending: PendingSet::new(),
            stats: DispatchStats::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn pending(&self) -> &PendingSet {
        &self.pending
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Scan once and send at most one batch.
    ///
    /// Only a failed directory scan is returned as an error.
    pub fn poll_once(&mut self) -> Result<PollOutcome, DispatchError> {
        self.stats.polls += 1;
        let scan = scan_capture_dir(&self.dir, &self.naming, &self.pending)?;
        self.pending.retain_present(&scan.on_disk);
        for name in &scan.candidates {
            self.pending.observe(name);
        }

        if scan.candidates.len() < self.batch_size {
            log::debug!(
                "{} capture(s) waiting, batch size {}",
                scan.candidates.len(),
                self.batch_size
            );
            return Ok(PollOutcome::Waiting {
                pending: scan.candidates.len(),
            });
        }

        let names: Vec<String> = scan
            .candidates
            .into_iter()
            .take(self.batch_size)
            .collect();
        let batch = Batch::new(&self.dir, names);

        let sent = build_notification(&batch, &self.naming, &self.subject_label)
            .and_then(|note| self.channel.deliver(&note).map_err(DispatchError::from));
        if let Err(error) = sent {
            self.stats.failures += 1;
            log::warn!(
                "batch of {} not sent via {}, will retry: {}",
                batch.len(),
                self.channel.name(),
                error
            );
            return Ok(PollOutcome::Failed {
                names: batch.names().to_vec(),
                error,
            });
        }

        let mut undeleted = Vec::new();
        for name in batch.names() {
            self.pending.mark_sent(name);
            if let Err(source) = fs::remove_file(batch.path_of(name)) {
                let err = DispatchError::Delete {
                    name: name.clone(),
                    source,
                };
                log::warn!("{}", err);
                undeleted.push(name.clone());
            }
        }
        self.stats.batches_sent += 1;
        self.stats.files_sent += batch.len() as u64;
        log::info!(
            "sent batch of {} via {} ({} .. {})",
            batch.len(),
            self.channel.name(),
            batch.names()[0],
            batch.names()[batch.len() - 1]
        );
        Ok(PollOutcome::Delivered {
            names: batch.names().to_vec(),
            undeleted,
        })
    }

    /// Poll until `stop` is set. The poll in progress always completes.
    pub fn run_until(&mut self, stop: &AtomicBool) {
        log::info!(
            "watching {} for {}_*.png (batch size {}, poll {:?}, channel {})",
            self.dir.display(),
            self.naming.prefix(),
            self.batch_size,
            self.poll_interval,
            self.channel.name()
        );
        while !stop.load(Ordering::Relaxed) {
            if let Err(err) = self.poll_once() {
                log::warn!("poll failed: {}", err);
            }
            sleep_unless_stopped(self.poll_interval, stop);
        }
        log::info!(
            "dispatcher stopped: {} batch(es), {} file(s) sent, {} failure(s)",
            self.stats.batches_sent,
            self.stats.files_sent,
            self.stats.failures
        );
    }
}

fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) {
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::Relaxed) {
        let slice = remaining.min(STOP_CHECK_SLICE);
        std::thread::sleep(slice);
        remaining -= slice;
    }
}
