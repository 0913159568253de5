//! snapwatch
//!
//! Detection-triggered best-frame capture and batched mail delivery.
//!
//! # Architecture
//!
//! Two independent loops share nothing but a directory:
//!
//! 1. **Capture** (`snapwatchd`): pulls frame cycles from a source, waits for
//!    the target class, samples a short burst, keeps the sharpest frame if it
//!    clears the focus threshold and writes it as `<prefix>_<YYYYMMDD_HHMMSS>.png`.
//! 2. **Dispatch** (`snap_dispatch`): polls that directory, groups new captures
//!    into fixed-size batches, sends each batch as one notification and deletes
//!    the files once delivery succeeds.
//!
//! # Module Structure
//!
//! - `frame`: pixel buffers and per-cycle samples
//! - `detect`: tracked objects, label map, target matching
//! - `ingest`: frame sources (synthetic `stub://`, local replay)
//! - `focus`: Laplacian-variance sharpness and best-frame selection
//! - `capture`: debounce gate, burst sampler, capture pipeline
//! - `storage`: capture naming and atomic persistence
//! - `dispatch`: directory watcher, batching, delivery channels
//! - `config`: layered configuration for both binaries

pub mod capture;
pub mod config;
pub mod detect;
pub mod dispatch;
pub mod error;
pub mod focus;
pub mod frame;
pub mod ingest;
pub mod storage;

pub use capture::{
    CaptureOutcome, CapturePipeline, CaptureStats, Clock, DebounceGate, ManualClock, SystemClock,
};
pub use config::{CaptureConfig, DispatchConfig, SmtpConfig, SmtpTls, SnapwatchConfig};
pub use detect::{TargetMatcher, TrackedObject};
pub use dispatch::{DeliveryChannel, Dispatcher, Notification, PollOutcome, SmtpChannel};
pub use error::{CaptureError, DeliveryError, DispatchError};
pub use focus::{FocusMetric, LaplacianVariance, SharpnessScore};
pub use frame::{ChannelOrder, FrameCycle, FrameSample, Image};
pub use ingest::{open_source, FrameSource, ReplaySource, SyntheticSource};
pub use storage::{CaptureNaming, CaptureStore, FilesystemCaptureStore, InMemoryCaptureStore};
