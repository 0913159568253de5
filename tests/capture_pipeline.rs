use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use chrono::{Local, TimeZone};

use snapwatch::capture::{CaptureOutcome, CapturePipeline, Clock, ManualClock};
use snapwatch::config::CaptureConfig;
use snapwatch::detect::{BoundingBox, TrackedObject, TrackingStatus};
use snapwatch::error::CaptureError;
use snapwatch::focus::FocusMetric;
use snapwatch::frame::{ChannelOrder, FrameCycle, FrameSample, Image};
use snapwatch::ingest::{FrameSource, SyntheticConfig, SyntheticSource};
use snapwatch::storage::{CaptureNaming, FilesystemCaptureStore, InMemoryCaptureStore};

const BIRD: u32 = 3;
const CAT: u32 = 8;

/// Plays back a fixed list of (label, shade) cycles, then reports exhaustion.
struct ScriptedSource {
    script: Vec<Option<(u32, u8)>>,
    pulled: usize,
}

impl ScriptedSource {
    fn new(script: Vec<Option<(u32, u8)>>) -> Self {
        Self { script, pulled: 0 }
    }
}

impl FrameSource for ScriptedSource {
    fn describe(&self) -> String {
        "scripted".to_string()
    }

    fn next_cycle(&mut self) -> Result<FrameCycle, CaptureError> {
        let step = *self
            .script
            .get(self.pulled)
            .ok_or(CaptureError::SourceExhausted)?;
        self.pulled += 1;
        let shade = step.map(|(_, shade)| shade).unwrap_or(0);
        let image = Image::from_fn(8, 6, ChannelOrder::Bgr, |_, _| [shade; 3]);
        let objects = step
            .map(|(label, _)| {
                vec![TrackedObject {
                    id: 7,
                    label,
                    bbox: BoundingBox {
                        x_min: 0.25,
                        y_min: 0.25,
                        x_max: 0.75,
                        y_max: 0.75,
                    },
                    status: TrackingStatus::Tracked,
                }]
            })
            .unwrap_or_default();
        Ok(FrameCycle {
            sample: FrameSample {
                preview: image.clone(),
                full: image,
                captured_at: Instant::now(),
            },
            objects,
        })
    }

    fn frames_delivered(&self) -> u64 {
        self.pulled as u64
    }
}

/// Scores a frame by its shade so tests can dictate exact values.
struct ShadeMetric;

impl FocusMetric for ShadeMetric {
    fn name(&self) -> &'static str {
        "shade"
    }

    fn score(&self, image: &Image) -> f64 {
        image.pixel(0, 0)[0] as f64 * 100.0
    }
}

fn bird(shade: u8) -> Option<(u32, u8)> {
    Some((BIRD, shade))
}

fn start_clock() -> ManualClock {
    ManualClock::new(Local.with_ymd_and_hms(2025, 7, 19, 14, 3, 9).unwrap())
}

fn config(dir: &Path) -> CaptureConfig {
    CaptureConfig {
        output_dir: dir.to_path_buf(),
        ..CaptureConfig::default()
    }
}

fn pipeline(dir: &Path, script: Vec<Option<(u32, u8)>>, clock: &ManualClock) -> CapturePipeline {
    let cfg = config(dir);
    let naming = CaptureNaming::new(&cfg.file_prefix).unwrap();
    let store = FilesystemCaptureStore::open(dir, naming).unwrap();
    CapturePipeline::new(&cfg, Box::new(ScriptedSource::new(script)), Box::new(store))
        .with_clock(clock.clone())
        .with_metric(ShadeMetric)
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn sharpest_of_five_is_saved_and_debounce_resets() {
    let dir = tempfile::tempdir().unwrap();
    let clock = start_clock();
    let script = vec![
        bird(1),
        bird(15),
        bird(25),
        bird(30),
        bird(18),
        bird(20),
        bird(40),
        bird(40),
    ];
    let mut pipeline = pipeline(dir.path(), script, &clock);

    match pipeline.run_cycle().unwrap() {
        CaptureOutcome::Saved {
            file,
            score,
            candidates,
            attempts,
        } => {
            assert_eq!(score.value, 3000.0);
            assert_eq!(candidates, 5);
            assert_eq!(attempts, 5);
            // Five 200 ms pauses elapse before the file is named.
            assert_eq!(file.name, "bird_detected_20250719_140310.png");
            let saved = Image::open(&file.path).unwrap();
            assert_eq!(saved.pixel(0, 0), [30, 30, 30]);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(files_in(dir.path()), vec!["bird_detected_20250719_140310.png"]);
    // Recorded at save time, right after the burst.
    assert_eq!(pipeline.gate().last_capture(), Some(clock.now()));

    // Still present, but inside the debounce window.
    assert!(matches!(
        pipeline.run_cycle().unwrap(),
        CaptureOutcome::CoolingDown
    ));
    assert_eq!(pipeline.stats().saved, 1);
    assert_eq!(pipeline.stats().bursts, 1);
}

#[test]
fn blurry_burst_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let clock = start_clock();
    // Target leaves after two burst frames; best is 800, below 2000.
    let mut script = vec![bird(1), bird(5), bird(8)];
    script.extend(std::iter::repeat(None).take(8));
    let mut pipeline = pipeline(dir.path(), script, &clock);

    match pipeline.run_cycle().unwrap() {
        CaptureOutcome::SkippedNotSharp { best, candidates } => {
            assert_eq!(best.value, 800.0);
            assert_eq!(best.threshold, 2000.0);
            assert_eq!(candidates, 2);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(files_in(dir.path()).is_empty());
    assert_eq!(pipeline.gate().last_capture(), None);
    assert_eq!(pipeline.stats().skipped_not_sharp, 1);
}

#[test]
fn score_equal_to_threshold_is_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let clock = start_clock();
    let mut script = vec![bird(1)];
    script.extend(std::iter::repeat(bird(20)).take(5));
    let mut pipeline = pipeline(dir.path(), script, &clock);

    assert!(matches!(
        pipeline.run_cycle().unwrap(),
        CaptureOutcome::SkippedNotSharp { .. }
    ));
    assert!(files_in(dir.path()).is_empty());
}

#[test]
fn burst_without_target_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let clock = start_clock();
    let mut script = vec![bird(1)];
    // A cat in frame does not count as the target.
    script.extend(std::iter::repeat(Some((CAT, 90))).take(4));
    script.extend(std::iter::repeat(None).take(6));
    let mut pipeline = pipeline(dir.path(), script, &clock);

    match pipeline.run_cycle().unwrap() {
        CaptureOutcome::SkippedNoValidFrames { attempts } => assert_eq!(attempts, 10),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(clock.slept(), Duration::from_secs(2));
    assert!(files_in(dir.path()).is_empty());
    assert_eq!(pipeline.gate().last_capture(), None);
}

#[test]
fn idle_when_target_absent() {
    let dir = tempfile::tempdir().unwrap();
    let clock = start_clock();
    let mut pipeline = pipeline(dir.path(), vec![None, Some((CAT, 90))], &clock);
    assert!(matches!(pipeline.run_cycle().unwrap(), CaptureOutcome::Idle));
    assert!(matches!(pipeline.run_cycle().unwrap(), CaptureOutcome::Idle));
    assert_eq!(pipeline.stats().bursts, 0);
}

#[test]
fn debounce_requires_strictly_more_than_interval() {
    let dir = tempfile::tempdir().unwrap();
    let clock = start_clock();
    let mut script = vec![bird(1)];
    script.extend(std::iter::repeat(bird(30)).take(5));
    script.push(bird(1));
    script.push(bird(1));
    script.extend(std::iter::repeat(bird(35)).take(5));
    let mut pipeline = pipeline(dir.path(), script, &clock);

    assert!(matches!(
        pipeline.run_cycle().unwrap(),
        CaptureOutcome::Saved { .. }
    ));

    clock.advance(Duration::from_secs(10));
    assert!(matches!(
        pipeline.run_cycle().unwrap(),
        CaptureOutcome::CoolingDown
    ));

    clock.advance(Duration::from_millis(1));
    match pipeline.run_cycle().unwrap() {
        CaptureOutcome::Saved { score, .. } => assert_eq!(score.value, 3500.0),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(files_in(dir.path()).len(), 2);
}

#[test]
fn persist_failure_leaves_debounce_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let clock = start_clock();
    // Occupy the name the first save will use.
    fs::write(dir.path().join("bird_detected_20250719_140310.png"), b"taken").unwrap();

    let mut script = vec![bird(1)];
    script.extend(std::iter::repeat(bird(30)).take(5));
    script.push(bird(1));
    script.extend(std::iter::repeat(bird(30)).take(5));
    let mut pipeline = pipeline(dir.path(), script, &clock);

    match pipeline.run_cycle().unwrap() {
        CaptureOutcome::PersistFailed { score, error } => {
            assert_eq!(score.value, 3000.0);
            assert!(matches!(error, CaptureError::Persist { .. }));
            assert!(!error.is_fatal());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(pipeline.gate().last_capture(), None);
    assert_eq!(
        fs::read(dir.path().join("bird_detected_20250719_140310.png")).unwrap(),
        b"taken"
    );

    // The very next detection opens a fresh event.
    assert!(matches!(
        pipeline.run_cycle().unwrap(),
        CaptureOutcome::Saved { .. }
    ));
    assert_eq!(pipeline.stats().persist_failures, 1);
}

#[test]
fn run_until_stops_on_source_exhaustion() {
    let dir = tempfile::tempdir().unwrap();
    let clock = start_clock();
    let mut pipeline = pipeline(dir.path(), vec![None, None, None], &clock);
    let stop = AtomicBool::new(false);
    let err = pipeline.run_until(&stop).unwrap_err();
    assert!(matches!(err, CaptureError::SourceExhausted));
    assert_eq!(pipeline.stats().cycles, 3);
}

#[test]
fn run_until_honours_stop_flag() {
    let dir = tempfile::tempdir().unwrap();
    let clock = start_clock();
    let mut pipeline = pipeline(dir.path(), vec![None], &clock);
    let stop = AtomicBool::new(true);
    pipeline.run_until(&stop).unwrap();
    assert_eq!(pipeline.stats().cycles, 0);
}

#[test]
fn synthetic_visit_yields_a_capture() {
    let cfg = CaptureConfig::default();
    let source = SyntheticSource::new(SyntheticConfig {
        width: 160,
        height: 90,
        preview_size: 60,
        visit_period: 40,
        visit_length: 20,
        frame_interval: Duration::ZERO,
        ..SyntheticConfig::default()
    });
    let store = InMemoryCaptureStore::new(CaptureNaming::new(&cfg.file_prefix).unwrap());
    let mut pipeline = CapturePipeline::new(&cfg, Box::new(source), Box::new(store))
        .with_clock(start_clock());

    let mut saved = 0;
    for _ in 0..30 {
        if let CaptureOutcome::Saved { score, .. } = pipeline.run_cycle().unwrap() {
            assert!(score.passes());
            saved += 1;
        }
    }
    // One sharp visit, one save; the rest of the visit is debounced.
    assert_eq!(saved, 1);
}
