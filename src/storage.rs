use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use regex::Regex;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::CaptureError;
use crate::frame::Image;

pub const CAPTURE_EXTENSION: &str = "png";
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Naming scheme shared by the capture writer and the dispatcher:
/// `<prefix>_<YYYYMMDD_HHMMSS>.png`.
#[derive(Clone, Debug)]
pub struct CaptureNaming {
    prefix: String,
    pattern: Regex,
}

impl CaptureNaming {
    pub fn new(prefix: &str) -> Result<Self> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Err(anyhow!("capture file prefix must not be empty"));
        }
        if prefix.starts_with('.')
            || prefix
                .chars()
                .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
        {
            return Err(anyhow!(
                "capture file prefix '{}' must be a plain file name fragment",
                prefix
            ));
        }
        let pattern = Regex::new(&format!(
            r"^{}_(\d{{8}}_\d{{6}})\.{}$",
            regex::escape(prefix),
            CAPTURE_EXTENSION
        ))?;
        Ok(Self {
            prefix: prefix.to_string(),
            pattern,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn file_name(&self, taken_at: &DateTime<Local>) -> String {
        format!(
            "{}_{}.{}",
            self.prefix,
            taken_at.format(TIMESTAMP_FORMAT),
            CAPTURE_EXTENSION
        )
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }

    /// The `YYYYMMDD_HHMMSS` part of a matching name.
    pub fn timestamp_of<'a>(&self, name: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// A capture written to disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureFile {
    pub path: PathBuf,
    pub name: String,
}

/// Destination for selected frames.
pub trait CaptureStore {
    /// Persist `image` under the name derived from `taken_at`.
    ///
    /// Implementations must never make a partially written file visible under
    /// the final name and must never overwrite an existing capture.
    fn persist(
        &mut self,
        image: &Image,
        taken_at: DateTime<Local>,
    ) -> Result<CaptureFile, CaptureError>;
}

/// Writes PNG captures into a directory via write-to-temp + rename.
pub struct FilesystemCaptureStore {
    dir: PathBuf,
    naming: CaptureNaming,
}

impl FilesystemCaptureStore {
    /// Open (creating if needed) the capture directory.
    pub fn open(dir: &Path, naming: CaptureNaming) -> Result<Self> {
        fs::create_dir_all(dir)
            .map_err(|e| anyhow!("failed to create capture dir {}: {}", dir.display(), e))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            naming,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_temp(&self, tmp: &Path, image: &Image) -> io::Result<()> {
        let file = File::create(tmp)?;
        let mut writer = BufWriter::new(file);
        image.write_png(&mut writer).map_err(|e| match e {
            image::ImageError::IoError(err) => err,
            other => io::Error::other(other),
        })?;
        writer.flush()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()
    }
}

impl CaptureStore for FilesystemCaptureStore {
    fn persist(
        &mut self,
        image: &Image,
        taken_at: DateTime<Local>,
    ) -> Result<CaptureFile, CaptureError> {
        let name = self.naming.file_name(&taken_at);
        let path = self.dir.join(&name);
        let persist_err = |source: io::Error| CaptureError::Persist {
            name: name.clone(),
            source,
        };

        if path.exists() {
            return Err(persist_err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "capture name already used",
            )));
        }

        // Hidden temp name never matches the capture pattern.
        let tmp = self.dir.join(format!(".{}.tmp", name));
        let written = self
            .write_temp(&tmp, image)
            .and_then(|()| fs::rename(&tmp, &path));
        if let Err(err) = written {
            let _ = fs::remove_file(&tmp);
            return Err(persist_err(err));
        }
        Ok(CaptureFile { path, name })
    }
}

/// Keeps captures in memory (dry runs).
#[derive(Debug)]
pub struct InMemoryCaptureStore {
    naming: CaptureNaming,
    captures: Vec<(String, Image)>,
}

impl InMemoryCaptureStore {
    pub fn new(naming: CaptureNaming) -> Self {
        Self {
            naming,
            captures: Vec::new(),
        }
    }

    pub fn captures(&self) -> &[(String, Image)] {
        &self.captures
    }
}

impl CaptureStore for InMemoryCaptureStore {
    fn persist(
        &mut self,
        image: &Image,
        taken_at: DateTime<Local>,
    ) -> Result<CaptureFile, CaptureError> {
        let name = self.naming.file_name(&taken_at);
        if self.captures.iter().any(|(existing, _)| existing == &name) {
            return Err(CaptureError::Persist {
                name,
                source: io::Error::new(io::ErrorKind::AlreadyExists, "capture name already used"),
            });
        }
        self.captures.push((name.clone(), image.clone()));
        Ok(CaptureFile {
            path: PathBuf::from(&name),
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ChannelOrder;
    use chrono::TimeZone;

    fn taken_at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 7, 19, 14, 3, 9).unwrap()
    }

    fn image() -> Image {
        Image::from_fn(4, 4, ChannelOrder::Bgr, |x, y| [(x * 60) as u8, (y * 60) as u8, 9])
    }

    #[test]
    fn naming_formats_and_matches() {
        let naming = CaptureNaming::new("bird_detected").unwrap();
        let name = naming.file_name(&taken_at());
        assert_eq!(name, "bird_detected_20250719_140309.png");
        assert!(naming.matches(&name));
        assert_eq!(naming.timestamp_of(&name), Some("20250719_140309"));

        assert!(!naming.matches(".bird_detected_20250719_140309.png.tmp"));
        assert!(!naming.matches("bird_detected_20250719_140309.jpg"));
        assert!(!naming.matches("bird_detected_2025071_140309.png"));
        assert!(!naming.matches("other_20250719_140309.png"));
    }

    #[test]
    fn naming_escapes_prefix_and_rejects_paths() {
        let naming = CaptureNaming::new("cam.1").unwrap();
        assert!(naming.matches("cam.1_20250719_140309.png"));
        assert!(!naming.matches("camx1_20250719_140309.png"));

        assert!(CaptureNaming::new("").is_err());
        assert!(CaptureNaming::new("../up").is_err());
        assert!(CaptureNaming::new(".hidden").is_err());
    }

    #[test]
    fn filesystem_store_writes_png_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let naming = CaptureNaming::new("bird_detected").unwrap();
        let mut store = FilesystemCaptureStore::open(dir.path(), naming).unwrap();

        let file = store.persist(&image(), taken_at()).unwrap();
        assert_eq!(file.name, "bird_detected_20250719_140309.png");
        assert_eq!(file.path, dir.path().join(&file.name));

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![file.name.clone()]);

        let decoded = Image::open(&file.path).unwrap();
        assert_eq!(decoded.to_luma(), image().to_luma());
    }

    #[test]
    fn filesystem_store_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let naming = CaptureNaming::new("bird_detected").unwrap();
        let mut store = FilesystemCaptureStore::open(dir.path(), naming).unwrap();
        store.persist(&image(), taken_at()).unwrap();

        let err = store.persist(&image(), taken_at()).unwrap_err();
        match err {
            CaptureError::Persist { name, source } => {
                assert_eq!(name, "bird_detected_20250719_140309.png");
                assert_eq!(source.kind(), io::ErrorKind::AlreadyExists);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn filesystem_store_creates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("captures/garden");
        let naming = CaptureNaming::new("bird_detected").unwrap();
        let store = FilesystemCaptureStore::open(&nested, naming).unwrap();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn in_memory_store_keeps_unique_names() {
        let mut store = InMemoryCaptureStore::new(CaptureNaming::new("snap").unwrap());
        store.persist(&image(), taken_at()).unwrap();
        assert!(store.persist(&image(), taken_at()).is_err());
        assert_eq!(store.captures().len(), 1);
        assert_eq!(store.captures()[0].0, "snap_20250719_140309.png");
    }
}
