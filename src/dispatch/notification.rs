use std::fs;
use std::path::{Path, PathBuf};

use crate::error::DispatchError;
use crate::storage::CaptureNaming;

pub const ATTACHMENT_CONTENT_TYPE: &str = "image/png";

/// Ordered group of capture names sent together, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Batch {
    dir: PathBuf,
    names: Vec<String>,
}

impl Batch {
    pub fn new(dir: &Path, names: Vec<String>) -> Self {
        Self {
            dir: dir.to_path_buf(),
            names,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: &'static str,
    pub data: Vec<u8>,
}

/// Channel-neutral message: one subject, a text body and the batch files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub attachments: Vec<Attachment>,
}

/// Read every batch member and compose the notification.
///
/// Any unreadable member fails the whole batch.
pub fn build_notification(
    batch: &Batch,
    naming: &CaptureNaming,
    subject_label: &str,
) -> Result<Notification, DispatchError> {
    let mut attachments = Vec::with_capacity(batch.len());
    for name in batch.names() {
        let data = fs::read(batch.path_of(name)).map_err(|source| DispatchError::Attachment {
            name: name.clone(),
            source,
        })?;
        attachments.push(Attachment {
            filename: name.clone(),
            content_type: ATTACHMENT_CONTENT_TYPE,
            data,
        });
    }

    let stamp = |name: &String| naming.timestamp_of(name).unwrap_or(name.as_str()).to_string();
    let subject = match batch.names() {
        [] => format!("{} detected", subject_label),
        [only] => format!("{} detected - {}", subject_label, stamp(only)),
        [first, .., last] => format!(
            "{} detected - {} captures ({} .. {})",
            subject_label,
            batch.len(),
            stamp(first),
            stamp(last)
        ),
    };

    let mut body = format!(
        "{} {} captured. Attached:\n",
        batch.len(),
        if batch.len() == 1 { "image" } else { "images" }
    );
    for name in batch.names() {
        body.push_str("  ");
        body.push_str(name);
        body.push('\n');
    }

    Ok(Notification {
        subject,
        body,
        attachments,
    })
}
