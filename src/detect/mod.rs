//! Target-class detection over tracker output.
//!
//! Inference and tracking happen upstream. This module only decides whether
//! a cycle's object set contains the class being watched for.

mod labels;
mod tracklet;

pub use labels::{label_index, label_name, VOC_LABELS};
pub use tracklet::{BoundingBox, PixelRect, TrackedObject, TrackingStatus};

/// Matches tracked objects against a target class name.
///
/// Matching is on the resolved label name, ignoring ASCII case, regardless of
/// the object's tracking status.
#[derive(Clone, Debug)]
pub struct TargetMatcher {
    label: String,
}

impl TargetMatcher {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.trim().to_string(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn matches(&self, object: &TrackedObject) -> bool {
        object.label_name().eq_ignore_ascii_case(&self.label)
    }

    /// True if any object in the set is of the target class.
    pub fn is_present(&self, objects: &[TrackedObject]) -> bool {
        objects.iter().any(|object| self.matches(object))
    }
}
