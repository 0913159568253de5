use std::borrow::Cow;

/// Class map of the 20-class VOC MobileNet-SSD detector (index 0 is background).
pub const VOC_LABELS: [&str; 21] = [
    "background",
    "aeroplane",
    "bicycle",
    "bird",
    "boat",
    "bottle",
    "bus",
    "car",
    "cat",
    "chair",
    "cow",
    "diningtable",
    "dog",
    "horse",
    "motorbike",
    "person",
    "pottedplant",
    "sheep",
    "sofa",
    "train",
    "tvmonitor",
];

/// Resolve a numeric class index. Unknown indices render as the number itself.
pub fn label_name(index: u32) -> Cow<'static, str> {
    match VOC_LABELS.get(index as usize) {
        Some(name) => Cow::Borrowed(*name),
        None => Cow::Owned(index.to_string()),
    }
}

/// Reverse lookup, case-insensitive.
pub fn label_index(name: &str) -> Option<u32> {
    VOC_LABELS
        .iter()
        .position(|label| label.eq_ignore_ascii_case(name))
        .map(|idx| idx as u32)
}
