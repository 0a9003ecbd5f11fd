use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb, Ltwh};

/// Detector output for one object, corners in frame pixels.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    #[serde(rename = "bbox")]
    pub box_xyxy: BBox<Ltrb>,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub class_id: i32,
}

impl RawDetection {
    pub fn new(box_xyxy: BBox<Ltrb>, confidence: f32, class_id: i32) -> Self {
        Self {
            box_xyxy,
            confidence,
            class_id,
        }
    }

    /// Inverted or non-finite corners, or a confidence outside `[0, 1]`.
    #[inline]
    pub fn is_malformed(&self) -> bool {
        let b = &self.box_xyxy;

        !b.is_finite()
            || b.right() < b.left()
            || b.bottom() < b.top()
            || !(0.0..=1.0).contains(&self.confidence)
    }
}

/// Detection handed to the associator: left-top-width-height in frame pixels,
/// class id already in the tracker-facing class space.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FilteredDetection {
    pub box_ltwh: BBox<Ltwh>,
    pub confidence: f32,
    pub class_id: i32,
}

impl FilteredDetection {
    #[inline(always)]
    pub fn ltrb(&self) -> BBox<Ltrb> {
        self.box_ltwh.as_ltrb()
    }
}
