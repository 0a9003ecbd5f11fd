use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackState {
    Tentative,
    Confirmed,
    Deleted,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Track {
    pub track_id: u64,
    pub state: TrackState,
    pub last_box_ltrb: BBox<Ltrb>,

    // tracker-facing class of the last matched detection
    pub det_class: i32,
    pub det_confidence: f32,

    // in frames
    pub age: u32,
    pub time_since_update: u32,
}

impl Track {
    #[inline]
    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.state == TrackState::Deleted
    }
}
