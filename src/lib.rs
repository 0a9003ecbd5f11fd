pub mod associator;
pub mod bbox;
pub mod classes;
pub mod config;
pub mod dataset;
pub mod detection;
pub mod error;
pub mod filter;
pub mod frame;
pub mod geometry;
pub mod manager;
pub mod render;
pub mod session;

mod track;

pub use associator::{IouAssociator, IouAssociatorConfig};
pub use classes::ClassTable;
pub use config::SessionConfig;
pub use detection::{FilteredDetection, RawDetection};
pub use filter::DetectionFilter;
pub use frame::Frame;
pub use geometry::{compute_resize_plan, map_box, unmap_box, NormalizedBox, ResizePlan, Size};
pub use manager::TrackLifecycleManager;
pub use session::{Detector, Session, SessionSummary};
pub use track::{Track, TrackState};

use error::Error;

#[cfg(test)]
use mockall::automock;

/// Detection-to-track association for a single video stream.
///
/// `update` is called exactly once per frame, in frame order; the
/// implementation owns identities and aging. `tracks` returns every track the
/// associator currently holds, whatever its state.
#[cfg_attr(test, automock)]
pub trait Associator {
    fn update(&mut self, detections: &[FilteredDetection], frame: u64) -> Result<(), Error>;
    fn tracks(&self) -> Vec<Track>;
}

impl<A: Associator + ?Sized> Associator for Box<A> {
    #[inline]
    fn update(&mut self, detections: &[FilteredDetection], frame: u64) -> Result<(), Error> {
        (**self).update(detections, frame)
    }

    #[inline]
    fn tracks(&self) -> Vec<Track> {
        (**self).tracks()
    }
}
