use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::classes::ClassTable;
use crate::{Associator, FilteredDetection, Track};

/// Drives one associator for one video session and exposes only confirmed,
/// labelable tracks with identities that are never handed out twice.
pub struct TrackLifecycleManager<A: Associator> {
    associator: A,
    classes: ClassTable,
    max_age: u32,
    frame_index: u64,
    snapshot: Arc<[Track]>,
    // exposed at least once and still held by the associator
    exposed: HashSet<u64>,
    retired: RetiredIds,
}

/// Ids that may never be exposed again, kept as disjoint half-open ranges.
/// Associators hand out ids roughly in order, so neighbouring retirements
/// merge and the set stays as small as the number of gaps between them.
#[derive(Debug, Default)]
struct RetiredIds {
    ranges: BTreeMap<u64, u64>,
}

impl RetiredIds {
    fn contains(&self, id: u64) -> bool {
        self.ranges
            .range(..=id)
            .next_back()
            .map_or(false, |(_, &end)| id < end)
    }

    fn insert(&mut self, id: u64) {
        if self.contains(id) {
            return;
        }

        let mut start = id;
        let mut end = id.saturating_add(1);

        if let Some((&s, &e)) = self.ranges.range(..id).next_back() {
            if e == id {
                start = s;
            }
        }

        if let Some(e) = self.ranges.remove(&end) {
            end = e;
        }

        self.ranges.insert(start, end);
    }

    #[cfg(test)]
    fn spans(&self) -> usize {
        self.ranges.len()
    }
}

impl<A: Associator> TrackLifecycleManager<A> {
    pub fn new(associator: A, classes: ClassTable, max_age: u32) -> Self {
        Self {
            associator,
            classes,
            max_age,
            frame_index: 0,
            snapshot: Arc::new([]),
            exposed: HashSet::new(),
            retired: RetiredIds::default(),
        }
    }

    /// Feeds one frame worth of detections. Must be called once per frame,
    /// in frame order, including frames without detections.
    ///
    /// If the associator rejects the frame, the previous snapshot is returned
    /// unchanged and the session carries on with the next frame.
    pub fn update(&mut self, filtered: &[FilteredDetection]) -> Arc<[Track]> {
        let frame = self.frame_index;
        self.frame_index += 1;

        if let Err(err) = self.associator.update(filtered, frame) {
            log::warn!("frame {}: associator failed, keeping previous tracks: {}", frame, err);
            return self.snapshot.clone();
        }

        let tracks = self.associator.tracks();
        self.retire(&tracks);

        let confirmed: Vec<Track> = tracks
            .into_iter()
            .filter(|t| self.is_exposable(t, frame))
            .collect();

        self.exposed.extend(confirmed.iter().map(|t| t.track_id));
        self.snapshot = confirmed.into();
        self.snapshot.clone()
    }

    /// Ids reported as deleted, or exposed earlier and now gone from the
    /// associator, may never be exposed again.
    fn retire(&mut self, tracks: &[Track]) {
        let mut live = HashSet::with_capacity(tracks.len());

        for t in tracks {
            if t.is_deleted() {
                self.retired.insert(t.track_id);
            } else {
                live.insert(t.track_id);
            }
        }

        let retired = &mut self.retired;
        self.exposed.retain(|id| {
            if live.contains(id) {
                return true;
            }

            retired.insert(*id);
            false
        });
    }

    fn is_exposable(&self, track: &Track, frame: u64) -> bool {
        if !track.is_confirmed() || track.time_since_update > self.max_age {
            return false;
        }

        if !self.classes.contains(track.det_class) {
            log::debug!(
                "frame {}: track {} has unknown class {}, skipping",
                frame,
                track.track_id,
                track.det_class
            );
            return false;
        }

        if self.retired.contains(track.track_id) {
            log::warn!("frame {}: associator reused retired id {}", frame, track.track_id);
            return false;
        }

        true
    }

    #[inline]
    pub fn snapshot(&self) -> Arc<[Track]> {
        self.snapshot.clone()
    }

    /// Number of frames fed so far.
    #[inline]
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    #[inline]
    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    #[inline]
    pub fn max_age(&self) -> u32 {
        self.max_age
    }

    pub fn into_associator(self) -> A {
        self.associator
    }
}
