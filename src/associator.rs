//! A small IoU based associator, enough to drive the lifecycle manager
//! without an external tracker.

use std::cmp::Ordering;

use ndarray::prelude::*;

use crate::error::Error;
use crate::{Associator, FilteredDetection, Track, TrackState};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IouAssociatorConfig {
    pub max_age: u32,
    pub n_init: u32,
    pub iou_threshold: f32,
}

impl IouAssociatorConfig {
    pub fn new(max_age: u32) -> Self {
        Self {
            max_age,
            n_init: 3,
            iou_threshold: 0.3,
        }
    }
}

#[derive(Debug)]
struct Entry {
    track: Track,
    hits: u32,
}

impl Entry {
    fn new(track_id: u64, det: &FilteredDetection, n_init: u32) -> Self {
        let state = if n_init <= 1 {
            TrackState::Confirmed
        } else {
            TrackState::Tentative
        };

        Self {
            track: Track {
                track_id,
                state,
                last_box_ltrb: det.ltrb(),
                det_class: det.class_id,
                det_confidence: det.confidence,
                age: 1,
                time_since_update: 0,
            },
            hits: 1,
        }
    }

    fn correct(&mut self, det: &FilteredDetection, n_init: u32) {
        self.hits += 1;
        self.track.time_since_update = 0;
        self.track.last_box_ltrb = det.ltrb();
        self.track.det_class = det.class_id;
        self.track.det_confidence = det.confidence;

        if self.track.state == TrackState::Tentative && self.hits >= n_init {
            self.track.state = TrackState::Confirmed;
        }
    }

    fn mark_missed(&mut self, max_age: u32) {
        match self.track.state {
            TrackState::Tentative => self.track.state = TrackState::Deleted,
            TrackState::Confirmed if self.track.time_since_update > max_age => {
                self.track.state = TrackState::Deleted
            }
            _ => (),
        }
    }
}

pub struct IouAssociator {
    config: IouAssociatorConfig,
    entries: Vec<Entry>,
    next_id: u64,
}

impl IouAssociator {
    pub fn new(config: IouAssociatorConfig) -> Self {
        Self {
            config,
            entries: Vec::with_capacity(64),
            next_id: 1,
        }
    }

    #[inline]
    pub fn config(&self) -> &IouAssociatorConfig {
        &self.config
    }

    fn validate(detections: &[FilteredDetection]) -> Result<(), Error> {
        for (index, det) in detections.iter().enumerate() {
            let reason = if !det.box_ltwh.is_finite() || !det.confidence.is_finite() {
                "non-finite value"
            } else if det.box_ltwh.width() < 0.0 || det.box_ltwh.height() < 0.0 {
                "negative extent"
            } else {
                continue;
            };

            return Err(Error::MalformedDetection { index, reason });
        }

        Ok(())
    }

    /// Greedy matching on descending IoU; pairs of different classes or below
    /// the threshold never match. Returns `(entry, detection)` pairs.
    fn assignment(&self, detections: &[FilteredDetection]) -> Vec<(usize, usize)> {
        let mut iou = Array2::<f32>::zeros((self.entries.len(), detections.len()));

        for ((t, d), v) in iou.indexed_iter_mut() {
            let track = &self.entries[t].track;
            let det = &detections[d];

            if track.det_class == det.class_id {
                *v = track.last_box_ltrb.iou(&det.ltrb());
            }
        }

        let threshold = self.config.iou_threshold;
        let mut candidates: Vec<(usize, usize, f32)> = iou
            .indexed_iter()
            .filter(|&(_, &v)| v > 0.0 && v >= threshold)
            .map(|((t, d), &v)| (t, d, v))
            .collect();

        candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));

        let mut track_used = vec![false; self.entries.len()];
        let mut det_used = vec![false; detections.len()];
        let mut assignments = Vec::new();

        for (t, d, _) in candidates {
            if track_used[t] || det_used[d] {
                continue;
            }

            track_used[t] = true;
            det_used[d] = true;
            assignments.push((t, d));
        }

        assignments
    }
}

impl Associator for IouAssociator {
    fn update(&mut self, detections: &[FilteredDetection], frame: u64) -> Result<(), Error> {
        Self::validate(detections)?;

        // deleted tracks were reported by the previous `tracks()`, drop them now
        self.entries.retain(|e| !e.track.is_deleted());

        for e in &mut self.entries {
            e.track.age += 1;
            e.track.time_since_update += 1;
        }

        let assignments = self.assignment(detections);

        let mut matched = vec![false; self.entries.len()];
        let mut det_matched = vec![false; detections.len()];

        for &(t, d) in &assignments {
            self.entries[t].correct(&detections[d], self.config.n_init);
            matched[t] = true;
            det_matched[d] = true;
        }

        for (e, _) in self.entries.iter_mut().zip(&matched).filter(|&(_, &m)| !m) {
            e.mark_missed(self.config.max_age);
        }

        for (det, _) in detections.iter().zip(&det_matched).filter(|&(_, &m)| !m) {
            let id = self.next_id;
            self.next_id += 1;
            self.entries.push(Entry::new(id, det, self.config.n_init));
        }

        log::trace!(
            "frame {}: {} detections, {} matched, {} tracks held",
            frame,
            detections.len(),
            assignments.len(),
            self.entries.len()
        );

        Ok(())
    }

    fn tracks(&self) -> Vec<Track> {
        self.entries.iter().map(|e| e.track.clone()).collect()
    }
}
