use std::collections::BTreeSet;

use crate::classes::ClassTable;
use crate::detection::{FilteredDetection, RawDetection};

/// Reduces raw detector output to what the associator should see.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionFilter {
    pub allowed_class_ids: BTreeSet<i32>,
    pub confidence_threshold: f32,
    /// Subtracted from detector class ids to get tracker-facing ids
    /// (detector `{2, 3}` -> tracker `{0, 1}` with an offset of 2).
    pub class_id_offset: i32,
}

impl DetectionFilter {
    pub fn new<I: IntoIterator<Item = i32>>(
        allowed_class_ids: I,
        confidence_threshold: f32,
        class_id_offset: i32,
    ) -> Self {
        Self {
            allowed_class_ids: allowed_class_ids.into_iter().collect(),
            confidence_threshold,
            class_id_offset,
        }
    }

    /// Narrows the allow-list to the classes selected by name. Names are
    /// tracker-facing, so they are shifted back into detector space. An empty
    /// selection keeps the current allow-list.
    pub fn with_selected_names<S: AsRef<str>>(mut self, classes: &ClassTable, names: &[S]) -> Self {
        if names.is_empty() {
            return self;
        }

        let selected: BTreeSet<i32> = names
            .iter()
            .filter_map(|name| classes.id_of(name.as_ref()))
            .map(|id| id + self.class_id_offset)
            .collect();

        self.allowed_class_ids = self
            .allowed_class_ids
            .intersection(&selected)
            .copied()
            .collect();

        self
    }

    #[inline]
    pub fn accepts(&self, det: &RawDetection) -> bool {
        det.confidence >= self.confidence_threshold
            && self.allowed_class_ids.contains(&det.class_id)
            && !det.is_malformed()
    }

    pub fn filter(&self, detections: &[RawDetection]) -> Vec<FilteredDetection> {
        detections
            .iter()
            .filter(|det| {
                let keep = self.accepts(det);
                if !keep {
                    log::trace!("dropping detection {:?}", det);
                }
                keep
            })
            .map(|det| FilteredDetection {
                box_ltwh: det.box_xyxy.as_ltwh(),
                confidence: det.confidence,
                class_id: det.class_id - self.class_id_offset,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;

    fn det(conf: f32, class_id: i32, ltrb: [f32; 4]) -> RawDetection {
        RawDetection::new(BBox::assigned(&ltrb), conf, class_id)
    }

    fn vehicle_person() -> DetectionFilter {
        DetectionFilter::new([2, 3], 0.5, 2)
    }

    #[test]
    fn remaps_class_and_converts_box() {
        let out = vehicle_person().filter(&[det(0.8, 3, [10.0, 20.0, 50.0, 60.0])]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_id, 1);
        assert_eq!(out[0].confidence, 0.8);
        assert_eq!(out[0].box_ltwh.as_slice(), &[10.0, 20.0, 40.0, 40.0]);
    }

    #[test]
    fn threshold_is_inclusive() {
        let out = vehicle_person().filter(&[
            det(0.5, 2, [0.0, 0.0, 1.0, 1.0]),
            det(0.49, 2, [0.0, 0.0, 1.0, 1.0]),
        ]);

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.5);
    }

    #[test]
    fn drops_disallowed_and_malformed_keeping_order() {
        let input = [
            det(0.9, 2, [0.0, 0.0, 10.0, 10.0]),
            det(0.9, 0, [0.0, 0.0, 10.0, 10.0]),
            det(0.9, 3, [10.0, 0.0, 5.0, 10.0]),
            det(0.9, 3, [0.0, 10.0, 10.0, 5.0]),
            det(0.7, 3, [1.0, 2.0, 3.0, 4.0]),
            det(0.6, 2, [5.0, 6.0, 7.0, 8.0]),
        ];

        let out = vehicle_person().filter(&input);
        let kept: Vec<_> = out.iter().map(|d| (d.class_id, d.confidence)).collect();

        assert_eq!(kept, vec![(0, 0.9), (1, 0.7), (0, 0.6)]);
    }

    #[test]
    fn never_emits_below_threshold_or_outside_allowed() {
        let filter = DetectionFilter::new([1, 4, 7], 0.35, 1);
        let input: Vec<_> = (0..200)
            .map(|i| {
                let x = (i % 13) as f32;
                det((i % 10) as f32 / 10.0, i % 9, [x, x, x + 4.0, x + 2.0])
            })
            .collect();

        let out = filter.filter(&input);
        assert!(!out.is_empty());

        for d in &out {
            assert!(d.confidence >= 0.35);
            assert!([0, 3, 6].contains(&d.class_id));
        }
    }

    #[test]
    fn junk_confidence_is_dropped_alone() {
        let out = vehicle_person().filter(&[
            det(0.9, 2, [0.0, 0.0, 10.0, 10.0]),
            det(f32::INFINITY, 3, [20.0, 20.0, 40.0, 40.0]),
            det(f32::NAN, 3, [20.0, 20.0, 40.0, 40.0]),
            det(1.2, 2, [20.0, 20.0, 40.0, 40.0]),
            det(0.6, 3, [50.0, 50.0, 60.0, 60.0]),
        ]);

        let kept: Vec<_> = out.iter().map(|d| (d.class_id, d.confidence)).collect();
        assert_eq!(kept, vec![(0, 0.9), (1, 0.6)]);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        assert!(vehicle_person().filter(&[]).is_empty());
    }

    #[test]
    fn selected_names_narrow_allow_list() {
        let classes = ClassTable::new(["person", "vehicle"]);

        let filter = vehicle_person().with_selected_names(&classes, &["VEHICLE"]);
        assert_eq!(filter.allowed_class_ids.iter().copied().collect::<Vec<_>>(), vec![3]);

        let unchanged = vehicle_person().with_selected_names::<&str>(&classes, &[]);
        assert_eq!(unchanged, vehicle_person());

        let unknown = vehicle_person().with_selected_names(&classes, &["bicycle"]);
        assert!(unknown.allowed_class_ids.is_empty());
    }
}
