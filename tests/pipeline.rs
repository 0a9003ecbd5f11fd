use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use vtrack::bbox::BBox;
use vtrack::{
    compute_resize_plan, ClassTable, DetectionFilter, IouAssociator, IouAssociatorConfig,
    RawDetection, Size, Track, TrackLifecycleManager,
};

fn detections_for(frame: u32) -> Vec<RawDetection> {
    let x = frame as f32;
    let mut dets = vec![
        // walking person, detector class 2
        RawDetection::new(BBox::ltrb(10.0 + x, 50.0, 40.0 + x, 130.0), 0.92, 2),
        // noise the filter has to remove
        RawDetection::new(BBox::ltrb(500.0, 500.0, 520.0, 520.0), 0.3, 2),
        RawDetection::new(BBox::ltrb(200.0, 200.0, 260.0, 240.0), 0.99, 0),
        RawDetection::new(BBox::ltrb(90.0, 90.0, 80.0, 120.0), 0.99, 3),
    ];

    // a vehicle visible on frames 0..=4 and a different one on the same
    // spot from frame 12
    if frame <= 4 || frame >= 12 {
        dets.push(RawDetection::new(
            BBox::ltrb(300.0, 300.0, 400.0, 360.0),
            0.81,
            3,
        ));
    }

    dets
}

#[test]
fn identities_survive_and_expire() {
    let filter = DetectionFilter::new([2, 3], 0.5, 2);
    let associator = IouAssociator::new(IouAssociatorConfig {
        max_age: 3,
        n_init: 2,
        iou_threshold: 0.3,
    });
    let mut manager =
        TrackLifecycleManager::new(associator, ClassTable::new(["person", "vehicle"]), 3);

    let mut history: Vec<Vec<Track>> = Vec::new();
    for frame in 0..20 {
        let filtered = filter.filter(&detections_for(frame));
        history.push(manager.update(&filtered).to_vec());
    }

    assert!(history.iter().flatten().all(Track::is_confirmed));
    assert!(history[0].is_empty());

    let mut frames_by_id: HashMap<u64, Vec<usize>> = HashMap::new();
    for (frame, tracks) in history.iter().enumerate() {
        for t in tracks {
            frames_by_id.entry(t.track_id).or_default().push(frame);
        }
    }

    let person: HashSet<u64> = history
        .iter()
        .flatten()
        .filter(|t| t.det_class == 0)
        .map(|t| t.track_id)
        .collect();
    assert_eq!(person.len(), 1, "person keeps a single identity");

    let mut vehicles: Vec<u64> = history
        .iter()
        .flatten()
        .filter(|t| t.det_class == 1)
        .map(|t| t.track_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    vehicles.sort_unstable();
    assert_eq!(vehicles.len(), 2, "returning vehicle gets a fresh identity");

    // confirmed on its second hit, kept while coasting up to max_age frames
    assert_eq!(frames_by_id[&vehicles[0]], vec![1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(frames_by_id[&vehicles[1]], (13..20).collect::<Vec<_>>());
}

#[test]
fn letterboxed_detections_map_back_before_filtering() {
    let plan = compute_resize_plan(Size::new(800, 600).unwrap(), Size::new(416, 416).unwrap());

    // detector ran on the 416x416 canvas
    let on_canvas = RawDetection::new(BBox::ltrb(52.0, 104.0, 156.0, 156.0), 0.9, 3);
    let on_frame = RawDetection {
        box_xyxy: plan.unletterbox_ltrb(&on_canvas.box_xyxy),
        ..on_canvas
    };

    let filtered = DetectionFilter::new([2, 3], 0.5, 2).filter(&[on_frame]);

    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].class_id, 1);

    let b = filtered[0].box_ltwh;
    assert!((b.left() - 100.0).abs() < 1e-3);
    assert!((b.top() - 100.0).abs() < 1e-3);
    assert!((b.width() - 200.0).abs() < 1e-3);
    assert!((b.height() - 100.0).abs() < 1e-3);
}

#[test]
fn junk_confidence_does_not_cost_the_frame() {
    let filter = DetectionFilter::new([2, 3], 0.5, 2);
    let associator = IouAssociator::new(IouAssociatorConfig {
        max_age: 5,
        n_init: 1,
        iou_threshold: 0.3,
    });
    let mut manager =
        TrackLifecycleManager::new(associator, ClassTable::new(["person", "vehicle"]), 5);

    let person = |left: f32| RawDetection::new(BBox::ltrb(left, 10.0, left + 40.0, 90.0), 0.9, 2);

    let first = manager.update(&filter.filter(&[person(10.0)]));
    assert_eq!(first.len(), 1);

    let filtered = filter.filter(&[
        person(14.0),
        RawDetection::new(BBox::ltrb(200.0, 200.0, 240.0, 260.0), f32::INFINITY, 3),
        RawDetection::new(BBox::ltrb(300.0, 200.0, 340.0, 260.0), f32::NAN, 3),
    ]);
    assert_eq!(filtered.len(), 1);

    let second = manager.update(&filtered);
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].track_id, first[0].track_id);
    assert_eq!(second[0].last_box_ltrb.left(), 14.0);
}
