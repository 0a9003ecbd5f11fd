//! Frame-sequential tracking session: detect, filter, track and render one
//! frame at a time while a reader thread keeps the next frames ready.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;

use crate::classes::ClassTable;
use crate::config::SessionConfig;
use crate::error::Error;
use crate::filter::DetectionFilter;
use crate::frame::Frame;
use crate::geometry::{compute_resize_plan, Size};
use crate::manager::TrackLifecycleManager;
use crate::render::Renderer;
use crate::{Associator, RawDetection, Track};

const QUEUE_DEPTH: usize = 2;
const STOP_POLL: Duration = Duration::from_millis(50);

pub trait Detector<T> {
    fn detect(&mut self, frame: &Frame<T>) -> Result<Vec<RawDetection>, Error>;
}

/// Frames that already carry their detections, e.g. a recorded detections file.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplayDetector {
    canvas: Option<Size>,
}

impl ReplayDetector {
    /// Detections were recorded on a letterboxed `canvas` and get mapped back
    /// onto each frame's own size.
    pub fn letterboxed(canvas: Size) -> Self {
        Self {
            canvas: Some(canvas),
        }
    }
}

impl Detector<Vec<RawDetection>> for ReplayDetector {
    fn detect(&mut self, frame: &Frame<Vec<RawDetection>>) -> Result<Vec<RawDetection>, Error> {
        let plan = match self.canvas {
            Some(canvas) => compute_resize_plan(frame.size, canvas),
            None => return Ok(frame.data.clone()),
        };

        Ok(frame
            .data
            .iter()
            .map(|det| RawDetection {
                box_xyxy: plan.unletterbox_ltrb(&det.box_xyxy),
                ..*det
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub frames: u64,
    pub stopped: bool,
    pub last_tracks: Arc<[Track]>,
}

pub struct Session<D, A: Associator, R> {
    detector: D,
    filter: DetectionFilter,
    manager: TrackLifecycleManager<A>,
    renderer: R,
}

impl<D, A: Associator, R> Session<D, A, R> {
    /// Loads the class names and wires the pipeline from `config`.
    pub fn new(config: &SessionConfig, detector: D, associator: A, renderer: R) -> Self {
        let classes = ClassTable::load(&config.class_names_path);
        let filter = config
            .detection_filter()
            .with_selected_names(&classes, &config.selected_classes);
        let manager = TrackLifecycleManager::new(associator, classes, config.max_age);

        Self::with_parts(detector, filter, manager, renderer)
    }

    pub fn with_parts(
        detector: D,
        filter: DetectionFilter,
        manager: TrackLifecycleManager<A>,
        renderer: R,
    ) -> Self {
        Self {
            detector,
            filter,
            manager,
            renderer,
        }
    }

    #[inline]
    pub fn manager(&self) -> &TrackLifecycleManager<A> {
        &self.manager
    }

    #[inline]
    pub fn filter(&self) -> &DetectionFilter {
        &self.filter
    }

    /// Runs the whole pipeline on one frame. A failing detector counts as a
    /// frame without detections so the tracker still ages its tracks.
    pub fn process_frame<T>(&mut self, frame: &mut Frame<T>) -> Arc<[Track]>
    where
        D: Detector<T>,
        R: Renderer<T>,
    {
        let raw = self.detector.detect(frame).unwrap_or_else(|err| {
            log::warn!("frame {}: detector failed: {}", frame.index, err);
            Vec::new()
        });

        let filtered = self.filter.filter(&raw);
        let tracks = self.manager.update(&filtered);
        self.renderer.render(frame, &tracks, self.manager.classes());

        tracks
    }

    /// Processes frames from `source` until it runs dry or `stop` is raised.
    ///
    /// `stop` is only honoured between frames. The reader thread (and with it
    /// the source) is released after the last frame has been processed, and
    /// the associator state is dropped together with the session.
    pub fn run<T, I>(mut self, source: I, stop: &AtomicBool) -> Result<SessionSummary, Error>
    where
        T: Send + 'static,
        I: IntoIterator<Item = Frame<T>> + Send + 'static,
        D: Detector<T>,
        R: Renderer<T>,
    {
        let (tx, rx) = crossbeam_channel::bounded::<Frame<T>>(QUEUE_DEPTH);

        let reader = thread::Builder::new()
            .name("frame-reader".into())
            .spawn(move || {
                for frame in source {
                    if tx.send(frame).is_err() {
                        break;
                    }
                }
            })?;

        log::info!("session started");

        let mut frames = 0;
        let mut stopped = false;
        let mut last_tracks = self.manager.snapshot();

        loop {
            if stop.load(Ordering::SeqCst) {
                stopped = true;
                break;
            }

            let mut frame = match rx.recv_timeout(STOP_POLL) {
                Ok(frame) => frame,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            last_tracks = self.process_frame(&mut frame);
            frames += 1;
        }

        drop(rx);
        if reader.join().is_err() {
            log::error!("frame reader panicked");
        }

        log::info!("session finished after {} frames (stopped: {})", frames, stopped);

        Ok(SessionSummary {
            frames,
            stopped,
            last_tracks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::{IouAssociator, IouAssociatorConfig};

    struct Recorder {
        seen: Vec<Vec<u64>>,
        stop_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl<T> Renderer<T> for Recorder {
        fn render(&mut self, _frame: &mut Frame<T>, tracks: &[Track], _classes: &ClassTable) {
            self.seen.push(tracks.iter().map(|t| t.track_id).collect());

            if let Some((n, stop)) = &self.stop_after {
                if self.seen.len() >= *n {
                    stop.store(true, Ordering::SeqCst);
                }
            }
        }
    }

    struct FailingDetector;

    impl Detector<Vec<RawDetection>> for FailingDetector {
        fn detect(&mut self, _frame: &Frame<Vec<RawDetection>>) -> Result<Vec<RawDetection>, Error> {
            Err(Error::Detector("model not loaded".into()))
        }
    }

    fn recorded(n: u64) -> Vec<Frame<Vec<RawDetection>>> {
        let size = Size::new(640, 480).unwrap();

        (0..n)
            .map(|i| {
                let x = i as f32 * 2.0;
                let dets = vec![
                    RawDetection::new(BBox::ltrb(x, 100.0, x + 40.0, 180.0), 0.9, 3),
                    RawDetection::new(BBox::ltrb(300.0, 50.0, 320.0, 90.0), 0.2, 2),
                ];
                Frame::new(i, size, dets)
            })
            .collect()
    }

    fn session<D>(
        detector: D,
        renderer: Recorder,
    ) -> Session<D, IouAssociator, Recorder> {
        let manager = TrackLifecycleManager::new(
            IouAssociator::new(IouAssociatorConfig::new(30)),
            ClassTable::new(["person", "vehicle"]),
            30,
        );

        Session::with_parts(detector, DetectionFilter::new([2, 3], 0.5, 2), manager, renderer)
    }

    fn recorder() -> Recorder {
        Recorder {
            seen: Vec::new(),
            stop_after: None,
        }
    }

    #[test]
    fn track_appears_once_confirmed() {
        let mut s = session(ReplayDetector::default(), recorder());

        let out: Vec<usize> = recorded(5)
            .into_iter()
            .map(|mut frame| s.process_frame(&mut frame).len())
            .collect();

        assert_eq!(out, vec![0, 0, 1, 1, 1]);
        assert_eq!(s.renderer.seen.last(), Some(&vec![1]));
    }

    #[test]
    fn runs_source_to_the_end() {
        let stop = AtomicBool::new(false);
        let summary = session(ReplayDetector::default(), recorder())
            .run(recorded(10), &stop)
            .unwrap();

        assert_eq!(summary.frames, 10);
        assert!(!summary.stopped);
        assert_eq!(summary.last_tracks.len(), 1);
        assert_eq!(summary.last_tracks[0].det_class, 1);
    }

    #[test]
    fn stop_takes_effect_between_frames() {
        let stop = Arc::new(AtomicBool::new(false));
        let renderer = Recorder {
            seen: Vec::new(),
            stop_after: Some((4, stop.clone())),
        };

        let summary = session(ReplayDetector::default(), renderer)
            .run(recorded(100), &stop)
            .unwrap();

        assert!(summary.stopped);
        assert_eq!(summary.frames, 4);
    }

    #[test]
    fn stopped_before_start_processes_nothing() {
        let stop = AtomicBool::new(true);
        let summary = session(ReplayDetector::default(), recorder())
            .run(recorded(3), &stop)
            .unwrap();

        assert!(summary.stopped);
        assert_eq!(summary.frames, 0);
        assert!(summary.last_tracks.is_empty());
    }

    #[test]
    fn letterboxed_replay_maps_onto_the_frame() {
        let on_canvas = RawDetection::new(BBox::ltrb(52.0, 104.0, 156.0, 156.0), 0.9, 3);
        let frame = Frame::new(0, Size::new(800, 600).unwrap(), vec![on_canvas]);

        let mut detector = ReplayDetector::letterboxed(Size::new(416, 416).unwrap());
        let out = detector.detect(&frame).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_id, 3);
        assert_eq!(out[0].confidence, 0.9);

        let b = out[0].box_xyxy;
        assert!((b.left() - 100.0).abs() < 1e-3);
        assert!((b.top() - 100.0).abs() < 1e-3);
        assert!((b.right() - 300.0).abs() < 1e-3);
        assert!((b.bottom() - 200.0).abs() < 1e-3);

        let plain = ReplayDetector::default().detect(&frame).unwrap();
        assert_eq!(plain, vec![on_canvas]);
    }

    #[test]
    fn detector_failure_still_advances_tracker() {
        let mut s = session(FailingDetector, recorder());

        for mut frame in recorded(3) {
            assert!(s.process_frame(&mut frame).is_empty());
        }

        assert_eq!(s.manager().frame_index(), 3);
        assert_eq!(s.renderer.seen.len(), 3);
    }
}
