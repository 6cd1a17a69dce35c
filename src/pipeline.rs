//! Acquire -> infer -> annotate loop and the worker thread that runs it.
//!
//! The worker owns the camera for its whole life: it opens and starts it, polls
//! it, and releases it before signalling exit. Finished frames go to the UI
//! through a `FrameSlot`. The UI stops the worker with `WorkerHandle::shutdown`,
//! which waits a bounded time and then detaches a worker stuck inside a poll.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::annotate::{Annotation, Annotator};
use crate::camera::FrameSource;
use crate::detect::DetectorBackend;
use crate::frame::FramePair;
use crate::slot::FrameSlot;
use crate::stream::StreamController;

pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(10);
pub const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Runs inference and annotation for one frame pair.
pub struct FrameProcessor {
    detector: Box<dyn DetectorBackend>,
    annotator: Annotator,
}

impl FrameProcessor {
    pub fn new(detector: Box<dyn DetectorBackend>, annotator: Annotator) -> Self {
        Self {
            detector,
            annotator,
        }
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn warm_up(&mut self) -> Result<()> {
        self.detector.warm_up().context("detector warm-up failed")
    }

    pub fn process(&mut self, pair: &FramePair) -> Result<Annotation> {
        let detections = self
            .detector
            .detect(&pair.color)
            .with_context(|| format!("detection failed on frame {}", pair.sequence))?;
        Ok(self
            .annotator
            .annotate(&pair.color, pair.depth.as_ref(), &detections))
    }
}

/// One loop iteration. `Ok(None)` when the camera had no frame in time.
pub fn run_iteration(
    source: &mut dyn FrameSource,
    processor: &mut FrameProcessor,
) -> Result<Option<Annotation>> {
    let Some(pair) = source.poll().context("frame acquisition failed")? else {
        return Ok(None);
    };
    processor.process(&pair).map(Some)
}

// ----------------------------------------------------------------------------
// Worker thread
// ----------------------------------------------------------------------------

/// Opens the camera on the worker thread. The camera is returned unstarted.
pub type SourceOpener = Box<dyn FnOnce() -> Result<Box<dyn FrameSource>> + Send>;

#[derive(Clone, Debug)]
pub struct WorkerOptions {
    /// Longest `spawn` waits for the camera to start.
    pub startup_timeout: Duration,
    pub health_log_interval: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
            health_log_interval: HEALTH_LOG_INTERVAL,
        }
    }
}

/// Snapshot of worker progress, shared with the UI.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkerStatus {
    pub frames_rendered: u64,
    pub skipped_polls: u64,
    /// Error that ended the loop, if any.
    pub last_error: Option<String>,
    pub camera_released: bool,
    pub exited: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Worker exited and released the camera within the timeout.
    Joined(WorkerStatus),
    /// Worker was still busy when the timeout expired and has been detached.
    TimedOut,
}

pub struct DetectionWorker;

impl DetectionWorker {
    /// Start the worker and wait until its camera is streaming.
    ///
    /// Fails if the camera cannot be opened or started; the worker thread has
    /// exited by the time the error is returned.
    pub fn spawn(
        open_source: SourceOpener,
        processor: FrameProcessor,
        slot: FrameSlot<RgbImage>,
        options: WorkerOptions,
    ) -> Result<WorkerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let status = Arc::new(Mutex::new(WorkerStatus::default()));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let ctx = WorkerContext {
            processor,
            slot,
            stop: stop.clone(),
            status: status.clone(),
            health_log_interval: options.health_log_interval,
        };
        let join = std::thread::Builder::new()
            .name("detect-worker".to_string())
            .spawn(move || {
                worker_main(open_source, ctx, ready_tx);
                let _ = done_tx.send(());
            })
            .context("failed to spawn detection worker")?;

        match ready_rx.recv_timeout(options.startup_timeout) {
            Ok(Ok(())) => Ok(WorkerHandle {
                stop,
                status,
                done: done_rx,
                join: Some(join),
            }),
            Ok(Err(err)) => {
                let _ = join.join();
                Err(err)
            }
            Err(_) => {
                stop.store(true, Ordering::SeqCst);
                Err(anyhow!(
                    "camera did not start within {:?}",
                    options.startup_timeout
                ))
            }
        }
    }
}

struct WorkerContext {
    processor: FrameProcessor,
    slot: FrameSlot<RgbImage>,
    stop: Arc<AtomicBool>,
    status: Arc<Mutex<WorkerStatus>>,
    health_log_interval: Duration,
}

impl WorkerContext {
    fn update(&self, f: impl FnOnce(&mut WorkerStatus)) {
        let mut guard = self
            .status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard);
    }
}

fn worker_main(open_source: SourceOpener, mut ctx: WorkerContext, ready: mpsc::Sender<Result<()>>) {
    let opened = open_source().and_then(|mut source| {
        source.start().context("camera failed to start")?;
        Ok(source)
    });
    let mut source = match opened {
        Ok(source) => source,
        Err(err) => {
            ctx.update(|s| {
                s.last_error = Some(format!("{:#}", err));
                s.exited = true;
            });
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(()));
    log::info!(
        "detection worker running: camera={} detector={}",
        source.name(),
        ctx.processor.detector_name()
    );

    if let Err(err) = frame_loop(source.as_mut(), &mut ctx) {
        log::error!("error in frame loop: {:#}", err);
        ctx.update(|s| s.last_error = Some(format!("{:#}", err)));
    }

    match source.stop() {
        Ok(()) => ctx.update(|s| s.camera_released = true),
        Err(err) => log::warn!("camera stop failed: {:#}", err),
    }
    ctx.update(|s| s.exited = true);
    log::info!("detection worker exited");
}

fn frame_loop(source: &mut dyn FrameSource, ctx: &mut WorkerContext) -> Result<()> {
    let mut last_health_log = Instant::now();
    while !ctx.stop.load(Ordering::SeqCst) {
        match run_iteration(source, &mut ctx.processor)? {
            Some(annotation) => {
                ctx.slot.publish(annotation.image);
                ctx.update(|s| s.frames_rendered += 1);
            }
            None => ctx.update(|s| s.skipped_polls += 1),
        }

        if last_health_log.elapsed() >= ctx.health_log_interval {
            let stats = source.stats();
            log::info!(
                "camera {} frames={} timeouts={} running={}",
                stats.device,
                stats.frames_delivered,
                stats.timeouts,
                source.is_running()
            );
            last_health_log = Instant::now();
        }
    }
    Ok(())
}

/// UI-side handle to a running worker.
pub struct WorkerHandle {
    stop: Arc<AtomicBool>,
    status: Arc<Mutex<WorkerStatus>>,
    done: mpsc::Receiver<()>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn status(&self) -> WorkerStatus {
        self.status
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// True once the loop has ended, by request or by error.
    pub fn is_finished(&self) -> bool {
        self.status().exited
    }

    /// Ask the worker to exit after its current iteration.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Request stop and wait up to `timeout` for the worker to exit.
    pub fn shutdown(mut self, timeout: Duration) -> Result<ShutdownOutcome> {
        self.request_stop();
        match self.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(join) = self.join.take() {
                    join.join()
                        .map_err(|_| anyhow!("detection worker thread panicked"))?;
                }
                Ok(ShutdownOutcome::Joined(self.status()))
            }
            Err(RecvTimeoutError::Timeout) => {
                log::warn!(
                    "detection worker still busy after {:?}; detaching it",
                    timeout
                );
                self.join.take();
                Ok(ShutdownOutcome::TimedOut)
            }
        }
    }

    /// Drive `stream` through Stopping while the worker shuts down.
    ///
    /// The stream only returns to Idle once the worker has joined and released
    /// the camera. A timed-out worker leaves it in Stopping.
    pub fn shutdown_stream(
        self,
        stream: &mut StreamController,
        timeout: Duration,
    ) -> Result<ShutdownOutcome> {
        stream.request_stop()?;
        let outcome = self.shutdown(timeout)?;
        match &outcome {
            ShutdownOutcome::Joined(status) if status.camera_released => stream.finish_stop()?,
            ShutdownOutcome::Joined(_) => {
                log::warn!("camera was not released cleanly; stream stays in Stopping")
            }
            ShutdownOutcome::TimedOut => log::warn!(
                "detection worker did not stop within {:?}; camera still held, stream stays in Stopping",
                timeout
            ),
        }
        Ok(outcome)
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraConfig, SyntheticCamera};
    use crate::detect::{BoundingBox, Detection, StubBackend};

    fn small_camera() -> CameraConfig {
        CameraConfig {
            device: "stub://worker".to_string(),
            width: 64,
            height: 48,
            fps: 200,
            ..CameraConfig::default()
        }
    }

    fn synthetic_opener(config: CameraConfig) -> SourceOpener {
        Box::new(move || -> Result<Box<dyn FrameSource>> {
            Ok(Box::new(SyntheticCamera::new(config)))
        })
    }

    fn processor(backend: StubBackend) -> FrameProcessor {
        FrameProcessor::new(Box::new(backend), Annotator::default())
    }

    #[test]
    fn iteration_annotates_with_depth() -> Result<()> {
        let mut cam = SyntheticCamera::new(small_camera());
        cam.start()?;
        let det = Detection::new(BoundingBox::new(10.0, 10.0, 30.0, 20.0), 0, "person", 0.8);
        let mut proc = processor(StubBackend::with_detections(vec![det]));

        let out = run_iteration(&mut cam, &mut proc)?.expect("frame");
        assert_eq!(out.image.dimensions(), (640, 480));
        assert_eq!(out.readings[0].center, (20, 15));
        assert_eq!(out.readings[0].distance_text().as_deref(), Some("1.02m"));
        Ok(())
    }

    #[test]
    fn worker_publishes_frames_and_shuts_down() -> Result<()> {
        let slot = FrameSlot::new();
        let handle = DetectionWorker::spawn(
            synthetic_opener(small_camera()),
            processor(StubBackend::new()),
            slot.clone(),
            WorkerOptions::default(),
        )?;

        let frame = slot.wait_take(Duration::from_secs(5)).expect("frame published");
        assert_eq!(frame.dimensions(), (640, 480));

        match handle.shutdown(DEFAULT_JOIN_TIMEOUT)? {
            ShutdownOutcome::Joined(status) => {
                assert!(status.exited);
                assert!(status.camera_released);
                assert!(status.frames_rendered >= 1);
                assert_eq!(status.last_error, None);
            }
            ShutdownOutcome::TimedOut => panic!("worker did not exit"),
        }
        Ok(())
    }

    #[test]
    fn detector_failure_ends_loop() -> Result<()> {
        let slot = FrameSlot::new();
        let handle = DetectionWorker::spawn(
            synthetic_opener(small_camera()),
            processor(StubBackend::new().failing_on(2)),
            slot,
            WorkerOptions::default(),
        )?;

        let deadline = Instant::now() + Duration::from_secs(5);
        while !handle.is_finished() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        let status = handle.status();
        assert!(status.exited);
        assert_eq!(status.frames_rendered, 1);
        assert!(status.last_error.unwrap().contains("stub detector failure"));
        assert!(matches!(
            handle.shutdown(DEFAULT_JOIN_TIMEOUT)?,
            ShutdownOutcome::Joined(_)
        ));
        Ok(())
    }

    #[test]
    fn camera_start_failure_is_reported_by_spawn() {
        let bad = CameraConfig {
            width: 0,
            ..small_camera()
        };
        let result = DetectionWorker::spawn(
            synthetic_opener(bad),
            processor(StubBackend::new()),
            FrameSlot::new(),
            WorkerOptions::default(),
        );
        let err = result.err().expect("start must fail");
        assert!(format!("{:#}", err).contains("camera failed to start"));
    }

    struct ColdBackend;

    impl DetectorBackend for ColdBackend {
        fn name(&self) -> &'static str {
            "cold"
        }

        fn detect(&mut self, _frame: &crate::frame::ColorFrame) -> Result<Vec<Detection>> {
            Ok(Vec::new())
        }

        fn warm_up(&mut self) -> Result<()> {
            Err(anyhow!("model output has no anchors"))
        }
    }

    #[test]
    fn warm_up_failure_is_returned_with_context() {
        let mut proc = FrameProcessor::new(Box::new(ColdBackend), Annotator::default());
        let err = proc.warm_up().err().expect("warm-up must fail");
        let text = format!("{:#}", err);
        assert!(text.contains("detector warm-up failed"));
        assert!(text.contains("no anchors"));
    }
}
