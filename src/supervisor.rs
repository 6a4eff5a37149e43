//! Multi-camera supervision.
//!
//! The supervisor owns detection and teardown; each detected camera runs
//! its capture loop on its own OS thread. The only state shared with the
//! loops is one stop flag, raised by the supervisor (or a signal handler)
//! and read at the top of every iteration. Teardown always joins every
//! worker before returning, so no device handle outlives [`MultiCameraCapture::stop_all`].

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::capture::{maintain_fps, should_stop, CameraCapture};
use crate::platform::Platform;
use crate::traits::{CameraBackend, CameraId, CaptureError, Result};

/// How often the supervising thread rechecks the stop and duration
/// conditions while loops run.
const SUPERVISOR_TICK: Duration = Duration::from_secs(1);

/// Runs one capture loop per detected camera.
pub struct MultiCameraCapture<B: CameraBackend> {
    backend: B,
    platform: Platform,
    ids: Vec<CameraId>,
    base_dir: PathBuf,
    fps: u32,
    cameras: Vec<CameraCapture<B>>,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl<B> MultiCameraCapture<B>
where
    B: CameraBackend + Send + 'static,
    B::Device: Send + 'static,
{
    /// Create a supervisor for the configured identifiers.
    #[must_use]
    pub fn new(
        backend: B,
        platform: Platform,
        ids: Vec<CameraId>,
        base_dir: PathBuf,
        fps: u32,
    ) -> Self {
        Self {
            backend,
            platform,
            ids,
            base_dir,
            fps,
            cameras: Vec::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    /// Handle for requesting shutdown from another thread or a signal
    /// handler.
    #[must_use]
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Probe every configured identifier, keeping the sessions that open
    /// and pass a one-frame liveness check. Failed candidates are logged
    /// and excluded without affecting the rest. Returns how many cameras
    /// are live; their devices stay open for the capture loops.
    pub fn detect_available(&mut self) -> usize {
        self.cameras.clear();
        for id in &self.ids {
            match probe_session(&self.backend, self.platform, id, &self.base_dir, self.fps) {
                Ok(camera) => {
                    info!(camera = %camera.id(), "camera detected");
                    self.cameras.push(camera);
                }
                Err(err) => {
                    warn!(camera = %id, error = %err, "camera unavailable");
                }
            }
        }
        self.cameras.len()
    }

    /// Detect cameras and fail when none are usable.
    pub fn start_all(&mut self) -> Result<()> {
        let available = self.detect_available();
        if available == 0 {
            return Err(CaptureError::NoCamerasAvailable);
        }
        info!(cameras = available, fps = self.fps, "starting capture loops");
        Ok(())
    }

    /// Hand each detected session to its own worker thread.
    ///
    /// Loops skip the open step (detection already opened the devices) and
    /// pace themselves to the shared target rate. A per-camera save error
    /// ends that camera's loop only.
    pub fn run_concurrent_loops(&mut self) {
        for mut camera in self.cameras.drain(..) {
            let shutdown = Arc::clone(&self.shutdown);
            let frame_interval = Duration::from_secs(1) / self.fps;
            let spawned = thread::Builder::new()
                .name(format!("capture-{}", camera.id().sanitized()))
                .spawn(move || {
                    camera_loop(&mut camera, &shutdown, frame_interval);
                });
            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(err) => error!(error = %err, "failed to spawn capture thread"),
            }
        }
    }

    /// Capture on all detected cameras until shutdown or `duration`.
    pub fn run(&mut self, duration: Option<Duration>) -> Result<()> {
        self.start_all()?;
        self.run_concurrent_loops();
        let start = Instant::now();
        while !self.shutdown.load(Ordering::Relaxed) && !should_stop(start, duration) {
            thread::sleep(SUPERVISOR_TICK);
        }
        if should_stop(start, duration) {
            info!("capture duration reached");
        }
        self.stop_all();
        Ok(())
    }

    /// Raise the stop flag, join every worker, and release any session
    /// that never made it into a loop. Idempotent.
    pub fn stop_all(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            let name = handle.thread().name().map(str::to_owned);
            if handle.join().is_err() {
                warn!(
                    thread = name.as_deref().unwrap_or("capture"),
                    "capture thread panicked"
                );
            }
        }
        for camera in &mut self.cameras {
            camera.stop();
        }
        self.cameras.clear();
    }
}

impl<B> Drop for MultiCameraCapture<B>
where
    B: CameraBackend,
{
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("capture thread panicked");
            }
        }
    }
}

/// Build, open, and liveness-check one session. The session comes back
/// with its device open; failures release everything before returning.
fn probe_session<B: CameraBackend>(
    backend: &B,
    platform: Platform,
    id: &CameraId,
    base_dir: &Path,
    fps: u32,
) -> Result<CameraCapture<B>> {
    let mut camera = CameraCapture::new(backend.clone(), platform, id.clone(), base_dir, fps)?;
    camera.open()?;
    if camera.capture_frame().is_none() {
        camera.stop();
        return Err(CaptureError::Stream(
            "liveness check produced no frame".to_owned(),
        ));
    }
    Ok(camera)
}

fn camera_loop<B: CameraBackend>(
    camera: &mut CameraCapture<B>,
    shutdown: &AtomicBool,
    frame_interval: Duration,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let loop_start = Instant::now();
        if let Err(err) = camera.capture_and_save() {
            error!(camera = %camera.id(), error = %err, "save failed, ending this camera's loop");
            break;
        }
        maintain_fps(loop_start, frame_interval);
    }
    camera.stop();
}
