//! Single-camera capture loop.
//!
//! A [`CameraCapture`] owns one device for its whole life: construction
//! derives the per-camera output directory, `open` walks the format-hint
//! ladder, and `run` captures, saves, and paces until the stop signal is
//! raised or the optional duration elapses. Stopping is cooperative and
//! idempotent; the device handle is released on every exit path.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use image::codecs::jpeg::JpegEncoder;
use tracing::{debug, info, warn};

use crate::platform::Platform;
use crate::probe;
use crate::traits::{
    CameraBackend, CameraDevice, CameraId, CaptureError, FormatHint, Frame, Result,
};

/// JPEG quality for saved frames.
const JPEG_QUALITY: u8 = 95;

/// Filename timestamps: local time to millisecond precision.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%3f";

/// Sleep out the remainder of the frame interval.
///
/// An iteration that already overran the interval is not compensated for;
/// pacing never tries to catch up with missed frames.
pub fn maintain_fps(loop_start: Instant, frame_interval: Duration) {
    if let Some(remaining) = frame_interval.checked_sub(loop_start.elapsed()) {
        thread::sleep(remaining);
    }
}

/// Whether a run that started at `start` has exhausted its optional duration.
#[must_use]
pub fn should_stop(start: Instant, duration: Option<Duration>) -> bool {
    duration.is_some_and(|limit| start.elapsed() >= limit)
}

/// Capture session for a single camera.
pub struct CameraCapture<B: CameraBackend> {
    backend: B,
    platform: Platform,
    id: CameraId,
    output_dir: PathBuf,
    fps: u32,
    frame_sequence: u64,
    device: Option<B::Device>,
    // Cooperative stop; readers only need eventual visibility.
    stop: Arc<AtomicBool>,
}

impl<B: CameraBackend> CameraCapture<B> {
    /// Create a session for `id`, resolving name-addressable placeholders
    /// and creating the per-camera output directory.
    pub fn new(
        backend: B,
        platform: Platform,
        id: CameraId,
        base_dir: &Path,
        fps: u32,
    ) -> Result<Self> {
        if fps == 0 {
            return Err(CaptureError::InvalidConfig(
                "fps must be greater than zero".to_owned(),
            ));
        }
        let id = probe::resolve_ambiguous_identifier(platform, &backend, &id).unwrap_or(id);
        let output_dir = base_dir.join(format!("camera_{}", id.sanitized()));
        fs::create_dir_all(&output_dir)?;
        debug!(camera = %id, dir = %output_dir.display(), "capture session ready");
        Ok(Self {
            backend,
            platform,
            id,
            output_dir,
            fps,
            frame_sequence: 0,
            device: None,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Identifier this session captures from (post-resolution).
    #[must_use]
    pub const fn id(&self) -> &CameraId {
        &self.id
    }

    /// Directory this session saves frames into.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Whether a device is currently held open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Handle for requesting a stop from another thread or a signal
    /// handler. Raising it takes effect at the next loop iteration.
    #[must_use]
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Open the device using the platform's default format ladder.
    pub fn open(&mut self) -> Result<()> {
        let ladder = self.platform.backend().default_ladder(self.fps);
        self.open_with_ladder(&ladder)
    }

    /// Open the device, trying each hint in order and keeping the first
    /// attempt that opens with a live video stream.
    ///
    /// A failed attempt never leaves a handle behind: an open without a
    /// stream is dropped before the next hint is tried. When every hint
    /// fails the session stays closed and the last failure is reported.
    pub fn open_with_ladder(&mut self, ladder: &[FormatHint]) -> Result<()> {
        let mut last_reason = String::from("empty format ladder");
        for hint in ladder {
            match self.backend.open(&self.id, *hint) {
                Ok(device) => {
                    if device.is_streaming() {
                        info!(
                            camera = %self.id,
                            spec = %device.stream_spec(),
                            hint = %hint,
                            "camera opened"
                        );
                        self.device = Some(device);
                        return Ok(());
                    }
                    debug!(camera = %self.id, hint = %hint, "opened without a video stream");
                    last_reason = format!("no video stream with hint {hint}");
                }
                Err(err) => {
                    debug!(camera = %self.id, hint = %hint, error = %err, "open attempt failed");
                    last_reason = err.to_string();
                }
            }
        }
        Err(CaptureError::OpenFailed {
            id: self.id.clone(),
            reason: last_reason,
        })
    }

    /// Decode the next frame from the open device.
    ///
    /// Yields `None` when the session is not open or the device produced
    /// nothing this cycle; misses are logged and never fatal.
    pub fn capture_frame(&mut self) -> Option<Frame> {
        let device = self.device.as_mut()?;
        match device.next_frame() {
            Ok(Some(frame)) => Some(frame),
            Ok(None) => {
                debug!(camera = %self.id, "no frame this cycle");
                None
            }
            Err(err) => {
                warn!(camera = %self.id, error = %err, "frame capture failed");
                None
            }
        }
    }

    /// Encode `frame` as JPEG and write it under the session directory.
    ///
    /// Filenames carry the sanitized identifier, a millisecond local
    /// timestamp, and the session's frame sequence number, which
    /// increments once per successful save.
    pub fn save_frame(&mut self, frame: &Frame) -> Result<PathBuf> {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        let filename = format!(
            "camera_{}_{}_{:06}.jpg",
            self.id.sanitized(),
            timestamp,
            self.frame_sequence
        );
        let path = self.output_dir.join(filename);
        fs::write(&path, encode_jpeg(frame)?)?;
        self.frame_sequence += 1;
        debug!(camera = %self.id, path = %path.display(), "saved frame");
        Ok(path)
    }

    /// Capture one frame and save it; `None` when no frame was available.
    pub fn capture_and_save(&mut self) -> Result<Option<PathBuf>> {
        match self.capture_frame() {
            Some(frame) => self.save_frame(&frame).map(Some),
            None => Ok(None),
        }
    }

    /// Open the device and capture until stopped.
    ///
    /// Runs until the stop signal is raised, the optional `duration`
    /// elapses, or a save fails. The stop path runs on every exit.
    pub fn run(&mut self, duration: Option<Duration>) -> Result<()> {
        self.open()?;
        info!(camera = %self.id, fps = self.fps, "capture running");
        let start = Instant::now();
        let result = self.paced_loop(start, duration);
        self.stop();
        result
    }

    fn paced_loop(&mut self, start: Instant, duration: Option<Duration>) -> Result<()> {
        let frame_interval = Duration::from_secs(1) / self.fps;
        while !self.stop.load(Ordering::Relaxed) {
            let loop_start = Instant::now();
            self.capture_and_save()?;
            if should_stop(start, duration) {
                info!(camera = %self.id, "capture duration reached");
                break;
            }
            maintain_fps(loop_start, frame_interval);
        }
        Ok(())
    }

    /// Raise the stop signal and release the device. Safe to call in any
    /// state, any number of times.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if self.device.take().is_some() {
            info!(camera = %self.id, frames = self.frame_sequence, "capture stopped");
        }
    }
}

fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>> {
    let mut jpeg = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY);
    encoder
        .encode(&frame.data, frame.width, frame.height, image::ColorType::Rgb8)
        .map_err(|err| CaptureError::Encode(err.to_string()))?;
    Ok(jpeg.into_inner())
}
