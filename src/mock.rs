//! Mock backend for testing without hardware.
//!
//! Open outcomes are scripted per identifier, and every device holds a
//! shared handle counter that drops back down when the device is released,
//! so tests can prove that no probe or capture path leaks a handle.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::traits::{
    CameraBackend, CameraDevice, CameraId, CaptureError, DeviceDescriptor, FormatHint, Frame,
    Result, StreamSpec,
};

/// What a scripted open attempt does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The open call fails outright.
    Refuse,
    /// Opens, but exposes no live video stream.
    NoStream,
    /// Opens and streams, but never yields a frame.
    Silent,
    /// Opens and yields generated frames.
    Streaming,
}

struct MockState {
    open_handles: AtomicUsize,
    opens_attempted: AtomicUsize,
    scripts: Mutex<HashMap<CameraId, VecDeque<OpenOutcome>>>,
    fallback: OpenOutcome,
    width: u32,
    height: u32,
}

/// Mock camera backend with scripted behavior.
///
/// Clones share state, so a test can keep one handle for assertions while
/// the code under test owns another.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<MockState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a backend where every open attempt succeeds and streams.
    #[must_use]
    pub fn new() -> Self {
        Self::with_fallback(OpenOutcome::Streaming)
    }

    /// Create a backend with the given outcome for unscripted attempts.
    #[must_use]
    pub fn with_fallback(fallback: OpenOutcome) -> Self {
        Self {
            state: Arc::new(MockState {
                open_handles: AtomicUsize::new(0),
                opens_attempted: AtomicUsize::new(0),
                scripts: Mutex::new(HashMap::new()),
                fallback,
                // Small frames keep JPEG encoding in tests cheap.
                width: 64,
                height: 48,
            }),
        }
    }

    /// Script outcomes for one identifier, consumed in order; once the
    /// script runs dry the backend falls back to its default outcome.
    #[must_use]
    pub fn script(self, id: &CameraId, outcomes: &[OpenOutcome]) -> Self {
        {
            let mut scripts = self.state.scripts.lock().expect("script lock poisoned");
            scripts
                .entry(id.clone())
                .or_default()
                .extend(outcomes.iter().copied());
        }
        self
    }

    /// Number of device handles currently open.
    #[must_use]
    pub fn open_handles(&self) -> usize {
        self.state.open_handles.load(Ordering::SeqCst)
    }

    /// Total open attempts observed, successful or not.
    #[must_use]
    pub fn opens_attempted(&self) -> usize {
        self.state.opens_attempted.load(Ordering::SeqCst)
    }

    fn next_outcome(&self, id: &CameraId) -> OpenOutcome {
        let mut scripts = self.state.scripts.lock().expect("script lock poisoned");
        scripts
            .get_mut(id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.state.fallback)
    }
}

impl CameraBackend for MockBackend {
    type Device = MockDevice;

    fn open(&self, id: &CameraId, _hint: FormatHint) -> Result<Self::Device> {
        self.state.opens_attempted.fetch_add(1, Ordering::SeqCst);
        let outcome = self.next_outcome(id);
        if outcome == OpenOutcome::Refuse {
            return Err(CaptureError::OpenFailed {
                id: id.clone(),
                reason: "scripted refusal".to_owned(),
            });
        }
        self.state.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(MockDevice {
            state: Arc::clone(&self.state),
            descriptor: DeviceDescriptor {
                name: "Mock Camera".to_owned(),
                address: format!("mock:{id}"),
            },
            spec: StreamSpec {
                width: self.state.width,
                height: self.state.height,
                fps: 30,
            },
            streaming: outcome != OpenOutcome::NoStream,
            yields: outcome == OpenOutcome::Streaming,
            frames_emitted: 0,
        })
    }
}

/// Mock device handle counted against its backend.
pub struct MockDevice {
    state: Arc<MockState>,
    descriptor: DeviceDescriptor,
    spec: StreamSpec,
    streaming: bool,
    yields: bool,
    frames_emitted: u32,
}

impl CameraDevice for MockDevice {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn stream_spec(&self) -> StreamSpec {
        self.spec
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.yields {
            return Ok(None);
        }
        let frame = gradient_frame(self.spec.width, self.spec.height, self.frames_emitted);
        self.frames_emitted += 1;
        Ok(Some(frame))
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        self.state.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Generate an RGB gradient frame fingerprinted with the frame index.
#[allow(clippy::cast_possible_truncation)]
fn gradient_frame(width: u32, height: u32, index: u32) -> Frame {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.push(((x * 255) / width.max(1)) as u8);
            data.push(((y * 255) / height.max(1)) as u8);
            data.push((index % 256) as u8);
        }
    }
    Frame {
        width,
        height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unscripted_opens_stream_by_default() {
        let backend = MockBackend::new();
        let mut device = backend
            .open(&CameraId::Index(0), FormatHint::Any)
            .expect("default open should succeed");
        assert!(device.is_streaming());
        let frame = device.next_frame().expect("mock never errors");
        assert!(frame.is_some());
    }

    #[test]
    fn scripted_outcomes_are_consumed_in_order() {
        let id = CameraId::Index(1);
        let backend = MockBackend::new().script(&id, &[OpenOutcome::Refuse, OpenOutcome::Silent]);

        assert!(backend.open(&id, FormatHint::Any).is_err());

        let mut silent = backend
            .open(&id, FormatHint::Any)
            .expect("second attempt opens");
        assert!(silent.is_streaming());
        assert!(silent.next_frame().expect("mock never errors").is_none());

        // Script exhausted, falls back to streaming.
        let fallback = backend.open(&id, FormatHint::Any).expect("fallback opens");
        assert!(fallback.is_streaming());
        drop(silent);
        drop(fallback);
        assert_eq!(backend.opens_attempted(), 3);
    }

    #[test]
    fn handle_count_tracks_device_lifetime() {
        let backend = MockBackend::new();
        assert_eq!(backend.open_handles(), 0);

        let device = backend
            .open(&CameraId::Index(0), FormatHint::Any)
            .expect("open should succeed");
        assert_eq!(backend.open_handles(), 1);

        drop(device);
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn refused_opens_hold_no_handle() {
        let id = CameraId::Index(2);
        let backend = MockBackend::with_fallback(OpenOutcome::Refuse);
        assert!(backend.open(&id, FormatHint::Any).is_err());
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn frames_are_fingerprinted_by_index() {
        let frame = gradient_frame(4, 2, 7);
        assert_eq!(frame.data.len(), 4 * 2 * 3);
        // Blue channel carries the frame index.
        assert_eq!(frame.data.get(2), Some(&7));
    }
}
