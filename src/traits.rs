//! Core traits and types for the camera capture abstraction.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Identifies a camera either by numeric index or by device name.
///
/// Numeric indices address `/dev/video<n>`-style devices; names address
/// platforms (Media Foundation) that enumerate devices by friendly name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
pub enum CameraId {
    /// Zero-based device index.
    Index(u32),
    /// Free-form device name.
    Name(String),
}

impl CameraId {
    /// Collapse an all-digit name into its index form.
    ///
    /// Identifiers arrive as strings from the CLI and as either integers or
    /// strings from the config file; `"1"` and `1` must address the same
    /// device.
    #[must_use]
    pub fn normalized(self) -> Self {
        match self {
            Self::Name(name) => match name.parse::<u32>() {
                Ok(index) => Self::Index(index),
                Err(_) => Self::Name(name),
            },
            Self::Index(index) => Self::Index(index),
        }
    }

    /// Filesystem-safe rendering used for per-camera directories and
    /// filenames.
    ///
    /// Spaces and `:` become `_`. An all-digit name gets an `id_` prefix so
    /// that `Name("0")` and `Index(0)` never map to the same directory.
    #[must_use]
    pub fn sanitized(&self) -> String {
        match self {
            Self::Index(index) => index.to_string(),
            Self::Name(name) => {
                let safe = name.replace([' ', ':'], "_");
                if !safe.is_empty() && safe.chars().all(|ch| ch.is_ascii_digit()) {
                    format!("id_{safe}")
                } else {
                    safe
                }
            }
        }
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

impl FromStr for CameraId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::Name(s.to_owned()).normalized())
    }
}

/// One rung of the open-attempt ladder.
///
/// Drivers reject format requests unevenly, so opening walks a prioritized
/// list of hints and keeps the first one the device accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    /// Accept whatever format the device offers.
    Any,
    /// Request the closest match to the given resolution and rate.
    Closest {
        /// Requested frame width in pixels.
        width: u32,
        /// Requested frame height in pixels.
        height: u32,
        /// Requested frame rate.
        fps: u32,
    },
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "any"),
            Self::Closest { width, height, fps } => {
                write!(f, "{width}x{height}@{fps}")
            }
        }
    }
}

/// Negotiated properties of an open video stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frame rate the device settled on.
    pub fps: u32,
}

impl fmt::Display for StreamSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{}fps", self.width, self.height, self.fps)
    }
}

/// Human-readable description of an open device.
#[derive(Debug, Clone, Default)]
pub struct DeviceDescriptor {
    /// Device name as reported by the backend.
    pub name: String,
    /// Backend-specific device address.
    pub address: String,
}

/// A decoded video frame.
///
/// Pixel data is tightly packed 8-bit RGB, row-major. Frames are transient:
/// they exist between decode and save and are never retained.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGB24 pixel data, `width * height * 3` bytes.
    pub data: Vec<u8>,
}

/// Error type for capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// No open attempt succeeded for the device.
    #[error("failed to open camera {id}: {reason}")]
    OpenFailed {
        /// Identifier of the camera that failed to open.
        id: CameraId,
        /// Backend-reported reason for the last failed attempt.
        reason: String,
    },
    /// Detection finished without a single usable camera.
    #[error("no cameras available")]
    NoCamerasAvailable,
    /// Error during streaming operation.
    #[error("stream error: {0}")]
    Stream(String),
    /// Frame could not be encoded to JPEG.
    #[error("image encoding failed: {0}")]
    Encode(String),
    /// Configuration value out of range or file malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Abstraction over a platform camera backend.
///
/// Implementations are cheap handles: cloning shares the underlying
/// platform state, and each capture loop owns its own clone.
pub trait CameraBackend: Clone {
    /// The device type produced by a successful open.
    type Device: CameraDevice;

    /// Open the device addressed by `id` with a single format hint.
    ///
    /// One call corresponds to one rung of the open ladder; walking the
    /// ladder is the caller's job. Dropping the returned device releases
    /// the underlying handle.
    fn open(&self, id: &CameraId, hint: FormatHint) -> Result<Self::Device>;
}

/// An open camera device yielding decoded frames.
pub trait CameraDevice {
    /// Describe the device for logs and listings.
    fn descriptor(&self) -> &DeviceDescriptor;

    /// Properties the stream was negotiated to.
    fn stream_spec(&self) -> StreamSpec;

    /// Whether the device currently exposes a live video stream.
    fn is_streaming(&self) -> bool;

    /// Decode the next frame from the stream.
    ///
    /// Returns `Ok(None)` on a transient miss (the device produced nothing
    /// this cycle); callers skip and retry on the next iteration.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}
