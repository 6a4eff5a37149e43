//! Multicam-Capture: timed frame capture from multiple cameras
//!
//! This library captures still frames from one or more attached cameras at
//! a steady rate and writes them to disk as timestamped JPEG files. Camera
//! access sits behind a trait seam, enabling both production use through
//! the platform's native backend and hardware-free testing with mock
//! devices.

pub mod capture;
pub mod config;
pub mod device;
pub mod platform;
pub mod probe;
pub mod supervisor;
pub mod traits;

#[cfg(test)]
pub mod mock;

pub use capture::CameraCapture;
pub use config::CaptureConfig;
pub use device::NokhwaBackend;
pub use platform::Platform;
pub use supervisor::MultiCameraCapture;
pub use traits::{
    CameraBackend, CameraDevice, CameraId, CaptureError, Frame, Result,
};
