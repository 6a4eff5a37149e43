//! Production camera backend over nokhwa.
//!
//! One backend value serves a whole process; it is `Copy` and each capture
//! loop carries its own. Opening negotiates a format from a single
//! [`FormatHint`] and starts the stream immediately, so a returned device
//! is always live. Dropping the device stops the stream and releases the
//! OS handle.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution,
};
use nokhwa::Camera;
use tracing::debug;

use crate::platform::{BackendKind, Platform};
use crate::traits::{
    CameraBackend, CameraDevice, CameraId, CaptureError, DeviceDescriptor, FormatHint, Frame,
    Result, StreamSpec,
};

/// Camera backend bound to the host's native capture API.
#[derive(Debug, Clone, Copy)]
pub struct NokhwaBackend {
    platform: Platform,
}

impl NokhwaBackend {
    /// Create a backend for the resolved platform.
    #[must_use]
    pub const fn new(platform: Platform) -> Self {
        Self { platform }
    }

    const fn api_backend(self) -> ApiBackend {
        match self.platform.backend() {
            BackendKind::MediaFoundation => ApiBackend::MediaFoundation,
            BackendKind::Video4Linux2 => ApiBackend::Video4Linux,
            BackendKind::AvFoundation => ApiBackend::AVFoundation,
        }
    }
}

fn camera_index(id: &CameraId) -> CameraIndex {
    match id {
        CameraId::Index(index) => CameraIndex::Index(*index),
        CameraId::Name(name) => CameraIndex::String(name.clone()),
    }
}

fn requested_type(hint: FormatHint) -> RequestedFormatType {
    match hint {
        FormatHint::Any => RequestedFormatType::None,
        FormatHint::Closest { width, height, fps } => RequestedFormatType::Closest(
            CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps),
        ),
    }
}

impl CameraBackend for NokhwaBackend {
    type Device = NokhwaDevice;

    fn open(&self, id: &CameraId, hint: FormatHint) -> Result<Self::Device> {
        let requested = RequestedFormat::new::<RgbFormat>(requested_type(hint));
        let mut camera = Camera::with_backend(camera_index(id), requested, self.api_backend())
            .map_err(|err| CaptureError::OpenFailed {
                id: id.clone(),
                reason: err.to_string(),
            })?;
        camera
            .open_stream()
            .map_err(|err| CaptureError::OpenFailed {
                id: id.clone(),
                reason: err.to_string(),
            })?;
        let descriptor = DeviceDescriptor {
            name: camera.info().human_name(),
            address: self.platform.device_address(id),
        };
        debug!(camera = %id, hint = %hint, "stream opened");
        Ok(NokhwaDevice { camera, descriptor })
    }
}

/// An open camera with a running stream.
pub struct NokhwaDevice {
    camera: Camera,
    descriptor: DeviceDescriptor,
}

impl CameraDevice for NokhwaDevice {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn stream_spec(&self) -> StreamSpec {
        let format = self.camera.camera_format();
        StreamSpec {
            width: format.width(),
            height: format.height(),
            fps: format.frame_rate(),
        }
    }

    fn is_streaming(&self) -> bool {
        self.camera.is_stream_open()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let buffer = match self.camera.frame() {
            Ok(buffer) => buffer,
            Err(err) => {
                debug!(camera = %self.descriptor.name, error = %err, "no frame this cycle");
                return Ok(None);
            }
        };
        match buffer.decode_image::<RgbFormat>() {
            Ok(image) => Ok(Some(Frame {
                width: image.width(),
                height: image.height(),
                data: image.into_raw(),
            })),
            Err(err) => {
                debug!(camera = %self.descriptor.name, error = %err, "frame decode failed");
                Ok(None)
            }
        }
    }
}

impl Drop for NokhwaDevice {
    fn drop(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            debug!(camera = %self.descriptor.name, error = %err, "stream stop failed during drop");
        }
    }
}
