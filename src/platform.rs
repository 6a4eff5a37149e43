//! Host platform resolution.
//!
//! Capture behavior differs per OS in three ways: which backend serves the
//! devices, how devices are addressed (numeric index vs. friendly name),
//! and which open-format ladder the drivers tolerate. All three are derived
//! here, once, at startup; everything downstream receives the resolved
//! [`Platform`] value explicitly.

use std::fmt;
use std::path::Path;

use crate::traits::{CameraId, FormatHint};

/// Marker file present on NVIDIA Jetson boards.
const JETSON_RELEASE_FILE: &str = "/etc/nv_tegra_release";

/// Host operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    /// Microsoft Windows.
    Windows,
    /// Linux, including Jetson-class boards.
    Linux,
    /// Anything else; treated as an AVFoundation host.
    Other,
}

impl fmt::Display for HostOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Windows => write!(f, "windows"),
            Self::Linux => write!(f, "linux"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Capture backend serving the host's cameras.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Windows Media Foundation.
    MediaFoundation,
    /// Video4Linux2.
    Video4Linux2,
    /// Apple AVFoundation.
    AvFoundation,
}

impl BackendKind {
    /// Default open-attempt ladder for this backend at the given rate.
    ///
    /// Media Foundation drivers reject exact requests often enough that the
    /// ladder starts fully permissive and widens through common
    /// resolutions. V4L2 and AVFoundation accept a direct high-resolution
    /// request in practice, with a permissive fallback behind it.
    #[must_use]
    pub fn default_ladder(self, fps: u32) -> Vec<FormatHint> {
        match self {
            Self::MediaFoundation => vec![
                FormatHint::Any,
                FormatHint::Closest {
                    width: 640,
                    height: 480,
                    fps,
                },
                FormatHint::Closest {
                    width: 1280,
                    height: 720,
                    fps,
                },
                FormatHint::Closest {
                    width: 1920,
                    height: 1080,
                    fps,
                },
            ],
            Self::Video4Linux2 | Self::AvFoundation => vec![
                FormatHint::Closest {
                    width: 1920,
                    height: 1080,
                    fps,
                },
                FormatHint::Any,
            ],
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MediaFoundation => write!(f, "Media Foundation"),
            Self::Video4Linux2 => write!(f, "Video4Linux2"),
            Self::AvFoundation => write!(f, "AVFoundation"),
        }
    }
}

/// Resolved host platform, computed once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// Host operating system family.
    pub os: HostOs,
    /// Whether the host is a Jetson-class board. Informational.
    pub jetson: bool,
}

impl Platform {
    /// Resolve the current host. Infallible.
    #[must_use]
    pub fn detect() -> Self {
        let os = match std::env::consts::OS {
            "windows" => HostOs::Windows,
            "linux" => HostOs::Linux,
            _ => HostOs::Other,
        };
        let jetson = os == HostOs::Linux && Path::new(JETSON_RELEASE_FILE).exists();
        Self { os, jetson }
    }

    /// Backend serving this platform's cameras.
    #[must_use]
    pub const fn backend(self) -> BackendKind {
        match self.os {
            HostOs::Windows => BackendKind::MediaFoundation,
            HostOs::Linux => BackendKind::Video4Linux2,
            HostOs::Other => BackendKind::AvFoundation,
        }
    }

    /// Whether cameras here are addressed by friendly name rather than
    /// numeric index.
    #[must_use]
    pub const fn is_name_addressable(self) -> bool {
        matches!(self.os, HostOs::Windows)
    }

    /// Render the backend-specific address for a camera identifier.
    ///
    /// Used in logs and listings; opening goes through the backend's own
    /// index type.
    #[must_use]
    pub fn device_address(self, id: &CameraId) -> String {
        match self.os {
            HostOs::Windows => format!("video={id}"),
            HostOs::Linux => match id {
                CameraId::Index(index) => format!("/dev/video{index}"),
                CameraId::Name(name) => name.clone(),
            },
            HostOs::Other => id.to_string(),
        }
    }
}
