//! Best-effort camera discovery.
//!
//! Probing is bounded and never fatal: each candidate is opened, checked
//! for a live stream, and asked for one frame, and the handle is released
//! before the next candidate is touched. Failures are reported per
//! candidate so an empty result distinguishes "no devices" from "every
//! probe errored".

use std::path::Path;

use tracing::{debug, info, warn};

use crate::platform::{HostOs, Platform};
use crate::traits::{CameraBackend, CameraDevice, CameraId, FormatHint};

/// Indices probed on index-addressable platforms: 0..10.
const PROBE_INDEX_LIMIT: u32 = 10;

/// Friendly device names worth probing on name-addressable platforms.
const COMMON_DEVICE_NAMES: [&str; 5] = [
    "Integrated Webcam",
    "USB2.0 HD UVC WebCam",
    "USB Camera",
    "Webcam",
    "Camera",
];

/// Outcome of probing one candidate.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// The candidate that was probed.
    pub id: CameraId,
    /// `None` when the candidate produced a frame; the reason otherwise.
    pub failure: Option<String>,
}

impl ProbeResult {
    /// Whether the candidate is usable.
    #[must_use]
    pub const fn is_working(&self) -> bool {
        self.failure.is_none()
    }
}

/// Identifiers worth probing on this platform.
///
/// Index-addressable platforms get a bounded index range, filtered on
/// Linux to device paths that actually exist. Name-addressable platforms
/// get the common-name list. Platforms with no enumeration capability get
/// an empty list, which is not an error.
#[must_use]
pub fn candidate_identifiers(platform: Platform) -> Vec<CameraId> {
    if platform.is_name_addressable() {
        return COMMON_DEVICE_NAMES
            .iter()
            .map(|name| CameraId::Name((*name).to_owned()))
            .collect();
    }
    match platform.os {
        HostOs::Linux => (0..PROBE_INDEX_LIMIT)
            .map(CameraId::Index)
            .filter(|id| Path::new(&platform.device_address(id)).exists())
            .collect(),
        _ => Vec::new(),
    }
}

/// Probe each candidate in order, reporting every outcome.
pub fn probe_candidates<B: CameraBackend>(
    backend: &B,
    candidates: &[CameraId],
) -> Vec<ProbeResult> {
    candidates
        .iter()
        .map(|id| {
            let failure = match probe_one(backend, id) {
                Ok(()) => {
                    info!(camera = %id, "camera is available");
                    None
                }
                Err(reason) => {
                    debug!(camera = %id, reason, "camera not available");
                    Some(reason)
                }
            };
            ProbeResult {
                id: id.clone(),
                failure,
            }
        })
        .collect()
}

/// Discover working cameras on this platform.
#[must_use]
pub fn list_candidate_devices<B: CameraBackend>(platform: Platform, backend: &B) -> Vec<CameraId> {
    let candidates = candidate_identifiers(platform);
    probe_candidates(backend, &candidates)
        .into_iter()
        .filter(ProbeResult::is_working)
        .map(|result| result.id)
        .collect()
}

/// Translate a numeric placeholder on a name-addressable platform by
/// probing the common device names; the first name that opens with a live
/// stream wins. Returns `None` when no translation applies or none
/// matched, in which case callers keep the original identifier.
pub fn resolve_ambiguous_identifier<B: CameraBackend>(
    platform: Platform,
    backend: &B,
    id: &CameraId,
) -> Option<CameraId> {
    if !platform.is_name_addressable() || !matches!(id, CameraId::Index(_)) {
        return None;
    }
    for name in COMMON_DEVICE_NAMES {
        let candidate = CameraId::Name(name.to_owned());
        match backend.open(&candidate, FormatHint::Any) {
            Ok(device) => {
                if device.is_streaming() {
                    info!(from = %id, to = %candidate, "resolved camera identifier");
                    return Some(candidate);
                }
                // Opened without a stream; the handle drops here.
            }
            Err(err) => {
                debug!(name, error = %err, "candidate name rejected");
            }
        }
    }
    warn!(camera = %id, "no common device name matched, keeping identifier");
    None
}

/// Open, check the stream, and decode one frame. The device handle is
/// released before this returns, on every path.
fn probe_one<B: CameraBackend>(backend: &B, id: &CameraId) -> Result<(), String> {
    let mut device = backend
        .open(id, FormatHint::Any)
        .map_err(|err| err.to_string())?;
    if !device.is_streaming() {
        return Err("no video stream".to_owned());
    }
    match device.next_frame() {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err("no frame produced".to_owned()),
        Err(err) => Err(err.to_string()),
    }
}
