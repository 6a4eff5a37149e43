//! Configuration loading and merging.
//!
//! Settings come from three layers: command line, optional TOML file, and
//! built-in defaults. The command line wins per field, then the file. A
//! missing config file is normal; a malformed one is an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::traits::{CameraId, CaptureError, Result};

/// Default target frame rate.
const DEFAULT_FPS: u32 = 30;

/// Default base output directory.
const DEFAULT_OUTPUT_DIR: &str = "./frames";

/// Optional settings read from a TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// Camera identifiers, as integers or strings.
    pub cameras: Option<Vec<CameraId>>,
    /// Base output directory.
    pub output_dir: Option<PathBuf>,
    /// Target frames per second.
    pub fps: Option<u32>,
    /// Capture duration in seconds.
    pub duration: Option<u64>,
}

impl FileConfig {
    /// Read settings from `path`. A missing file yields the empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        let config = toml::from_str(&raw)
            .map_err(|err| CaptureError::InvalidConfig(format!("{}: {err}", path.display())))?;
        info!(path = %path.display(), "loaded config file");
        Ok(config)
    }
}

/// Settings supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Camera identifiers.
    pub cameras: Option<Vec<CameraId>>,
    /// Base output directory.
    pub output_dir: Option<PathBuf>,
    /// Target frames per second.
    pub fps: Option<u32>,
    /// Capture duration in seconds.
    pub duration: Option<u64>,
}

/// Fully resolved capture settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Cameras to capture from.
    pub cameras: Vec<CameraId>,
    /// Base output directory.
    pub output_dir: PathBuf,
    /// Target frames per second.
    pub fps: u32,
    /// Stop after this many seconds; `None` runs until interrupted.
    pub duration: Option<u64>,
}

impl CaptureConfig {
    /// Merge CLI overrides, file settings, and defaults.
    pub fn resolve(overrides: Overrides, file: FileConfig) -> Result<Self> {
        let cameras = setting(overrides.cameras, file.cameras, vec![CameraId::Index(0)])
            .into_iter()
            .map(CameraId::normalized)
            .collect();
        let config = Self {
            cameras,
            output_dir: setting(
                overrides.output_dir,
                file.output_dir,
                PathBuf::from(DEFAULT_OUTPUT_DIR),
            ),
            fps: setting(overrides.fps, file.fps, DEFAULT_FPS),
            duration: overrides.duration.or(file.duration),
        };
        config.validate()?;
        Ok(config)
    }

    /// Configured capture duration as a `Duration`, when one was set.
    #[must_use]
    pub fn duration_limit(&self) -> Option<Duration> {
        self.duration.map(Duration::from_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(CaptureError::InvalidConfig(
                "cameras list is empty".to_owned(),
            ));
        }
        if self.fps == 0 {
            return Err(CaptureError::InvalidConfig(
                "fps must be greater than zero".to_owned(),
            ));
        }
        if self.duration == Some(0) {
            return Err(CaptureError::InvalidConfig(
                "duration must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }
}

fn setting<T>(cli: Option<T>, file: Option<T>, default: T) -> T {
    cli.or(file).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = CaptureConfig::resolve(Overrides::default(), FileConfig::default())
            .expect("defaults are valid");
        assert_eq!(config.cameras, vec![CameraId::Index(0)]);
        assert_eq!(config.output_dir, PathBuf::from("./frames"));
        assert_eq!(config.fps, 30);
        assert_eq!(config.duration, None);
    }

    #[test]
    fn cli_beats_file_beats_default_per_field() {
        let file: FileConfig = toml::from_str(
            r#"
            cameras = [1, 2]
            fps = 15
            duration = 600
            "#,
        )
        .expect("valid toml");
        let overrides = Overrides {
            fps: Some(60),
            ..Overrides::default()
        };

        let config = CaptureConfig::resolve(overrides, file).expect("valid merge");

        // fps from the CLI, cameras and duration from the file, the rest
        // from defaults.
        assert_eq!(config.fps, 60);
        assert_eq!(config.cameras, vec![CameraId::Index(1), CameraId::Index(2)]);
        assert_eq!(config.duration, Some(600));
        assert_eq!(config.output_dir, PathBuf::from("./frames"));
    }

    #[test]
    fn file_cameras_accept_integers_and_strings() {
        let file: FileConfig = toml::from_str(
            r#"
            cameras = [0, "Front Door", "2"]
            "#,
        )
        .expect("valid toml");

        let config = CaptureConfig::resolve(Overrides::default(), file).expect("valid merge");

        assert_eq!(
            config.cameras,
            vec![
                CameraId::Index(0),
                CameraId::Name("Front Door".to_owned()),
                CameraId::Index(2),
            ]
        );
    }

    #[test]
    fn empty_camera_list_is_rejected() {
        let file: FileConfig = toml::from_str("cameras = []").expect("valid toml");
        let err = CaptureConfig::resolve(Overrides::default(), file)
            .expect_err("empty camera list must be rejected");
        assert!(matches!(err, CaptureError::InvalidConfig(_)));
    }

    #[test]
    fn zero_fps_and_zero_duration_are_rejected() {
        let zero_fps = Overrides {
            fps: Some(0),
            ..Overrides::default()
        };
        assert!(CaptureConfig::resolve(zero_fps, FileConfig::default()).is_err());

        let zero_duration = Overrides {
            duration: Some(0),
            ..Overrides::default()
        };
        assert!(CaptureConfig::resolve(zero_duration, FileConfig::default()).is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config =
            FileConfig::load(&dir.path().join("nope.toml")).expect("missing file is not an error");
        assert!(config.cameras.is_none());
        assert!(config.fps.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "cameras = [0,").expect("write test file");

        let err = FileConfig::load(&path).expect_err("malformed toml must fail");
        assert!(matches!(err, CaptureError::InvalidConfig(_)));
    }

    #[test]
    fn duration_limit_converts_seconds() {
        let config = CaptureConfig {
            cameras: vec![CameraId::Index(0)],
            output_dir: PathBuf::from("./frames"),
            fps: 30,
            duration: Some(90),
        };
        assert_eq!(config.duration_limit(), Some(Duration::from_secs(90)));
    }
}
