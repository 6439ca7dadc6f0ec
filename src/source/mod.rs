mod raw;

#[cfg(all(feature = "camera", target_os = "linux"))]
mod camera;
#[cfg(feature = "image_source")]
mod images;

pub use raw::RawVideoSource;

#[cfg(all(feature = "camera", target_os = "linux"))]
pub use camera::CameraSource;
#[cfg(feature = "image_source")]
pub use images::ImageDirSource;

use crate::config::CameraConfig;
use crate::error::FrameError;
use crate::frame::GrayFrame;

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Ordered supply of grayscale frames.
///
/// `next_frame` returns `Ok(None)` at end of stream. `close` must be safe to
/// call more than once and after a failed `open`.
#[async_trait]
pub trait FrameSource: Send {
    async fn open(&mut self) -> Result<(), FrameError>;

    async fn next_frame(&mut self) -> Result<Option<GrayFrame>, FrameError>;

    async fn close(&mut self);

    fn describe(&self) -> String;
}

/// Where frames come from, as given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    /// V4L2 device from the camera config
    Camera,
    /// Raw GRAY8 frames at the configured resolution; `-` reads stdin
    Raw(PathBuf),
    /// Directory of still images, read in file name order
    Images(PathBuf),
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "camera" {
            return Ok(SourceKind::Camera);
        }
        if let Some(path) = s.strip_prefix("raw:") {
            if path.is_empty() {
                return Err("raw source needs a path or '-'".to_string());
            }
            return Ok(SourceKind::Raw(PathBuf::from(path)));
        }
        if let Some(dir) = s.strip_prefix("images:") {
            if dir.is_empty() {
                return Err("images source needs a directory".to_string());
            }
            return Ok(SourceKind::Images(PathBuf::from(dir)));
        }
        Err(format!(
            "unknown source '{}' (expected camera, raw:<path>, or images:<dir>)",
            s
        ))
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Camera => write!(f, "camera"),
            SourceKind::Raw(path) => write!(f, "raw:{}", path.display()),
            SourceKind::Images(dir) => write!(f, "images:{}", dir.display()),
        }
    }
}

/// Build the frame source for `kind`
pub fn build_source(
    kind: &SourceKind,
    camera: &CameraConfig,
) -> Result<Box<dyn FrameSource>, FrameError> {
    match kind {
        SourceKind::Camera => build_camera(camera),
        SourceKind::Raw(path) => {
            let (width, height) = camera.resolution;
            Ok(Box::new(RawVideoSource::from_path(path.clone(), width, height)))
        }
        SourceKind::Images(dir) => build_images(dir.clone()),
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
fn build_camera(camera: &CameraConfig) -> Result<Box<dyn FrameSource>, FrameError> {
    Ok(Box::new(CameraSource::new(camera.clone())))
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
fn build_camera(_camera: &CameraConfig) -> Result<Box<dyn FrameSource>, FrameError> {
    Err(FrameError::Acquisition {
        details: "camera capture requires the 'camera' feature on Linux".to_string(),
    })
}

#[cfg(feature = "image_source")]
fn build_images(dir: PathBuf) -> Result<Box<dyn FrameSource>, FrameError> {
    Ok(Box::new(ImageDirSource::new(dir)))
}

#[cfg(not(feature = "image_source"))]
fn build_images(_dir: PathBuf) -> Result<Box<dyn FrameSource>, FrameError> {
    Err(FrameError::Acquisition {
        details: "image directory input requires the 'image_source' feature".to_string(),
    })
}
