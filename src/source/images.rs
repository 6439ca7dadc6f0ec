use super::FrameSource;
use crate::error::FrameError;
use crate::frame::GrayFrame;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, trace};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "pgm", "tif", "tiff"];

/// Still images from a directory, converted to luma and read in file name order
pub struct ImageDirSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    position: usize,
}

impl ImageDirSource {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            files: Vec::new(),
            position: 0,
        }
    }

    fn is_image(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl FrameSource for ImageDirSource {
    async fn open(&mut self) -> Result<(), FrameError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| FrameError::Acquisition {
                details: format!("Failed to read {}: {}", self.dir.display(), e),
            })?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FrameError::Acquisition {
                details: e.to_string(),
            })?
        {
            let path = entry.path();
            if Self::is_image(&path) {
                files.push(path);
            }
        }
        files.sort();

        info!("Found {} images in {}", files.len(), self.dir.display());
        self.files = files;
        self.position = 0;
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<GrayFrame>, FrameError> {
        let Some(path) = self.files.get(self.position).cloned() else {
            debug!("Image directory exhausted after {} frames", self.position);
            return Ok(None);
        };
        let frame_id = self.position as u64;
        self.position += 1;

        let decoded = tokio::task::spawn_blocking({
            let path = path.clone();
            move || image::open(&path).map(|image| image.to_luma8())
        })
        .await
        .map_err(|e| FrameError::Acquisition {
            details: format!("Decoder task failed: {}", e),
        })?
        .map_err(|e| FrameError::Malformed {
            frame_id,
            details: format!("{}: {}", path.display(), e),
        })?;

        let (width, height) = decoded.dimensions();
        trace!("Loaded {} as frame {} ({}x{})", path.display(), frame_id, width, height);
        GrayFrame::new(frame_id, SystemTime::now(), width, height, decoded.into_raw()).map(Some)
    }

    async fn close(&mut self) {
        self.files.clear();
    }

    fn describe(&self) -> String {
        format!("images:{}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_reads_images_in_name_order() {
        let dir = TempDir::new().unwrap();
        GrayImage::from_pixel(4, 3, Luma([200])).save(dir.path().join("b.png")).unwrap();
        GrayImage::from_pixel(4, 3, Luma([10])).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ImageDirSource::new(dir.path().to_path_buf());
        source.open().await.unwrap();

        let first = source.next_frame().await.unwrap().unwrap();
        assert_eq!(first.id, 0);
        assert_eq!(first.dimensions(), (4, 3));
        assert!(first.data.iter().all(|&p| p == 10));

        let second = source.next_frame().await.unwrap().unwrap();
        assert!(second.data.iter().all(|&p| p == 200));

        assert!(source.next_frame().await.unwrap().is_none());
        source.close().await;
    }

    #[tokio::test]
    async fn test_missing_directory_fails_open() {
        let mut source = ImageDirSource::new(PathBuf::from("/nonexistent/frames"));
        assert!(source.open().await.is_err());
    }
}
