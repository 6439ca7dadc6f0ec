use super::FrameSource;
use crate::error::FrameError;
use crate::frame::GrayFrame;

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tracing::{debug, info};

type Reader = Box<dyn AsyncRead + Unpin + Send>;

enum Input {
    Path(PathBuf),
    Reader(Option<Reader>),
}

/// Headerless GRAY8 video: consecutive `width * height` byte frames
pub struct RawVideoSource {
    input: Input,
    reader: Option<BufReader<Reader>>,
    width: u32,
    height: u32,
    frame_count: u64,
}

impl RawVideoSource {
    /// Read from a file, or from stdin when `path` is `-`
    pub fn from_path(path: PathBuf, width: u32, height: u32) -> Self {
        Self {
            input: Input::Path(path),
            reader: None,
            width,
            height,
            frame_count: 0,
        }
    }

    pub fn from_reader<R>(reader: R, width: u32, height: u32) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        Self {
            input: Input::Reader(Some(Box::new(reader))),
            reader: None,
            width,
            height,
            frame_count: 0,
        }
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[async_trait]
impl FrameSource for RawVideoSource {
    async fn open(&mut self) -> Result<(), FrameError> {
        if self.frame_len() == 0 {
            return Err(FrameError::Acquisition {
                details: format!("invalid raw frame size {}x{}", self.width, self.height),
            });
        }

        let reader: Reader = match &mut self.input {
            Input::Path(path) if path.as_os_str() == "-" => Box::new(tokio::io::stdin()),
            Input::Path(path) => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| FrameError::Acquisition {
                        details: format!("Failed to open {}: {}", path.display(), e),
                    })?;
                Box::new(file)
            }
            Input::Reader(reader) => reader.take().ok_or_else(|| FrameError::Acquisition {
                details: "raw reader already consumed".to_string(),
            })?,
        };

        info!("Reading raw GRAY8 frames at {}x{}", self.width, self.height);
        self.reader = Some(BufReader::new(reader));
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<GrayFrame>, FrameError> {
        let frame_len = self.frame_len();
        let reader = self.reader.as_mut().ok_or_else(|| FrameError::Acquisition {
            details: "raw source is not open".to_string(),
        })?;

        let mut data = vec![0u8; frame_len];
        let mut filled = 0;
        while filled < frame_len {
            let read = reader
                .read(&mut data[filled..])
                .await
                .map_err(|e| FrameError::Acquisition {
                    details: e.to_string(),
                })?;
            if read == 0 {
                break;
            }
            filled += read;
        }

        if filled == 0 {
            debug!("Raw stream ended after {} frames", self.frame_count);
            return Ok(None);
        }

        let frame_id = self.frame_count;
        if filled < frame_len {
            return Err(FrameError::Malformed {
                frame_id,
                details: format!("truncated frame: {} of {} bytes", filled, frame_len),
            });
        }

        self.frame_count += 1;
        GrayFrame::new(frame_id, SystemTime::now(), self.width, self.height, data).map(Some)
    }

    async fn close(&mut self) {
        if self.reader.take().is_some() {
            debug!("Closed raw source after {} frames", self.frame_count);
        }
    }

    fn describe(&self) -> String {
        match &self.input {
            Input::Path(path) => format!("raw:{}", path.display()),
            Input::Reader(_) => "raw:<reader>".to_string(),
        }
    }
}
