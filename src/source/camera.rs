use super::FrameSource;
use crate::config::CameraConfig;
use crate::error::FrameError;
use crate::frame::GrayFrame;

use async_trait::async_trait;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// No sample for this long is treated as a camera failure
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Frames buffered between the appsink thread and the detection loop
const SAMPLE_QUEUE: usize = 4;

enum CameraMessage {
    Sample(gstreamer::Sample),
    Eos,
}

/// V4L2 camera through GStreamer, converted to GRAY8 in the pipeline
pub struct CameraSource {
    config: CameraConfig,
    pipeline: Option<Pipeline>,
    receiver: Option<mpsc::Receiver<CameraMessage>>,
    frame_count: u64,
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            pipeline: None,
            receiver: None,
            frame_count: 0,
        }
    }

    fn build_pipeline_string(&self) -> String {
        let (width, height) = self.config.resolution;
        format!(
            "v4l2src device=/dev/video{} do-timestamp=true ! \
             videoconvert ! videoscale ! \
             video/x-raw,format=GRAY8,width={},height={},framerate={}/1 ! \
             queue max-size-buffers=4 leaky=downstream ! \
             appsink name=sink sync=false max-buffers=4 drop=true emit-signals=false",
            self.config.index, width, height, self.config.fps
        )
    }

    fn sample_to_frame(&self, sample: &gstreamer::Sample) -> Result<GrayFrame, FrameError> {
        let frame_id = self.frame_count;
        let malformed = |details: String| FrameError::Malformed { frame_id, details };

        let buffer = sample
            .buffer()
            .ok_or_else(|| malformed("No buffer in sample".to_string()))?;
        let caps = sample
            .caps()
            .ok_or_else(|| malformed("No caps in sample".to_string()))?;
        let video_info = VideoInfo::from_caps(caps)
            .map_err(|e| malformed(format!("Failed to get video info: {}", e)))?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;

        let map = buffer
            .map_readable()
            .map_err(|e| malformed(format!("Failed to map buffer: {}", e)))?;
        let bytes = map.as_slice();

        // GRAY8 rows are padded to the stride
        let row = width as usize;
        let mut data = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            let start = y * stride;
            let line = bytes
                .get(start..start + row)
                .ok_or_else(|| malformed(format!("buffer too short for row {}", y)))?;
            data.extend_from_slice(line);
        }

        GrayFrame::new(frame_id, SystemTime::now(), width, height, data)
    }
}

#[async_trait]
impl FrameSource for CameraSource {
    async fn open(&mut self) -> Result<(), FrameError> {
        gstreamer::init().map_err(|e| FrameError::Acquisition {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let pipeline_desc = self.build_pipeline_string();
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| FrameError::Acquisition {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| FrameError::Acquisition {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .and_then(|element| element.downcast::<AppSink>().ok())
            .ok_or_else(|| FrameError::Acquisition {
                details: "Pipeline has no appsink".to_string(),
            })?;

        let (tx, rx) = mpsc::channel(SAMPLE_QUEUE);
        let eos_tx = tx.clone();
        appsink.set_callbacks(
            gstreamer_app::AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink
                        .pull_sample()
                        .map_err(|_| gstreamer::FlowError::Eos)?;
                    if tx.try_send(CameraMessage::Sample(sample)).is_err() {
                        trace!("Detection loop behind; dropping camera sample");
                    }
                    Ok(gstreamer::FlowSuccess::Ok)
                })
                .eos(move |_| {
                    let _ = eos_tx.try_send(CameraMessage::Eos);
                })
                .build(),
        );

        if let Err(e) = pipeline.set_state(gstreamer::State::Playing) {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(FrameError::Acquisition {
                details: format!("Failed to start GStreamer pipeline: {}", e),
            });
        }

        info!("Camera /dev/video{} started", self.config.index);
        self.pipeline = Some(pipeline);
        self.receiver = Some(rx);
        Ok(())
    }

    async fn next_frame(&mut self) -> Result<Option<GrayFrame>, FrameError> {
        let receiver = self.receiver.as_mut().ok_or_else(|| FrameError::Acquisition {
            details: "camera is not open".to_string(),
        })?;

        let message = tokio::time::timeout(FRAME_TIMEOUT, receiver.recv())
            .await
            .map_err(|_| FrameError::Acquisition {
                details: format!("No camera frames received for {:?}", FRAME_TIMEOUT),
            })?;

        match message {
            Some(CameraMessage::Sample(sample)) => {
                let frame = self.sample_to_frame(&sample)?;
                self.frame_count += 1;
                trace!("Captured GRAY8 frame {} ({}x{})", frame.id, frame.width, frame.height);
                Ok(Some(frame))
            }
            Some(CameraMessage::Eos) => {
                warn!("Camera stream reached end of stream");
                Ok(None)
            }
            None => {
                error!("Camera sample channel closed");
                Ok(None)
            }
        }
    }

    async fn close(&mut self) {
        self.receiver = None;
        if let Some(pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.set_state(gstreamer::State::Null) {
                error!("Failed to stop GStreamer pipeline: {}", e);
            }
            debug!("Camera closed after {} frames", self.frame_count);
        }
    }

    fn describe(&self) -> String {
        format!("camera:/dev/video{}", self.config.index)
    }
}
