use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeizowatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Verifier error: {0}")]
    Verifier(#[from] VerifierError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("System error: {message}")]
    System { message: String },
}

impl SeizowatchError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    /// Whether this error must stop the detection loop
    pub fn is_fatal(&self) -> bool {
        match self {
            SeizowatchError::Frame(_) => true,
            SeizowatchError::Verifier(_)
            | SeizowatchError::Sink(_)
            | SeizowatchError::Notify(_)
            | SeizowatchError::EventBus(_) => false,
            _ => true,
        }
    }
}

/// Frame acquisition and frame-pair errors
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Frame acquisition failed: {details}")]
    Acquisition { details: String },

    #[error("Frame dimension mismatch: previous {previous:?}, current {current:?}")]
    DimensionMismatch {
        previous: (u32, u32),
        current: (u32, u32),
    },

    #[error("Malformed frame {frame_id}: {details}")]
    Malformed { frame_id: u64, details: String },
}

/// Secondary classifier errors
#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("Verification unavailable: {details}")]
    Unavailable { details: String },

    #[error("Failed to load model from {path}: {details}")]
    ModelLoad { path: String, details: String },
}

/// Durable event log errors
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to write event {event_id}: {details}")]
    WriteFailed { event_id: String, details: String },

    #[error("Failed to publish status: {details}")]
    StatusFailed { details: String },

    #[error("Failed to read event log: {details}")]
    ReadFailed { details: String },
}

/// Alert delivery errors
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Alert delivery failed: {details}")]
    DeliveryFailed { details: String },
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server failure: {details}")]
    Runtime { details: String },
}

pub type Result<T> = std::result::Result<T, SeizowatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_classification() {
        let mismatch: SeizowatchError = FrameError::DimensionMismatch {
            previous: (4, 4),
            current: (8, 8),
        }
        .into();
        assert!(mismatch.is_fatal());

        let unavailable: SeizowatchError = VerifierError::Unavailable {
            details: "model offline".to_string(),
        }
        .into();
        assert!(!unavailable.is_fatal());

        let sink: SeizowatchError = SinkError::WriteFailed {
            event_id: "e1".to_string(),
            details: "disk full".to_string(),
        }
        .into();
        assert!(!sink.is_fatal());
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = FrameError::DimensionMismatch {
            previous: (640, 480),
            current: (320, 240),
        };
        let message = err.to_string();
        assert!(message.contains("640"));
        assert!(message.contains("320"));
    }
}
