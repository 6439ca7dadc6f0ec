use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SeizowatchConfig {
    pub camera: CameraConfig,
    pub detector: DetectorConfig,
    pub verifier: VerifierConfig,
    pub events: EventsConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second requested from the device
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorConfig {
    /// Assumed sampling rate; converts streak length to seconds
    #[serde(default = "default_detector_fps")]
    pub fps: u32,

    /// Number of motion samples kept for spectral analysis
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,

    /// Minimum motion magnitude for a qualifying frame (resolution dependent)
    #[serde(default = "default_motion_threshold")]
    pub motion_threshold: f64,

    /// Dominant frequency index above which motion counts as rhythmic
    #[serde(default = "default_rhythm_threshold")]
    pub rhythm_threshold: usize,

    /// Consecutive qualifying frames required before verification
    #[serde(default = "default_frame_threshold")]
    pub frame_threshold: u32,

    /// Exclusive upper bound of the spectrum bins searched
    #[serde(default = "default_max_bin")]
    pub max_bin: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VerifierConfig {
    /// JSON model file for the MLP classifier
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Probability above which a candidate is confirmed
    #[serde(default = "default_cutoff")]
    pub cutoff: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EventsConfig {
    /// Append-only JSON Lines log of confirmed events
    #[serde(default = "default_log_path")]
    pub log_path: String,

    /// IANA time zone used for event timestamps
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Minimum interval between status snapshots in milliseconds
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Serve the HTTP status API
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,

    /// IP address to bind to
    #[serde(default = "default_server_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl DetectorConfig {
    /// Seconds represented by `frames` at the configured sampling rate
    pub fn frames_to_seconds(&self, frames: u32) -> f64 {
        frames as f64 / self.fps.max(1) as f64
    }
}

impl EventsConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }

    pub fn parsed_timezone(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|e| ConfigError::Message(format!("Invalid timezone '{}': {}", self.timezone, e)))
    }
}

impl SeizowatchConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("detector.fps", default_detector_fps())?
            .set_default(
                "detector.window_capacity",
                default_window_capacity() as i64,
            )?
            .set_default("detector.motion_threshold", default_motion_threshold())?
            .set_default(
                "detector.rhythm_threshold",
                default_rhythm_threshold() as i64,
            )?
            .set_default("detector.frame_threshold", default_frame_threshold())?
            .set_default("detector.max_bin", default_max_bin() as i64)?
            .set_default("verifier.model_path", default_model_path())?
            .set_default("verifier.cutoff", default_cutoff() as f64)?
            .set_default("events.log_path", default_log_path())?
            .set_default("events.timezone", default_timezone())?
            .set_default(
                "events.status_interval_ms",
                default_status_interval_ms() as i64,
            )?
            .set_default(
                "events.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("server.enabled", default_server_enabled())?
            .set_default("server.ip", default_server_ip())?
            .set_default("server.port", default_server_port())?
            .add_source(File::with_name(&path_str).required(false))
            .add_source(
                Environment::with_prefix("SEIZOWATCH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: SeizowatchConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.detector.fps == 0 {
            return Err(ConfigError::Message(
                "Detector fps must be greater than 0".to_string(),
            ));
        }

        if self.detector.window_capacity < 2 {
            return Err(ConfigError::Message(
                "Detector window_capacity must be at least 2".to_string(),
            ));
        }

        if self.detector.max_bin < 2 {
            return Err(ConfigError::Message(
                "Detector max_bin must be at least 2".to_string(),
            ));
        }

        if self.detector.frame_threshold == 0 {
            return Err(ConfigError::Message(
                "Detector frame_threshold must be greater than 0".to_string(),
            ));
        }

        if !self.detector.motion_threshold.is_finite() || self.detector.motion_threshold < 0.0 {
            return Err(ConfigError::Message(
                "Detector motion_threshold must be a non-negative number".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.verifier.cutoff) {
            return Err(ConfigError::Message(
                "Verifier cutoff must be within [0, 1]".to_string(),
            ));
        }

        if self.events.status_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Events status_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.events.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        self.events.parsed_timezone()?;

        Ok(())
    }

    /// A live camera delivers frames at `camera.fps`, so streak durations are
    /// only correct when the detector time base matches it
    pub fn check_camera_timing(&self) -> Result<(), ConfigError> {
        if self.camera.fps != self.detector.fps {
            return Err(ConfigError::Message(format!(
                "Camera fps ({}) must match detector fps ({}) when reading from the camera",
                self.camera.fps, self.detector.fps
            )));
        }
        Ok(())
    }
}

impl Default for SeizowatchConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
            },
            detector: DetectorConfig::default(),
            verifier: VerifierConfig {
                model_path: default_model_path(),
                cutoff: default_cutoff(),
            },
            events: EventsConfig {
                log_path: default_log_path(),
                timezone: default_timezone(),
                status_interval_ms: default_status_interval_ms(),
                event_bus_capacity: default_event_bus_capacity(),
            },
            server: ServerConfig {
                enabled: default_server_enabled(),
                ip: default_server_ip(),
                port: default_server_port(),
            },
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fps: default_detector_fps(),
            window_capacity: default_window_capacity(),
            motion_threshold: default_motion_threshold(),
            rhythm_threshold: default_rhythm_threshold(),
            frame_threshold: default_frame_threshold(),
            max_bin: default_max_bin(),
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    15
}

fn default_detector_fps() -> u32 {
    15
}
fn default_window_capacity() -> usize {
    60
} // ~4 seconds at 15 fps
fn default_motion_threshold() -> f64 {
    900_000.0
}
fn default_rhythm_threshold() -> usize {
    4
}
fn default_frame_threshold() -> u32 {
    2
}
fn default_max_bin() -> usize {
    50
}

fn default_model_path() -> String {
    "models/seizure_verifier.json".to_string()
}
fn default_cutoff() -> f32 {
    0.5
}

fn default_log_path() -> String {
    "./seizure_events.jsonl".to_string()
}
fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_status_interval_ms() -> u64 {
    1000
}
fn default_event_bus_capacity() -> usize {
    100
}

fn default_server_enabled() -> bool {
    true
}
fn default_server_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_server_port() -> u16 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SeizowatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detector.window_capacity, 60);
        assert_eq!(config.detector.frame_threshold, 2);
        assert_eq!(config.detector.rhythm_threshold, 4);
        assert_eq!(config.verifier.cutoff, 0.5);
        assert_eq!(config.events.status_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_config_validation() {
        let mut config = SeizowatchConfig::default();
        config.detector.fps = 0;
        assert!(config.validate().is_err());

        config.detector.fps = 15;
        config.verifier.cutoff = 1.5;
        assert!(config.validate().is_err());

        config.verifier.cutoff = 0.5;
        config.events.timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());

        config.events.timezone = "Asia/Kolkata".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frames_to_seconds() {
        let detector = DetectorConfig::default();
        assert!((detector.frames_to_seconds(30) - 2.0).abs() < f64::EPSILON);
        assert!((detector.frames_to_seconds(2) - 2.0 / 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "[detector]\nmotion_threshold = 1500000.0\nframe_threshold = 30\n"
        )
        .unwrap();

        let config = SeizowatchConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.detector.motion_threshold, 1_500_000.0);
        assert_eq!(config.detector.frame_threshold, 30);
        assert_eq!(config.detector.window_capacity, 60);
        assert_eq!(config.server.port, 5000);
    }

    #[test]
    fn test_camera_timing_must_match_detector() {
        let mut config = SeizowatchConfig::default();
        assert!(config.check_camera_timing().is_ok());

        config.camera.fps = 30;
        assert!(config.validate().is_ok());
        assert!(config.check_camera_timing().is_err());

        config.detector.fps = 30;
        assert!(config.check_camera_timing().is_ok());
    }

    #[test]
    fn test_environment_overrides_nested_keys() {
        // Same values the file override test expects, so parallel tests agree
        std::env::set_var("SEIZOWATCH_DETECTOR__MOTION_THRESHOLD", "1500000");
        std::env::set_var("SEIZOWATCH_DETECTOR__FRAME_THRESHOLD", "30");

        let dir = tempfile::TempDir::new().unwrap();
        let result = SeizowatchConfig::load_from_file(dir.path().join("absent.toml"));

        std::env::remove_var("SEIZOWATCH_DETECTOR__MOTION_THRESHOLD");
        std::env::remove_var("SEIZOWATCH_DETECTOR__FRAME_THRESHOLD");

        let config = result.unwrap();
        assert_eq!(config.detector.motion_threshold, 1_500_000.0);
        assert_eq!(config.detector.frame_threshold, 30);
        assert_eq!(config.detector.rhythm_threshold, 4);
        assert!(config.validate().is_ok());
    }
}
