//! API server configuration (spec §6 "Configuration").

use std::path::PathBuf;
use std::time::Duration;

/// Server-wide configuration, resolved once at startup from the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,

    pub audios_dir: PathBuf,
    pub transcriptions_dir: PathBuf,
    pub videos_tmp_dir: PathBuf,
    pub log_file: Option<String>,

    pub max_concurrent_tasks: usize,
    pub queue_depth: usize,
    pub task_timeout_secs: u64,
    pub max_audio_bytes: u64,
    pub max_video_bytes: u64,
    pub extractor_timeout_secs: u64,

    /// Which `Transcriber` implementation to construct: `"http"` talks to
    /// `transcriber_base_url`; anything else falls back to the in-process
    /// stub used for local development.
    pub transcriber_backend: String,
    pub transcriber_base_url: Option<String>,
    pub default_model: String,
    pub default_force_cpu: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        let max_concurrent_tasks = 3;
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            environment: "development".to_string(),

            audios_dir: PathBuf::from("./public/audios"),
            transcriptions_dir: PathBuf::from("./public/transcriptions"),
            videos_tmp_dir: std::env::temp_dir().join("txo-videos"),
            log_file: None,

            max_concurrent_tasks,
            queue_depth: max_concurrent_tasks * 16,
            task_timeout_secs: 600,
            max_audio_bytes: 104_857_600,
            max_video_bytes: 524_288_000,
            extractor_timeout_secs: 600,

            transcriber_backend: "noop".to_string(),
            transcriber_base_url: None,
            default_model: "default".to_string(),
            default_force_cpu: false,
        }
    }
}

impl ApiConfig {
    /// Build configuration from environment variables, falling back to the
    /// defaults above for anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),

            audios_dir: std::env::var("AUDIOS_DIR").map(PathBuf::from).unwrap_or(defaults.audios_dir),
            transcriptions_dir: std::env::var("TRANSCRIPTIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.transcriptions_dir),
            videos_tmp_dir: std::env::var("VIDEOS_TMP_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.videos_tmp_dir),
            log_file: std::env::var("LOG_FILE").ok(),

            max_concurrent_tasks: std::env::var("MAX_CONCURRENT_TASKS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_tasks),
            queue_depth: std::env::var("SCHEDULER_QUEUE_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_concurrent_tasks * 16),
            task_timeout_secs: std::env::var("TASK_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.task_timeout_secs),
            max_audio_bytes: std::env::var("MAX_AUDIO_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_audio_bytes),
            max_video_bytes: std::env::var("MAX_VIDEO_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_video_bytes),
            extractor_timeout_secs: std::env::var("EXTRACTOR_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.extractor_timeout_secs),

            transcriber_backend: std::env::var("TRANSCRIBER_BACKEND").unwrap_or(defaults.transcriber_backend),
            transcriber_base_url: std::env::var("TRANSCRIBER_BASE_URL").ok(),
            default_model: std::env::var("VERSION_MODEL").unwrap_or(defaults.default_model),
            default_force_cpu: std::env::var("FORCE_CPU")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.default_force_cpu),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn extractor_timeout(&self) -> Duration {
        Duration::from_secs(self.extractor_timeout_secs)
    }
}
