//! Transcription options, immutable after task creation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output container requested for the transcription text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
    Srt,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Srt => "srt",
        }
    }
}

fn default_model() -> String {
    "default".to_string()
}

/// `{timestamps, diarization, output_format, model, force_cpu}`, validated at
/// the HTTP boundary and immutable once a `TaskRecord` is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskOptions {
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    pub diarization: bool,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default = "default_model")]
    pub model: String,
    /// Forces the Transcriber to use its CPU code path instead of any
    /// accelerator, passed through verbatim (spec §4.3).
    #[serde(default)]
    pub force_cpu: bool,
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self {
            timestamps: false,
            diarization: false,
            output_format: OutputFormat::default(),
            model: default_model(),
            force_cpu: false,
        }
    }
}

impl TaskOptions {
    /// Build the options pair used by a video fan-out variant, keeping the
    /// client-supplied `output_format`/`model`/`force_cpu` and overriding
    /// only the two booleans the variant fixes.
    pub fn with_flags(&self, timestamps: bool, diarization: bool) -> Self {
        Self {
            timestamps,
            diarization,
            output_format: self.output_format,
            model: self.model.clone(),
            force_cpu: self.force_cpu,
        }
    }
}
