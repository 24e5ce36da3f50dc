//! The option shape the Transcriber capability actually consumes.

use txo_models::TaskOptions;

/// `{timestamps, diarization, model, force_cpu}` (spec §4.3) — narrower than
/// `TaskOptions`, which additionally carries `output_format` for the HTTP
/// layer's own use.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscribeOptions {
    pub timestamps: bool,
    pub diarization: bool,
    pub model: String,
    pub force_cpu: bool,
}

impl From<&TaskOptions> for TranscribeOptions {
    fn from(options: &TaskOptions) -> Self {
        Self {
            timestamps: options.timestamps,
            diarization: options.diarization,
            model: options.model.clone(),
            force_cpu: options.force_cpu,
        }
    }
}
