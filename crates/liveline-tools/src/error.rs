//! Error types for tool handlers
//!
//! Display strings start with a machine-readable code; handlers prefix them
//! with their area code (`MIXER_ERROR: INVALID_VOLUME: ...`).

use liveline_osc::{OscError, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("INVALID_ARGUMENTS: {0}")]
    InvalidArguments(String),

    #[error("INVALID_VOLUME: {0}")]
    InvalidVolume(String),

    #[error("INVALID_PAN: {0}")]
    InvalidPan(String),

    #[error("INVALID_TEMPO: {0}")]
    InvalidTempo(String),

    #[error("INVALID_TRACK: {0}")]
    InvalidTrack(String),

    #[error("TRACK_NOT_FOUND: No track named \"{0}\"")]
    TrackNotFound(String),

    #[error("INVALID_NOTE[{index}]: {message}")]
    InvalidNote { index: usize, message: String },

    #[error("INVALID_NOTES: {0}")]
    InvalidNotes(String),

    #[error("INVALID_PARAMETER: {0}")]
    InvalidParameter(String),

    #[error("PARAMETER_NOT_FOUND: No parameter named \"{name}\" on device {device}")]
    ParameterNotFound { name: String, device: i64 },

    #[error(
        "INVALID_TRACK: Track {0} is not a MIDI track. Can only create MIDI clips on MIDI tracks."
    )]
    NotMidiTrack(i64),

    #[error(
        "SLOT_NOT_EMPTY: Clip slot [{track}, {scene}] already contains a clip. \
         Delete it first or use a different slot."
    )]
    SlotNotEmpty { track: i64, scene: i64 },

    #[error("MISSING_PARAMS: At least one of {0} must be provided.")]
    MissingParams(&'static str),

    #[error(
        "TOGGLE_UNSUPPORTED: Device has no \"Device On\" parameter and cannot be toggled via this API."
    )]
    ToggleUnsupported,

    #[error("VALUE_OUT_OF_RANGE: Value {value} outside range [{min}, {max}] for parameter \"{parameter}\"")]
    ValueOutOfRange {
        value: f64,
        min: Value,
        max: Value,
        parameter: i64,
    },

    #[error(
        "LOAD_FAILED: Device loading timed out. Ensure the AbletonOSC build in use \
         supports /live/track/insert_device."
    )]
    LoadTimedOut,

    #[error(
        "DEVICE_NOT_FOUND: No device matching \"{0}\" in Ableton browser. Check spelling -- \
         use exact Ableton names like \"Wavetable\", \"EQ Eight\", \"Compressor\"."
    )]
    DeviceNotFound(String),

    #[error(
        "No pending delete for track {0}. Call track_delete without confirm first to review track contents."
    )]
    NoPendingDelete(i64),

    #[error("SAMPLE_NOT_FOUND: Sample not in index. Run sample_search to find available samples.")]
    SampleNotFound,

    #[error(
        "READ_ONLY: Tool \"{0}\" blocked. Read-only mode is active. Use set_read_only(false) to disable."
    )]
    ReadOnly(String),

    #[error(transparent)]
    Osc(#[from] OscError),

    #[error(transparent)]
    Samples(liveline_samples::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl From<liveline_samples::Error> for ToolError {
    fn from(err: liveline_samples::Error) -> Self {
        match err {
            liveline_samples::Error::SampleNotFound(_) => ToolError::SampleNotFound,
            other => ToolError::Samples(other),
        }
    }
}

impl ToolError {
    /// Failures that say something about the connection rather than the request.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, ToolError::Osc(_))
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_codes() {
        let err = ToolError::SlotNotEmpty { track: 1, scene: 2 };
        assert!(err.to_string().starts_with("SLOT_NOT_EMPTY: Clip slot [1, 2]"));

        let err = ToolError::InvalidNote {
            index: 3,
            message: "pitch must be integer 0-127, got 200".into(),
        };
        assert_eq!(
            err.to_string(),
            "INVALID_NOTE[3]: pitch must be integer 0-127, got 200"
        );

        let err = ToolError::ValueOutOfRange {
            value: 2.0,
            min: Value::Float(0.0),
            max: Value::Float(1.0),
            parameter: 4,
        };
        assert_eq!(
            err.to_string(),
            "VALUE_OUT_OF_RANGE: Value 2 outside range [0, 1] for parameter \"4\""
        );
    }

    #[test]
    fn test_osc_errors_are_transparent() {
        let err = ToolError::from(OscError::NotReady);
        assert_eq!(err.to_string(), "OSC client not ready. Call open() first.");
        assert!(err.is_connection_failure());
        assert!(!ToolError::ToggleUnsupported.is_connection_failure());
    }

    #[test]
    fn test_missing_sample_maps_to_code() {
        let err = ToolError::from(liveline_samples::Error::SampleNotFound("/x.wav".into()));
        assert!(matches!(err, ToolError::SampleNotFound));
    }
}
