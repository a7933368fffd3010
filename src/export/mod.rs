pub mod json;

pub use json::{ArmRecording, RecordedFrame, RecordingMetadata};
