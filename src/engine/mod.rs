pub mod recorder;
pub mod state;

pub use recorder::{Recorder, RecorderConfig, SessionSummary};
pub use state::RecorderState;
