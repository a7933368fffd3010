pub mod episode;
pub mod error;
pub mod frame;

pub use episode::{Episode, EpisodeStats};
pub use error::{RecorderError, Result};
pub use frame::{ChannelMap, ChannelSchema, ChannelValue, Frame};
