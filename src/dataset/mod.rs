pub mod layout;
pub mod queue;
pub mod writer;

pub use layout::{DatasetLayout, DEFAULT_CHUNK_SIZE};
pub use queue::WriteQueue;
pub use writer::{DatasetInfo, DatasetWriter, EpisodeRecord, DATASET_VERSION};
