use std::path::{Path, PathBuf};

use crate::core::error::{RecorderError, Result};

/// Default number of episodes per chunk directory
pub const DEFAULT_CHUNK_SIZE: u64 = 1000;

/// Owns the mapping from episode index to on-disk paths and chunk
/// boundaries. Pure function of the index and the configured chunk
/// capacity; chunk assignment is deterministic, never based on file size.
///
/// ```text
/// <root>/
///   meta/info.json
///   meta/episodes.jsonl
///   data/chunk-<NNN>/episode_<NNNNNN>.parquet
///   videos/ (reserved)
/// ```
#[derive(Debug, Clone)]
pub struct DatasetLayout {
    root: PathBuf,
    chunk_size: u64,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>, chunk_size: u64) -> Self {
        assert!(chunk_size > 0, "chunk size must be at least 1");
        Self {
            root: root.into(),
            chunk_size,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join("meta")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Reserved for future video streams
    pub fn videos_dir(&self) -> PathBuf {
        self.root.join("videos")
    }

    pub fn info_path(&self) -> PathBuf {
        self.meta_dir().join("info.json")
    }

    pub fn episodes_path(&self) -> PathBuf {
        self.meta_dir().join("episodes.jsonl")
    }

    /// Chunk index holding the given episode
    pub fn chunk_for(&self, episode_index: u64) -> u64 {
        episode_index / self.chunk_size
    }

    pub fn chunk_dir(&self, chunk_index: u64) -> PathBuf {
        self.data_dir().join(format!("chunk-{chunk_index:03}"))
    }

    /// Data file path for the given episode
    pub fn path_for(&self, episode_index: u64) -> PathBuf {
        self.chunk_dir(self.chunk_for(episode_index))
            .join(format!("episode_{episode_index:06}.parquet"))
    }

    /// Create the fixed directory skeleton. Chunk directories are created
    /// lazily by the writer as episodes land in them.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.meta_dir(), self.data_dir(), self.videos_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| RecorderError::io(e, dir.clone()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_boundaries() {
        let layout = DatasetLayout::new("/tmp/demo", 1000);
        assert_eq!(layout.chunk_for(0), 0);
        assert_eq!(layout.chunk_for(999), 0);
        assert_eq!(layout.chunk_for(1000), 1);
        assert_eq!(layout.chunk_for(2500), 2);
    }

    #[test]
    fn test_path_for_is_deterministic() {
        let layout = DatasetLayout::new("/tmp/demo", 10);
        let path = layout.path_for(12);
        assert!(path.ends_with("data/chunk-001/episode_000012.parquet"));
        assert_eq!(path, layout.path_for(12));
    }
}
