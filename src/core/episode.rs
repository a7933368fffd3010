use serde::{Deserialize, Serialize};

use crate::core::error::{RecorderError, Result};
use crate::core::frame::{ChannelMap, ChannelSchema, Frame};

/// Ordered, append-only sequence of frames bounded by an explicit
/// start/finalize lifecycle.
///
/// Created empty, filled by the recorder loop, finalized exactly once.
/// Appending or re-finalizing after finalize fails fast with a state error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub episode_index: u64,
    pub task: String,
    pub task_index: u32,

    frames: Vec<Frame>,
    schema: Option<ChannelSchema>,
    finalized: bool,

    // Computed at finalize
    start_time: Option<f64>,
    end_time: Option<f64>,
    duration: Option<f64>,
}

/// Read-only episode summary for diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub episode_index: u64,
    pub task: String,
    pub length: u64,
    pub duration: f64,
    pub start_time: f64,
    pub end_time: f64,
    /// Achieved average rate: length / duration
    pub average_fps: f64,
}

impl Episode {
    pub fn new(episode_index: u64, task: impl Into<String>, task_index: u32) -> Self {
        Self {
            episode_index,
            task: task.into(),
            task_index,
            frames: Vec::new(),
            schema: None,
            finalized: false,
            start_time: None,
            end_time: None,
            duration: None,
        }
    }

    /// Append one frame. The frame index is assigned here and is always
    /// contiguous from 0. The first frame establishes the channel schema;
    /// every later frame must expose the same channel key set.
    pub fn add_frame(
        &mut self,
        timestamp: f64,
        observation: ChannelMap,
        action: ChannelMap,
        state: ChannelMap,
    ) -> Result<()> {
        if self.finalized {
            return Err(RecorderError::State(format!(
                "Cannot add frame to finalized episode {}",
                self.episode_index
            )));
        }

        let frame = Frame {
            frame_index: self.frames.len() as u64,
            timestamp,
            observation,
            action,
            state,
        };

        match &self.schema {
            None => self.schema = Some(ChannelSchema::of(&frame)),
            Some(schema) => schema.validate(&frame)?,
        }

        self.frames.push(frame);
        Ok(())
    }

    /// Seal the episode: computes start/end timestamps, duration and length.
    /// Fails on zero frames; an empty episode is not a valid dataset record.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(RecorderError::State(format!(
                "Episode {} is already finalized",
                self.episode_index
            )));
        }
        if self.frames.is_empty() {
            return Err(RecorderError::EmptyEpisode(self.episode_index));
        }

        let first = self.frames.first().map(|f| f.timestamp);
        let last = self.frames.last().map(|f| f.timestamp);
        self.start_time = first;
        self.end_time = last;
        self.duration = match (first, last) {
            (Some(s), Some(e)) => Some(e - s),
            _ => None,
        };
        self.finalized = true;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> u64 {
        self.frames.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn schema(&self) -> Option<&ChannelSchema> {
        self.schema.as_ref()
    }

    pub fn start_time(&self) -> Option<f64> {
        self.start_time
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Summary statistics. Never mutates state; usable before finalize,
    /// computing from the frames captured so far.
    pub fn stats(&self) -> EpisodeStats {
        let start = self.frames.first().map(|f| f.timestamp).unwrap_or(0.0);
        let end = self.frames.last().map(|f| f.timestamp).unwrap_or(0.0);
        let duration = end - start;
        let length = self.frames.len() as u64;
        EpisodeStats {
            episode_index: self.episode_index,
            task: self.task.clone(),
            length,
            duration,
            start_time: start,
            end_time: end,
            average_fps: if duration > 0.0 {
                length as f64 / duration
            } else {
                0.0
            },
        }
    }
}
