use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float64Array, Float64Builder, Int64Array, ListBuilder, RecordBatch, StringBuilder,
    UInt8Builder,
};
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};

use crate::core::episode::Episode;
use crate::core::error::{RecorderError, Result};
use crate::core::frame::{ChannelSchema, ChannelValue, Frame};
use crate::dataset::layout::DatasetLayout;

/// On-disk format version
pub const DATASET_VERSION: &str = "3.0";

/// Dataset-level metadata, fully rewritten on each save
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub name: String,
    pub robot_type: String,
    pub fps: u32,
    pub created_at: String,
    pub version: String,
    pub num_episodes: u64,
    pub total_frames: u64,
}

/// One line of `meta/episodes.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub episode_index: u64,
    pub task: String,
    pub task_index: u32,
    pub length: u64,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
}

/// Serializes finalized episodes into the persistent dataset and keeps the
/// dataset-level metadata consistent.
///
/// Owns the episode index counter and the dataset-wide channel schema; the
/// recorder loop only ever requests the next index. A failed episode write
/// leaves the index log and the metadata of previously written episodes
/// untouched.
pub struct DatasetWriter {
    layout: DatasetLayout,
    info: DatasetInfo,
    next_episode_index: u64,
    schema: Option<ChannelSchema>,
}

impl DatasetWriter {
    /// Create the dataset directory skeleton, resuming counters from an
    /// existing `meta/info.json` if one is present. The stored fps wins
    /// over the configured one; the target rate is recorded once and never
    /// retroactively changed.
    pub fn open(
        layout: DatasetLayout,
        name: impl Into<String>,
        robot_type: impl Into<String>,
        fps: u32,
    ) -> Result<Self> {
        layout.ensure_dirs()?;

        let info_path = layout.info_path();
        let info = if info_path.exists() {
            let file =
                File::open(&info_path).map_err(|e| RecorderError::io(e, info_path.clone()))?;
            serde_json::from_reader(BufReader::new(file))?
        } else {
            DatasetInfo {
                name: name.into(),
                robot_type: robot_type.into(),
                fps,
                created_at: chrono::Utc::now().to_rfc3339(),
                version: DATASET_VERSION.to_string(),
                num_episodes: 0,
                total_frames: 0,
            }
        };

        let next_episode_index = resume_next_index(&layout, &info)?;
        Ok(Self {
            layout,
            info,
            next_episode_index,
            schema: None,
        })
    }

    pub fn layout(&self) -> &DatasetLayout {
        &self.layout
    }

    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    pub fn next_episode_index(&self) -> u64 {
        self.next_episode_index
    }

    /// Hand out the next episode index. Indices are never reused, even if
    /// the episode they were allocated to fails to serialize.
    pub fn allocate_episode_index(&mut self) -> u64 {
        let index = self.next_episode_index;
        self.next_episode_index += 1;
        index
    }

    /// Serialize one finalized episode: write its parquet file (atomically,
    /// via temp file + rename), append its index record, and persist the
    /// updated dataset metadata.
    pub fn write_episode(&mut self, episode: &Episode) -> Result<()> {
        if !episode.is_finalized() {
            return Err(RecorderError::State(format!(
                "Episode {} must be finalized before writing",
                episode.episode_index
            )));
        }
        let episode_schema = episode.schema().ok_or_else(|| {
            RecorderError::State(format!(
                "Episode {} has no channel schema",
                episode.episode_index
            ))
        })?;

        // The dataset schema is derived from the first written episode and
        // held fixed for the rest of the session.
        match &self.schema {
            None => self.schema = Some(episode_schema.clone()),
            Some(schema) if schema == episode_schema => {}
            Some(schema) => {
                let expected: Vec<String> = schema.all_keys().cloned().collect();
                let got: Vec<String> = episode_schema.all_keys().cloned().collect();
                return Err(RecorderError::Schema {
                    missing: expected
                        .iter()
                        .filter(|k| !got.contains(k))
                        .cloned()
                        .collect(),
                    unexpected: got
                        .iter()
                        .filter(|k| !expected.contains(k))
                        .cloned()
                        .collect(),
                });
            }
        }

        let batch = build_record_batch(episode)?;

        let path = self.layout.path_for(episode.episode_index);
        let chunk_dir = self
            .layout
            .chunk_dir(self.layout.chunk_for(episode.episode_index));
        std::fs::create_dir_all(&chunk_dir).map_err(|e| RecorderError::io(e, chunk_dir))?;

        // A reader must never observe a partially written file.
        let tmp_path = path.with_extension("parquet.tmp");
        let file = File::create(&tmp_path).map_err(|e| RecorderError::io(e, tmp_path.clone()))?;
        let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
        writer.write(&batch)?;
        writer.close()?;
        std::fs::rename(&tmp_path, &path).map_err(|e| RecorderError::io(e, path))?;

        self.append_episode_index(episode)?;

        self.info.num_episodes += 1;
        self.info.total_frames += episode.len();
        self.save_dataset_info()?;

        if self.next_episode_index <= episode.episode_index {
            self.next_episode_index = episode.episode_index + 1;
        }
        Ok(())
    }

    /// Append one line-delimited metadata record to `meta/episodes.jsonl`.
    /// Append-only; prior lines are never rewritten.
    pub fn append_episode_index(&self, episode: &Episode) -> Result<()> {
        let record = EpisodeRecord {
            episode_index: episode.episode_index,
            task: episode.task.clone(),
            task_index: episode.task_index,
            length: episode.len(),
            start_time: episode.start_time().unwrap_or(0.0),
            end_time: episode.end_time().unwrap_or(0.0),
            duration: episode.duration().unwrap_or(0.0),
        };

        let path = self.layout.episodes_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RecorderError::io(e, path.clone()))?;
        let line = serde_json::to_string(&record)?;
        writeln!(file, "{line}").map_err(|e| RecorderError::io(e, path))?;
        Ok(())
    }

    /// Rewrite `meta/info.json` in full. Idempotent: saving twice with no
    /// new episodes produces identical contents.
    pub fn save_dataset_info(&self) -> Result<()> {
        let path = self.layout.info_path();
        let tmp_path = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(&self.info)?;
        std::fs::write(&tmp_path, body).map_err(|e| RecorderError::io(e, tmp_path.clone()))?;
        std::fs::rename(&tmp_path, &path).map_err(|e| RecorderError::io(e, path))?;
        Ok(())
    }
}

/// The resume point is one past the highest index in `meta/episodes.jsonl`,
/// not the episode count: an index allocated to an episode whose write
/// failed leaves a gap in the log, and handing it out again would overwrite
/// the episode written after it.
fn resume_next_index(layout: &DatasetLayout, info: &DatasetInfo) -> Result<u64> {
    let path = layout.episodes_path();
    if !path.exists() {
        return Ok(info.num_episodes);
    }

    let body = std::fs::read_to_string(&path).map_err(|e| RecorderError::io(e, path.clone()))?;
    let mut next = info.num_episodes;
    for line in body.lines().filter(|line| !line.trim().is_empty()) {
        let record: EpisodeRecord = serde_json::from_str(line)?;
        next = next.max(record.episode_index + 1);
    }
    Ok(next)
}

/// How a channel's cells are typed in the columnar file
enum ColumnKind {
    Vector,
    Image,
}

fn column_kind(frames: &[Frame], key: &str) -> ColumnKind {
    for frame in frames {
        match frame.channel(key) {
            Some(ChannelValue::FloatVec(_)) => return ColumnKind::Vector,
            Some(ChannelValue::Image { .. }) => return ColumnKind::Image,
            _ => continue,
        }
    }
    // Every cell is an error marker; the column is all nulls either way.
    ColumnKind::Vector
}

fn vector_column(frames: &[Frame], key: &str) -> ArrayRef {
    let mut builder = ListBuilder::new(Float64Builder::new());
    for frame in frames {
        match frame.channel(key) {
            Some(ChannelValue::FloatVec(values)) => {
                builder.values().append_slice(values);
                builder.append(true);
            }
            _ => builder.append(false),
        }
    }
    Arc::new(builder.finish())
}

fn image_column(frames: &[Frame], key: &str) -> ArrayRef {
    let mut builder = ListBuilder::new(UInt8Builder::new());
    for frame in frames {
        match frame.channel(key) {
            Some(ChannelValue::Image { data, .. }) => {
                builder.values().append_slice(data);
                builder.append(true);
            }
            _ => builder.append(false),
        }
    }
    Arc::new(builder.finish())
}

/// Per-row JSON map of channel -> error message; `{}` when the frame is
/// clean. Keeps the error markers explicit in the persisted data while the
/// value columns stay numerically typed.
fn errors_column(frames: &[Frame], schema: &ChannelSchema) -> Result<ArrayRef> {
    let mut builder = StringBuilder::new();
    for frame in frames {
        let mut markers = serde_json::Map::new();
        for key in schema.all_keys() {
            if let Some(ChannelValue::Error(msg)) = frame.channel(key) {
                markers.insert(key.clone(), serde_json::Value::String(msg.clone()));
            }
        }
        builder.append_value(serde_json::to_string(&serde_json::Value::Object(markers))?);
    }
    Ok(Arc::new(builder.finish()))
}

/// Convert the frame sequence into one column-oriented record batch: each
/// channel becomes a column, each frame a row.
pub fn build_record_batch(episode: &Episode) -> Result<RecordBatch> {
    let frames = episode.frames();
    let schema = episode.schema().ok_or_else(|| {
        RecorderError::State(format!(
            "Episode {} has no channel schema",
            episode.episode_index
        ))
    })?;

    let mut columns: Vec<(String, ArrayRef)> = Vec::new();

    let episode_indices: Vec<i64> = frames.iter().map(|_| episode.episode_index as i64).collect();
    let frame_indices: Vec<i64> = frames.iter().map(|f| f.frame_index as i64).collect();
    let timestamps: Vec<f64> = frames.iter().map(|f| f.timestamp).collect();

    columns.push((
        "episode_index".to_string(),
        Arc::new(Int64Array::from(episode_indices)) as ArrayRef,
    ));
    columns.push((
        "frame_index".to_string(),
        Arc::new(Int64Array::from(frame_indices)) as ArrayRef,
    ));
    columns.push((
        "timestamp".to_string(),
        Arc::new(Float64Array::from(timestamps)) as ArrayRef,
    ));

    for key in schema.all_keys() {
        let column = match column_kind(frames, key) {
            ColumnKind::Vector => vector_column(frames, key),
            ColumnKind::Image => image_column(frames, key),
        };
        columns.push((key.clone(), column));
    }

    columns.push(("errors".to_string(), errors_column(frames, schema)?));

    RecordBatch::try_from_iter(columns).map_err(RecorderError::from)
}
