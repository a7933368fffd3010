use std::fs::File;

use armcap::core::{ChannelMap, ChannelValue, Episode, RecorderError};
use arrow::array::Array;
use armcap::dataset::{DatasetLayout, DatasetWriter};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

fn observation(joints: f64, with_camera_error: bool) -> ChannelMap {
    let mut map = ChannelMap::new();
    map.insert(
        "observation.state.left_arm".to_string(),
        ChannelValue::FloatVec(vec![joints; 7]),
    );
    map.insert(
        "observation.camera_video0".to_string(),
        if with_camera_error {
            ChannelValue::Error("frame grab failed".to_string())
        } else {
            ChannelValue::Image {
                height: 2,
                width: 2,
                data: vec![128; 12],
            }
        },
    );
    map
}

fn action(joints: f64) -> ChannelMap {
    let mut map = ChannelMap::new();
    map.insert(
        "action.left_arm".to_string(),
        ChannelValue::FloatVec(vec![joints; 7]),
    );
    map
}

fn finalized_episode(index: u64, frames: usize, with_camera_error: bool) -> Episode {
    let mut episode = Episode::new(index, "pick and place", 0);
    for i in 0..frames {
        episode
            .add_frame(
                1000.0 + i as f64 * 0.1,
                observation(i as f64, with_camera_error),
                action(i as f64),
                ChannelMap::new(),
            )
            .unwrap();
    }
    episode.finalize().unwrap();
    episode
}

fn open_writer(root: &std::path::Path) -> DatasetWriter {
    let layout = DatasetLayout::new(root.join("demo"), 1000);
    DatasetWriter::open(layout, "demo", "realman_dual_arm", 10).unwrap()
}

#[test]
fn test_write_episode_creates_expected_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = open_writer(dir.path());

    let index = writer.allocate_episode_index();
    assert_eq!(index, 0);
    writer.write_episode(&finalized_episode(index, 20, false)).unwrap();

    let layout = writer.layout();
    assert!(layout.path_for(0).exists());
    assert!(layout
        .path_for(0)
        .ends_with("data/chunk-000/episode_000000.parquet"));
    assert!(layout.info_path().exists());

    let log = std::fs::read_to_string(layout.episodes_path()).unwrap();
    assert_eq!(log.lines().count(), 1);

    let info = writer.info();
    assert_eq!(info.num_episodes, 1);
    assert_eq!(info.total_frames, 20);
    assert_eq!(info.fps, 10);
}

#[test]
fn test_round_trip_preserves_rows_and_channels() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = open_writer(dir.path());

    let episode = finalized_episode(writer.allocate_episode_index(), 15, false);
    writer.write_episode(&episode).unwrap();

    let file = File::open(writer.layout().path_for(0)).unwrap();
    let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .with_batch_size(1024)
        .build()
        .unwrap();
    let batch = reader.next().unwrap().unwrap();

    assert_eq!(batch.num_rows(), 15);
    let schema = batch.schema();
    let columns: Vec<&str> = schema
        .fields()
        .iter()
        .map(|f| f.name().as_str())
        .collect();
    for expected in [
        "episode_index",
        "frame_index",
        "timestamp",
        "observation.state.left_arm",
        "observation.camera_video0",
        "action.left_arm",
        "errors",
    ] {
        assert!(columns.contains(&expected), "missing column {expected}");
    }
}

#[test]
fn test_error_markers_become_nulls_with_messages() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = open_writer(dir.path());

    let episode = finalized_episode(writer.allocate_episode_index(), 5, true);
    writer.write_episode(&episode).unwrap();

    let file = File::open(writer.layout().path_for(0)).unwrap();
    let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap();
    let batch = reader.next().unwrap().unwrap();

    let camera = batch
        .column_by_name("observation.camera_video0")
        .unwrap();
    assert_eq!(camera.null_count(), 5);

    let errors = batch.column_by_name("errors").unwrap();
    let errors = errors
        .as_any()
        .downcast_ref::<arrow::array::StringArray>()
        .unwrap();
    for i in 0..errors.len() {
        assert!(errors.value(i).contains("observation.camera_video0"));
        assert!(errors.value(i).contains("frame grab failed"));
    }
}

#[test]
fn test_append_only_episode_log() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = open_writer(dir.path());

    for _ in 0..3 {
        let index = writer.allocate_episode_index();
        writer.write_episode(&finalized_episode(index, 4, false)).unwrap();
    }

    let log = std::fs::read_to_string(writer.layout().episodes_path()).unwrap();
    let indices: Vec<u64> = log
        .lines()
        .map(|line| {
            let record: serde_json::Value = serde_json::from_str(line).unwrap();
            record["episode_index"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(indices, vec![0, 1, 2]);
}

#[test]
fn test_save_dataset_info_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = open_writer(dir.path());

    let index = writer.allocate_episode_index();
    writer.write_episode(&finalized_episode(index, 8, false)).unwrap();

    writer.save_dataset_info().unwrap();
    let first = std::fs::read(writer.layout().info_path()).unwrap();
    writer.save_dataset_info().unwrap();
    let second = std::fs::read(writer.layout().info_path()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unfinalized_episode_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = open_writer(dir.path());

    let mut episode = Episode::new(writer.allocate_episode_index(), "incomplete", 0);
    episode
        .add_frame(0.0, observation(0.0, false), action(0.0), ChannelMap::new())
        .unwrap();

    let err = writer.write_episode(&episode).unwrap_err();
    assert!(matches!(err, RecorderError::State(_)));
    assert_eq!(writer.info().num_episodes, 0);
    assert!(!writer.layout().episodes_path().exists());
}

#[test]
fn test_dataset_schema_fixed_after_first_episode() {
    let dir = tempfile::tempdir().unwrap();
    let mut writer = open_writer(dir.path());

    let index = writer.allocate_episode_index();
    writer.write_episode(&finalized_episode(index, 3, false)).unwrap();

    // Second episode with a divergent channel set
    let mut divergent = Episode::new(writer.allocate_episode_index(), "other", 0);
    let mut obs = ChannelMap::new();
    obs.insert(
        "observation.state.right_arm".to_string(),
        ChannelValue::FloatVec(vec![0.0; 7]),
    );
    divergent
        .add_frame(0.0, obs, action(0.0), ChannelMap::new())
        .unwrap();
    divergent.finalize().unwrap();

    let err = writer.write_episode(&divergent).unwrap_err();
    assert!(matches!(err, RecorderError::Schema { .. }));

    // Prior episode's records are untouched
    assert_eq!(writer.info().num_episodes, 1);
    let log = std::fs::read_to_string(writer.layout().episodes_path()).unwrap();
    assert_eq!(log.lines().count(), 1);
}

#[test]
fn test_reopen_never_reuses_index_of_failed_write() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut writer = open_writer(dir.path());
        // Index 0 goes to an episode whose write fails; only index 1 lands
        // in the log.
        let _lost = writer.allocate_episode_index();
        let index = writer.allocate_episode_index();
        writer.write_episode(&finalized_episode(index, 6, false)).unwrap();
        assert_eq!(writer.info().num_episodes, 1);
    }

    let first_file = {
        let layout = DatasetLayout::new(dir.path().join("demo"), 1000);
        std::fs::read(layout.path_for(1)).unwrap()
    };

    let mut writer = open_writer(dir.path());
    assert_eq!(writer.next_episode_index(), 2);

    let index = writer.allocate_episode_index();
    assert_eq!(index, 2);
    writer.write_episode(&finalized_episode(index, 3, false)).unwrap();

    // Episode 1's file is untouched and its index appears exactly once
    assert_eq!(std::fs::read(writer.layout().path_for(1)).unwrap(), first_file);
    let log = std::fs::read_to_string(writer.layout().episodes_path()).unwrap();
    let indices: Vec<u64> = log
        .lines()
        .map(|line| {
            let record: serde_json::Value = serde_json::from_str(line).unwrap();
            record["episode_index"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(indices, vec![1, 2]);
}

#[test]
fn test_reopen_resumes_counters() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut writer = open_writer(dir.path());
        let index = writer.allocate_episode_index();
        writer.write_episode(&finalized_episode(index, 6, false)).unwrap();
    }

    let writer = open_writer(dir.path());
    assert_eq!(writer.info().num_episodes, 1);
    assert_eq!(writer.info().total_frames, 6);
    assert_eq!(writer.next_episode_index(), 1);
}
