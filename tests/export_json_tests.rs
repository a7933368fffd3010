use armcap::core::{ChannelMap, ChannelValue, Episode};
use armcap::export::ArmRecording;

fn arm_channels(name: &str, joints: f64) -> ChannelMap {
    let mut map = ChannelMap::new();
    map.insert(
        format!("observation.state.{name}_arm"),
        ChannelValue::FloatVec(vec![joints; 7]),
    );
    map.insert(
        format!("observation.state.{name}_eef_pos"),
        ChannelValue::FloatVec(vec![0.3, 0.0, 0.2]),
    );
    map.insert(
        format!("observation.state.{name}_eef_euler"),
        ChannelValue::FloatVec(vec![0.0, 0.1, 0.0]),
    );
    map.insert(
        format!("observation.state.{name}_gripper"),
        ChannelValue::scalar(0.5),
    );
    map
}

fn recorded_episode() -> Episode {
    let mut episode = Episode::new(0, "export me", 0);
    for i in 0..3 {
        episode
            .add_frame(
                10.0 + i as f64 * 0.1,
                arm_channels("left", i as f64),
                ChannelMap::new(),
                ChannelMap::new(),
            )
            .unwrap();
    }
    episode.finalize().unwrap();
    episode
}

#[test]
fn test_from_episode_builds_nested_format() {
    let episode = recorded_episode();
    let recording = ArmRecording::from_episode(&episode, 10, Some("left"), None);

    assert_eq!(recording.metadata.num_frames, 3);
    assert_eq!(recording.metadata.fps, 10);
    assert!((recording.metadata.duration.unwrap() - 0.2).abs() < 1e-9);
    assert_eq!(recording.frames.len(), 3);

    let frame = &recording.frames[1];
    assert_eq!(frame.frame_number, 1);
    let arm = frame.arm1.as_ref().unwrap();
    let joints = arm.joint_states.as_ref().unwrap();
    assert_eq!(joints.angles_rad, vec![1.0; 7]);
    assert!((joints.angles_deg[0] - 1.0_f64.to_degrees()).abs() < 1e-9);
    assert_eq!(arm.end_effector_pose.as_ref().unwrap().position.z, 0.2);
    assert_eq!(arm.gripper_state, Some(0.5));
    assert!(arm.error.is_none());
    assert!(frame.arm2.is_none());
}

#[test]
fn test_read_failure_becomes_error_field() {
    let mut episode = Episode::new(0, "flaky", 0);
    let mut channels = arm_channels("left", 0.0);
    for value in channels.values_mut() {
        *value = ChannelValue::Error("simulated read failure".to_string());
    }
    episode
        .add_frame(0.0, channels, ChannelMap::new(), ChannelMap::new())
        .unwrap();
    episode.finalize().unwrap();

    let recording = ArmRecording::from_episode(&episode, 10, Some("left"), None);
    let arm = recording.frames[0].arm1.as_ref().unwrap();
    assert_eq!(arm.error.as_deref(), Some("simulated read failure"));
    assert!(arm.joint_states.is_none());
}

#[test]
fn test_json_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.json");

    let recording = ArmRecording::from_episode(&recorded_episode(), 10, Some("left"), None);
    recording.save_json(&path).unwrap();

    let loaded: ArmRecording =
        serde_json::from_reader(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(loaded.metadata.num_frames, 3);
    assert_eq!(loaded.frames.len(), 3);
}

#[test]
fn test_csv_flattening() {
    let recording = ArmRecording::from_episode(&recorded_episode(), 10, Some("left"), None);
    let csv = recording.to_csv();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines.len(), 4); // header + 3 frames
    assert!(lines[0].starts_with("frame_number,timestamp,arm1_joint_0"));
    assert!(lines[0].ends_with("arm1_gripper"));

    let cells: Vec<&str> = lines[1].split(',').collect();
    assert_eq!(cells.len(), 2 + 7 + 6 + 1);
    assert_eq!(cells[0], "0");
}
